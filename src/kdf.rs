use crate::prelude::*;

pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Derives the vault keys for one envelope: PBKDF2-HMAC-SHA256 over the
/// password and salt, then HKDF-SHA256 expansion into separate encryption
/// and mac keys.
pub fn derive_keys(
    password: &crate::locked::Password,
    salt: &[u8],
    iterations: u32,
) -> Result<crate::locked::Keys> {
    if iterations == 0 {
        return Err(Error::Pbkdf2ZeroIterations);
    }

    let mut keys = crate::locked::Vec::new();
    keys.extend(std::iter::repeat_n(0, 64));

    let master_key = &mut keys.data_mut()[0..32];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
        password.password(),
        salt,
        iterations,
        master_key,
    );

    let hkdf = hkdf::Hkdf::<sha2::Sha256>::from_prk(master_key)
        .map_err(|_| Error::HkdfExpand)?;
    hkdf.expand(b"enc", master_key)
        .map_err(|_| Error::HkdfExpand)?;
    let mac_key = &mut keys.data_mut()[32..64];
    hkdf.expand(b"mac", mac_key).map_err(|_| Error::HkdfExpand)?;

    Ok(crate::locked::Keys::new(keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password(s: &str) -> crate::locked::Password {
        let mut vec = crate::locked::Vec::new();
        vec.extend(s.bytes());
        crate::locked::Password::new(vec)
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_keys(&password("hunter2"), b"0123456789abcdef", 10)
            .unwrap();
        let b = derive_keys(&password("hunter2"), b"0123456789abcdef", 10)
            .unwrap();
        assert_eq!(a.enc_key(), b.enc_key());
        assert_eq!(a.mac_key(), b.mac_key());
    }

    #[test]
    fn enc_and_mac_keys_differ() {
        let keys =
            derive_keys(&password("hunter2"), b"0123456789abcdef", 10)
                .unwrap();
        assert_ne!(keys.enc_key(), keys.mac_key());
    }

    #[test]
    fn salt_changes_keys() {
        let a = derive_keys(&password("hunter2"), b"0123456789abcdef", 10)
            .unwrap();
        let b = derive_keys(&password("hunter2"), b"fedcba9876543210", 10)
            .unwrap();
        assert_ne!(a.enc_key(), b.enc_key());
    }

    #[test]
    fn iterations_change_keys() {
        let a = derive_keys(&password("hunter2"), b"0123456789abcdef", 10)
            .unwrap();
        let b = derive_keys(&password("hunter2"), b"0123456789abcdef", 11)
            .unwrap();
        assert_ne!(a.enc_key(), b.enc_key());
    }

    #[test]
    fn zero_iterations_is_rejected() {
        assert!(matches!(
            derive_keys(&password("hunter2"), b"0123456789abcdef", 0),
            Err(Error::Pbkdf2ZeroIterations)
        ));
    }
}
