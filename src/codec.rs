use crate::prelude::*;

use aes::cipher::{
    BlockDecryptMut as _, BlockEncryptMut as _, KeyIvInit as _,
};
use base64::Engine as _;
use hmac::Mac as _;
use rand::RngCore as _;
use zeroize::Zeroizing;

pub const ENVELOPE_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;

// Fixed plaintext whose ciphertext is persisted once so that candidate
// passwords can be checked without touching the real vault blob.
pub const PASSWORD_TEST_SENTINEL: &[u8] = b"VALID_PASSWORD_TEST";

/// One self-contained ciphertext: AES-256-CBC with an HMAC-SHA256 tag over
/// iv || ciphertext, keys derived from the password and the embedded salt.
/// The string form (via `Display`/`new`) is what gets persisted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    pub v: u32,
    pub iter: u32,
    pub salt: String,
    pub iv: String,
    pub data: String,
    pub mac: String,
}

impl Envelope {
    pub fn new(s: &str) -> Result<Self> {
        let envelope: Self =
            serde_json::from_str(s).map_err(|_| Error::InvalidEnvelope)?;
        if envelope.v != ENVELOPE_VERSION {
            return Err(Error::UnsupportedEnvelopeVersion {
                version: envelope.v,
            });
        }
        Ok(envelope)
    }

    pub fn seal(
        password: &crate::locked::Password,
        plaintext: &[u8],
        iterations: u32,
    ) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let mut salt = [0_u8; SALT_LEN];
        rng.fill_bytes(&mut salt);
        let mut iv = [0_u8; IV_LEN];
        rng.fill_bytes(&mut iv);

        let keys = crate::kdf::derive_keys(password, &salt, iterations)?;

        let cipher =
            cbc::Encryptor::<aes::Aes256>::new_from_slices(
                keys.enc_key(),
                &iv,
            )
            .map_err(|source| Error::CreateBlockMode { source })?;
        let ciphertext =
            cipher.encrypt_padded_vec_mut::<block_padding::Pkcs7>(plaintext);

        let mut digest =
            hmac::Hmac::<sha2::Sha256>::new_from_slice(keys.mac_key())
                .map_err(|source| Error::CreateHmac { source })?;
        digest.update(&iv);
        digest.update(&ciphertext);
        let mac = digest.finalize().into_bytes();

        Ok(Self {
            v: ENVELOPE_VERSION,
            iter: iterations,
            salt: base64::engine::general_purpose::STANDARD.encode(salt),
            iv: base64::engine::general_purpose::STANDARD.encode(iv),
            data: base64::engine::general_purpose::STANDARD
                .encode(ciphertext),
            mac: base64::engine::general_purpose::STANDARD.encode(mac),
        })
    }

    /// Verifies the mac, then decrypts. Any mismatch (wrong password,
    /// bit rot, tampering) collapses to `InvalidPasswordOrCorruptData`.
    /// The iteration count comes from the envelope itself, so blobs sealed
    /// under a different configuration still open.
    pub fn open(
        &self,
        password: &crate::locked::Password,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let salt = decode_field(&self.salt, Some(SALT_LEN))?;
        let iv = decode_field(&self.iv, Some(IV_LEN))?;
        let ciphertext = decode_field(&self.data, None)?;
        let mac = decode_field(&self.mac, Some(MAC_LEN))?;

        let keys = crate::kdf::derive_keys(password, &salt, self.iter)?;

        let mut digest =
            hmac::Hmac::<sha2::Sha256>::new_from_slice(keys.mac_key())
                .map_err(|source| Error::CreateHmac { source })?;
        digest.update(&iv);
        digest.update(&ciphertext);
        digest
            .verify_slice(&mac)
            .map_err(|_| Error::InvalidPasswordOrCorruptData)?;

        let cipher =
            cbc::Decryptor::<aes::Aes256>::new_from_slices(
                keys.enc_key(),
                &iv,
            )
            .map_err(|source| Error::CreateBlockMode { source })?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<block_padding::Pkcs7>(&ciphertext)
            .map_err(|_| Error::InvalidPasswordOrCorruptData)?;

        Ok(Zeroizing::new(plaintext))
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json =
            serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

fn decode_field(input: &str, expected_len: Option<usize>) -> Result<Vec<u8>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(input)
        .map_err(|source| Error::InvalidBase64 { source })?;
    if let Some(expected_len) = expected_len {
        if bytes.len() != expected_len {
            return Err(Error::InvalidEnvelope);
        }
    }
    Ok(bytes)
}

/// Serializes `value` to json and seals it under `password`.
pub fn encrypt_value<T: serde::Serialize>(
    value: &T,
    password: &crate::locked::Password,
    iterations: u32,
) -> Result<String> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(value)
            .map_err(|source| Error::SerializeJson { source })?,
    );
    Ok(Envelope::seal(password, &plaintext, iterations)?.to_string())
}

/// Opens a sealed blob and parses the plaintext back out of json.
pub fn decrypt_value<T: serde::de::DeserializeOwned>(
    blob: &str,
    password: &crate::locked::Password,
) -> Result<T> {
    let plaintext = Envelope::new(blob)?.open(password)?;
    serde_json::from_slice(&plaintext)
        .map_err(|_| Error::InvalidPasswordOrCorruptData)
}

pub fn create_password_test(
    password: &crate::locked::Password,
    iterations: u32,
) -> Result<String> {
    Ok(Envelope::seal(password, PASSWORD_TEST_SENTINEL, iterations)?
        .to_string())
}

/// Whether `candidate` is the password that sealed `test_blob`. Converts
/// every failure into `false`; verification must never error.
pub fn validate_password(
    test_blob: &str,
    candidate: &crate::locked::Password,
) -> bool {
    Envelope::new(test_blob)
        .and_then(|envelope| envelope.open(candidate))
        .is_ok_and(|plaintext| plaintext.as_slice() == PASSWORD_TEST_SENTINEL)
}
