use crate::prelude::*;

pub const DEFAULT_PERIOD: u64 = 30;
pub const DIGITS: usize = 6;

/// A code together with the start of the window it was generated for.
/// Two calls in the same window always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub window_start: u64,
}

/// Strips whitespace and dashes and uppercases, then checks the result
/// actually decodes as rfc 4648 base32. Keys are pasted from provisioning
/// screens that format them in spaced lowercase groups.
pub fn normalize_secret(raw: &str) -> Result<String> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return Err(Error::GenerationFailed);
    }
    if base32::decode(
        base32::Alphabet::Rfc4648 { padding: false },
        &normalized,
    )
    .is_none()
    {
        return Err(Error::GenerationFailed);
    }
    Ok(normalized)
}

/// Sha-1, six digits. Pure function of its arguments, so callers control
/// the clock. Secrets shorter than the rfc minimum are accepted; real
/// provisioning keys are frequently 10 bytes.
pub fn generate(secret: &str, period: u64, now: u64) -> Result<GeneratedCode> {
    if period == 0 {
        return Err(Error::GenerationFailed);
    }
    let secret = totp_rs::Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|_| Error::GenerationFailed)?;
    if secret.is_empty() {
        return Err(Error::GenerationFailed);
    }
    let totp = totp_rs::TOTP::new_unchecked(
        totp_rs::Algorithm::SHA1,
        DIGITS,
        0,
        period,
        secret,
    );
    Ok(GeneratedCode {
        code: totp.generate(now),
        window_start: now - now % period,
    })
}

/// Seconds until the current window rolls over. Equals `period` exactly
/// at a boundary, which is the tick a scheduler regenerates on.
pub fn seconds_remaining(period: u64, now: u64) -> u64 {
    period - now % period
}

#[cfg(test)]
mod tests {
    use super::*;

    // rfc 6238 appendix b, sha-1 rows, truncated from 8 to 6 digits
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn rfc_6238_vectors() {
        for (time, code) in [
            (59, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
        ] {
            assert_eq!(
                generate(RFC_SECRET, DEFAULT_PERIOD, time).unwrap().code,
                code,
                "at time {time}"
            );
        }
    }

    #[test]
    fn same_window_same_code() {
        let early = generate(RFC_SECRET, DEFAULT_PERIOD, 30).unwrap();
        let late = generate(RFC_SECRET, DEFAULT_PERIOD, 59).unwrap();
        assert_eq!(early, late);
        assert_eq!(early.window_start, 30);
    }

    #[test]
    fn adjacent_windows_differ() {
        let before = generate(RFC_SECRET, DEFAULT_PERIOD, 59).unwrap();
        let after = generate(RFC_SECRET, DEFAULT_PERIOD, 60).unwrap();
        assert_ne!(before.code, after.code);
        assert_eq!(after.window_start, 60);
    }

    #[test]
    fn codes_are_six_digits() {
        let generated =
            generate("GEZDGNBVGY3TQOJQ", DEFAULT_PERIOD, 1_000_000).unwrap();
        assert_eq!(generated.code.len(), DIGITS);
        assert!(generated.code.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn normalization() {
        assert_eq!(
            normalize_secret("gezd gnbv-gy3t qojq").unwrap(),
            "GEZDGNBVGY3TQOJQ"
        );
        assert_eq!(
            normalize_secret("  GEZDGNBVGY3TQOJQ\n").unwrap(),
            "GEZDGNBVGY3TQOJQ"
        );
    }

    #[test]
    fn invalid_secrets_are_rejected() {
        assert!(matches!(
            normalize_secret("not!base32"),
            Err(Error::GenerationFailed)
        ));
        assert!(matches!(
            normalize_secret(" - - "),
            Err(Error::GenerationFailed)
        ));
        assert!(matches!(
            generate("not!base32", DEFAULT_PERIOD, 59),
            Err(Error::GenerationFailed)
        ));
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(matches!(
            generate(RFC_SECRET, 0, 59),
            Err(Error::GenerationFailed)
        ));
    }

    #[test]
    fn seconds_remaining_math() {
        assert_eq!(seconds_remaining(30, 0), 30);
        assert_eq!(seconds_remaining(30, 1), 29);
        assert_eq!(seconds_remaining(30, 29), 1);
        assert_eq!(seconds_remaining(30, 30), 30);
        assert_eq!(seconds_remaining(30, 59), 1);
    }
}
