pub const UNKNOWN_ISSUER: &str = "Unknown";
pub const DEFAULT_ACCOUNT: &str = "default";
pub const BACKUP_VERSION: u32 = 1;

/// One stored totp secret. `code` and `time_remaining` are display state
/// recomputed on every refresh tick; they ride along in the persisted
/// json for compatibility but are never trusted on read, so both
/// tolerate being absent.
#[derive(
    serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq,
)]
pub struct SecretRecord {
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_account")]
    pub account: String,
    pub secret: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, rename = "timeRemaining")]
    pub time_remaining: u64,
}

impl SecretRecord {
    pub fn new(issuer: &str, account: &str, secret: String) -> Self {
        let issuer = issuer.trim();
        let account = account.trim();
        Self {
            issuer: if issuer.is_empty() {
                UNKNOWN_ISSUER.to_string()
            } else {
                issuer.to_string()
            },
            account: if account.is_empty() {
                DEFAULT_ACCOUNT.to_string()
            } else {
                account.to_string()
            },
            secret,
            code: String::new(),
            time_remaining: 0,
        }
    }
}

fn default_issuer() -> String {
    UNKNOWN_ISSUER.to_string()
}

fn default_account() -> String {
    DEFAULT_ACCOUNT.to_string()
}

/// The plaintext inside an exported backup envelope. `codes` is the one
/// mandatory field; an envelope that decrypts but has no `codes` is not
/// a backup.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct Backup {
    pub codes: Vec<SecretRecord>,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_defaults() {
        let record = SecretRecord::new("", "  ", "JBSWY3DP".to_string());
        assert_eq!(record.issuer, "Unknown");
        assert_eq!(record.account, "default");
        assert_eq!(record.secret, "JBSWY3DP");
        assert_eq!(record.code, "");
        assert_eq!(record.time_remaining, 0);

        let record =
            SecretRecord::new(" Example ", "alice", "JBSWY3DP".to_string());
        assert_eq!(record.issuer, "Example");
        assert_eq!(record.account, "alice");
    }

    #[test]
    fn derived_fields_are_optional_on_read() {
        let record: SecretRecord = serde_json::from_str(
            r#"{"issuer":"Example","account":"alice","secret":"JBSWY3DP"}"#,
        )
        .unwrap();
        assert_eq!(record.code, "");
        assert_eq!(record.time_remaining, 0);

        let record: SecretRecord =
            serde_json::from_str(r#"{"secret":"JBSWY3DP"}"#).unwrap();
        assert_eq!(record.issuer, "Unknown");
        assert_eq!(record.account, "default");
    }

    #[test]
    fn time_remaining_is_camel_case_on_the_wire() {
        let mut record =
            SecretRecord::new("Example", "alice", "JBSWY3DP".to_string());
        record.time_remaining = 17;
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""timeRemaining":17"#), "json {json}");
        let parsed: SecretRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn backup_requires_codes() {
        assert!(
            serde_json::from_str::<Backup>(r#"{"timestamp":5}"#).is_err()
        );
        let backup: Backup =
            serde_json::from_str(r#"{"codes":[]}"#).unwrap();
        assert!(backup.codes.is_empty());
        assert_eq!(backup.timestamp, 0);
        assert_eq!(backup.version, 0);
    }
}
