#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create block mode cipher: {source}")]
    CreateBlockMode { source: aes::cipher::InvalidLength },

    #[error("failed to create directory: {source}")]
    CreateDirectory { source: std::io::Error },

    #[error("failed to create hmac: {source}")]
    CreateHmac { source: hmac::digest::InvalidLength },

    #[error("failed to generate code")]
    GenerationFailed,

    #[error("failed to expand with hkdf")]
    HkdfExpand,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("invalid backup format")]
    InvalidBackupFormat,

    #[error("invalid base64: {source}")]
    InvalidBase64 { source: base64::DecodeError },

    #[error("invalid ciphertext envelope")]
    InvalidEnvelope,

    #[error("invalid password or corrupted data")]
    InvalidPasswordOrCorruptData,

    #[error("not a valid otpauth uri")]
    InvalidUri,

    #[error("failed to parse json: {source}")]
    Json {
        source: serde_path_to_error::Error<serde_json::Error>,
    },

    #[error("failed to load config: {source}")]
    LoadConfig {
        source: std::io::Error,
        file: std::path::PathBuf,
    },

    #[error("failed to parse config: {source}")]
    LoadConfigJson {
        source: serde_path_to_error::Error<serde_json::Error>,
        file: std::path::PathBuf,
    },

    #[error("failed to load store: {source}")]
    LoadStore {
        source: std::io::Error,
        file: std::path::PathBuf,
    },

    #[error("failed to parse store: {source}")]
    LoadStoreJson {
        source: serde_path_to_error::Error<serde_json::Error>,
        file: std::path::PathBuf,
    },

    #[error("no record at index {index}")]
    NoSuchRecord { index: usize },

    #[error("a master password is already set")]
    PasswordAlreadySet,

    #[error("no master password has been set")]
    PasswordNotSet,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("pbkdf2 requires at least 1 iteration (got 0)")]
    Pbkdf2ZeroIterations,

    #[error("failed to save config: {source}")]
    SaveConfig {
        source: std::io::Error,
        file: std::path::PathBuf,
    },

    #[error("failed to serialize config: {source}")]
    SaveConfigJson {
        source: serde_json::Error,
        file: std::path::PathBuf,
    },

    #[error("failed to save store: {source}")]
    SaveStore {
        source: std::io::Error,
        file: std::path::PathBuf,
    },

    #[error("failed to serialize store: {source}")]
    SaveStoreJson {
        source: serde_json::Error,
        file: std::path::PathBuf,
    },

    #[error("failed to serialize to json: {source}")]
    SerializeJson { source: serde_json::Error },

    #[error("unsupported envelope version: {version}")]
    UnsupportedEnvelopeVersion { version: u32 },

    #[error("vault is locked")]
    VaultLocked,
}

pub type Result<T> = std::result::Result<T, Error>;
