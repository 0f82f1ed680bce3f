use crate::prelude::*;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
    #[serde(default = "default_period")]
    pub period: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_file: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: default_pbkdf2_iterations(),
            period: default_period(),
            store_file: None,
        }
    }
}

fn default_pbkdf2_iterations() -> u32 {
    crate::kdf::DEFAULT_ITERATIONS
}

fn default_period() -> u64 {
    crate::totp::DEFAULT_PERIOD
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing config file means defaults. Zero values would panic
    /// deeper in (pbkdf2 and window math both need at least 1), so they
    /// are pulled back to their defaults here.
    pub async fn load() -> Result<Self> {
        let file = Self::filename();
        let json = match tokio::fs::read_to_string(&file).await {
            Ok(json) => json,
            Err(source)
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::LoadConfig { source, file });
            }
        };
        let jd = &mut serde_json::Deserializer::from_str(&json);
        let mut slf: Self = serde_path_to_error::deserialize(jd)
            .map_err(|source| Error::LoadConfigJson { source, file })?;
        if slf.pbkdf2_iterations == 0 {
            log::warn!(
                "pbkdf2_iterations must be at least 1, using the default"
            );
            slf.pbkdf2_iterations = default_pbkdf2_iterations();
        }
        if slf.period == 0 {
            log::warn!("period must be at least 1, using the default");
            slf.period = default_period();
        }
        Ok(slf)
    }

    pub async fn save(&self) -> Result<()> {
        let file = Self::filename();
        // unwrap is safe here because Self::filename is explicitly
        // constructed as a filename in a directory
        tokio::fs::create_dir_all(file.parent().unwrap())
            .await
            .map_err(|source| Error::SaveConfig {
                source,
                file: file.clone(),
            })?;
        let json = serde_json::to_string(self).map_err(|source| {
            Error::SaveConfigJson {
                source,
                file: file.clone(),
            }
        })?;
        tokio::fs::write(&file, json.as_bytes())
            .await
            .map_err(|source| Error::SaveConfig { source, file })?;
        Ok(())
    }

    #[must_use]
    pub fn store_file(&self) -> std::path::PathBuf {
        self.store_file
            .clone()
            .unwrap_or_else(crate::dirs::store_file)
    }

    fn filename() -> std::path::PathBuf {
        crate::dirs::config_file()
    }
}
