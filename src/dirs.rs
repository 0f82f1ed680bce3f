use crate::prelude::*;

pub fn make_all() -> Result<()> {
    std::fs::create_dir_all(config_dir())
        .map_err(|source| Error::CreateDirectory { source })?;

    std::fs::create_dir_all(data_dir())
        .map_err(|source| Error::CreateDirectory { source })?;

    Ok(())
}

#[must_use]
pub fn config_file() -> std::path::PathBuf {
    config_dir().join("config.json")
}

#[must_use]
pub fn store_file() -> std::path::PathBuf {
    data_dir().join("store.json")
}

fn config_dir() -> std::path::PathBuf {
    let project_dirs =
        directories::ProjectDirs::from("", "", "otpvault").unwrap();
    project_dirs.config_dir().to_path_buf()
}

fn data_dir() -> std::path::PathBuf {
    let project_dirs =
        directories::ProjectDirs::from("", "", "otpvault").unwrap();
    project_dirs.data_dir().to_path_buf()
}
