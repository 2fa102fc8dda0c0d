use std::{
    io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
pub const ASSET_DIR_ENV: &str = "TAKE_CONTROL_ASSET_DIR";

fn ensure_dir(path: PathBuf) -> io::Result<PathBuf> {
    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }
    Ok(path)
}

/// Root for the config file, the SQLite database and uploaded images.
///
/// `TAKE_CONTROL_ASSET_DIR` wins when set. Otherwise debug builds use
/// `dev_assets/` at the workspace root and release builds the platform data
/// directory.
pub fn asset_dir() -> io::Result<PathBuf> {
    if let Ok(override_dir) = std::env::var(ASSET_DIR_ENV) {
        let override_dir = override_dir.trim();
        if !override_dir.is_empty() {
            return ensure_dir(PathBuf::from(override_dir));
        }
    }

    let path = if cfg!(debug_assertions) {
        Path::new(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("io", "take-control", "take-control-api")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?
            .data_dir()
            .to_path_buf()
    };
    ensure_dir(path)
}

pub fn config_path() -> io::Result<PathBuf> {
    Ok(asset_dir()?.join("config.json"))
}

pub fn images_dir() -> io::Result<PathBuf> {
    ensure_dir(asset_dir()?.join("images"))
}

pub fn default_database_url() -> io::Result<String> {
    let path = asset_dir()?.join("db.sqlite");
    Ok(format!("sqlite://{}?mode=rwc", path.to_string_lossy()))
}
