mod session;
mod settings;

pub use session::Session;
pub use settings::{ApiSettings, Config, ExportSettings};

use crate::error::{ExportError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (XDG config dir, falling back to ~/.invoice-dbf/)
pub fn config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "invoice-dbf") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    let home = dirs_home().ok_or_else(|| {
        ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".invoice-dbf"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand ~ in paths
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load config.toml
pub fn load_config(config_dir: &Path) -> Result<Config> {
    let path = config_dir.join("config.toml");
    if !path.exists() {
        return Err(ExportError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| ExportError::ConfigParse { path, source: e })
}

/// Load session.toml, if a login has been stored
pub fn load_session(config_dir: &Path) -> Result<Option<Session>> {
    let path = config_dir.join("session.toml");
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ExportError::ConfigParse { path, source: e })
}

/// Save session.toml
pub fn save_session(config_dir: &Path, session: &Session) -> Result<()> {
    let path = config_dir.join("session.toml");
    let content = toml::to_string_pretty(session).map_err(|e| {
        ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })?;
    fs::create_dir_all(config_dir)?;
    fs::write(path, content)?;
    Ok(())
}

/// Remove session.toml. Returns whether a session existed.
pub fn clear_session(config_dir: &Path) -> Result<bool> {
    let path = config_dir.join("session.toml");
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[api]
base_url = "https://erp.example.com"
timeout_secs = 30

[export]
output_dir = "~/dbf-export"    # created if missing
header_file = "MOVIMCAB.DBF"   # one row per invoice
detail_file = "MOVIMITE.DBF"   # one row per invoice line
codepage = "cp1252"            # cp1252, cp1250 or cp1251
"#;
