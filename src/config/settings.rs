use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::expand_path;
use crate::dbf::Codepage;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://erp.example.com".to_string(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportSettings {
    pub output_dir: String,
    #[serde(default = "default_header_file")]
    pub header_file: String,
    #[serde(default = "default_detail_file")]
    pub detail_file: String,
    #[serde(default)]
    pub codepage: Codepage,
}

impl ExportSettings {
    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.output_dir)
    }

    pub fn header_path(&self) -> PathBuf {
        self.output_dir().join(&self.header_file)
    }

    pub fn detail_path(&self) -> PathBuf {
        self.output_dir().join(&self.detail_file)
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            header_file: default_header_file(),
            detail_file: default_detail_file(),
            codepage: Codepage::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_header_file() -> String {
    "MOVIMCAB.DBF".to_string()
}

fn default_detail_file() -> String {
    "MOVIMITE.DBF".to_string()
}
