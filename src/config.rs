use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

pub const DEFAULT_HOST_URL: &str = "https://gitlab.com";

/// 設定ファイルから読み込んだ設定。
///
/// コマンドライン引数や環境変数で指定された値はこちらより優先される。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host_url: String,
    pub access_token: Option<String>,
    /// `--filter-by-author`を省略した場合に使うユーザー名。
    pub author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    host_url: Option<String>,
    access_token: Option<String>,
    author: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from(FileConfig::default())
    }
}

impl From<FileConfig> for Config {
    fn from(file_config: FileConfig) -> Self {
        Self {
            host_url: file_config
                .host_url
                .unwrap_or_else(|| DEFAULT_HOST_URL.to_string()),
            access_token: file_config.access_token,
            author: file_config.author,
        }
    }
}

impl Config {
    /// 既定の場所から設定ファイルを読み込む。
    ///
    /// ファイルが存在しない場合は既定値を返す。
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// 指定したパスから設定ファイルを読み込む。
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// TOML形式の設定を解析する。
    pub fn parse(content: &str) -> Result<Self> {
        let file_config: FileConfig = toml::from_str(content).context("Invalid TOML")?;
        Ok(Self::from(file_config))
    }

    /// `<config_dir>/gitlab-spent/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("config.toml"))
    }
}
