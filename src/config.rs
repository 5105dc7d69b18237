//! Service configuration
//!
//! Values resolve as command line, then `VOLTCAST_*` environment variables
//! (a `.env` file is loaded first), then built-in defaults. This module
//! covers the environment and default layers; `main` applies CLI values
//! on top with the `with_*` setters.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::archive::DEFAULT_INDEX;
use crate::error::{Result, VoltcastError};
use crate::upload::DEFAULT_EXTENSIONS;

/// Default bind host for both services
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port of the evaluation service
pub const DEFAULT_EVALUATE_PORT: u16 = 5000;

/// Default port of the upload service
pub const DEFAULT_UPLOAD_PORT: u16 = 5001;

/// Default model artifact of the evaluation service
pub const DEFAULT_EVALUATE_MODEL: &str = "lgbm_model.txt";

/// Default model artifact of the upload service
pub const DEFAULT_UPLOAD_MODEL: &str = "lgbm_upload_model.txt";

/// Default labelled test file
pub const DEFAULT_DATA_PATH: &str = "test1_data.csv";

/// Default document store
pub const DEFAULT_ARCHIVE_URL: &str = "http://localhost:9200";

/// Default upload directory
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default log file of the evaluation service
pub const DEFAULT_LOG_FILE: &str = "app.log";

/// Settings of the fixed-file evaluation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateConfig {
    /// Listen address
    pub addr: SocketAddr,
    /// LightGBM text model
    pub model_path: PathBuf,
    /// Labelled comma-delimited test file
    pub data_path: PathBuf,
    /// Document store root; `None` disables archiving
    pub archive_url: Option<String>,
    /// Index prediction runs are written to
    pub archive_index: String,
    /// Append-mode log file
    pub log_file: Option<PathBuf>,
}

/// Settings of the upload service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Listen address
    pub addr: SocketAddr,
    /// LightGBM text model
    pub model_path: PathBuf,
    /// Where uploads are stored while being scored
    pub upload_dir: PathBuf,
    /// Accepted file extensions
    pub allowed_extensions: Vec<String>,
    /// Append-mode log file
    pub log_file: Option<PathBuf>,
}

impl EvaluateConfig {
    /// Resolve from the process environment and `.env`
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::InvalidConfiguration`] for an unparsable
    /// host or port.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`EvaluateConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            addr: bind_addr(&lookup, DEFAULT_EVALUATE_PORT)?,
            model_path: path_or(&lookup, "VOLTCAST_MODEL", DEFAULT_EVALUATE_MODEL),
            data_path: path_or(&lookup, "VOLTCAST_DATA", DEFAULT_DATA_PATH),
            archive_url: match lookup("VOLTCAST_ARCHIVE_URL") {
                None => Some(DEFAULT_ARCHIVE_URL.to_string()),
                Some(url) => archive_url(&url),
            },
            archive_index: lookup("VOLTCAST_ARCHIVE_INDEX")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_INDEX.to_string()),
            log_file: log_file(&lookup, Some(DEFAULT_LOG_FILE)),
        })
    }

    /// Override the listen address
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::InvalidConfiguration`] for a bad host.
    pub fn with_bind(mut self, host: Option<&str>, port: Option<u16>) -> Result<Self> {
        self.addr = rebind(self.addr, host, port)?;
        Ok(self)
    }

    /// Override the archive URL; `"none"` or `""` disables archiving
    #[must_use]
    pub fn with_archive_url(mut self, url: &str) -> Self {
        self.archive_url = archive_url(url);
        self
    }
}

impl UploadConfig {
    /// Resolve from the process environment and `.env`
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::InvalidConfiguration`] for an unparsable
    /// host or port, or an empty extension list.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`UploadConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let allowed_extensions = match lookup("VOLTCAST_ALLOWED_EXTENSIONS") {
            Some(list) => parse_extensions(&list)?,
            None => DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
        };
        Ok(Self {
            addr: bind_addr(&lookup, DEFAULT_UPLOAD_PORT)?,
            model_path: path_or(&lookup, "VOLTCAST_UPLOAD_MODEL", DEFAULT_UPLOAD_MODEL),
            upload_dir: path_or(&lookup, "VOLTCAST_UPLOAD_DIR", DEFAULT_UPLOAD_DIR),
            allowed_extensions,
            log_file: log_file(&lookup, None),
        })
    }

    /// Override the listen address
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::InvalidConfiguration`] for a bad host.
    pub fn with_bind(mut self, host: Option<&str>, port: Option<u16>) -> Result<Self> {
        self.addr = rebind(self.addr, host, port)?;
        Ok(self)
    }

    /// Override the extension allow-list from a comma-separated value
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::InvalidConfiguration`] if the list is empty.
    pub fn with_extensions(mut self, list: &str) -> Result<Self> {
        self.allowed_extensions = parse_extensions(list)?;
        Ok(self)
    }
}

fn bind_addr(lookup: &impl Fn(&str) -> Option<String>, default_port: u16) -> Result<SocketAddr> {
    let host = lookup("VOLTCAST_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match lookup("VOLTCAST_PORT") {
        Some(p) => p
            .parse::<u16>()
            .map_err(|e| VoltcastError::InvalidConfiguration(format!("VOLTCAST_PORT '{p}': {e}")))?,
        None => default_port,
    };
    socket_addr(&host, port)
}

fn rebind(current: SocketAddr, host: Option<&str>, port: Option<u16>) -> Result<SocketAddr> {
    let host = host.map_or_else(|| current.ip().to_string(), str::to_string);
    socket_addr(&host, port.unwrap_or(current.port()))
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| VoltcastError::InvalidConfiguration(format!("bind address {host}:{port}: {e}")))
}

fn path_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    PathBuf::from(lookup(key).filter(|s| !s.is_empty()).unwrap_or_else(|| default.to_string()))
}

fn log_file(lookup: &impl Fn(&str) -> Option<String>, default: Option<&str>) -> Option<PathBuf> {
    match lookup("VOLTCAST_LOG_FILE") {
        Some(v) if v.is_empty() || v.eq_ignore_ascii_case("none") => None,
        Some(v) => Some(PathBuf::from(v)),
        None => default.map(PathBuf::from),
    }
}

fn archive_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() || url.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(url.to_string())
    }
}

fn parse_extensions(list: &str) -> Result<Vec<String>> {
    let extensions: Vec<String> = list
        .split(',')
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if extensions.is_empty() {
        return Err(VoltcastError::InvalidConfiguration(
            "allowed extension list is empty".to_string(),
        ));
    }
    Ok(extensions)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_evaluate_defaults() {
        let cfg = EvaluateConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg.addr, "0.0.0.0:5000".parse().expect("addr"));
        assert_eq!(cfg.model_path, PathBuf::from("lgbm_model.txt"));
        assert_eq!(cfg.data_path, PathBuf::from("test1_data.csv"));
        assert_eq!(cfg.archive_url.as_deref(), Some("http://localhost:9200"));
        assert_eq!(cfg.archive_index, "predictions");
        assert_eq!(cfg.log_file, Some(PathBuf::from("app.log")));
    }

    #[test]
    fn test_upload_defaults() {
        let cfg = UploadConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg.addr.port(), 5001);
        assert_eq!(cfg.upload_dir, PathBuf::from("uploads"));
        assert_eq!(cfg.allowed_extensions, vec!["csv", "txt"]);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let cfg = EvaluateConfig::from_lookup(lookup(&[
            ("VOLTCAST_HOST", "127.0.0.1"),
            ("VOLTCAST_PORT", "8080"),
            ("VOLTCAST_DATA", "/data/readings.csv"),
            ("VOLTCAST_ARCHIVE_URL", "none"),
            ("VOLTCAST_LOG_FILE", ""),
        ]))
        .expect("config");
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().expect("addr"));
        assert_eq!(cfg.data_path, PathBuf::from("/data/readings.csv"));
        assert_eq!(cfg.archive_url, None);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn test_cli_overrides_environment() {
        let cfg = EvaluateConfig::from_lookup(lookup(&[("VOLTCAST_PORT", "8080")]))
            .expect("config")
            .with_bind(Some("127.0.0.1"), Some(9000))
            .expect("bind")
            .with_archive_url("http://es:9200");
        assert_eq!(cfg.addr, "127.0.0.1:9000".parse().expect("addr"));
        assert_eq!(cfg.archive_url.as_deref(), Some("http://es:9200"));
    }

    #[test]
    fn test_rebind_keeps_unset_parts() {
        let cfg = UploadConfig::from_lookup(lookup(&[]))
            .expect("config")
            .with_bind(None, Some(7000))
            .expect("bind");
        assert_eq!(cfg.addr, "0.0.0.0:7000".parse().expect("addr"));
    }

    #[test]
    fn test_invalid_port() {
        let err = EvaluateConfig::from_lookup(lookup(&[("VOLTCAST_PORT", "http")])).expect_err("port");
        assert!(matches!(err, VoltcastError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_extension_list() {
        let cfg = UploadConfig::from_lookup(lookup(&[("VOLTCAST_ALLOWED_EXTENSIONS", " .CSV, tsv ,")]))
            .expect("config");
        assert_eq!(cfg.allowed_extensions, vec!["csv", "tsv"]);

        let err = UploadConfig::from_lookup(lookup(&[]))
            .expect("config")
            .with_extensions(" , ")
            .expect_err("empty");
        assert!(matches!(err, VoltcastError::InvalidConfiguration(_)));
    }
}
