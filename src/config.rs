use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::stages::PipelineSettings;

const DEFAULT_ALLOWED_ORIGINS: &str = "localhost,localhost:3000,*.varram.me";

/// Process-wide service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Scratch directory for staged uploads
    pub upload_dir: PathBuf,
    /// Origin patterns for CORS: exact hosts or `*.domain` wildcards
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub pipeline: PipelineSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            upload_dir: PathBuf::from("uploads"),
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            max_upload_bytes: 50 * 1024 * 1024,
            pipeline: PipelineSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host
                .parse()
                .with_context(|| format!("HOST is not an IP address: {}", host))?;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", port))?;
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = parse_origins(&origins);
        }
        if let Some(bytes) = lookup("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = bytes
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {}", bytes))?;
        }
        if let Some(retries) = lookup("MAX_REMOTE_RETRIES") {
            config.pipeline.max_remote_retries = retries
                .parse()
                .with_context(|| format!("MAX_REMOTE_RETRIES is not a number: {}", retries))?;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
