use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::jog::RepeatPolicy;
use crate::{IdentityToken, ScannerError};

/// Environment variable that overrides `server_url` after the file is read.
pub const SERVER_URL_ENV: &str = "SCANNER_SERVER_URL";

/// ```rust,ignore
/// let config = ScannerClientConfig::load("scanner.toml")?;
/// config.validate()?;
/// let ws = config.websocket_url(&IdentityToken::parse("ab12")?)?;
/// assert_eq!(ws.as_str(), "ws://127.0.0.1:8000/ws/ab12");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScannerClientConfig {
    /// Base http(s) address of the remote controller.
    pub server_url: String,
    pub reconnect_delay_ms: u64,
    pub keepalive_interval_ms: u64,
    pub arm_delay_ms: u64,
    pub repeat_interval_ms: u64,
    pub repeat_policy: RepeatPolicy,
    pub reset_timeout_ms: u64,
}

impl Default for ScannerClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            reconnect_delay_ms: 3_000,
            keepalive_interval_ms: 30_000,
            arm_delay_ms: 300,
            repeat_interval_ms: 150,
            repeat_policy: RepeatPolicy::default(),
            reset_timeout_ms: 5_000,
        }
    }
}

impl ScannerClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ScannerError> {
        toml::from_str(raw).map_err(|e| ScannerError::Config(e.to_string()))
    }

    /// Reads a TOML file, then applies the `SCANNER_SERVER_URL` override.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScannerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScannerError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(SERVER_URL_ENV) {
            if !v.trim().is_empty() {
                self.server_url = v;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ScannerError> {
        let base = self.base_url()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ScannerError::Config(format!(
                "server_url must start with http:// or https://, got {}",
                self.server_url
            )));
        }
        if self.arm_delay_ms == 0 {
            return Err(ScannerError::Config("arm_delay_ms must be greater than 0".to_string()));
        }
        if self.repeat_interval_ms == 0 {
            return Err(ScannerError::Config("repeat_interval_ms must be greater than 0".to_string()));
        }
        if self.keepalive_interval_ms == 0 {
            return Err(ScannerError::Config("keepalive_interval_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    fn base_url(&self) -> Result<Url, ScannerError> {
        let mut base = Url::parse(&self.server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }

    /// `http://h:p` becomes `ws://h:p/ws/{identity}`, `https` becomes `wss`.
    pub fn websocket_url(&self, identity: &IdentityToken) -> Result<Url, ScannerError> {
        let mut url = self.base_url()?.join(&format!("ws/{}", identity))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(ScannerError::Config(format!("unsupported scheme {}", other)));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ScannerError::Config(format!("cannot use {} scheme", scheme)))?;
        Ok(url)
    }

    pub fn reset_url(&self, identity: &IdentityToken) -> Result<Url, ScannerError> {
        Ok(self.base_url()?.join(&format!("api/v1/users/{}/reset", identity))?)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn arm_delay(&self) -> Duration {
        Duration::from_millis(self.arm_delay_ms)
    }

    pub fn repeat_interval(&self) -> Duration {
        Duration::from_millis(self.repeat_interval_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}
