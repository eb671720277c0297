use crate::utils::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between eviction sweeps
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default session cookie name
pub const DEFAULT_COOKIE_NAME: &str = "_s";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity limit in seconds; 0 disables timeout eviction
    pub timeout_secs: u64,

    /// Absolute age limit in seconds; 0 disables expiration eviction
    pub expiration_secs: u64,

    pub sweep_interval_secs: u64,

    pub cookie: CookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            expiration_secs: 0,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            cookie: CookieConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(timeout: Duration, expiration: Duration) -> Self {
        Self {
            timeout_secs: timeout.as_secs(),
            expiration_secs: expiration.as_secs(),
            ..Self::default()
        }
    }

    /// `None` when timeout eviction is disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// `None` when expiration eviction is disabled
    pub fn expiration(&self) -> Option<Duration> {
        (self.expiration_secs > 0).then(|| Duration::from_secs(self.expiration_secs))
    }

    /// Period of the background sweep; 0 falls back to the default
    pub fn sweep_interval(&self) -> Duration {
        match self.sweep_interval_secs {
            0 => Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,

    pub secure: bool,
    pub http_only: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            domain: None,
            max_age_secs: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
}

impl CookieConfig {
    /// Rejects values that would break out of their `Set-Cookie` attribute
    pub fn validate(&self) -> Result<()> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .bytes()
                .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b));
        if !valid_name {
            return Err(SessionError::config(format!(
                "invalid cookie name {:?}",
                self.name
            )));
        }

        if !self.path.starts_with('/') || !is_attribute_value(&self.path) {
            return Err(SessionError::config(format!(
                "cookie path must start with '/' and contain no ';', whitespace or control characters, got {:?}",
                self.path
            )));
        }

        if let Some(ref domain) = self.domain {
            if domain.is_empty() || !is_attribute_value(domain) {
                return Err(SessionError::config(format!(
                    "cookie domain must be non-empty and contain no ';', whitespace or control characters, got {:?}",
                    domain
                )));
            }
        }

        Ok(())
    }
}

fn is_attribute_value(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_graphic() && b != b';')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout(), None);
        assert_eq!(config.expiration(), None);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.cookie.name, "_s");
        assert_eq!(config.cookie.path, "/");
        assert!(!config.cookie.secure);
    }

    #[test]
    fn test_config_new() {
        let config = SessionConfig::new(Duration::from_secs(30), Duration::ZERO);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.expiration(), None);
    }

    #[test]
    fn test_config_deserialization_partial() {
        let json = r#"{
            "expiration_secs": 3600,
            "cookie": { "secure": true, "same_site": "Lax" }
        }"#;

        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.expiration(), Some(Duration::from_secs(3600)));
        assert_eq!(config.timeout_secs, 0);
        assert_eq!(config.sweep_interval_secs, DEFAULT_SWEEP_INTERVAL_SECS);
        assert_eq!(config.cookie.name, "_s");
        assert!(config.cookie.secure);
        assert_eq!(config.cookie.same_site, Some(SameSite::Lax));
    }

    #[test]
    fn test_zero_sweep_interval_uses_default() {
        let config: SessionConfig = serde_json::from_str(r#"{"sweep_interval_secs": 0}"#).unwrap();
        assert_eq!(
            config.sweep_interval(),
            Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)
        );

        let config = SessionConfig {
            sweep_interval_secs: 5,
            ..SessionConfig::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_cookie_validate_accepts_defaults_and_domain() {
        assert!(CookieConfig::default().validate().is_ok());

        let cookie = CookieConfig {
            path: "/app".to_string(),
            domain: Some(".example.com".to_string()),
            ..CookieConfig::default()
        };
        assert!(cookie.validate().is_ok());
    }

    #[test]
    fn test_cookie_validate_rejects_attribute_injection() {
        for path in ["/; Domain=evil.example", "/a b", "/\tx", "app"] {
            let cookie = CookieConfig {
                path: path.to_string(),
                ..CookieConfig::default()
            };
            assert!(cookie.validate().is_err(), "path {:?} accepted", path);
        }

        for domain in ["x; SameSite=None", "example.com ", "", "ex\nample.com"] {
            let cookie = CookieConfig {
                domain: Some(domain.to_string()),
                ..CookieConfig::default()
            };
            assert!(cookie.validate().is_err(), "domain {:?} accepted", domain);
        }
    }

    #[test]
    fn test_config_serialization_skips_unset() {
        let json = serde_json::to_string(&SessionConfig::default()).unwrap();
        assert!(json.contains("\"timeout_secs\":0"));
        assert!(!json.contains("domain"));
        assert!(!json.contains("same_site"));
    }
}
