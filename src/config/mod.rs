use axum::http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid environment variable {0}: {1}")]
    Invalid(&'static str, String),
}

// Top-level configuration, built once at startup and shared through AppState
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub admin: AdminConfig,
    pub store: StoreConfig,
    pub checkout: CheckoutConfig,
    pub cors: CorsConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub pin: Option<SecretString>,
}

impl AdminConfig {
    pub fn is_configured(&self) -> bool {
        self.pin.as_ref().is_some_and(|pin| !pin.expose_secret().is_empty())
    }

    /// Exact comparison against the configured PIN. An unset or empty PIN never matches.
    pub fn verify_pin(&self, candidate: &str) -> bool {
        self.pin
            .as_ref()
            .map(|pin| pin.expose_secret())
            .is_some_and(|pin| !pin.is_empty() && pin == candidate)
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub upstream_url: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origin: HeaderValue,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from_address: String,
}

const DEFAULT_CORS_ORIGIN: &str = "https://mini-ecommerce-eight-lyart.vercel.app";
const DEFAULT_CHECKOUT_UPSTREAM: &str = "https://checkout.paystack.com";
const DEFAULT_CHECKOUT_PREFIX: &str = "/paystack";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let smtp = match var("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 587)?,
                username: var("SMTP_USERNAME"),
                password: var("SMTP_PASSWORD").map(SecretString::from),
                from_address: var("SMTP_FROM").ok_or(ConfigError::Missing("SMTP_FROM"))?,
            }),
            None => None,
        };

        let origin = var("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        if origin.trim() == "*" {
            return Err(ConfigError::Invalid(
                "CORS_ORIGIN",
                "a wildcard origin cannot be combined with credentials".to_string(),
            ));
        }
        let allowed_origin = HeaderValue::from_str(&origin)
            .map_err(|e| ConfigError::Invalid("CORS_ORIGIN", e.to_string()))?;

        let prefix = var("CHECKOUT_PROXY_PREFIX").unwrap_or_else(|| DEFAULT_CHECKOUT_PREFIX.to_string());
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(ConfigError::Invalid(
                "CHECKOUT_PROXY_PREFIX",
                format!("{prefix:?} must start with '/' and must not end with '/'"),
            ));
        }

        Ok(Config {
            app: AppConfig {
                host: parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?,
                port: parse_or(&lookup, "PORT", 3000)?,
                rust_log: var("RUST_LOG")
                    .unwrap_or_else(|| "shop_backend=debug,tower_http=debug".to_string()),
            },
            admin: AdminConfig {
                pin: lookup("ADMIN_PIN").map(SecretString::from),
            },
            store: StoreConfig {
                path: var("DB_PATH").unwrap_or_else(|| "db.json".to_string()).into(),
            },
            checkout: CheckoutConfig {
                upstream_url: var("CHECKOUT_UPSTREAM_URL")
                    .unwrap_or_else(|| DEFAULT_CHECKOUT_UPSTREAM.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                prefix,
            },
            cors: CorsConfig { allowed_origin },
            notifications: NotificationConfig {
                queue_capacity: parse_or(&lookup, "NOTIFICATION_QUEUE_CAPACITY", 256)?,
                smtp,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(key, e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = load(&[]).unwrap();
        assert_eq!(config.app.port, 3000);
        assert_eq!(config.app.host.to_string(), "0.0.0.0");
        assert_eq!(config.store.path, PathBuf::from("db.json"));
        assert_eq!(config.checkout.upstream_url, "https://checkout.paystack.com");
        assert_eq!(config.checkout.prefix, "/paystack");
        assert_eq!(config.cors.allowed_origin, DEFAULT_CORS_ORIGIN);
        assert_eq!(config.notifications.queue_capacity, 256);
        assert!(config.notifications.smtp.is_none());
        assert!(config.admin.pin.is_none());
    }

    #[test]
    fn port_must_be_numeric() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("PORT", _)));
    }

    #[test]
    fn smtp_host_requires_sender_address() {
        let err = load(&[("SMTP_HOST", "smtp.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SMTP_FROM")));

        let config = load(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_FROM", "shop@example.com")]).unwrap();
        let smtp = config.notifications.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_address, "shop@example.com");
    }

    #[test]
    fn proxy_prefix_is_validated() {
        assert!(load(&[("CHECKOUT_PROXY_PREFIX", "paystack")]).is_err());
        assert!(load(&[("CHECKOUT_PROXY_PREFIX", "/paystack/")]).is_err());
        assert_eq!(load(&[("CHECKOUT_PROXY_PREFIX", "/pay")]).unwrap().checkout.prefix, "/pay");
    }

    #[test]
    fn wildcard_origin_is_rejected() {
        let err = load(&[("CORS_ORIGIN", "*")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("CORS_ORIGIN", _)));
    }

    #[test]
    fn upstream_trailing_slash_is_dropped() {
        let config = load(&[("CHECKOUT_UPSTREAM_URL", "http://localhost:9000/")]).unwrap();
        assert_eq!(config.checkout.upstream_url, "http://localhost:9000");
    }

    #[test]
    fn pin_verification_is_exact() {
        let config = load(&[("ADMIN_PIN", "2468")]).unwrap();
        assert!(config.admin.verify_pin("2468"));
        assert!(!config.admin.verify_pin("2468 "));
        assert!(!config.admin.verify_pin(""));
    }

    #[test]
    fn empty_or_missing_pin_never_matches() {
        let unset = load(&[]).unwrap();
        assert!(!unset.admin.is_configured());
        assert!(!unset.admin.verify_pin(""));

        let empty = load(&[("ADMIN_PIN", "")]).unwrap();
        assert!(!empty.admin.is_configured());
        assert!(!empty.admin.verify_pin(""));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = load(&[("ADMIN_PIN", "9999")]).unwrap();
        assert!(!format!("{config:?}").contains("9999"));
    }
}
