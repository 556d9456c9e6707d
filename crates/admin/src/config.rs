//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIREBASE_API_KEY` - Web API key of the Firebase project
//! - `FIREBASE_PROJECT_ID` - Firebase / Google Cloud project id
//! - `ADMIN_BASE_URL` - Public URL for the admin console
//!
//! ## Optional
//! - `FIRESTORE_DATABASE` - Firestore database id (default: `(default)`)
//! - `FIXIT_PROFILES_COLLECTION` - User profile collection (default: `users`)
//! - `FIXIT_COMPLAINTS_COLLECTION` - Complaint collection (default: `complaints`)
//! - `FIXIT_ROLE_CHECK_TIMEOUT_SECS` - Role lookup timeout, 1-60 (default: 5)
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)
//!
//! ## Optional (TLS)
//! - `ADMIN_TLS_CERT` - PEM-encoded certificate chain
//! - `ADMIN_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::services::GuardSettings;

const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_PROFILES_COLLECTION: &str = "users";
const DEFAULT_COMPLAINTS_COLLECTION: &str = "complaints";
const DEFAULT_ROLE_CHECK_TIMEOUT_SECS: u64 = 5;
const MAX_ROLE_CHECK_TIMEOUT_SECS: u64 = 60;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Firebase project access
    pub firebase: FirebaseConfig,
    /// Collection holding one profile document per user id
    pub profiles_collection: String,
    /// Collection holding complaint documents
    pub complaints_collection: String,
    /// Upper bound on a single role lookup
    pub role_check_timeout: Duration,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the admin console
    pub base_url: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key
    pub api_key: SecretString,
    /// Project id
    pub project_id: String,
    /// Firestore database id
    pub database: String,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .finish()
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

/// Source of configuration values, keyed by variable name.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable with a default value.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

impl FirebaseConfig {
    fn from_vars<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: vars.validated_secret("FIREBASE_API_KEY")?,
            project_id: vars.required("FIREBASE_PROJECT_ID")?,
            database: vars.or_default("FIRESTORE_DATABASE", DEFAULT_DATABASE),
        })
    }
}

impl TlsConfig {
    fn from_vars<F: Fn(&str) -> Option<String>>(
        vars: &Vars<F>,
    ) -> Result<Option<Self>, ConfigError> {
        let cert_pem = vars.optional("ADMIN_TLS_CERT");
        let key_pem = vars.optional("ADMIN_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "ADMIN_TLS_*".to_string(),
                "Both ADMIN_TLS_CERT and ADMIN_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`AdminConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let firebase = FirebaseConfig::from_vars(&vars)?;
        let host = vars.parsed::<IpAddr>("ADMIN_HOST", "127.0.0.1")?;
        let port = vars.parsed::<u16>("ADMIN_PORT", "3001")?;
        let base_url = vars.required("ADMIN_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_BASE_URL".to_string(), e.to_string()))?;

        let timeout_secs = vars.parsed::<u64>(
            "FIXIT_ROLE_CHECK_TIMEOUT_SECS",
            &DEFAULT_ROLE_CHECK_TIMEOUT_SECS.to_string(),
        )?;
        if !(1..=MAX_ROLE_CHECK_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(ConfigError::InvalidEnvVar(
                "FIXIT_ROLE_CHECK_TIMEOUT_SECS".to_string(),
                format!("must be between 1 and {MAX_ROLE_CHECK_TIMEOUT_SECS} (got {timeout_secs})"),
            ));
        }

        let sentry_sample_rate = vars
            .optional("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = vars
            .optional("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            firebase,
            profiles_collection: vars
                .or_default("FIXIT_PROFILES_COLLECTION", DEFAULT_PROFILES_COLLECTION),
            complaints_collection: vars
                .or_default("FIXIT_COMPLAINTS_COLLECTION", DEFAULT_COMPLAINTS_COLLECTION),
            role_check_timeout: Duration::from_secs(timeout_secs),
            host,
            port,
            base_url,
            sentry_dsn: vars.optional("SENTRY_DSN"),
            sentry_environment: vars.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls: TlsConfig::from_vars(&vars)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies must be marked `Secure`.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Settings for the access guard.
    #[must_use]
    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            profiles_collection: self.profiles_collection.clone(),
            role_check_timeout: self.role_check_timeout,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the Firebase console."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const API_KEY: &str = "AIzaSyD3xK9mQ2vL7pR4tW8nB1cF6hJ0sZ5yE";

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("FIREBASE_API_KEY", API_KEY),
            ("FIREBASE_PROJECT_ID", "fixit-campus"),
            ("ADMIN_BASE_URL", "http://localhost:3001"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = AdminConfig::from_lookup(vars(&minimal())).unwrap();

        assert_eq!(config.firebase.database, "(default)");
        assert_eq!(config.profiles_collection, "users");
        assert_eq!(config.complaints_collection, "complaints");
        assert_eq!(config.role_check_timeout, Duration::from_secs(5));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3001");
        assert!(!config.secure_cookies());
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_missing_required_var() {
        let mut pairs = minimal();
        pairs.retain(|(k, _)| *k != "FIREBASE_PROJECT_ID");

        let err = AdminConfig::from_lookup(vars(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "FIREBASE_PROJECT_ID"));
    }

    #[test]
    fn test_role_check_timeout_range() {
        let mut pairs = minimal();
        pairs.push(("FIXIT_ROLE_CHECK_TIMEOUT_SECS", "0"));
        assert!(AdminConfig::from_lookup(vars(&pairs)).is_err());

        let mut pairs = minimal();
        pairs.push(("FIXIT_ROLE_CHECK_TIMEOUT_SECS", "12"));
        let config = AdminConfig::from_lookup(vars(&pairs)).unwrap();
        assert_eq!(config.guard_settings().role_check_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_tls_requires_both_halves() {
        let mut pairs = minimal();
        pairs.push(("ADMIN_TLS_CERT", "-----BEGIN CERTIFICATE-----"));
        let err = AdminConfig::from_lookup(vars(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_placeholder_api_key_rejected() {
        let mut pairs = minimal();
        pairs.retain(|(k, _)| *k != "FIREBASE_API_KEY");
        pairs.push(("FIREBASE_API_KEY", "your-firebase-api-key"));

        let err = AdminConfig::from_lookup(vars(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_https_base_url_enables_secure_cookies() {
        let mut pairs = minimal();
        pairs.retain(|(k, _)| *k != "ADMIN_BASE_URL");
        pairs.push(("ADMIN_BASE_URL", "https://admin.fixit.example.edu"));

        let config = AdminConfig::from_lookup(vars(&pairs)).unwrap();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_firebase_config_debug_redacts_api_key() {
        let config = AdminConfig::from_lookup(vars(&minimal())).unwrap();

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("fixit-campus"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(API_KEY));
    }
}
