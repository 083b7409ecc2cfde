//! Runtime configuration.
//!
//! Loaded once from the environment at startup and treated as immutable
//! thereafter. Services receive a clone; nothing mutates it while serving.

use crate::email::SuperAdmins;
use crate::error::{CoterieError, Result};
use url::Url;

/// Default invitation token time-to-live in days.
pub const DEFAULT_INVITATION_TTL_DAYS: i64 = 7;

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct CoterieConfig {
    /// Protected super-admin email addresses.
    pub super_admins: SuperAdmins,
    /// Hostnames allowed in invitation `base_url`s.
    pub allowed_hostnames: Vec<String>,
    /// Invitation token time-to-live in days.
    pub invitation_ttl_days: i64,
    /// HMAC secret for invitation token signing.
    pub token_secret: Vec<u8>,
}

impl CoterieConfig {
    /// Loads configuration from the environment.
    ///
    /// * `COTERIE_SUPER_ADMINS` - comma-separated email list (optional)
    /// * `COTERIE_ALLOWED_HOSTNAMES` - comma-separated hostname list (required)
    /// * `COTERIE_INVITATION_TTL_DAYS` - integer, defaults to 7
    /// * `COTERIE_TOKEN_SECRET` - signing secret (required)
    pub fn from_env() -> Result<Self> {
        let super_admins = SuperAdmins::new(split_csv(
            &std::env::var("COTERIE_SUPER_ADMINS").unwrap_or_default(),
        ));

        let allowed_hostnames = split_csv(
            &std::env::var("COTERIE_ALLOWED_HOSTNAMES").map_err(|_| {
                CoterieError::validation_field(
                    "COTERIE_ALLOWED_HOSTNAMES must be set",
                    "COTERIE_ALLOWED_HOSTNAMES",
                )
            })?,
        );

        let invitation_ttl_days = match std::env::var("COTERIE_INVITATION_TTL_DAYS") {
            Ok(raw) => raw.parse::<i64>().map_err(|_| {
                CoterieError::validation_field(
                    "COTERIE_INVITATION_TTL_DAYS must be an integer",
                    "COTERIE_INVITATION_TTL_DAYS",
                )
            })?,
            Err(_) => DEFAULT_INVITATION_TTL_DAYS,
        };

        let token_secret = std::env::var("COTERIE_TOKEN_SECRET")
            .map_err(|_| {
                CoterieError::validation_field(
                    "COTERIE_TOKEN_SECRET must be set",
                    "COTERIE_TOKEN_SECRET",
                )
            })?
            .into_bytes();

        Ok(Self {
            super_admins,
            allowed_hostnames,
            invitation_ttl_days,
            token_secret,
        })
    }

    /// Validates that the given base URL parses and that its hostname is on
    /// the allow-list.
    pub fn check_base_url(&self, base_url: &str) -> Result<()> {
        let parsed = Url::parse(base_url).map_err(|e| {
            CoterieError::validation_field(format!("Invalid base URL: {e}"), "base_url")
        })?;

        let hostname = parsed.host_str().ok_or_else(|| {
            CoterieError::validation_field("Base URL has no hostname", "base_url")
        })?;

        if self.allowed_hostnames.iter().any(|h| h == hostname) {
            Ok(())
        } else {
            Err(CoterieError::validation_field(
                format!("Hostname '{hostname}' is not allowed"),
                "base_url",
            ))
        }
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CoterieConfig {
        CoterieConfig {
            super_admins: SuperAdmins::new(["root@coterie.dev"]),
            allowed_hostnames: vec!["app.coterie.dev".to_string(), "localhost".to_string()],
            invitation_ttl_days: DEFAULT_INVITATION_TTL_DAYS,
            token_secret: b"test-secret".to_vec(),
        }
    }

    #[test]
    fn test_check_base_url_allows_listed_hostname() {
        let config = test_config();
        assert!(config.check_base_url("https://app.coterie.dev/invite").is_ok());
        assert!(config.check_base_url("http://localhost:3000/invite").is_ok());
    }

    #[test]
    fn test_check_base_url_rejects_unlisted_hostname() {
        let config = test_config();
        let err = config
            .check_base_url("https://evil.example.com/invite")
            .unwrap_err();
        assert!(matches!(err, CoterieError::Validation { .. }));
    }

    #[test]
    fn test_check_base_url_rejects_garbage() {
        let config = test_config();
        assert!(config.check_base_url("not a url").is_err());
    }

    #[test]
    fn test_split_csv_trims_and_drops_empties() {
        assert_eq!(
            split_csv(" a@x.com , b@y.com ,, "),
            vec!["a@x.com".to_string(), "b@y.com".to_string()]
        );
        assert!(split_csv("").is_empty());
    }
}
