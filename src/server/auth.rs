//! Bearer-token checks for the trigger endpoints.
//!
//! Secrets are compared through their SHA-256 digests so the comparison
//! takes the same time whatever the input.

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ServerSettings;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct Credentials {
    cron_digest: Option<[u8; 32]>,
    admin_digests: Vec<[u8; 32]>,
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

/// Short, non-reversible tag for logs.
pub fn fingerprint(token: &str) -> String {
    hex::encode(&digest(token)[..4])
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl Credentials {
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            cron_digest: settings
                .cron_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(digest),
            admin_digests: settings
                .admin_tokens
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| digest(t))
                .collect(),
        }
    }

    /// Scheduled trigger. Fails closed when no secret is configured.
    pub fn check_cron(&self, headers: &HeaderMap) -> Result<()> {
        let Some(expected) = self.cron_digest else {
            return Err(Error::Unauthorized {
                message: "scheduled trigger has no cron_secret configured".to_string(),
            });
        };
        match bearer(headers) {
            Some(token) if digest(token) == expected => Ok(()),
            _ => Err(Error::Unauthorized {
                message: "missing or invalid cron secret".to_string(),
            }),
        }
    }

    /// Admin endpoints.
    pub fn check_admin(&self, headers: &HeaderMap) -> Result<()> {
        let token = bearer(headers).ok_or(Error::Forbidden)?;
        let presented = digest(token);
        if self.admin_digests.iter().any(|d| *d == presented) {
            debug!(token = %fingerprint(token), "Admin request accepted");
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}
