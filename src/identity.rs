// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client identity hashing.
//!
//! Raw addresses are never stored. Every write path keys on a salted
//! BLAKE3 digest of the client address instead.
//!
//! The address comes from client-supplied proxy headers and is therefore
//! only good enough to deter casual abuse.

use axum::http::HeaderMap;
use rand::{distributions::Alphanumeric, Rng};
use tracing::warn;

/// Address used when no proxy header is present.
pub const FALLBACK_ADDRESS: &str = "127.0.0.1";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Turns client addresses into stable, non-reversible identities.
#[derive(Clone)]
pub struct IdentityHasher {
    salt: String,
}

impl IdentityHasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Build from the configured salt. Without one, a random per-process
    /// salt is used, so identities do not survive a restart.
    pub fn from_config(salt: Option<&str>) -> Self {
        match salt {
            Some(salt) if !salt.is_empty() => Self::new(salt),
            _ => {
                warn!("No identity salt configured (IP_SALT); using an ephemeral random salt");
                let salt: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(32)
                    .map(char::from)
                    .collect();
                Self::new(salt)
            }
        }
    }

    /// Hex digest of address + salt.
    pub fn hash(&self, address: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(address.as_bytes());
        hasher.update(self.salt.as_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    /// Identity of the client that sent `headers`.
    pub fn identify(&self, headers: &HeaderMap) -> String {
        self.hash(&client_address(headers))
    }
}

/// Resolve the client address: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the loopback placeholder.
pub fn client_address(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header(FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    header(REAL_IP)
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_hash_is_deterministic() {
        let hasher = IdentityHasher::new("pepper");
        assert_eq!(hasher.hash("203.0.113.7"), hasher.hash("203.0.113.7"));
        assert_eq!(hasher.hash("203.0.113.7").len(), 64);
    }

    #[test]
    fn test_salt_changes_identity() {
        let a = IdentityHasher::new("pepper");
        let b = IdentityHasher::new("paprika");
        assert_ne!(a.hash("203.0.113.7"), b.hash("203.0.113.7"));
    }

    #[test]
    fn test_identity_does_not_contain_address() {
        let hasher = IdentityHasher::new("pepper");
        assert!(!hasher.hash("203.0.113.7").contains("203.0.113.7"));
    }

    #[test]
    fn test_forwarded_for_takes_priority() {
        let map = headers(&[
            ("x-forwarded-for", " 198.51.100.1 , 10.0.0.1"),
            ("x-real-ip", "192.0.2.9"),
        ]);
        assert_eq!(client_address(&map), "198.51.100.1");
    }

    #[test]
    fn test_real_ip_fallback() {
        let map = headers(&[("x-real-ip", "192.0.2.9")]);
        assert_eq!(client_address(&map), "192.0.2.9");
    }

    #[test]
    fn test_loopback_fallback() {
        assert_eq!(client_address(&HeaderMap::new()), FALLBACK_ADDRESS);
    }

    #[test]
    fn test_random_salt_when_unconfigured() {
        let a = IdentityHasher::from_config(None);
        let b = IdentityHasher::from_config(Some(""));
        assert_ne!(a.hash("192.0.2.1"), b.hash("192.0.2.1"));
    }
}
