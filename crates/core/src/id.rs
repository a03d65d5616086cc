// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hash-based short reference IDs (`kind-XXXXXX`).
//!
//! Every entity is addressed by a 6-hex-char reference unique within its
//! project, derived from `(nanos, random bytes, project id)` per the
//! collision-resistant scheme described in the design notes. IDs are
//! intentionally short (git-commit-hash style) rather than full UUIDs;
//! a UUID is populated separately only where cross-project aggregation
//! needs a globally unique key (see [`crate::project::ProjectId`]).

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of hex characters in a short reference suffix.
pub const SHORT_REF_LEN: usize = 6;

/// Maximum collision-retry attempts before giving up with `Conflict`.
pub const MAX_COLLISION_RETRIES: u8 = 8;

/// Compute one candidate 6-hex-char suffix for `(nanos, project_id)`,
/// salted with fresh random bytes on each call.
fn candidate_suffix(nanos: u128, project_id: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut hasher = Sha256::new();
    hasher.update(nanos.to_be_bytes());
    hasher.update(project_id.as_bytes());
    hasher.update(salt);
    let digest = hasher.finalize();
    let hex = hex_encode(&digest[..4]);
    hex[..SHORT_REF_LEN].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// A function deciding whether a candidate suffix is already taken.
/// Supplied by storage managers, which know the existing id set for a kind.
pub trait CollisionCheck {
    fn exists(&self, candidate: &str) -> bool;
}

impl<F: Fn(&str) -> bool> CollisionCheck for F {
    fn exists(&self, candidate: &str) -> bool {
        (self)(candidate)
    }
}

/// Generate a short reference suffix for `project_id`, retrying on collision
/// up to [`MAX_COLLISION_RETRIES`] times with fresh salt each attempt.
pub fn generate_suffix(project_id: &str, exists: impl CollisionCheck) -> Result<String, ()> {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    for _ in 0..MAX_COLLISION_RETRIES {
        let candidate = candidate_suffix(nanos, project_id);
        if !exists.exists(&candidate) {
            return Ok(candidate);
        }
    }
    Err(())
}

/// Define a short-reference ID newtype with a `kind-` prefix.
///
/// Generates `new(project_id, exists)` (collision-checked generation),
/// `from_string`, `as_str`, `suffix`, `Display`, `From<String>`/`From<&str>`,
/// and the traits needed to use the id as a hash map key.
#[macro_export]
macro_rules! define_ref_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new id unique among `exists`, for `project_id`.
            pub fn generate(
                project_id: &str,
                exists: impl $crate::id::CollisionCheck,
            ) -> Result<Self, $crate::error::GobbyError> {
                let suffix = $crate::id::generate_suffix(project_id, exists)
                    .map_err(|_| $crate::error::GobbyError::Conflict {
                        reason: format!("exhausted short-ref retries for {}", Self::PREFIX),
                    })?;
                Ok(Self(format!("{}{}", Self::PREFIX, suffix)))
            }

            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn suffix(&self) -> &str {
                self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
