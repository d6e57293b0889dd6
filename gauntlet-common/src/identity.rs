//! Isolated identity provisioning.
//!
//! Concurrent scenarios must not interfere with each other's server-side
//! state (rate limits, sessions, revocation lists), so every scenario mints
//! its own login credentials. A token combines a sanitized purpose tag, the
//! process id, a millisecond timestamp, a per-process sequence number, and a
//! random suffix: the sequence and suffix rule out in-process collisions,
//! the pid and timestamp rule out cross-process ones.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

/// Maximum identity length accepted by the backend.
pub const MAX_IDENTITY_LEN: usize = 100;

/// Length of the random suffix component.
const RANDOM_SUFFIX_LEN: usize = 8;

/// Leading tag on every provisioned identity.
const IDENTITY_BASE: &str = "gauntlet";

/// Source of the time, process, and randomness components of an identity.
///
/// Injected so tests can pin all three and exercise the composition logic
/// deterministically.
pub trait IdentitySource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
    /// Identifier of the current process.
    fn process_id(&self) -> u32;
    /// Fresh random suffix, `RANDOM_SUFFIX_LEN` alphanumeric characters.
    fn random_suffix(&self) -> String;
}

/// Production identity source: real clock, real pid, thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSource;

impl IdentitySource for SystemSource {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn process_id(&self) -> u32 {
        std::process::id()
    }

    fn random_suffix(&self) -> String {
        Alphanumeric
            .sample_string(&mut rand::rng(), RANDOM_SUFFIX_LEN)
            .to_ascii_lowercase()
    }
}

/// A provisioned credential string, unique per (purpose, process, call).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsolatedIdentity(String);

impl IsolatedIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic password companion for create-or-login backends.
    pub fn password(&self) -> String {
        format!("{}-pw", self.0)
    }
}

impl fmt::Display for IsolatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mints isolated identities. Cheap to clone; clones share the sequence
/// counter, so they never hand out the same identity twice.
#[derive(Clone)]
pub struct IdentityProvisioner {
    source: Arc<dyn IdentitySource>,
    seq: Arc<AtomicU64>,
}

impl Default for IdentityProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvisioner {
    pub fn new() -> Self {
        Self::with_source(Arc::new(SystemSource))
    }

    pub fn with_source(source: Arc<dyn IdentitySource>) -> Self {
        Self {
            source,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mint a fresh identity for the given purpose.
    ///
    /// The result never exceeds [`MAX_IDENTITY_LEN`] bytes; over-long
    /// compositions are truncated from the front so the discriminating tail
    /// (pid, timestamp, sequence, random suffix) always survives.
    pub fn isolated_token(&self, purpose: &str) -> IsolatedIdentity {
        let purpose = sanitize_purpose(purpose);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let composed = format!(
            "{IDENTITY_BASE}-{purpose}-{pid}-{millis}-{seq}-{suffix}",
            pid = self.source.process_id(),
            millis = self.source.now_millis(),
            suffix = self.source.random_suffix(),
        );

        if composed.len() <= MAX_IDENTITY_LEN {
            return IsolatedIdentity(composed);
        }

        let tail_start = composed.len() - MAX_IDENTITY_LEN;
        let tail = composed[tail_start..].trim_start_matches('-');
        IsolatedIdentity(tail.to_string())
    }
}

impl fmt::Debug for IdentityProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProvisioner")
            .field("seq", &self.seq.load(Ordering::Relaxed))
            .finish()
    }
}

/// Reduce a free-form purpose tag to lowercase alphanumerics and single
/// dashes. An empty result falls back to "anon" so the composed identity
/// keeps its fixed field count.
fn sanitize_purpose(purpose: &str) -> String {
    let mut out = String::with_capacity(purpose.len());
    let mut last_dash = true;
    for c in purpose.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "anon".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Source with pinned time and pid and a counting "random" suffix, so
    /// composition is fully deterministic.
    struct PinnedSource {
        millis: u64,
        pid: u32,
        counter: AtomicU64,
    }

    impl PinnedSource {
        fn new(millis: u64, pid: u32) -> Self {
            Self {
                millis,
                pid,
                counter: AtomicU64::new(0),
            }
        }
    }

    impl IdentitySource for PinnedSource {
        fn now_millis(&self) -> u64 {
            self.millis
        }

        fn process_id(&self) -> u32 {
            self.pid
        }

        fn random_suffix(&self) -> String {
            format!("r{:07}", self.counter.fetch_add(1, Ordering::Relaxed))
        }
    }

    #[test]
    fn test_token_has_expected_shape() {
        let provisioner =
            IdentityProvisioner::with_source(Arc::new(PinnedSource::new(1_700_000_000_000, 4242)));
        let token = provisioner.isolated_token("refresh race");
        assert_eq!(
            token.as_str(),
            "gauntlet-refresh-race-4242-1700000000000-0-r0000000"
        );
    }

    #[test]
    fn test_same_purpose_same_millisecond_still_differs() {
        let provisioner =
            IdentityProvisioner::with_source(Arc::new(PinnedSource::new(1_700_000_000_000, 1)));
        let a = provisioner.isolated_token("login");
        let b = provisioner.isolated_token("login");
        assert_ne!(a, b);
        assert!(a.as_str().len() <= MAX_IDENTITY_LEN);
        assert!(b.as_str().len() <= MAX_IDENTITY_LEN);
    }

    #[test]
    fn test_ten_thousand_tokens_are_unique() {
        let provisioner = IdentityProvisioner::new();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let token = provisioner.isolated_token("uniqueness");
            assert!(seen.insert(token.as_str().to_string()), "duplicate identity");
        }
    }

    #[test]
    fn test_clones_share_sequence() {
        let provisioner = IdentityProvisioner::new();
        let clone = provisioner.clone();
        let a = provisioner.isolated_token("shared");
        let b = clone.isolated_token("shared");
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_purpose_truncates_from_front() {
        let provisioner =
            IdentityProvisioner::with_source(Arc::new(PinnedSource::new(1_700_000_000_000, 77)));
        let long_purpose = "x".repeat(200);
        let token = provisioner.isolated_token(&long_purpose);
        assert!(token.as_str().len() <= MAX_IDENTITY_LEN);
        assert!(
            token.as_str().ends_with("-r0000000"),
            "random suffix must survive truncation: {}",
            token
        );
        assert!(!token.as_str().starts_with('-'));
    }

    #[test]
    fn test_sanitize_purpose_collapses_noise() {
        assert_eq!(sanitize_purpose("Login  Storm!"), "login-storm");
        assert_eq!(sanitize_purpose("__"), "anon");
        assert_eq!(sanitize_purpose(""), "anon");
        assert_eq!(sanitize_purpose("a--b"), "a-b");
    }

    #[test]
    fn test_password_is_deterministic() {
        let provisioner =
            IdentityProvisioner::with_source(Arc::new(PinnedSource::new(1, 1)));
        let token = provisioner.isolated_token("pw");
        assert_eq!(token.password(), format!("{}-pw", token.as_str()));
    }

    proptest! {
        #[test]
        fn prop_tokens_bounded_and_clean(purpose in ".{0,300}") {
            let provisioner = IdentityProvisioner::new();
            let token = provisioner.isolated_token(&purpose);
            prop_assert!(token.as_str().len() <= MAX_IDENTITY_LEN);
            prop_assert!(!token.as_str().is_empty());
            prop_assert!(
                token.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            );
        }
    }
}
