//! In-memory state for the mock backend.
//!
//! One coarse async mutex over all stores. Contended races (duplicate
//! refresh, delete-delete, create-create) are decided inside a single
//! critical section, which is exactly the serialization a correct backend
//! must provide for these operations.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use hmac::{Hmac, Mac};
use rand::distr::{Alphanumeric, SampleString};
use sha2::Sha256;
use tokio::sync::Mutex;

/// Length of generated token material.
const TOKEN_LEN: usize = 24;

/// Tunable behavior of the mock backend.
#[derive(Debug, Clone)]
pub struct MockApiConfig {
    /// Login attempts allowed per identity per window.
    pub login_rate_limit: u32,
    /// Fixed rate-limit window.
    pub rate_window: Duration,
    /// Request bodies above this size are rejected with 413.
    pub max_body_bytes: usize,
    /// When set, error details embed fake internal diagnostics so the
    /// harness's leak detector can be exercised against a misbehaving
    /// backend. Never exposed over HTTP.
    pub leak_mode: bool,
}

impl Default for MockApiConfig {
    fn default() -> Self {
        Self {
            login_rate_limit: 50,
            rate_window: Duration::from_secs(10),
            max_body_bytes: 16 * 1024,
            leak_mode: false,
        }
    }
}

/// Identity attached to a live access token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: u64,
    pub username: String,
}

#[derive(Debug)]
pub struct UserRecord {
    pub password: String,
    pub user_id: u64,
}

#[derive(Debug)]
pub struct RefreshRecord {
    pub username: String,
    pub user_id: u64,
    /// CSRF token bound to this refresh token; the `X-CSRF-Token` header
    /// must match it exactly.
    pub csrf: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub name: String,
    pub version: u64,
    pub owner: u64,
}

#[derive(Debug)]
struct RateWindow {
    started: Instant,
    count: u32,
}

/// All mutable stores, guarded by one lock.
#[derive(Default)]
pub struct Stores {
    users: HashMap<String, UserRecord>,
    sessions: HashMap<String, AuthContext>,
    refresh_tokens: HashMap<String, RefreshRecord>,
    items: HashMap<u64, ItemRecord>,
    item_names: HashMap<String, u64>,
    tickets: HashMap<u64, bool>,
    login_windows: HashMap<String, RateWindow>,
    next_user_id: u64,
    next_item_id: u64,
    next_ticket_id: u64,
}

/// Shared application state.
pub struct AppState {
    pub config: MockApiConfig,
    signing_secret: String,
    pub stores: Mutex<Stores>,
}

impl AppState {
    pub fn new(config: MockApiConfig) -> Self {
        Self {
            config,
            signing_secret: fresh_token("sec"),
            stores: Mutex::new(Stores::default()),
        }
    }

    /// Hex HMAC-SHA256 signature for an item export URL.
    pub fn export_signature(&self, item_id: u64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.signing_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("item-{item_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Pick the clean or leaky error detail depending on configuration.
    pub fn detail(&self, clean: &str, leaky: &str) -> String {
        if self.config.leak_mode {
            leaky.to_string()
        } else {
            clean.to_string()
        }
    }
}

impl Stores {
    /// Create-or-login semantics: identical credentials always succeed with
    /// the same result shape, a wrong password for an existing user fails.
    pub fn login(&mut self, username: &str, password: &str) -> Result<u64, ()> {
        match self.users.get(username) {
            Some(user) if user.password == password => Ok(user.user_id),
            Some(_) => Err(()),
            None => {
                self.next_user_id += 1;
                let user_id = self.next_user_id;
                self.users.insert(
                    username.to_string(),
                    UserRecord {
                        password: password.to_string(),
                        user_id,
                    },
                );
                Ok(user_id)
            }
        }
    }

    /// Mint and register a full session: access token, refresh token, CSRF.
    pub fn open_session(&mut self, username: &str, user_id: u64) -> (String, String, String) {
        let access = fresh_token("at");
        let refresh = fresh_token("rt");
        let csrf = fresh_token("cs");
        self.sessions.insert(
            access.clone(),
            AuthContext {
                user_id,
                username: username.to_string(),
            },
        );
        self.refresh_tokens.insert(
            refresh.clone(),
            RefreshRecord {
                username: username.to_string(),
                user_id,
                csrf: csrf.clone(),
            },
        );
        (access, refresh, csrf)
    }

    pub fn refresh_record(&self, token: &str) -> Option<&RefreshRecord> {
        self.refresh_tokens.get(token)
    }

    /// Consume a refresh token exactly once.
    pub fn consume_refresh(&mut self, token: &str) -> Option<RefreshRecord> {
        self.refresh_tokens.remove(token)
    }

    pub fn authenticate(&self, bearer: &str) -> Option<AuthContext> {
        self.sessions.get(bearer).cloned()
    }

    /// Revoke an access token, returning the identity it belonged to.
    pub fn revoke_session(&mut self, bearer: &str) -> Option<AuthContext> {
        self.sessions.remove(bearer)
    }

    /// Insert a new item unless the name is taken.
    pub fn create_item(&mut self, name: &str, owner: u64) -> Result<(u64, ItemRecord), ()> {
        if self.item_names.contains_key(name) {
            return Err(());
        }
        self.next_item_id += 1;
        let id = self.next_item_id;
        let record = ItemRecord {
            name: name.to_string(),
            version: 1,
            owner,
        };
        self.items.insert(id, record.clone());
        self.item_names.insert(name.to_string(), id);
        Ok((id, record))
    }

    pub fn item(&self, id: u64) -> Option<&ItemRecord> {
        self.items.get(&id)
    }

    /// Optimistic-concurrency update: the caller's version must match.
    pub fn update_item(
        &mut self,
        id: u64,
        expected_version: u64,
        new_name: Option<&str>,
    ) -> Result<ItemRecord, UpdateError> {
        let item = self.items.get_mut(&id).ok_or(UpdateError::NotFound)?;
        if item.version != expected_version {
            return Err(UpdateError::VersionConflict);
        }
        if let Some(name) = new_name {
            self.item_names.remove(&item.name);
            self.item_names.insert(name.to_string(), id);
            item.name = name.to_string();
        }
        item.version += 1;
        Ok(item.clone())
    }

    pub fn delete_item(&mut self, id: u64) -> bool {
        match self.items.remove(&id) {
            Some(item) => {
                self.item_names.remove(&item.name);
                true
            }
            None => false,
        }
    }

    pub fn create_ticket(&mut self) -> u64 {
        self.next_ticket_id += 1;
        self.tickets.insert(self.next_ticket_id, false);
        self.next_ticket_id
    }

    /// Consume a one-time ticket.
    pub fn consume_ticket(&mut self, id: u64) -> Result<(), ConsumeError> {
        match self.tickets.get_mut(&id) {
            None => Err(ConsumeError::NotFound),
            Some(consumed) if *consumed => Err(ConsumeError::AlreadyConsumed),
            Some(consumed) => {
                *consumed = true;
                Ok(())
            }
        }
    }

    /// Fixed-window login rate limiting per identity. Returns the seconds
    /// until the window resets when the limit is exceeded.
    pub fn check_login_rate(
        &mut self,
        username: &str,
        limit: u32,
        window: Duration,
    ) -> Result<(), u64> {
        let now = Instant::now();
        let entry = self
            .login_windows
            .entry(username.to_string())
            .or_insert(RateWindow {
                started: now,
                count: 0,
            });

        if now.duration_since(entry.started) > window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count += 1;
        if entry.count > limit {
            let elapsed = now.duration_since(entry.started);
            let remaining = window.saturating_sub(elapsed);
            Err(remaining.as_secs().max(1))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    NotFound,
    VersionConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeError {
    NotFound,
    AlreadyConsumed,
}

fn fresh_token(prefix: &str) -> String {
    let body = Alphanumeric.sample_string(&mut rand::rng(), TOKEN_LEN);
    format!("{prefix}-{body}")
}
