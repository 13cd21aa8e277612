//! Role-scoped token storage
//!
//! Tokens live under `<role>_<kind>_token` keys next to an `active_role`
//! marker, so agent and client credentials never collide. Every accessor is
//! total: missing or unreadable keys fall back to defaults.

use crate::error::Result;
use crate::types::{Role, TokenKind, TokenPair};
use papaya::HashMap;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Key of the active role marker
pub const ACTIVE_ROLE_KEY: &str = "active_role";

/// Storage key for a role's token of the given kind, e.g. `agent_access_token`.
pub fn token_key(role: Role, kind: TokenKind) -> String {
    format!("{}_{}_token", role.as_str(), kind.as_str())
}

/// Key/value persistence backend
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);

    /// Write several entries as one unit. Backends that persist should
    /// override this so a partially written pair is never observable.
    fn set_entries(&self, entries: &[(&str, &str)]) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    fn remove_entries(&self, keys: &[&str]) {
        for key in keys {
            self.remove(key);
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Thread-safe in-memory store using Papaya HashMap
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.pin().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.pin().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.pin().remove(key);
    }
}

/// JSON-file backed store
///
/// Reads are served from memory; every mutation rewrites the whole file.
/// Write failures are logged and do not fail the caller.
pub struct FileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// A missing file starts empty. A malformed file is an error, so a
    /// corrupted session is never silently discarded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = HashMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if !content.trim().is_empty() {
                let stored: BTreeMap<String, String> = serde_json::from_str(&content)?;
                let pinned = entries.pin();
                for (key, value) in stored {
                    pinned.insert(key, value);
                }
            }
        }

        debug!(path = %path.display(), "Opened token file store");

        Ok(Self {
            path,
            entries,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let snapshot: BTreeMap<String, String> = self
            .entries
            .pin()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let result = serde_json::to_string_pretty(&snapshot)
            .map_err(std::io::Error::other)
            .and_then(|content| self.write_atomic(&content));

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to persist token store");
        }
    }

    /// Write to a sibling temp file, then rename over the store. Readers see
    /// either the old file or the new one, and the file is readable by the
    /// owner only.
    fn write_atomic(&self, content: &str) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        file.persist(&self.path).map_err(|e| e.error)?;

        if let Ok(parent) = std::fs::File::open(dir) {
            let _ = parent.sync_all();
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.pin().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.pin().insert(key.to_string(), value.to_string());
        self.persist();
    }

    fn remove(&self, key: &str) {
        if self.entries.pin().remove(key).is_some() {
            self.persist();
        }
    }

    fn set_entries(&self, entries: &[(&str, &str)]) {
        {
            let pinned = self.entries.pin();
            for (key, value) in entries {
                pinned.insert(key.to_string(), value.to_string());
            }
        }
        self.persist();
    }

    fn remove_entries(&self, keys: &[&str]) {
        {
            let pinned = self.entries.pin();
            for key in keys {
                pinned.remove(*key);
            }
        }
        self.persist();
    }
}

/// Role-aware view over a [`KeyValueStore`]
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Token store backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get_token(&self, role: Role, kind: TokenKind) -> Option<String> {
        self.backend.get(&token_key(role, kind))
    }

    pub fn set_token(&self, role: Role, kind: TokenKind, value: &str) {
        self.backend.set(&token_key(role, kind), value);
    }

    pub fn clear_token(&self, role: Role, kind: TokenKind) {
        self.backend.remove(&token_key(role, kind));
    }

    /// Both tokens for a role, only if both are present
    pub fn get_pair(&self, role: Role) -> Option<TokenPair> {
        let access_token = self.get_token(role, TokenKind::Access)?;
        let refresh_token = self.get_token(role, TokenKind::Refresh)?;
        Some(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn set_pair(&self, role: Role, pair: &TokenPair) {
        let access_key = token_key(role, TokenKind::Access);
        let refresh_key = token_key(role, TokenKind::Refresh);
        self.backend.set_entries(&[
            (access_key.as_str(), pair.access_token.as_str()),
            (refresh_key.as_str(), pair.refresh_token.as_str()),
        ]);
    }

    pub fn clear_pair(&self, role: Role) {
        let access_key = token_key(role, TokenKind::Access);
        let refresh_key = token_key(role, TokenKind::Refresh);
        self.backend
            .remove_entries(&[access_key.as_str(), refresh_key.as_str()]);
    }

    pub fn has_session(&self, role: Role) -> bool {
        self.backend.contains(&token_key(role, TokenKind::Access))
    }

    /// The stored marker, or agent when unset or unrecognised.
    pub fn get_active_role(&self) -> Role {
        self.backend
            .get(ACTIVE_ROLE_KEY)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Like [`get_active_role`](Self::get_active_role), but without a marker
    /// it guesses from which role holds an access token (agent first).
    pub fn resolve_active_role(&self) -> Role {
        if let Some(role) = self
            .backend
            .get(ACTIVE_ROLE_KEY)
            .and_then(|value| value.parse().ok())
        {
            return role;
        }

        Role::ALL
            .into_iter()
            .find(|role| self.has_session(*role))
            .unwrap_or_default()
    }

    pub fn set_active_role(&self, role: Role) {
        self.backend.set(ACTIVE_ROLE_KEY, role.as_str());
    }

    pub fn clear_active_role(&self) {
        self.backend.remove(ACTIVE_ROLE_KEY);
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
