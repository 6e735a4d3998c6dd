use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Capacity of the change-notification channel.
/// Slow subscribers lag rather than block writers.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Names under which session values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    AccessToken,
    RefreshToken,
    Email,
    Username,
    /// JSON-encoded array of role names
    Roles,
}

impl SessionKey {
    pub const ALL: [SessionKey; 5] = [
        SessionKey::AccessToken,
        SessionKey::RefreshToken,
        SessionKey::Email,
        SessionKey::Username,
        SessionKey::Roles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::AccessToken => "accessToken",
            SessionKey::RefreshToken => "refreshToken",
            SessionKey::Email => "email",
            SessionKey::Username => "username",
            SessionKey::Roles => "roles",
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown session key: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Set,
    Removed,
}

/// Notification sent to subscribers whenever a session value changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub key: SessionKey,
    pub change: SessionChange,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Display attributes cached at login so the dashboard need not re-fetch them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionProfile {
    pub email: Option<String>,
    pub username: Option<String>,
    pub roles: Vec<String>,
}

/// Key/value store holding the credentials of one signed-in session.
///
/// Implementations are shared between every component that talks to the
/// API, so mutations are broadcast to subscribers.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: SessionKey) -> Option<String>;

    fn set(&self, key: SessionKey, value: &str) -> Result<(), SessionError>;

    fn remove(&self, key: SessionKey) -> Result<(), SessionError>;

    /// Remove every session value
    fn clear(&self) -> Result<(), SessionError>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Drop both tokens, keeping cached profile attributes
    fn clear_tokens(&self) -> Result<(), SessionError> {
        self.remove(SessionKey::AccessToken)?;
        self.remove(SessionKey::RefreshToken)
    }

    fn profile(&self) -> SessionProfile {
        let roles = match self.get(SessionKey::Roles) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored roles are not a JSON string array");
                Vec::new()
            }),
            None => Vec::new(),
        };
        SessionProfile {
            email: self.get(SessionKey::Email),
            username: self.get(SessionKey::Username),
            roles,
        }
    }

    fn set_profile(&self, profile: &SessionProfile) -> Result<(), SessionError> {
        match profile.email {
            Some(ref email) => self.set(SessionKey::Email, email)?,
            None => self.remove(SessionKey::Email)?,
        }
        match profile.username {
            Some(ref username) => self.set(SessionKey::Username, username)?,
            None => self.remove(SessionKey::Username)?,
        }
        let roles = serde_json::to_string(&profile.roles)?;
        self.set(SessionKey::Roles, &roles)
    }
}

/// Values plus the channel that announces changes to them.
struct SessionMap {
    values: RwLock<HashMap<SessionKey, String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionMap {
    fn new(values: HashMap<SessionKey, String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(values),
            events,
        }
    }

    fn get(&self, key: SessionKey) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn snapshot(&self) -> HashMap<SessionKey, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, key: SessionKey, value: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.to_string());
        self.notify(key, SessionChange::Set);
    }

    /// Returns whether a value was actually removed
    fn remove(&self, key: SessionKey) -> bool {
        let removed = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some();
        if removed {
            self.notify(key, SessionChange::Removed);
        }
        removed
    }

    fn clear(&self) {
        let removed: Vec<SessionKey> = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(k, _)| k)
            .collect();
        for key in removed {
            self.notify(key, SessionChange::Removed);
        }
    }

    fn notify(&self, key: SessionKey, change: SessionChange) {
        // No subscribers is not an error
        let _ = self.events.send(SessionEvent { key, change });
    }
}

/// Process-local session store; values vanish when the process exits.
pub struct MemorySessionStore {
    map: SessionMap,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            map: SessionMap::new(HashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        self.map.get(key)
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), SessionError> {
        self.map.set(key, value);
        Ok(())
    }

    fn remove(&self, key: SessionKey) -> Result<(), SessionError> {
        self.map.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.map.clear();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.map.events.subscribe()
    }
}

/// Session store persisted as JSON in the cache directory, so separate
/// command invocations share one signed-in session.
pub struct FileSessionStore {
    path: PathBuf,
    map: SessionMap,
    /// Serializes writers so memory only changes after the disk write
    write_gate: Mutex<()>,
}

impl FileSessionStore {
    /// Open the store in `cache_dir`, loading any saved session
    pub fn open(cache_dir: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = cache_dir.as_ref().join(SESSION_FILE);
        let mut values = HashMap::new();

        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let raw: HashMap<String, String> = serde_json::from_str(&contents)?;
            for (name, value) in raw {
                match name.parse::<SessionKey>() {
                    Ok(key) => {
                        values.insert(key, value);
                    }
                    Err(e) => warn!(error = %e, "Ignoring unknown key in session file"),
                }
            }
            debug!(path = %path.display(), keys = values.len(), "Session loaded");
        }

        Ok(Self {
            path,
            map: SessionMap::new(values),
            write_gate: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `values` to disk, replacing the file atomically. The file is
    /// created owner-only before any token is written to it.
    fn save(&self, values: &HashMap<SessionKey, String>) -> Result<(), SessionError> {
        if values.is_empty() {
            return self.delete_file();
        }

        let raw: HashMap<&str, &str> = values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let contents = serde_json::to_string_pretty(&raw)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        // NamedTempFile is created with mode 0600 on unix
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete_file(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        self.map.get(key)
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), SessionError> {
        let _write = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.map.snapshot();
        next.insert(key, value.to_string());
        self.save(&next)?;
        self.map.set(key, value);
        Ok(())
    }

    fn remove(&self, key: SessionKey) -> Result<(), SessionError> {
        let _write = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.map.snapshot();
        if next.remove(&key).is_none() {
            return Ok(());
        }
        self.save(&next)?;
        self.map.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let _write = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.delete_file()?;
        self.map.clear();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.map.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in SessionKey::ALL {
            assert_eq!(key.as_str().parse::<SessionKey>(), Ok(key));
        }
        assert!("sessionId".parse::<SessionKey>().is_err());
    }

    #[test]
    fn test_memory_store_basic_operations() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get(SessionKey::AccessToken), None);

        store.set(SessionKey::AccessToken, "abc").unwrap();
        store.set(SessionKey::RefreshToken, "def").unwrap();
        store.set(SessionKey::Email, "ana@example.com").unwrap();
        assert_eq!(store.get(SessionKey::AccessToken).as_deref(), Some("abc"));

        store.clear_tokens().unwrap();
        assert_eq!(store.get(SessionKey::AccessToken), None);
        assert_eq!(store.get(SessionKey::RefreshToken), None);
        assert_eq!(store.get(SessionKey::Email).as_deref(), Some("ana@example.com"));

        store.clear().unwrap();
        assert_eq!(store.get(SessionKey::Email), None);
    }

    #[test]
    fn test_events_on_change() {
        let store = MemorySessionStore::new();
        let mut rx = store.subscribe();

        store.set(SessionKey::AccessToken, "abc").unwrap();
        store.remove(SessionKey::AccessToken).unwrap();
        // Removing an absent key is silent
        store.remove(SessionKey::AccessToken).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent {
                key: SessionKey::AccessToken,
                change: SessionChange::Set
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent {
                key: SessionKey::AccessToken,
                change: SessionChange::Removed
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_profile_round_trip() {
        let store = MemorySessionStore::new();
        let profile = SessionProfile {
            email: Some("ana@example.com".into()),
            username: Some("ana".into()),
            roles: vec!["admin".into(), "auditor".into()],
        };
        store.set_profile(&profile).unwrap();

        assert_eq!(
            store.get(SessionKey::Roles).as_deref(),
            Some(r#"["admin","auditor"]"#)
        );
        assert_eq!(store.profile(), profile);
    }

    #[test]
    fn test_profile_with_corrupt_roles() {
        let store = MemorySessionStore::new();
        store.set(SessionKey::Roles, "admin").unwrap();
        assert!(store.profile().roles.is_empty());
    }

    #[test]
    fn test_file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileSessionStore::open(dir.path()).unwrap();
        store.set(SessionKey::AccessToken, "abc").unwrap();
        store.set(SessionKey::Username, "ana").unwrap();
        assert!(store.path().exists());

        let reopened = FileSessionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(SessionKey::AccessToken).as_deref(), Some("abc"));
        assert_eq!(reopened.get(SessionKey::Username).as_deref(), Some("ana"));

        reopened.clear().unwrap();
        assert!(!reopened.path().exists());
        let empty = FileSessionStore::open(dir.path()).unwrap();
        assert_eq!(empty.get(SessionKey::AccessToken), None);
    }

    #[test]
    fn test_file_store_removes_file_when_emptied() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        store.set(SessionKey::AccessToken, "abc").unwrap();
        store.remove(SessionKey::AccessToken).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "not json").unwrap();
        assert!(matches!(
            FileSessionStore::open(dir.path()),
            Err(SessionError::Parse(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        store.set(SessionKey::AccessToken, "abc").unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // A file left readable by an older build is replaced on the next write
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        store.set(SessionKey::RefreshToken, "def").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let store = FileSessionStore::open(&cache_dir).unwrap();
        let mut rx = store.subscribe();

        // The cache directory cannot be created over a regular file
        std::fs::write(&cache_dir, "not a directory").unwrap();

        assert!(matches!(
            store.set(SessionKey::AccessToken, "abc"),
            Err(SessionError::Io(_))
        ));
        assert_eq!(store.get(SessionKey::AccessToken), None);
        assert!(rx.try_recv().is_err());
    }
}
