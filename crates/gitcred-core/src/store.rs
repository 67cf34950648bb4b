//! Credential stores.
//!
//! Secrets are indexed by `(service, account)`. Looking up a service without
//! an account returns its first credential.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// A secret read back from a store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub account: String,
    pub secret: String,
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("account", &self.account)
            .field("secret", &"********")
            .finish()
    }
}

// ============================================================================
// CredentialStore Trait
// ============================================================================

/// Persistent secret storage.
///
/// Concurrent writers are the store's concern; callers do no locking.
#[async_trait]
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// Find a credential; `account = None` matches any account.
    async fn get(&self, service: &str, account: Option<&str>) -> Result<Option<StoredCredential>>;

    async fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<()>;

    /// Remove the first matching credential. Returns whether one was removed.
    async fn remove(&self, service: &str, account: Option<&str>) -> Result<bool>;
}

/// `service -> account -> secret`, ordered so "first" is deterministic.
type Entries = BTreeMap<String, BTreeMap<String, String>>;

fn find(entries: &Entries, service: &str, account: Option<&str>) -> Option<StoredCredential> {
    let accounts = entries.get(service)?;
    let (account, secret) = match account {
        Some(account) => accounts.get_key_value(account)?,
        None => accounts.iter().next()?,
    };
    Some(StoredCredential {
        account: account.clone(),
        secret: secret.clone(),
    })
}

fn insert(entries: &mut Entries, service: &str, account: &str, secret: &str) {
    entries
        .entry(service.to_string())
        .or_default()
        .insert(account.to_string(), secret.to_string());
}

fn delete(entries: &mut Entries, service: &str, account: Option<&str>) -> bool {
    let Some(accounts) = entries.get_mut(service) else {
        return false;
    };
    let key = match account {
        Some(account) => account.to_string(),
        None => match accounts.keys().next() {
            Some(first) => first.clone(),
            None => return false,
        },
    };
    let removed = accounts.remove(&key).is_some();
    if accounts.is_empty() {
        entries.remove(service);
    }
    removed
}

// ============================================================================
// MemoryCredentialStore
// ============================================================================

/// In-process store for tests and one-shot sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<Entries>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, service: &str, account: Option<&str>) -> Result<Option<StoredCredential>> {
        Ok(find(&self.entries.read(), service, account))
    }

    async fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        insert(&mut self.entries.write(), service, account, secret);
        Ok(())
    }

    async fn remove(&self, service: &str, account: Option<&str>) -> Result<bool> {
        Ok(delete(&mut self.entries.write(), service, account))
    }
}

// ============================================================================
// PlaintextCredentialStore
// ============================================================================

/// JSON file store. Secrets are written unencrypted; the file is made
/// readable by its owner only where the platform allows.
#[derive(Debug)]
pub struct PlaintextCredentialStore {
    path: PathBuf,
}

impl PlaintextCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Store(format!("failed to read {}: {}", self.path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| Error::Store(format!("failed to parse {}: {}", self.path.display(), e)))
    }

    /// Replace the file atomically with an owner-only copy of `entries`.
    fn save(&self, entries: &Entries) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Store(format!("failed to create {}: {}", parent.display(), e)))?;

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::Store(format!("failed to serialize credentials: {}", e)))?;
        let write_err =
            |e: std::io::Error| Error::Store(format!("failed to write {}: {}", self.path.display(), e));

        let mut file = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PlaintextCredentialStore {
    async fn get(&self, service: &str, account: Option<&str>) -> Result<Option<StoredCredential>> {
        Ok(find(&self.load()?, service, account))
    }

    async fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        let mut entries = self.load()?;
        if find(&entries, service, Some(account)).is_some_and(|c| c.secret == secret) {
            return Ok(());
        }
        insert(&mut entries, service, account, secret);
        self.save(&entries)?;
        tracing::debug!(path = %self.path.display(), service, "Credential written");
        Ok(())
    }

    async fn remove(&self, service: &str, account: Option<&str>) -> Result<bool> {
        let mut entries = self.load()?;
        let removed = delete(&mut entries, service, account);
        if removed {
            self.save(&entries)?;
        }
        Ok(removed)
    }
}

// ============================================================================
// Indexed slots
// ============================================================================

/// Suffix of the service whose slot names the last account written under a
/// service. Key hosts and paths are percent-encoded, so no key service ends
/// this way.
#[cfg_attr(not(feature = "keyring"), allow(dead_code))]
const INDEX_SERVICE_SUFFIX: &str = "?index";

/// Single secrets addressed by `(service, account)`, without enumeration.
#[cfg_attr(not(feature = "keyring"), allow(dead_code))]
trait SecretSlots: Send + Sync + fmt::Debug {
    fn read(&self, service: &str, account: &str) -> Result<Option<String>>;

    fn write(&self, service: &str, account: &str, secret: &str) -> Result<()>;

    /// Returns whether the slot existed.
    fn delete(&self, service: &str, account: &str) -> Result<bool>;
}

/// Store semantics over [`SecretSlots`]. Each service keeps an index slot,
/// under its own service, naming the last account written.
#[cfg_attr(not(feature = "keyring"), allow(dead_code))]
#[derive(Debug, Default)]
struct IndexedSlots<S> {
    slots: S,
}

#[cfg_attr(not(feature = "keyring"), allow(dead_code))]
impl<S: SecretSlots> IndexedSlots<S> {
    fn index_service(service: &str) -> String {
        format!("{}{}", service, INDEX_SERVICE_SUFFIX)
    }

    fn resolve_account(&self, service: &str, account: Option<&str>) -> Result<Option<String>> {
        match account {
            Some(account) => Ok(Some(account.to_string())),
            None => self.slots.read(&Self::index_service(service), ""),
        }
    }

    fn get(&self, service: &str, account: Option<&str>) -> Result<Option<StoredCredential>> {
        let Some(account) = self.resolve_account(service, account)? else {
            return Ok(None);
        };
        Ok(self
            .slots
            .read(service, &account)?
            .map(|secret| StoredCredential { account, secret }))
    }

    fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        self.slots.write(service, account, secret)?;
        self.slots.write(&Self::index_service(service), "", account)
    }

    fn remove(&self, service: &str, account: Option<&str>) -> Result<bool> {
        let Some(account) = self.resolve_account(service, account)? else {
            return Ok(false);
        };
        let removed = self.slots.delete(service, &account)?;
        let index = Self::index_service(service);
        if self.slots.read(&index, "")?.as_deref() == Some(account.as_str()) {
            self.slots.delete(&index, "")?;
        }
        Ok(removed)
    }
}

// ============================================================================
// KeyringCredentialStore (feature-gated)
// ============================================================================

#[cfg(feature = "keyring")]
#[derive(Debug, Default)]
struct KeyringSlots;

#[cfg(feature = "keyring")]
impl KeyringSlots {
    fn entry(service: &str, account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, account)
            .map_err(|e| Error::Store(format!("keyring error: {}", e)))
    }
}

#[cfg(feature = "keyring")]
impl SecretSlots for KeyringSlots {
    fn read(&self, service: &str, account: &str) -> Result<Option<String>> {
        match Self::entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Store(format!("failed to read from keyring: {}", e))),
        }
    }

    fn write(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        Self::entry(service, account)?
            .set_password(secret)
            .map_err(|e| Error::Store(format!("failed to store in keyring: {}", e)))
    }

    fn delete(&self, service: &str, account: &str) -> Result<bool> {
        match Self::entry(service, account)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(Error::Store(format!("failed to delete from keyring: {}", e))),
        }
    }
}

/// OS keychain store (macOS Keychain, Secret Service, Windows Credential Manager).
#[cfg(feature = "keyring")]
#[derive(Debug, Default)]
pub struct KeyringCredentialStore {
    inner: IndexedSlots<KeyringSlots>,
}

#[cfg(feature = "keyring")]
impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "keyring")]
#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self, service: &str, account: Option<&str>) -> Result<Option<StoredCredential>> {
        self.inner.get(service, account)
    }

    async fn add_or_update(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        self.inner.add_or_update(service, account, secret)
    }

    async fn remove(&self, service: &str, account: Option<&str>) -> Result<bool> {
        self.inner.remove(service, account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn exercise(store: &dyn CredentialStore) {
        assert_eq!(store.get("git:https://example.com", None).await.unwrap(), None);

        store
            .add_or_update("git:https://example.com", "bob", "pw-bob")
            .await
            .unwrap();
        store
            .add_or_update("git:https://example.com", "alice", "pw-alice")
            .await
            .unwrap();

        let alice = store
            .get("git:https://example.com", Some("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.secret, "pw-alice");

        // No account: first in order.
        let first = store
            .get("git:https://example.com", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.account, "alice");

        store
            .add_or_update("git:https://example.com", "alice", "rotated")
            .await
            .unwrap();
        let alice = store
            .get("git:https://example.com", Some("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.secret, "rotated");

        assert!(store.remove("git:https://example.com", Some("alice")).await.unwrap());
        assert!(!store.remove("git:https://example.com", Some("alice")).await.unwrap());
        assert!(store.remove("git:https://example.com", None).await.unwrap());
        assert_eq!(store.get("git:https://example.com", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCredentialStore::new();
        exercise(&store).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_plaintext_store() {
        let dir = TempDir::new().unwrap();
        let store = PlaintextCredentialStore::new(dir.path().join("nested/credentials.json"));
        exercise(&store).await;
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_plaintext_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");

        PlaintextCredentialStore::new(&path)
            .add_or_update("git:https://example.com", "alice", "pw")
            .await
            .unwrap();

        let reopened = PlaintextCredentialStore::new(&path);
        let found = reopened
            .get("git:https://example.com", Some("alice"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().secret, "pw");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plaintext_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = PlaintextCredentialStore::new(dir.path().join("credentials.json"));
        store.add_or_update("s", "a", "pw").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_plaintext_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = PlaintextCredentialStore::new(&path)
            .get("s", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plaintext_store_replaces_readable_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = PlaintextCredentialStore::new(&path);
        store.add_or_update("s", "a", "pw").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        // Only the credential file remains; the staging file was renamed over it.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(store.get("s", Some("a")).await.unwrap().unwrap().secret, "pw");
    }

    /// Slots kept in memory, standing in for the OS keychain.
    #[derive(Debug, Default)]
    struct MapSlots(parking_lot::Mutex<BTreeMap<(String, String), String>>);

    impl SecretSlots for MapSlots {
        fn read(&self, service: &str, account: &str) -> Result<Option<String>> {
            Ok(self
                .0
                .lock()
                .get(&(service.to_string(), account.to_string()))
                .cloned())
        }

        fn write(&self, service: &str, account: &str, secret: &str) -> Result<()> {
            self.0
                .lock()
                .insert((service.to_string(), account.to_string()), secret.to_string());
            Ok(())
        }

        fn delete(&self, service: &str, account: &str) -> Result<bool> {
            Ok(self
                .0
                .lock()
                .remove(&(service.to_string(), account.to_string()))
                .is_some())
        }
    }

    #[test]
    fn test_indexed_slots_empty_account_keeps_its_secret() {
        let store = IndexedSlots::<MapSlots>::default();
        let service = "git:https://example.com";

        store.add_or_update(service, "", "pw").unwrap();
        let found = store.get(service, Some("")).unwrap().unwrap();
        assert_eq!(found.account, "");
        assert_eq!(found.secret, "pw");

        // The index never answers for an explicit empty account.
        store.add_or_update(service, "alice", "pw-alice").unwrap();
        assert_eq!(store.get(service, Some("")).unwrap().unwrap().secret, "pw");
    }

    #[test]
    fn test_indexed_slots_lookup_without_account() {
        let store = IndexedSlots::<MapSlots>::default();
        let service = "git:https://example.com";
        assert_eq!(store.get(service, None).unwrap(), None);
        assert_eq!(store.get(service, Some("")).unwrap(), None);

        store.add_or_update(service, "bob", "pw-bob").unwrap();
        store.add_or_update(service, "alice", "pw-alice").unwrap();
        let last = store.get(service, None).unwrap().unwrap();
        assert_eq!(last.account, "alice");
        assert_eq!(last.secret, "pw-alice");

        assert!(store.remove(service, None).unwrap());
        assert_eq!(store.get(service, None).unwrap(), None);
        assert_eq!(store.get(service, Some("bob")).unwrap().unwrap().secret, "pw-bob");
        assert!(!store.remove(service, Some("alice")).unwrap());

        // Removing another account leaves the index alone.
        store.add_or_update(service, "carol", "pw-carol").unwrap();
        assert!(store.remove(service, Some("bob")).unwrap());
        assert_eq!(store.get(service, None).unwrap().unwrap().account, "carol");
    }

    #[test]
    fn test_stored_credential_debug_hides_secret() {
        let credential = StoredCredential {
            account: "alice".into(),
            secret: "hunter2".into(),
        };
        assert!(!format!("{:?}", credential).contains("hunter2"));
    }
}
