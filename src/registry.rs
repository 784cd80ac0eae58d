//! Server public key registry.
//!
//! The relay needs the server's public key to verify pushes for a client
//! identifier. The last key successfully registered is cached locally, and
//! the relay is only written to when the observed key differs from the
//! cache. A failed write leaves the cache untouched, so the next
//! reconciliation sees the mismatch and tries again.
//!
//! # Storage
//!
//! - [`MemoryKeyStore`]: in-process map, for tests and embedding.
//! - [`FileKeyStore`]: JSON file at `{config_dir}/server_keys.json`.

use std::collections::HashMap;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::constants;
use crate::oplog::OperationLog;
use crate::transport::{HttpRequest, Transport};

/// Local cache of server keys, keyed by client identifier.
///
/// Implementations use interior mutability so one store can serve
/// reconcilers for several identities; last write wins.
pub trait KeyStore {
    /// Cached key for `client_id`.
    fn find(&self, client_id: &str) -> Option<String>;

    /// Upsert the key for `client_id`.
    fn save(&self, client_id: &str, server_key: &str) -> Result<()>;
}

impl<S: KeyStore + ?Sized> KeyStore for &S {
    fn find(&self, client_id: &str) -> Option<String> {
        (**self).find(client_id)
    }

    fn save(&self, client_id: &str, server_key: &str) -> Result<()> {
        (**self).save(client_id, server_key)
    }
}

/// In-memory key store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: Mutex<HashMap<String, String>>,
}

impl MemoryKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.lock().map(|k| k.len()).unwrap_or(0)
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStore for MemoryKeyStore {
    fn find(&self, client_id: &str) -> Option<String> {
        self.keys.lock().ok()?.get(client_id).cloned()
    }

    fn save(&self, client_id: &str, server_key: &str) -> Result<()> {
        self.keys
            .lock()
            .map_err(|e| anyhow::anyhow!("key store lock poisoned: {e}"))?
            .insert(client_id.to_string(), server_key.to_string());
        Ok(())
    }
}

/// Key store persisted as a JSON object on disk.
///
/// The whole map is rewritten on every save with owner-only permissions.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    keys: Mutex<HashMap<String, String>>,
}

impl FileKeyStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read key store {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Key store {} is corrupted", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, keys: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(keys)?)
            .with_context(|| format!("Failed to write key store {}", self.path.display()))?;

        #[cfg(unix)]
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn find(&self, client_id: &str) -> Option<String> {
        self.keys.lock().ok()?.get(client_id).cloned()
    }

    fn save(&self, client_id: &str, server_key: &str) -> Result<()> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|e| anyhow::anyhow!("key store lock poisoned: {e}"))?;
        keys.insert(client_id.to_string(), server_key.to_string());
        self.persist(&keys)
    }
}

#[derive(Debug, Serialize)]
struct ServerKeyRequest<'a> {
    client_id: &'a str,
    server_key: &'a str,
}

/// What [`ServerKeyRegistry::sync_key`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySync {
    /// The subscription carried no server key.
    MissingKey,
    /// The cached key already matches.
    Unchanged,
    /// The relay accepted the key and the cache was updated.
    Registered,
    /// The relay call failed; the cache is unchanged.
    Failed,
}

/// Propagates server keys to the relay through a local cache.
#[derive(Debug)]
pub struct ServerKeyRegistry<'a, T: Transport, S: KeyStore> {
    transport: &'a T,
    relay_url: &'a str,
    store: &'a S,
}

impl<'a, T: Transport, S: KeyStore> ServerKeyRegistry<'a, T, S> {
    /// Registry writing to the relay at `relay_url` and caching in `store`.
    pub fn new(transport: &'a T, relay_url: &'a str, store: &'a S) -> Self {
        Self {
            transport,
            relay_url,
            store,
        }
    }

    /// Cached key for `client_id`. No network.
    pub fn check_cached_key(&self, client_id: &str) -> Option<String> {
        self.store.find(client_id)
    }

    /// Make the relay know `observed_key` for `client_id`.
    ///
    /// Never fails the reconciliation: every problem is logged and a later
    /// run retries because the cache still differs.
    pub fn sync_key(
        &self,
        client_id: &str,
        observed_key: Option<&str>,
        log: &mut OperationLog,
    ) -> KeySync {
        let Some(server_key) = observed_key else {
            log.add("(missing server public key in subscription.)");
            return KeySync::MissingKey;
        };

        if self.check_cached_key(client_id).as_deref() == Some(server_key) {
            return KeySync::Unchanged;
        }

        let body = match serde_json::to_value(ServerKeyRequest {
            client_id,
            server_key,
        }) {
            Ok(body) => body,
            Err(e) => {
                log.add(format!("(server public key registration failed: {e})"));
                return KeySync::Failed;
            }
        };
        let request = HttpRequest::post(
            format!("{}{}", self.relay_url, constants::RELAY_SERVER_KEY_PATH),
            body,
        );

        let response = match self.transport.execute(&request) {
            Ok(response) => response,
            Err(e) => {
                log.add(format!("(server public key registration failed: {e})"));
                return KeySync::Failed;
            }
        };

        if !response.is_ok() {
            log.add("(server public key registration failed.)");
            log.add(response.status_line());
            return KeySync::Failed;
        }

        if let Err(e) = self.store.save(client_id, server_key) {
            log::warn!("[Relay] failed to cache server key: {:#}", e);
            log.add(format!("(server public key is registered, but caching failed: {e})"));
            return KeySync::Registered;
        }
        log.add("(server public key is registered.)");
        KeySync::Registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::HttpResponse;

    #[test]
    fn test_memory_store_upsert() {
        let store = MemoryKeyStore::new();
        assert!(store.find("client").is_none());

        store.save("client", "k1").unwrap();
        store.save("client", "k2").unwrap();
        assert_eq!(store.find("client").as_deref(), Some("k2"));
        assert_eq!(store.len(), 1);
    }

    struct FixedStatus(u16);

    impl Transport for FixedStatus {
        fn execute(&self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse::empty(self.0))
        }
    }

    #[test]
    fn test_sync_key_outcomes() {
        let store = MemoryKeyStore::new();
        let mut log = OperationLog::new();

        let refused = ServerKeyRegistry::new(&FixedStatus(500), "r", &store);
        assert_eq!(refused.sync_key("c", None, &mut log), KeySync::MissingKey);
        assert_eq!(refused.sync_key("c", Some("k"), &mut log), KeySync::Failed);
        assert!(store.is_empty());
        assert!(log.contains("(server public key registration failed.)"));

        let accepted = ServerKeyRegistry::new(&FixedStatus(200), "r", &store);
        assert_eq!(accepted.sync_key("c", Some("k"), &mut log), KeySync::Registered);
        assert_eq!(accepted.sync_key("c", Some("k"), &mut log), KeySync::Unchanged);
        assert_eq!(accepted.check_cached_key("c").as_deref(), Some("k"));
    }
}
