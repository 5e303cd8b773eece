//! Process-local backend.
//!
//! State is lost on restart. Each map sits behind its own lock, taken for a
//! single synchronous operation and never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::{
    Backend, RefreshEntry, RefreshStore, StoreError, StoreResult, User, UserStore,
};

#[derive(Default)]
struct UserTable {
    next_id: i64,
    by_id: HashMap<i64, User>,
}

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<RwLock<UserTable>>,
}

impl UserStore for MemoryUserStore {
    async fn create(&self, username: &str, password: &str) -> StoreResult<User> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;

        if table.by_id.values().any(|u| u.username == username) {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }

        table.next_id += 1;
        let user = User {
            id: table.next_id,
            username: username.to_string(),
            password: password.to_string(),
            token_version: 0,
        };
        table.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<User>> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.by_id.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table
            .by_id
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn bump_token_version(&self, id: i64) -> StoreResult<Option<u64>> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(table.by_id.get_mut(&id).map(|user| {
            user.token_version += 1;
            user.token_version
        }))
    }
}

#[derive(Clone, Default)]
pub struct MemoryRefreshStore {
    entries: Arc<Mutex<HashMap<String, RefreshEntry>>>,
}

impl RefreshStore for MemoryRefreshStore {
    async fn insert(&self, entry: &RefreshEntry) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(entry.refresh_id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, refresh_id: &str) -> StoreResult<Option<RefreshEntry>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(refresh_id).cloned())
    }

    async fn revoke(&self, refresh_id: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        match entries.get_mut(refresh_id) {
            Some(entry) => {
                entry.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate(&self, refresh_id: &str, successor: &RefreshEntry) -> StoreResult<bool> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;

        match entries.get_mut(refresh_id) {
            Some(entry) if !entry.revoked => {
                entry.revoked = true;
                entry.replaced_by = Some(successor.refresh_id.clone());
            }
            _ => return Ok(false),
        }

        entries.insert(successor.refresh_id.clone(), successor.clone());
        Ok(true)
    }

    async fn list_by_user(&self, user_id: i64, now: u64) -> StoreResult<Vec<RefreshEntry>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut live: Vec<RefreshEntry> = entries
            .values()
            .filter(|e| e.user_id == user_id && e.is_live(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(live)
    }
}

/// In-memory [`Backend`].
#[derive(Clone, Default)]
pub struct MemoryBackend {
    users: MemoryUserStore,
    tokens: MemoryRefreshStore,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    type Users = MemoryUserStore;
    type Tokens = MemoryRefreshStore;

    fn users(&self) -> &MemoryUserStore {
        &self.users
    }

    fn tokens(&self) -> &MemoryRefreshStore {
        &self.tokens
    }
}
