//! In-process store backed by concurrent maps.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;

use super::{EntryStore, PermissionStore, StoreError, StoreSnapshot, StoreStatus, TokenStore, UserStore};
use crate::models::token::unix_now;
use crate::models::{Entry, EntryFilter, NewEntry, NewUser, Permissions, Token, TokenHash, TokenScope, User};

#[derive(Debug, Clone, Copy)]
struct StoredToken {
    user_id: i64,
    expiry: u64,
}

/// Thread-safe store for users, tokens, permissions and entries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    /// Lowercased email to user id; enforces uniqueness.
    emails: DashMap<String, i64>,
    tokens: DashMap<(TokenScope, TokenHash), StoredToken>,
    permissions: DashMap<i64, BTreeSet<String>>,
    entries: DashMap<i64, Entry>,
    next_user_id: AtomicI64,
    next_entry_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_key(email: &str) -> String {
        email.to_ascii_lowercase()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        match self.emails.entry(Self::email_key(&user.email)) {
            MapEntry::Occupied(_) => Err(StoreError::DuplicateEmail),
            MapEntry::Vacant(slot) => {
                let id = self.next_user_id.fetch_add(1, Ordering::Relaxed) + 1;
                let user = User {
                    id,
                    created_at: unix_now(),
                    name: user.name,
                    email: user.email,
                    password_hash: user.password_hash,
                    activated: false,
                };
                slot.insert(id);
                self.users.insert(id, user.clone());
                Ok(user)
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let id = *self
            .emails
            .get(&Self::email_key(email))
            .ok_or(StoreError::NotFound)?;
        self.users
            .get(&id)
            .map(|u| u.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut stored = self.users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        let old_key = Self::email_key(&stored.email);
        let new_key = Self::email_key(&user.email);
        if old_key != new_key {
            match self.emails.entry(new_key) {
                MapEntry::Occupied(_) => return Err(StoreError::DuplicateEmail),
                MapEntry::Vacant(slot) => {
                    slot.insert(user.id);
                }
            }
            self.emails.remove(&old_key);
        }
        *stored = user.clone();
        Ok(())
    }

    async fn get_for_token(&self, scope: TokenScope, hash: &TokenHash) -> Result<User, StoreError> {
        let token = *self
            .tokens
            .get(&(scope, *hash))
            .ok_or(StoreError::NotFound)?;
        if token.expiry <= unix_now() {
            return Err(StoreError::NotFound);
        }
        self.users
            .get(&token.user_id)
            .map(|u| u.clone())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        self.tokens.insert(
            (token.scope, token.hash),
            StoredToken {
                user_id: token.user_id,
                expiry: token.expiry,
            },
        );
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<(), StoreError> {
        self.tokens
            .retain(|(s, _), t| !(*s == scope && t.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        Ok(self
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let mut granted = self.permissions.entry(user_id).or_default();
        granted.extend(codes.iter().map(|c| c.to_string()));
        Ok(())
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn insert(&self, entry: NewEntry) -> Result<Entry, StoreError> {
        let id = self.next_entry_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Entry {
            id,
            title: entry.title,
            category: entry.category,
            score: entry.score,
            created_at: unix_now(),
            version: 1,
        };
        self.entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: i64) -> Result<Entry, StoreError> {
        self.entries
            .get(&id)
            .map(|e| e.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, entry: &Entry) -> Result<(), StoreError> {
        let mut stored = self.entries.get_mut(&entry.id).ok_or(StoreError::NotFound)?;
        *stored = entry.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, filter: &EntryFilter) -> Result<Vec<Entry>, StoreError> {
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }
}

impl StoreStatus for MemoryStore {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            backend: "memory",
            users: self.users.len(),
            tokens: self.tokens.len(),
            entries: self.entries.len(),
        }
    }
}
