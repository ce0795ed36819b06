//! Collaborator interfaces for identity, permission and resource lookups.
//!
//! # Responsibilities
//! - Define the async traits the pipeline and handlers call into
//! - Bundle one implementation of each into a cloneable [`Models`]
//! - Report a snapshot of the backing store for the metrics endpoint
//!
//! # Design Decisions
//! - The pipeline never retries; a failed call is reported once
//! - Deadlines are applied by the caller (see `resilience::timeouts`)
//! - `MemoryStore` implements every trait so the server runs standalone

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Entry, EntryFilter, NewEntry, NewUser, Permissions, Token, TokenHash, TokenScope, User};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("a user with this email address already exists")]
    DuplicateEmail,

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;

    /// Resolve a token hash within `scope` to its owner, ignoring expired tokens.
    async fn get_for_token(&self, scope: TokenScope, hash: &TokenHash) -> Result<User, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), StoreError>;
    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;
    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn insert(&self, entry: NewEntry) -> Result<Entry, StoreError>;
    async fn get(&self, id: i64) -> Result<Entry, StoreError>;
    async fn update(&self, entry: &Entry) -> Result<(), StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
    async fn list(&self, filter: &EntryFilter) -> Result<Vec<Entry>, StoreError>;
}

/// Point-in-time view of the backing store.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub backend: &'static str,
    pub users: usize,
    pub tokens: usize,
    pub entries: usize,
}

pub trait StoreStatus: Send + Sync {
    fn snapshot(&self) -> StoreSnapshot;
}

/// Every collaborator the server talks to.
#[derive(Clone)]
pub struct Models {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub entries: Arc<dyn EntryStore>,
    pub status: Arc<dyn StoreStatus>,
}

impl Models {
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    pub fn from_store(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            tokens: store.clone(),
            permissions: store.clone(),
            entries: store.clone(),
            status: store,
        }
    }
}
