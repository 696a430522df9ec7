// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential records and subject resolution.
//!
//! The credential store is the system of record for principals; the auth core
//! only reads it. [`IdentityResolver`] is the single lookup the edge filter
//! performs per request, and the one point where a request may suspend on I/O.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Credential store errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityStoreError {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    #[error("principal already registered: {0}")]
    Duplicate(String),

    #[error("principal not found: {0}")]
    NotFound(String),
}

/// A principal as held by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Stable identifier
    pub id: Uuid,
    /// Unique principal name
    pub email: String,
    /// PHC-encoded password hash
    pub password_hash: String,
    /// Raw authority strings, not yet canonicalized
    pub authorities: Vec<String>,
}

impl CredentialRecord {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, authorities: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            authorities,
        }
    }

    /// Value derived from mutable credential state; tokens are bound to it.
    pub fn fingerprint(&self) -> &str {
        &self.password_hash
    }
}

/// Canonical lookup key for a principal name: trimmed, NFKC, lowercase.
pub fn normalize_principal(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// Backing store for credential records.
///
/// `principal` arguments are already passed through [`normalize_principal`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a record by normalized principal name.
    async fn find_by_principal(
        &self,
        principal: &str,
    ) -> Result<Option<CredentialRecord>, IdentityStoreError>;

    /// Register a new record. Fails with `Duplicate` if the principal exists.
    async fn insert(&self, record: CredentialRecord) -> Result<(), IdentityStoreError>;

    /// Cheap reachability probe used by readiness checks.
    async fn ping(&self) -> Result<(), IdentityStoreError> {
        Ok(())
    }
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the password hash, which invalidates every outstanding token.
    pub async fn update_password(
        &self,
        principal: &str,
        password_hash: impl Into<String>,
    ) -> Result<(), IdentityStoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&normalize_principal(principal))
            .ok_or_else(|| IdentityStoreError::NotFound(principal.to_string()))?;
        record.password_hash = password_hash.into();
        Ok(())
    }

    /// Replace the raw authorities of a principal.
    pub async fn set_authorities(
        &self,
        principal: &str,
        authorities: Vec<String>,
    ) -> Result<(), IdentityStoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&normalize_principal(principal))
            .ok_or_else(|| IdentityStoreError::NotFound(principal.to_string()))?;
        record.authorities = authorities;
        Ok(())
    }

    /// Delete a principal. Returns the removed record, if any.
    pub async fn remove(&self, principal: &str) -> Option<CredentialRecord> {
        self.records.write().await.remove(&normalize_principal(principal))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_principal(
        &self,
        principal: &str,
    ) -> Result<Option<CredentialRecord>, IdentityStoreError> {
        Ok(self.records.read().await.get(principal).cloned())
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), IdentityStoreError> {
        let key = normalize_principal(&record.email);
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Err(IdentityStoreError::Duplicate(record.email));
        }
        records.insert(key, record);
        Ok(())
    }
}

/// Resolves a claimed subject to its current credential record.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn CredentialStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Case-insensitive lookup. `Ok(None)` means no such principal; the
    /// caller decides what that implies.
    pub async fn resolve(
        &self,
        subject: &str,
    ) -> Result<Option<CredentialRecord>, IdentityStoreError> {
        let principal = normalize_principal(subject);
        if principal.is_empty() {
            return Ok(None);
        }

        let record = self.store.find_by_principal(&principal).await?;
        if record.is_none() {
            debug!("subject did not resolve to a credential record");
        }
        Ok(record)
    }

    /// Register a record in the underlying store.
    pub async fn register(&self, record: CredentialRecord) -> Result<(), IdentityStoreError> {
        self.store.insert(record).await
    }

    /// Reachability of the underlying store.
    pub async fn ping(&self) -> Result<(), IdentityStoreError> {
        self.store.ping().await
    }
}
