//! Persistence contracts and implementations.
//!
//! Two idempotent, ordered stores: application records and account
//! credentials. SQLite backs production; the in-memory variants serve
//! tests and double as a scratch mode.
//!
//! Timestamps are persisted ISO-8601 with an explicit UTC offset; naive
//! strings read back as UTC. `NULL` means unset — the empty string is a
//! valid stored value.

pub mod memory;
pub mod sqlite;

use crate::error::StoreError;
use crate::model::{AccountCredential, JobApplicationRecord};

/// Store and query job application records.
pub trait JobApplicationStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::DuplicateId`] when
    /// the id already exists.
    fn add(&self, record: &JobApplicationRecord) -> Result<(), StoreError>;

    /// Replace the record with the same id.
    fn update(&self, record: &JobApplicationRecord) -> Result<(), StoreError>;

    /// Fetch by id.
    fn get(&self, id: &str) -> Result<Option<JobApplicationRecord>, StoreError>;

    /// All records, ordered by `applied_at` descending, nulls last.
    fn list_all(&self) -> Result<Vec<JobApplicationRecord>, StoreError>;
}

/// Store and query portal account credentials.
///
/// Passwords are stored as plain text — a documented limitation. This
/// trait is the seam where an encrypting decorator belongs.
pub trait CredentialStore: Send + Sync {
    /// Insert or update, keyed on `(portal, tenant, email)`. On update
    /// the original `id` and `created_at` are preserved and `updated_at`
    /// advances.
    fn upsert(&self, credential: &AccountCredential) -> Result<(), StoreError>;

    /// Fetch by key.
    fn get(
        &self,
        portal: &str,
        tenant: &str,
        email: &str,
    ) -> Result<Option<AccountCredential>, StoreError>;

    /// All credentials, ordered by `updated_at` descending.
    fn list_all(&self) -> Result<Vec<AccountCredential>, StoreError>;
}
