//! In-memory store implementations.
//!
//! Same ordering and idempotence contracts as the SQLite stores; used as
//! test doubles and as a scratch mode when no database path is set.

use std::sync::Mutex;

use super::{CredentialStore, JobApplicationStore};
use crate::error::StoreError;
use crate::model::{AccountCredential, JobApplicationRecord};

/// Application records in a mutex-guarded vector.
#[derive(Debug, Default)]
pub struct InMemoryJobApplicationStore {
    records: Mutex<Vec<JobApplicationRecord>>,
}

impl InMemoryJobApplicationStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobApplicationStore for InMemoryJobApplicationStore {
    fn add(&self, record: &JobApplicationRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("store mutex poisoned");
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateId(record.id.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    fn update(&self, record: &JobApplicationRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("store mutex poisoned");
        if let Some(slot) = records.iter_mut().find(|r| r.id == record.id) {
            *slot = record.clone();
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<JobApplicationRecord>, StoreError> {
        let records = self.records.lock().expect("store mutex poisoned");
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn list_all(&self) -> Result<Vec<JobApplicationRecord>, StoreError> {
        let records = self.records.lock().expect("store mutex poisoned");
        let mut all = records.clone();
        // applied_at descending, nulls last; stable for ties.
        all.sort_by(|a, b| match (b.applied_at, a.applied_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(all)
    }
}

/// Credentials in a mutex-guarded vector.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<Vec<AccountCredential>>,
}

impl InMemoryCredentialStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn upsert(&self, credential: &AccountCredential) -> Result<(), StoreError> {
        let mut credentials = self.credentials.lock().expect("store mutex poisoned");
        if let Some(slot) = credentials.iter_mut().find(|c| {
            c.portal == credential.portal
                && c.tenant == credential.tenant
                && c.email == credential.email
        }) {
            slot.password = credential.password.clone();
            slot.updated_at = credential.updated_at;
        } else {
            credentials.push(credential.clone());
        }
        Ok(())
    }

    fn get(
        &self,
        portal: &str,
        tenant: &str,
        email: &str,
    ) -> Result<Option<AccountCredential>, StoreError> {
        let credentials = self.credentials.lock().expect("store mutex poisoned");
        Ok(credentials
            .iter()
            .find(|c| c.portal == portal && c.tenant == tenant && c.email == email)
            .cloned())
    }

    fn list_all(&self) -> Result<Vec<AccountCredential>, StoreError> {
        let credentials = self.credentials.lock().expect("store mutex poisoned");
        let mut all = credentials.clone();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::JobPostingRef;
    use chrono::{TimeZone, Utc};

    fn job() -> JobPostingRef {
        JobPostingRef {
            company_name: "Acme".into(),
            job_title: "".into(),
            job_url: "https://example.test/jobs/1".into(),
            board_type: None,
        }
    }

    #[test]
    fn duplicate_add_fails() {
        let store = InMemoryJobApplicationStore::new();
        let record = JobApplicationRecord::pending("id-1", &job());
        store.add(&record).unwrap();
        assert!(store.add(&record).is_err());
    }

    #[test]
    fn ordering_matches_the_sqlite_contract() {
        let store = InMemoryJobApplicationStore::new();
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap();
        store
            .add(&JobApplicationRecord::pending("id-pending", &job()))
            .unwrap();
        store
            .add(&JobApplicationRecord::pending("id-early", &job()).applied(at(8)))
            .unwrap();
        store
            .add(&JobApplicationRecord::pending("id-late", &job()).applied(at(20)))
            .unwrap();
        let ids: Vec<String> = store.list_all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["id-late", "id-early", "id-pending"]);
    }

    #[test]
    fn upsert_preserves_identity_and_created_at() {
        let store = InMemoryCredentialStore::new();
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap();
        let first = AccountCredential {
            id: "c-1".into(),
            portal: "unknown".into(),
            tenant: "acme".into(),
            email: "ada@x.test".into(),
            password: "pw-1".into(),
            created_at: at(9),
            updated_at: at(9),
        };
        let mut second = first.clone();
        second.id = "c-2".into();
        second.password = "pw-2".into();
        second.created_at = at(15);
        second.updated_at = at(15);

        store.upsert(&first).unwrap();
        store.upsert(&second).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "c-1");
        assert_eq!(all[0].password, "pw-2");
        assert_eq!(all[0].created_at, at(9));
        assert_eq!(all[0].updated_at, at(15));
    }
}
