//! SQLite-backed stores.
//!
//! One connection per store, WAL journal, commit per write (rusqlite
//! auto-commits outside explicit transactions). The connection sits
//! behind a mutex so stores can be shared across tasks.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

use super::{CredentialStore, JobApplicationStore};
use crate::error::StoreError;
use crate::model::{AccountCredential, JobApplicationRecord, JobApplicationStatus};

/// Serialize an optional timestamp to ISO-8601 with offset.
fn dt_to_iso(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|d| d.to_rfc3339())
}

/// Parse a stored timestamp. Naive values are taken as UTC; `NULL` and
/// the empty string mean unset.
fn iso_to_dt(value: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    let Some(s) = value else { return Ok(None) };
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|_| StoreError::Timestamp(s))
}

/// Application records in SQLite.
#[derive(Debug)]
pub struct SqliteJobApplicationStore {
    conn: Mutex<Connection>,
}

impl SqliteJobApplicationStore {
    const SCHEMA: &'static str = "\
        CREATE TABLE IF NOT EXISTS applied_jobs (
            id             TEXT PRIMARY KEY,
            company_name   TEXT NOT NULL,
            job_title      TEXT NOT NULL,
            job_url        TEXT NOT NULL,
            status         TEXT NOT NULL,
            applied_at     TEXT,
            failure_reason TEXT,
            debug_run_id   TEXT
        );";

    /// Open (and migrate) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// An in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<(JobApplicationRecord, Option<String>)> {
        let status: String = row.get(4)?;
        let applied_at: Option<String> = row.get(5)?;
        let record = JobApplicationRecord {
            id: row.get(0)?,
            company_name: row.get(1)?,
            job_title: row.get(2)?,
            job_url: row.get(3)?,
            status: JobApplicationStatus::parse(&status)
                .unwrap_or(JobApplicationStatus::Failed),
            applied_at: None,
            failure_reason: row.get(6)?,
            debug_run_id: row.get(7)?,
        };
        Ok((record, applied_at))
    }
}

const RECORD_COLUMNS: &str =
    "id, company_name, job_title, job_url, status, applied_at, failure_reason, debug_run_id";

impl JobApplicationStore for SqliteJobApplicationStore {
    fn add(&self, record: &JobApplicationRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let result = conn.execute(
            "INSERT INTO applied_jobs \
             (id, company_name, job_title, job_url, status, applied_at, failure_reason, debug_run_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.company_name,
                record.job_title,
                record.job_url,
                record.status.as_str(),
                dt_to_iso(record.applied_at),
                record.failure_reason,
                record.debug_run_id,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateId(record.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, record: &JobApplicationRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "UPDATE applied_jobs SET \
             company_name=?1, job_title=?2, job_url=?3, status=?4, \
             applied_at=?5, failure_reason=?6, debug_run_id=?7 \
             WHERE id=?8",
            params![
                record.company_name,
                record.job_title,
                record.job_url,
                record.status.as_str(),
                dt_to_iso(record.applied_at),
                record.failure_reason,
                record.debug_run_id,
                record.id,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<JobApplicationRecord>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let row = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM applied_jobs WHERE id = ?1"),
                params![id],
                Self::row_to_record,
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((mut record, applied_at)) => {
                record.applied_at = iso_to_dt(applied_at)?;
                Ok(Some(record))
            }
        }
    }

    fn list_all(&self) -> Result<Vec<JobApplicationRecord>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM applied_jobs \
             ORDER BY applied_at IS NULL, applied_at DESC"
        ))?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            let (mut record, applied_at) = row?;
            record.applied_at = iso_to_dt(applied_at)?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Account credentials in SQLite. Plaintext passwords — see the trait
/// docs for the encryption seam.
#[derive(Debug)]
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    const SCHEMA: &'static str = "\
        CREATE TABLE IF NOT EXISTS credentials (
            id         TEXT PRIMARY KEY,
            portal     TEXT NOT NULL,
            tenant     TEXT NOT NULL,
            email      TEXT NOT NULL,
            password   TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (portal, tenant, email)
        );";

    /// Open (and migrate) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// An in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<(AccountCredential, String, String)> {
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        let credential = AccountCredential {
            id: row.get(0)?,
            portal: row.get(1)?,
            tenant: row.get(2)?,
            email: row.get(3)?,
            password: row.get(4)?,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        Ok((credential, created_at, updated_at))
    }

    fn finish(
        parts: (AccountCredential, String, String),
    ) -> Result<AccountCredential, StoreError> {
        let (mut credential, created_at, updated_at) = parts;
        credential.created_at = iso_to_dt(Some(created_at))?
            .ok_or_else(|| StoreError::Timestamp("created_at is empty".into()))?;
        credential.updated_at = iso_to_dt(Some(updated_at))?
            .ok_or_else(|| StoreError::Timestamp("updated_at is empty".into()))?;
        Ok(credential)
    }
}

const CREDENTIAL_COLUMNS: &str = "id, portal, tenant, email, password, created_at, updated_at";

impl CredentialStore for SqliteCredentialStore {
    fn upsert(&self, credential: &AccountCredential) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO credentials \
             (id, portal, tenant, email, password, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(portal, tenant, email) DO UPDATE SET \
             password=excluded.password, updated_at=excluded.updated_at",
            params![
                credential.id,
                credential.portal,
                credential.tenant,
                credential.email,
                credential.password,
                credential.created_at.to_rfc3339(),
                credential.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get(
        &self,
        portal: &str,
        tenant: &str,
        email: &str,
    ) -> Result<Option<AccountCredential>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let row = conn
            .query_row(
                &format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM credentials \
                     WHERE portal = ?1 AND tenant = ?2 AND email = ?3"
                ),
                params![portal, tenant, email],
                Self::row_to_credential,
            )
            .optional()?;
        row.map(Self::finish).transpose()
    }

    fn list_all(&self) -> Result<Vec<AccountCredential>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials ORDER BY updated_at DESC"
        ))?;
        let rows = stmt.query_map([], Self::row_to_credential)?;
        rows.map(|row| Self::finish(row?)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::JobPostingRef;
    use chrono::TimeZone;

    fn job() -> JobPostingRef {
        JobPostingRef {
            company_name: "Acme".into(),
            job_title: "Backend Engineer".into(),
            job_url: "https://example.test/jobs/1".into(),
            board_type: None,
        }
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    mod applications {
        use super::*;

        #[test]
        fn add_then_get_roundtrips() {
            let store = SqliteJobApplicationStore::in_memory().unwrap();
            let record = JobApplicationRecord::pending("id-1", &job());
            store.add(&record).unwrap();
            assert_eq!(store.get("id-1").unwrap().unwrap(), record);
        }

        #[test]
        fn add_duplicate_id_fails() {
            let store = SqliteJobApplicationStore::in_memory().unwrap();
            let record = JobApplicationRecord::pending("id-1", &job());
            store.add(&record).unwrap();
            assert!(matches!(
                store.add(&record),
                Err(StoreError::DuplicateId(id)) if id == "id-1"
            ));
        }

        #[test]
        fn update_replaces_by_id() {
            let store = SqliteJobApplicationStore::in_memory().unwrap();
            let record = JobApplicationRecord::pending("id-1", &job());
            store.add(&record).unwrap();
            let applied = record.applied(ts(12));
            store.update(&applied).unwrap();
            let stored = store.get("id-1").unwrap().unwrap();
            assert_eq!(stored.status, JobApplicationStatus::Applied);
            assert_eq!(stored.applied_at, Some(ts(12)));
        }

        #[test]
        fn list_orders_applied_at_desc_nulls_last() {
            let store = SqliteJobApplicationStore::in_memory().unwrap();
            let early = JobApplicationRecord::pending("id-early", &job()).applied(ts(8));
            let late = JobApplicationRecord::pending("id-late", &job()).applied(ts(20));
            let pending = JobApplicationRecord::pending("id-pending", &job());
            store.add(&pending).unwrap();
            store.add(&early).unwrap();
            store.add(&late).unwrap();

            let ids: Vec<String> = store.list_all().unwrap().into_iter().map(|r| r.id).collect();
            assert_eq!(ids, vec!["id-late", "id-early", "id-pending"]);
        }

        #[test]
        fn empty_failure_reason_is_a_valid_value() {
            let store = SqliteJobApplicationStore::in_memory().unwrap();
            let record = JobApplicationRecord::pending("id-1", &job()).failed("");
            store.add(&record).unwrap();
            let stored = store.get("id-1").unwrap().unwrap();
            assert_eq!(stored.failure_reason.as_deref(), Some(""));
        }

        #[test]
        fn naive_timestamps_read_as_utc() {
            let store = SqliteJobApplicationStore::in_memory().unwrap();
            {
                let conn = store.conn.lock().unwrap();
                conn.execute(
                    "INSERT INTO applied_jobs \
                     (id, company_name, job_title, job_url, status, applied_at) \
                     VALUES ('id-n', 'Acme', '', 'https://x', 'applied', '2025-06-01T12:00:00')",
                    [],
                )
                .unwrap();
            }
            let stored = store.get("id-n").unwrap().unwrap();
            assert_eq!(stored.applied_at, Some(ts(12)));
        }
    }

    mod credentials {
        use super::*;

        fn credential(id: &str, password: &str, at: DateTime<Utc>) -> AccountCredential {
            AccountCredential {
                id: id.into(),
                portal: "unknown".into(),
                tenant: "acme".into(),
                email: "ada@x.test".into(),
                password: password.into(),
                created_at: at,
                updated_at: at,
            }
        }

        #[test]
        fn upsert_then_get_roundtrips() {
            let store = SqliteCredentialStore::in_memory().unwrap();
            let cred = credential("c-1", "pw-1", ts(9));
            store.upsert(&cred).unwrap();
            assert_eq!(
                store.get("unknown", "acme", "ada@x.test").unwrap().unwrap(),
                cred
            );
        }

        #[test]
        fn second_upsert_preserves_created_at_and_advances_updated_at() {
            let store = SqliteCredentialStore::in_memory().unwrap();
            store.upsert(&credential("c-1", "pw-1", ts(9))).unwrap();
            store.upsert(&credential("c-2", "pw-2", ts(15))).unwrap();

            let all = store.list_all().unwrap();
            assert_eq!(all.len(), 1);
            let stored = &all[0];
            assert_eq!(stored.id, "c-1");
            assert_eq!(stored.password, "pw-2");
            assert_eq!(stored.created_at, ts(9));
            assert_eq!(stored.updated_at, ts(15));
        }

        #[test]
        fn list_orders_by_updated_at_desc() {
            let store = SqliteCredentialStore::in_memory().unwrap();
            let mut older = credential("c-1", "pw", ts(9));
            older.tenant = "initech".into();
            let newer = credential("c-2", "pw", ts(18));
            store.upsert(&older).unwrap();
            store.upsert(&newer).unwrap();
            let ids: Vec<String> = store.list_all().unwrap().into_iter().map(|c| c.id).collect();
            assert_eq!(ids, vec!["c-2", "c-1"]);
        }

        #[test]
        fn missing_key_returns_none() {
            let store = SqliteCredentialStore::in_memory().unwrap();
            assert!(store.get("unknown", "acme", "no@x.test").unwrap().is_none());
        }
    }
}
