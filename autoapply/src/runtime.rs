//! Clock and id-generation seams.
//!
//! Injected everywhere a timestamp or identifier is minted so tests can
//! pin both.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Time source.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Identifier generation for runs and records.
pub trait IdGenerator: Send + Sync {
    /// Id for one orchestrator invocation.
    fn new_run_id(&self) -> String;

    /// Id for a persisted record.
    fn new_record_id(&self) -> String;

    /// A throwaway password for account creation.
    fn new_password(&self) -> String;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// UUID-backed id generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl UuidIdGenerator {
    fn short() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        hex[..12].to_owned()
    }
}

impl IdGenerator for UuidIdGenerator {
    fn new_run_id(&self) -> String {
        format!("run-{}", Self::short())
    }

    fn new_record_id(&self) -> String {
        format!("id-{}", Self::short())
    }

    fn new_password(&self) -> String {
        format!("Aa1!{}", Self::short())
    }
}

/// Deterministic clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Deterministic id generator for tests: `run-1`, `id-2`, …
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn new_run_id(&self) -> String {
        format!("run-{}", self.next())
    }

    fn new_record_id(&self) -> String {
        format!("id-{}", self.next())
    }

    fn new_password(&self) -> String {
        format!("pw-{}", self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_carry_prefixes() {
        let gen = UuidIdGenerator;
        assert!(gen.new_run_id().starts_with("run-"));
        assert!(gen.new_record_id().starts_with("id-"));
        assert_eq!(gen.new_run_id().len(), "run-".len() + 12);
    }

    #[test]
    fn sequential_ids_advance() {
        let gen = SequentialIdGenerator::default();
        assert_eq!(gen.new_run_id(), "run-1");
        assert_eq!(gen.new_record_id(), "id-2");
        assert_eq!(gen.new_password(), "pw-3");
    }
}
