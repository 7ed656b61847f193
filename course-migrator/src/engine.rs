use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dyn_clone::DynClone;

use crate::{error::DatabaseError, Target};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    pub migration_id: String,
    pub applied_at: DateTime<Utc>,
}

/// An open connection to one target database.
#[async_trait]
pub trait Database: Send {
    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64, DatabaseError>;

    async fn begin(&mut self) -> Result<(), DatabaseError>;

    async fn commit(&mut self) -> Result<(), DatabaseError>;

    async fn rollback(&mut self) -> Result<(), DatabaseError>;

    async fn create_tracker(&mut self, table: &str) -> Result<(), DatabaseError>;

    /// Records ordered by `migration_id`, empty when `table` does not exist.
    async fn applied(&mut self, table: &str) -> Result<Vec<AppliedRecord>, DatabaseError>;

    async fn insert_applied(
        &mut self,
        table: &str,
        record: &AppliedRecord,
    ) -> Result<(), DatabaseError>;

    async fn delete_applied(&mut self, table: &str, migration_id: &str)
        -> Result<(), DatabaseError>;

    async fn close(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Opens connections to targets.
#[async_trait]
pub trait Connector: DynClone + Send + Sync {
    async fn connect(&self, target: &Target) -> Result<Box<dyn Database>, DatabaseError>;
}

dyn_clone::clone_trait_object!(Connector);
