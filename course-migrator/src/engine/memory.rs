use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use crate::{
    engine::{AppliedRecord, Connector, Database, Param},
    error::DatabaseError,
    Target,
};

#[derive(Debug, Clone, Default)]
struct State {
    tables: BTreeSet<String>,
    statements: Vec<String>,
    trackers: HashMap<String, BTreeMap<String, DateTime<Utc>>>,
}

impl State {
    fn apply(&mut self, statement: &str) {
        self.statements.push(statement.to_owned());

        let tokens = statement
            .split_whitespace()
            .map(|token| token.to_ascii_lowercase())
            .collect::<Vec<_>>();
        let tokens = tokens.iter().map(String::as_str).collect::<Vec<_>>();

        match tokens.as_slice() {
            ["create", "table", "if", "not", "exists", name, ..] => {
                self.tables.insert(table_name(name));
            }
            ["create", "table", name, ..] => {
                self.tables.insert(table_name(name));
            }
            ["drop", "table", "if", "exists", name, ..] => {
                self.tables.remove(&table_name(name));
            }
            ["drop", "table", name, ..] => {
                self.tables.remove(&table_name(name));
            }
            _ => {}
        }
    }

    fn tracker(&mut self, table: &str) -> Result<&mut BTreeMap<String, DateTime<Utc>>, DatabaseError> {
        self.trackers.get_mut(table).ok_or_else(|| {
            DatabaseError::Statement(format!("relation \"{table}\" does not exist"))
        })
    }
}

fn table_name(token: &str) -> String {
    token
        .split('(')
        .next()
        .unwrap_or_default()
        .trim_end_matches(',')
        .trim_matches('"')
        .to_owned()
}

/// In-memory stand-in for a target database.
///
/// Clones share the same data but each handle tracks its own transaction.
/// `CREATE TABLE` / `DROP TABLE` statements maintain the table set; every
/// other statement is only journaled.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<RwLock<State>>,
    failures: Arc<RwLock<Vec<String>>>,
    open_handles: Arc<Mutex<usize>>,
    snapshot: Option<State>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every statement containing `pattern` fail.
    pub fn fail_on(&self, pattern: impl Into<String>) {
        self.failures.write().push(pattern.into());
    }

    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    pub fn tables(&self) -> BTreeSet<String> {
        self.state.read().tables.clone()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.state.read().tables.contains(name)
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.read().statements.clone()
    }

    pub fn applied_ids(&self, table: &str) -> Vec<String> {
        self.state
            .read()
            .trackers
            .get(table)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn open_handles(&self) -> usize {
        *self.open_handles.lock()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn execute(&mut self, sql: &str, _params: &[Param]) -> Result<u64, DatabaseError> {
        if let Some(pattern) = self
            .failures
            .read()
            .iter()
            .find(|pattern| sql.contains(pattern.as_str()))
        {
            return Err(DatabaseError::Statement(format!(
                "injected failure on `{pattern}`"
            )));
        }

        let mut state = self.state.write();

        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            state.apply(statement);
        }

        Ok(0)
    }

    async fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.snapshot.is_some() {
            return Err(DatabaseError::TransactionOpen);
        }

        self.snapshot = Some(self.state.read().clone());

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(DatabaseError::NoTransaction)
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        let snapshot = self.snapshot.take().ok_or(DatabaseError::NoTransaction)?;
        *self.state.write() = snapshot;

        Ok(())
    }

    async fn create_tracker(&mut self, table: &str) -> Result<(), DatabaseError> {
        self.state
            .write()
            .trackers
            .entry(table.to_owned())
            .or_default();

        Ok(())
    }

    async fn applied(&mut self, table: &str) -> Result<Vec<AppliedRecord>, DatabaseError> {
        let records = self
            .state
            .read()
            .trackers
            .get(table)
            .map(|records| {
                records
                    .iter()
                    .map(|(migration_id, applied_at)| AppliedRecord {
                        migration_id: migration_id.to_owned(),
                        applied_at: *applied_at,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }

    async fn insert_applied(
        &mut self,
        table: &str,
        record: &AppliedRecord,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write();
        let records = state.tracker(table)?;

        if records.contains_key(&record.migration_id) {
            return Err(DatabaseError::Statement(format!(
                "duplicate key value violates unique constraint \"{table}_pkey\""
            )));
        }

        records.insert(record.migration_id.to_owned(), record.applied_at);

        Ok(())
    }

    async fn delete_applied(
        &mut self,
        table: &str,
        migration_id: &str,
    ) -> Result<(), DatabaseError> {
        self.state.write().tracker(table)?.remove(migration_id);

        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        let mut database = *self;

        if let Some(snapshot) = database.snapshot.take() {
            *database.state.write() = snapshot;
        }

        let mut open_handles = database.open_handles.lock();
        *open_handles = open_handles.saturating_sub(1);

        Ok(())
    }
}

/// Hands out one shared [`MemoryDatabase`] per target.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    databases: Arc<RwLock<HashMap<Target, MemoryDatabase>>>,
    unreachable: Arc<RwLock<HashSet<Target>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The database behind `target`, created on first access.
    pub fn database(&self, target: &Target) -> MemoryDatabase {
        self.databases
            .write()
            .entry(target.clone())
            .or_default()
            .clone()
    }

    pub fn set_unreachable(&self, target: Target) {
        self.unreachable.write().insert(target);
    }

    pub fn set_reachable(&self, target: &Target) {
        self.unreachable.write().remove(target);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, target: &Target) -> Result<Box<dyn Database>, DatabaseError> {
        if self.unreachable.read().contains(target) {
            return Err(DatabaseError::Statement(format!(
                "database for {target} does not exist"
            )));
        }

        let database = self.database(target);
        *database.open_handles.lock() += 1;

        Ok(Box::new(database))
    }
}
