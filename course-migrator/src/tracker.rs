use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::{
    engine::{AppliedRecord, Database},
    error::{DatabaseError, DriftKind},
    MigrationUnit, Scope,
};

/// Applied-state bookkeeping of one scope inside a target database.
///
/// `record_applied` and `remove_applied` write through the handle they are
/// given, so they land in whatever transaction that handle has open.
#[derive(Debug, Clone, Copy)]
pub struct Tracker {
    scope: Scope,
}

impl Tracker {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn table(&self) -> &'static str {
        self.scope.tracker_table()
    }

    pub async fn ensure(&self, db: &mut dyn Database) -> Result<(), DatabaseError> {
        db.create_tracker(self.table()).await
    }

    pub async fn applied(&self, db: &mut dyn Database) -> Result<Vec<AppliedRecord>, DatabaseError> {
        db.applied(self.table()).await
    }

    pub async fn applied_ids(&self, db: &mut dyn Database) -> Result<HashSet<String>, DatabaseError> {
        Ok(self
            .applied(db)
            .await?
            .into_iter()
            .map(|record| record.migration_id)
            .collect())
    }

    pub async fn record_applied(
        &self,
        db: &mut dyn Database,
        migration_id: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let record = AppliedRecord {
            migration_id: migration_id.to_owned(),
            applied_at,
        };

        db.insert_applied(self.table(), &record).await
    }

    pub async fn remove_applied(
        &self,
        db: &mut dyn Database,
        migration_id: &str,
    ) -> Result<(), DatabaseError> {
        db.delete_applied(self.table(), migration_id).await
    }
}

/// Number of leading `units` that are applied.
///
/// Fails when `applied` is not exactly such a prefix.
pub fn verify_prefix(units: &[MigrationUnit], applied: &HashSet<String>) -> Result<usize, DriftKind> {
    let registered = units
        .iter()
        .map(|unit| unit.id().as_str())
        .collect::<HashSet<_>>();

    let mut unknown = applied
        .iter()
        .filter(|id| !registered.contains(id.as_str()))
        .collect::<Vec<_>>();
    unknown.sort();

    if let Some(id) = unknown.first() {
        return Err(DriftKind::Unknown(id.to_string()));
    }

    let prefix = units
        .iter()
        .take_while(|unit| applied.contains(unit.id().as_str()))
        .count();

    if let Some(unit) = units[prefix..]
        .iter()
        .find(|unit| applied.contains(unit.id().as_str()))
    {
        return Err(DriftKind::Gap {
            missing: units[prefix].id().to_string(),
            applied: unit.id().to_string(),
        });
    }

    Ok(prefix)
}
