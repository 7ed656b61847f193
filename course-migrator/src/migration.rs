use async_trait::async_trait;
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

use crate::{Config, Database, DatabaseError, Param, Target};

/// Whether a migration runs against the system database or every course database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, FromStr,
)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    System,
    Course,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::System, Scope::Course];

    /// Bookkeeping table holding the applied records of this scope.
    pub fn tracker_table(&self) -> &'static str {
        match self {
            Scope::System => "migrations_system",
            Scope::Course => "migrations_course",
        }
    }
}

/// A named, versioned pair of schema operations.
///
/// `name` must be `<YYYYMMDDHHMMSS>_<slug>`; the registry rejects anything else.
/// Both operations run inside a transaction opened by the executor, so they
/// must not begin, commit or roll back on their own.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    fn scope(&self) -> Scope;

    async fn up(&self, ctx: &mut Context<'_>) -> Result<(), DatabaseError>;

    async fn down(&self, _ctx: &mut Context<'_>) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Everything an operation gets to see while it runs.
pub struct Context<'a> {
    pub config: &'a Config,
    pub semester: Option<&'a str>,
    pub course: Option<&'a str>,
    database: &'a mut dyn Database,
}

impl<'a> Context<'a> {
    pub fn new(config: &'a Config, target: &'a Target, database: &'a mut dyn Database) -> Self {
        Self {
            config,
            semester: target.semester(),
            course: target.course_name(),
            database,
        }
    }

    pub async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.database.execute(sql, &[]).await
    }

    pub async fn execute_with(&mut self, sql: &str, params: &[Param]) -> Result<u64, DatabaseError> {
        self.database.execute(sql, params).await
    }
}
