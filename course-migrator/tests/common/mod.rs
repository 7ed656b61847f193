#![allow(dead_code)]

use async_trait::async_trait;
use course_migrator::{
    Context, DatabaseError, Migration, MigrationUnit, Registry, Scope, Target,
};
use tokio_util::sync::CancellationToken;

pub const A: &str = "20240101000000_a";
pub const B: &str = "20240102000000_b";
pub const C: &str = "20240103000000_c";
pub const SYS: &str = "20231201000000_sys";

pub const COURSE_TABLE: &str = "migrations_course";
pub const SYSTEM_TABLE: &str = "migrations_system";

/// Creates a table named after its slug on `up` and drops it on `down`.
pub struct TableMigration {
    name: String,
    scope: Scope,
    empty_down: bool,
    fail_up: bool,
    cancel_on_up: Option<CancellationToken>,
}

impl TableMigration {
    pub fn course(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            scope: Scope::Course,
            empty_down: false,
            fail_up: false,
            cancel_on_up: None,
        }
    }

    pub fn system(name: &str) -> Self {
        Self {
            scope: Scope::System,
            ..Self::course(name)
        }
    }

    pub fn empty_down(mut self) -> Self {
        self.empty_down = true;
        self
    }

    /// Runs its statement, then fails.
    pub fn failing(mut self) -> Self {
        self.fail_up = true;
        self
    }

    pub fn cancel_on_up(mut self, token: CancellationToken) -> Self {
        self.cancel_on_up = Some(token);
        self
    }

    pub fn table(&self) -> &str {
        table_of(&self.name)
    }
}

pub fn table_of(name: &str) -> &str {
    name.split_once('_').map(|(_, slug)| slug).unwrap_or(name)
}

#[async_trait]
impl Migration for TableMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> Scope {
        self.scope
    }

    async fn up(&self, ctx: &mut Context<'_>) -> Result<(), DatabaseError> {
        ctx.execute(&format!("CREATE TABLE IF NOT EXISTS {} (id integer)", self.table()))
            .await?;

        if self.fail_up {
            return Err(anyhow::anyhow!("up of {} failed", self.name).into());
        }

        if let Some(token) = &self.cancel_on_up {
            token.cancel();
        }

        Ok(())
    }

    async fn down(&self, ctx: &mut Context<'_>) -> Result<(), DatabaseError> {
        if self.empty_down {
            return Ok(());
        }

        ctx.execute(&format!("DROP TABLE IF EXISTS {}", self.table()))
            .await?;

        Ok(())
    }
}

/// Journals the semester, course and `label` setting it was run with.
pub struct ProbeMigration;

#[async_trait]
impl Migration for ProbeMigration {
    fn name(&self) -> &str {
        "20240201000000_probe"
    }

    fn scope(&self) -> Scope {
        Scope::Course
    }

    async fn up(&self, ctx: &mut Context<'_>) -> Result<(), DatabaseError> {
        let label = ctx
            .config
            .extra("label")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned();

        let sql = format!(
            "INSERT INTO probe VALUES ('{}', '{}', '{label}')",
            ctx.semester.unwrap_or("-"),
            ctx.course.unwrap_or("-"),
        );

        ctx.execute(&sql).await?;

        Ok(())
    }
}

pub fn registry(migrations: Vec<TableMigration>) -> Registry {
    Registry::from_migrations(
        migrations
            .into_iter()
            .map(|m| Box::new(m) as Box<dyn Migration>)
            .collect(),
    )
    .unwrap()
}

pub fn abc() -> Registry {
    registry(vec![
        TableMigration::course(A),
        TableMigration::course(B),
        TableMigration::course(C),
    ])
}

pub fn ids(units: &[MigrationUnit]) -> Vec<&str> {
    units.iter().map(|unit| unit.id().as_str()).collect()
}

pub fn course() -> Target {
    Target::course("f24", "csci1100")
}
