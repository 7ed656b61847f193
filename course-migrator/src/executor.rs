use chrono::Utc;
use parse_display::Display;
use tokio_util::sync::CancellationToken;

use crate::{
    engine::Database,
    error::{DatabaseError, MigrateError, Result},
    tracker::{verify_prefix, Tracker},
    Config, Context, MigrationUnit, Target,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Where an apply stops.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UpTo {
    All,
    Id(String),
}

/// Where a revert stops.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DownTo {
    All,
    Id(String),
    Last(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Apply(UpTo),
    Revert(DownTo),
}

/// What a run should do to each target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    step: Step,
    fake: bool,
}

impl Plan {
    fn new(step: Step) -> Self {
        Self { step, fake: false }
    }

    pub fn apply_all() -> Self {
        Self::new(Step::Apply(UpTo::All))
    }

    /// Apply pending units up to and including `id`.
    pub fn apply_to(id: impl Into<String>) -> Self {
        Self::new(Step::Apply(UpTo::Id(id.into())))
    }

    pub fn revert_all() -> Self {
        Self::new(Step::Revert(DownTo::All))
    }

    /// Revert applied units after `id`, keeping `id` itself applied.
    pub fn revert_to(id: impl Into<String>) -> Self {
        Self::new(Step::Revert(DownTo::Id(id.into())))
    }

    pub fn revert_last(count: usize) -> Self {
        Self::new(Step::Revert(DownTo::Last(count)))
    }

    /// Only write or remove applied records, never run `up`/`down`.
    pub fn fake(mut self, fake: bool) -> Self {
        self.fake = fake;
        self
    }

    pub fn direction(&self) -> Direction {
        match self.step {
            Step::Apply(_) => Direction::Up,
            Step::Revert(_) => Direction::Down,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match &self.step {
            Step::Apply(UpTo::Id(id)) | Step::Revert(DownTo::Id(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_fake(&self) -> bool {
        self.fake
    }
}

/// Runs the units of one target in order, one transaction per unit.
#[derive(Debug, Clone)]
pub struct Executor<'a> {
    config: &'a Config,
    cancel: CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop before the next unit once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn apply(
        &self,
        db: &mut dyn Database,
        target: &Target,
        units: &[MigrationUnit],
        up_to: Option<&str>,
    ) -> Result<Vec<String>> {
        let plan = up_to.map_or_else(Plan::apply_all, Plan::apply_to);

        self.run(db, target, units, &plan).await
    }

    pub async fn rollback(
        &self,
        db: &mut dyn Database,
        target: &Target,
        units: &[MigrationUnit],
        down_to: Option<&str>,
    ) -> Result<Vec<String>> {
        let plan = down_to.map_or_else(Plan::revert_all, Plan::revert_to);

        self.run(db, target, units, &plan).await
    }

    /// Returns the ids applied or reverted, in execution order.
    pub async fn run(
        &self,
        db: &mut dyn Database,
        target: &Target,
        units: &[MigrationUnit],
        plan: &Plan,
    ) -> Result<Vec<String>> {
        let tracker = Tracker::new(target.scope());
        tracker.ensure(db).await?;

        let applied = tracker.applied_ids(db).await?;
        let applied_count = verify_prefix(units, &applied).map_err(|kind| MigrateError::Drift {
            target: target.clone(),
            kind,
        })?;

        let position = |id: &str| {
            units
                .iter()
                .position(|unit| unit.id().as_str() == id)
                .ok_or_else(|| MigrateError::UnknownMigration {
                    id: id.to_owned(),
                    scope: target.scope(),
                })
        };

        let selected = match &plan.step {
            Step::Apply(up_to) => {
                let end = match up_to {
                    UpTo::All => units.len(),
                    UpTo::Id(id) => position(id)? + 1,
                };

                units[applied_count..end.max(applied_count)].iter().collect::<Vec<_>>()
            }
            Step::Revert(down_to) => {
                let start = match down_to {
                    DownTo::All => 0,
                    DownTo::Id(id) => position(id)? + 1,
                    DownTo::Last(count) => applied_count.saturating_sub(*count),
                };

                units[start.min(applied_count)..applied_count]
                    .iter()
                    .rev()
                    .collect::<Vec<_>>()
            }
        };

        if selected.is_empty() {
            tracing::debug!(tenant = %target, direction = %plan.direction(), "nothing to do");
        }

        let mut done = Vec::with_capacity(selected.len());

        for unit in selected {
            if self.cancel.is_cancelled() {
                tracing::warn!(tenant = %target, "run interrupted before `{}`", unit.id());

                return Err(MigrateError::Interrupted);
            }

            self.step(db, target, &tracker, unit, plan).await?;

            tracing::info!(
                tenant = %target,
                migration = unit.id().as_str(),
                fake = plan.fake,
                "{}",
                match plan.direction() {
                    Direction::Up => "applied",
                    Direction::Down => "reverted",
                }
            );

            done.push(unit.id().to_string());
        }

        Ok(done)
    }

    async fn step(
        &self,
        db: &mut dyn Database,
        target: &Target,
        tracker: &Tracker,
        unit: &MigrationUnit,
        plan: &Plan,
    ) -> Result<()> {
        let failed = |cause| MigrateError::MigrationFailed {
            id: unit.id().to_string(),
            cause,
        };

        db.begin().await.map_err(failed)?;

        if let Err(cause) = self.transition(db, target, tracker, unit, plan).await {
            tracing::warn!(
                tenant = %target,
                migration = unit.id().as_str(),
                error = %cause,
                "rolling back"
            );

            if let Err(err) = db.rollback().await {
                tracing::error!(tenant = %target, error = %err, "rollback failed");
            }

            return Err(failed(cause));
        }

        db.commit().await.map_err(failed)
    }

    async fn transition(
        &self,
        db: &mut dyn Database,
        target: &Target,
        tracker: &Tracker,
        unit: &MigrationUnit,
        plan: &Plan,
    ) -> std::result::Result<(), DatabaseError> {
        let id = unit.id().as_str();

        match plan.direction() {
            Direction::Up => {
                if !plan.fake {
                    let mut ctx = Context::new(self.config, target, &mut *db);
                    unit.migration().up(&mut ctx).await?;
                }

                tracker.record_applied(db, id, Utc::now()).await
            }
            Direction::Down => {
                if !plan.fake {
                    let mut ctx = Context::new(self.config, target, &mut *db);
                    unit.migration().down(&mut ctx).await?;
                }

                tracker.remove_applied(db, id).await
            }
        }
    }
}
