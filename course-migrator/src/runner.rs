use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    engine::{AppliedRecord, Connector, Database},
    error::{DriftKind, MigrateError, Result},
    executor::{Executor, Plan},
    target::{Course, CourseSource, Target},
    tracker::{verify_prefix, Tracker},
    Config, Registry, Scope,
};

/// Which targets a command touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub scopes: Vec<Scope>,
    pub course: Option<Course>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            scopes: Scope::ALL.to_vec(),
            course: None,
        }
    }
}

impl Selection {
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self.scopes.sort();
        self.scopes.dedup();
        self
    }

    pub fn course(mut self, course: Course) -> Self {
        self.course = Some(course);
        self
    }

    fn includes(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub plan: Plan,
    pub selection: Selection,
    /// Course targets migrated at the same time.
    pub jobs: usize,
}

impl RunOptions {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            selection: Selection::default(),
            jobs: 1,
        }
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}

#[derive(Debug)]
pub struct TargetReport {
    pub target: Target,
    /// Ids applied or reverted on success.
    pub result: Result<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct Report {
    pub targets: Vec<TargetReport>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.targets.iter().all(|report| report.result.is_ok())
    }

    pub fn get(&self, target: &Target) -> Option<&Result<Vec<String>>> {
        self.targets
            .iter()
            .find(|report| &report.target == target)
            .map(|report| &report.result)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Target, &MigrateError)> {
        self.targets
            .iter()
            .filter_map(|report| report.result.as_ref().err().map(|err| (&report.target, err)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Applied(DateTime<Utc>),
    Pending,
    /// Recorded as applied but not registered.
    Unknown(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub id: String,
    pub state: UnitState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetState {
    pub units: Vec<UnitStatus>,
    pub drift: Option<DriftKind>,
}

impl TargetState {
    pub fn pending(&self) -> usize {
        self.units
            .iter()
            .filter(|unit| unit.state == UnitState::Pending)
            .count()
    }
}

#[derive(Debug)]
pub struct TargetStatus {
    pub target: Target,
    pub result: Result<TargetState>,
}

/// Drives the executor over the system database and every course database.
pub struct Runner {
    registry: Registry,
    connector: Box<dyn Connector>,
    courses: Box<dyn CourseSource>,
    config: Config,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new<C, S>(registry: Registry, connector: C, courses: S, config: Config) -> Self
    where
        C: Connector + 'static,
        S: CourseSource + 'static,
    {
        Self {
            registry,
            connector: Box::new(connector),
            courses: Box::new(courses),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The system target first, then courses ordered by semester and name.
    pub async fn targets(&self, selection: &Selection) -> Result<Vec<Target>> {
        let mut targets = Vec::new();

        if selection.includes(Scope::System) {
            targets.push(Target::System);
        }

        if !selection.includes(Scope::Course) {
            return match &selection.course {
                Some(course) => Err(MigrateError::CourseOutOfScope(course.clone())),
                None => Ok(targets),
            };
        }

        let mut courses = self
            .courses
            .courses()
            .await
            .map_err(MigrateError::CourseListing)?;
        courses.sort();
        courses.dedup();

        if let Some(course) = &selection.course {
            if !courses.contains(course) {
                return Err(MigrateError::UnknownCourse(course.clone()));
            }

            courses.retain(|c| c == course);
        }

        targets.extend(courses.into_iter().map(Target::Course));

        Ok(targets)
    }

    pub async fn run_all(&self, options: &RunOptions) -> Result<Report> {
        let plan = &options.plan;
        let mut selection = options.selection.clone();

        if let Some(id) = plan.target_id() {
            let scopes = selection
                .scopes
                .iter()
                .copied()
                .filter(|scope| self.registry.position(*scope, id).is_ok())
                .collect::<Vec<_>>();

            let Some(scope) = scopes.first().copied() else {
                return Err(MigrateError::UnknownMigration {
                    id: id.to_owned(),
                    scope: selection.scopes.first().copied().unwrap_or(Scope::Course),
                });
            };

            if scopes.len() < selection.scopes.len() {
                tracing::info!("`{id}` is a {scope} migration, limiting the run to that scope");
            }

            selection.scopes = scopes;
        }

        let targets = self.targets(&selection).await?;
        let mut unreachable = self.preflight(&targets).await?;

        tracing::info!(
            direction = %plan.direction(),
            targets = targets.len(),
            fake = plan.is_fake(),
            "starting run"
        );

        let (system, courses): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .map(|target| {
                let skip = unreachable.remove(&target);
                (target, skip)
            })
            .partition(|(target, _)| target == &Target::System);

        let mut report = Report::default();

        for (target, skip) in system {
            let result = self.run_target(&target, plan, skip).await;
            report.targets.push(TargetReport { target, result });
        }

        let reports = stream::iter(courses.into_iter().map(|(target, skip)| async move {
            let result = self.run_target(&target, plan, skip).await;
            TargetReport { target, result }
        }))
        .buffered(options.jobs.max(1))
        .collect::<Vec<_>>()
        .await;

        report.targets.extend(reports);

        for (target, err) in report.failures() {
            tracing::error!(tenant = %target, error = %err, "target failed");
        }

        Ok(report)
    }

    pub async fn status(&self, selection: &Selection) -> Result<Vec<TargetStatus>> {
        let targets = self.targets(selection).await?;
        let mut statuses = Vec::with_capacity(targets.len());

        for target in targets {
            let result = self.inspect(&target).await.map(|records| {
                let units = self.registry.discover(target.scope());
                let applied = records
                    .iter()
                    .map(|record| record.migration_id.to_owned())
                    .collect();
                let drift = verify_prefix(units, &applied).err();
                let applied_at = records
                    .iter()
                    .map(|record| (record.migration_id.as_str(), record.applied_at))
                    .collect::<HashMap<_, _>>();

                let mut unit_statuses = units
                    .iter()
                    .map(|unit| UnitStatus {
                        id: unit.id().to_string(),
                        state: applied_at
                            .get(unit.id().as_str())
                            .map_or(UnitState::Pending, |at| UnitState::Applied(*at)),
                    })
                    .collect::<Vec<_>>();

                unit_statuses.extend(
                    records
                        .iter()
                        .filter(|record| {
                            !units
                                .iter()
                                .any(|unit| unit.id().as_str() == record.migration_id)
                        })
                        .map(|record| UnitStatus {
                            id: record.migration_id.to_owned(),
                            state: UnitState::Unknown(record.applied_at),
                        }),
                );

                TargetState {
                    units: unit_statuses,
                    drift,
                }
            });

            statuses.push(TargetStatus { target, result });
        }

        Ok(statuses)
    }

    /// Reads every target's applied records without changing anything.
    ///
    /// Unreachable targets are returned with their error; drift anywhere
    /// aborts before a single migration runs.
    async fn preflight(&self, targets: &[Target]) -> Result<HashMap<Target, MigrateError>> {
        let mut unreachable = HashMap::new();

        for target in targets {
            let records = match self.inspect(target).await {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(tenant = %target, error = %err, "skipping target");
                    unreachable.insert(target.clone(), err);
                    continue;
                }
            };

            let applied = records
                .into_iter()
                .map(|record| record.migration_id)
                .collect();

            verify_prefix(self.registry.discover(target.scope()), &applied).map_err(|kind| {
                MigrateError::Drift {
                    target: target.clone(),
                    kind,
                }
            })?;
        }

        Ok(unreachable)
    }

    async fn connect(&self, target: &Target) -> Result<Box<dyn Database>> {
        self.connector
            .connect(target)
            .await
            .map_err(|cause| MigrateError::ConnectionError {
                target: target.clone(),
                cause,
            })
    }

    async fn inspect(&self, target: &Target) -> Result<Vec<AppliedRecord>> {
        let mut db = self.connect(target).await?;

        let records = Tracker::new(target.scope()).applied(db.as_mut()).await;

        if let Err(err) = db.close().await {
            tracing::warn!(tenant = %target, error = %err, "failed to close connection");
        }

        Ok(records?)
    }

    async fn run_target(
        &self,
        target: &Target,
        plan: &Plan,
        skip: Option<MigrateError>,
    ) -> Result<Vec<String>> {
        if let Some(err) = skip {
            return Err(err);
        }

        if self.cancel.is_cancelled() {
            tracing::warn!(tenant = %target, "run interrupted, target not started");

            return Err(MigrateError::Interrupted);
        }

        let result = self
            .execute(target, plan)
            .instrument(tracing::info_span!("target", tenant = %target))
            .await;

        if let Ok(ids) = &result {
            tracing::info!(tenant = %target, count = ids.len(), "target done");
        }

        result
    }

    async fn execute(&self, target: &Target, plan: &Plan) -> Result<Vec<String>> {
        let mut db = self.connect(target).await?;

        let result = Executor::new(&self.config)
            .with_cancellation(self.cancel.clone())
            .run(db.as_mut(), target, self.registry.discover(target.scope()), plan)
            .await;

        if let Err(err) = db.close().await {
            tracing::warn!(tenant = %target, error = %err, "failed to close connection");
        }

        result
    }
}
