mod common;

use std::collections::BTreeSet;

use course_migrator::{
    AppliedRecord, CancellationToken, Config, ConfigBuilder, Database, DriftKind, Executor,
    MemoryDatabase, MigrateError, Migration, Plan, Registry, Scope,
};

use crate::common::{abc, course, registry, ProbeMigration, TableMigration, A, B, C, COURSE_TABLE};

async fn users_db() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    let mut handle = db.clone();
    handle
        .execute("CREATE TABLE users (user_id text)", &[])
        .await
        .unwrap();

    db
}

async fn run(registry: &Registry, db: &MemoryDatabase, plan: Plan) -> Result<Vec<String>, MigrateError> {
    let config = Config::default();
    let mut handle = db.clone();

    let result = Executor::new(&config)
        .run(&mut handle, &course(), registry.discover(Scope::Course), &plan)
        .await;

    // whatever the outcome, the handle that ran is left outside a transaction
    assert!(!handle.in_transaction());

    result
}

#[tokio::test]
async fn apply_then_rollback_round_trip() {
    let registry = abc();
    let db = users_db().await;
    let before = db.tables();

    let applied = run(&registry, &db, Plan::apply_all()).await.unwrap();

    assert_eq!(applied, vec![A, B, C]);
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A, B, C]);
    assert_eq!(
        db.tables(),
        BTreeSet::from(["a", "b", "c", "users"].map(str::to_owned))
    );

    let reverted = run(&registry, &db, Plan::revert_all()).await.unwrap();

    assert_eq!(reverted, vec![C, B, A]);
    assert!(db.applied_ids(COURSE_TABLE).is_empty());
    assert_eq!(db.tables(), before);
}

#[tokio::test]
async fn apply_twice_is_idempotent() {
    let registry = abc();
    let db = MemoryDatabase::new();

    run(&registry, &db, Plan::apply_to(B)).await.unwrap();
    let statements = db.statements().len();

    let applied = run(&registry, &db, Plan::apply_to(B)).await.unwrap();

    assert!(applied.is_empty());
    assert_eq!(db.statements().len(), statements);
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A, B]);
}

#[tokio::test]
async fn failing_unit_rolls_back_and_stops() {
    let registry = registry(vec![
        TableMigration::course(A),
        TableMigration::course(B).failing(),
        TableMigration::course(C),
    ]);
    let db = MemoryDatabase::new();

    let err = run(&registry, &db, Plan::apply_all()).await.unwrap_err();

    assert!(matches!(err, MigrateError::MigrationFailed { ref id, .. } if id == B));
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A]);
    assert_eq!(db.tables(), BTreeSet::from(["a".to_owned()]));
    assert!(db.statements().iter().all(|s| !s.contains(" c ")));
}

#[tokio::test]
async fn database_error_rolls_back_and_stops() {
    let registry = abc();
    let db = MemoryDatabase::new();
    db.fail_on("EXISTS b ");

    let err = run(&registry, &db, Plan::apply_all()).await.unwrap_err();

    assert!(matches!(err, MigrateError::MigrationFailed { ref id, .. } if id == B));
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A]);

    db.clear_failures();
    let applied = run(&registry, &db, Plan::apply_all()).await.unwrap();

    assert_eq!(applied, vec![B, C]);
}

#[tokio::test]
async fn empty_down_still_removes_record() {
    let registry = registry(vec![
        TableMigration::course(A),
        TableMigration::course(B).empty_down(),
    ]);
    let db = MemoryDatabase::new();

    run(&registry, &db, Plan::apply_all()).await.unwrap();
    let reverted = run(&registry, &db, Plan::revert_last(1)).await.unwrap();

    assert_eq!(reverted, vec![B]);
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A]);
    assert!(db.has_table("b"));
}

#[tokio::test]
async fn bounded_apply_and_rollback() {
    let registry = abc();
    let db = MemoryDatabase::new();

    assert_eq!(run(&registry, &db, Plan::apply_to(A)).await.unwrap(), vec![A]);
    assert_eq!(run(&registry, &db, Plan::apply_all()).await.unwrap(), vec![B, C]);

    assert_eq!(run(&registry, &db, Plan::revert_to(A)).await.unwrap(), vec![C, B]);
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A]);

    assert!(run(&registry, &db, Plan::revert_to(B)).await.unwrap().is_empty());
    assert_eq!(run(&registry, &db, Plan::revert_last(5)).await.unwrap(), vec![A]);
}

#[tokio::test]
async fn apply_and_rollback_wrappers() {
    let registry = abc();
    let config = Config::default();
    let executor = Executor::new(&config);
    let units = registry.discover(Scope::Course);
    let mut db = MemoryDatabase::new();

    let applied = executor.apply(&mut db, &course(), units, Some(B)).await.unwrap();
    assert_eq!(applied, vec![A, B]);

    let reverted = executor.rollback(&mut db, &course(), units, Some(A)).await.unwrap();
    assert_eq!(reverted, vec![B]);

    let applied = executor.apply(&mut db, &course(), units, None).await.unwrap();
    assert_eq!(applied, vec![B, C]);

    let reverted = executor.rollback(&mut db, &course(), units, None).await.unwrap();
    assert_eq!(reverted, vec![C, B, A]);
}

#[tokio::test]
async fn unknown_bound_is_rejected() {
    let registry = abc();
    let db = MemoryDatabase::new();

    let err = run(&registry, &db, Plan::apply_to("20990101000000_nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::UnknownMigration { .. }));
    assert!(db.applied_ids(COURSE_TABLE).is_empty());
}

#[tokio::test]
async fn gap_is_surfaced_not_repaired() {
    let registry = abc();
    let mut db = MemoryDatabase::new();
    db.create_tracker(COURSE_TABLE).await.unwrap();
    db.insert_applied(
        COURSE_TABLE,
        &AppliedRecord {
            migration_id: B.to_owned(),
            applied_at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();

    let err = run(&registry, &db, Plan::apply_all()).await.unwrap_err();

    match err {
        MigrateError::Drift { target, kind } => {
            assert_eq!(target, course());
            assert_eq!(
                kind,
                DriftKind::Gap {
                    missing: A.to_owned(),
                    applied: B.to_owned()
                }
            );
        }
        other => panic!("unexpected {other}"),
    }

    assert_eq!(db.applied_ids(COURSE_TABLE), vec![B]);
    assert!(db.tables().is_empty());
}

#[tokio::test]
async fn unknown_applied_id_is_drift() {
    let registry = abc();
    let mut db = MemoryDatabase::new();
    db.create_tracker(COURSE_TABLE).await.unwrap();
    db.insert_applied(
        COURSE_TABLE,
        &AppliedRecord {
            migration_id: "20200101000000_gone".to_owned(),
            applied_at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();

    let err = run(&registry, &db, Plan::revert_all()).await.unwrap_err();

    assert!(matches!(
        err,
        MigrateError::Drift { kind: DriftKind::Unknown(ref id), .. } if id == "20200101000000_gone"
    ));
}

#[tokio::test]
async fn fake_only_touches_tracker() {
    let registry = abc();
    let db = MemoryDatabase::new();

    let applied = run(&registry, &db, Plan::apply_all().fake(true)).await.unwrap();

    assert_eq!(applied, vec![A, B, C]);
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A, B, C]);
    assert!(db.statements().is_empty());

    run(&registry, &db, Plan::revert_to(A).fake(true)).await.unwrap();

    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A]);
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn cancellation_finishes_current_unit() {
    let cancel = CancellationToken::new();
    let registry = registry(vec![
        TableMigration::course(A),
        TableMigration::course(B).cancel_on_up(cancel.clone()),
        TableMigration::course(C),
    ]);
    let config = Config::default();
    let mut db = MemoryDatabase::new();

    let err = Executor::new(&config)
        .with_cancellation(cancel)
        .run(&mut db, &course(), registry.discover(Scope::Course), &Plan::apply_all())
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::Interrupted));
    assert_eq!(db.applied_ids(COURSE_TABLE), vec![A, B]);
    assert!(!db.has_table("c"));
    assert!(!db.in_transaction());
}

#[tokio::test]
async fn context_carries_target_and_config() {
    let registry = Registry::from_migrations(vec![Box::new(ProbeMigration) as Box<dyn Migration>])
        .unwrap();
    let config = ConfigBuilder::new().extra("label", "nightly").build();
    let mut db = MemoryDatabase::new();

    Executor::new(&config)
        .run(&mut db, &course(), registry.discover(Scope::Course), &Plan::apply_all())
        .await
        .unwrap();

    assert_eq!(
        db.statements(),
        vec!["INSERT INTO probe VALUES ('f24', 'csci1100', 'nightly')".to_owned()]
    );
}
