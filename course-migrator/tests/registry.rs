mod common;

use course_migrator::{MigrateError, Migration, Registry, Scope};

use crate::common::{ids, TableMigration, A, B, C, SYS};

fn permutations(names: &[&'static str]) -> Vec<Vec<&'static str>> {
    if names.len() <= 1 {
        return vec![names.to_vec()];
    }

    let mut all = Vec::new();

    for (i, name) in names.iter().enumerate() {
        let mut rest = names.to_vec();
        rest.remove(i);

        for mut tail in permutations(&rest) {
            tail.insert(0, *name);
            all.push(tail);
        }
    }

    all
}

#[test]
fn order_is_independent_of_registration_order() {
    let tie = "20240102000000_a_tie";

    for order in permutations(&[C, A, tie, B]) {
        let mut registry = Registry::new();

        for name in order {
            registry.add(Box::new(TableMigration::course(name))).unwrap();
        }

        assert_eq!(ids(registry.discover(Scope::Course)), vec![A, tie, B, C]);
    }
}

#[test]
fn scopes_are_kept_apart() {
    let registry = Registry::from_migrations(vec![
        Box::new(TableMigration::course(B)) as Box<dyn Migration>,
        Box::new(TableMigration::system(SYS)),
        Box::new(TableMigration::system(B)),
        Box::new(TableMigration::course(A)),
    ])
    .unwrap();

    assert_eq!(ids(registry.discover(Scope::Course)), vec![A, B]);
    assert_eq!(ids(registry.discover(Scope::System)), vec![SYS, B]);
    assert_eq!(registry.len(), 4);
}

#[test]
fn duplicate_in_scope_is_rejected() {
    let mut registry = Registry::new();
    registry.add(Box::new(TableMigration::course(A))).unwrap();

    let err = registry
        .add(Box::new(TableMigration::course(A).empty_down()))
        .unwrap_err();

    assert!(matches!(
        err,
        MigrateError::DuplicateIdentifier { ref id, scope: Scope::Course } if id == A
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn malformed_name_is_rejected() {
    let err = Registry::from_migrations(vec![
        Box::new(TableMigration::course(A)) as Box<dyn Migration>,
        Box::new(TableMigration::course("lecture_chat")),
    ])
    .unwrap_err();

    assert!(matches!(err, MigrateError::MalformedIdentifier(ref name) if name == "lecture_chat"));
}

#[test]
fn position_of_unknown_id() {
    let registry = Registry::from_migrations(vec![
        Box::new(TableMigration::course(A)) as Box<dyn Migration>,
        Box::new(TableMigration::course(B)),
    ])
    .unwrap();

    assert_eq!(registry.position(Scope::Course, B).unwrap(), 1);
    assert!(matches!(
        registry.position(Scope::System, B),
        Err(MigrateError::UnknownMigration { scope: Scope::System, .. })
    ));
    assert!(registry.discover(Scope::System).is_empty());
}
