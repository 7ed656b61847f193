use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    error::{MigrateError, Result},
    Migration, Scope,
};

/// `<YYYYMMDDHHMMSS>_<slug>`, ordered by timestamp then slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationId {
    timestamp: NaiveDateTime,
    slug: String,
    raw: String,
}

impl MigrationId {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for MigrationId {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || MigrateError::MalformedIdentifier(s.to_owned());

        let (timestamp, slug) = s.split_once('_').ok_or_else(malformed)?;

        if timestamp.len() != 14 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let valid_slug = slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');

        if slug.is_empty() || !valid_slug {
            return Err(malformed());
        }

        let field = |from: usize, to: usize| timestamp[from..to].parse::<u32>().ok();
        let timestamp = field(0, 4)
            .and_then(|year| NaiveDate::from_ymd_opt(year as i32, field(4, 6)?, field(6, 8)?))
            .and_then(|date| date.and_hms_opt(field(8, 10)?, field(10, 12)?, field(12, 14)?))
            .ok_or_else(malformed)?;

        Ok(Self {
            timestamp,
            slug: slug.to_owned(),
            raw: s.to_owned(),
        })
    }
}

impl Ord for MigrationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.slug.cmp(&other.slug))
    }
}

impl PartialOrd for MigrationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

pub struct MigrationUnit {
    id: MigrationId,
    migration: Box<dyn Migration>,
}

impl MigrationUnit {
    pub fn id(&self) -> &MigrationId {
        &self.id
    }

    pub fn scope(&self) -> Scope {
        self.migration.scope()
    }

    pub fn migration(&self) -> &dyn Migration {
        self.migration.as_ref()
    }
}

impl fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("id", &self.id.as_str())
            .field("scope", &self.scope())
            .finish()
    }
}

/// Every known migration, kept sorted per scope.
#[derive(Debug, Default)]
pub struct Registry {
    units: BTreeMap<Scope, Vec<MigrationUnit>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_migrations(migrations: Vec<Box<dyn Migration>>) -> Result<Self> {
        let mut registry = Self::new();

        for migration in migrations {
            registry.add(migration)?;
        }

        Ok(registry)
    }

    pub fn add(&mut self, migration: Box<dyn Migration>) -> Result<()> {
        let id = migration.name().parse::<MigrationId>()?;
        let scope = migration.scope();
        let units = self.units.entry(scope).or_default();

        match units.binary_search_by(|unit| unit.id.cmp(&id)) {
            Ok(_) => Err(MigrateError::DuplicateIdentifier {
                id: id.raw,
                scope,
            }),
            Err(pos) => {
                units.insert(pos, MigrationUnit { id, migration });
                Ok(())
            }
        }
    }

    /// Units of `scope` in execution order.
    pub fn discover(&self, scope: Scope) -> &[MigrationUnit] {
        self.units.get(&scope).map(Vec::as_slice).unwrap_or_default()
    }

    /// Index of `id` within [`Registry::discover`].
    pub fn position(&self, scope: Scope, id: &str) -> Result<usize> {
        self.discover(scope)
            .iter()
            .position(|unit| unit.id.as_str() == id)
            .ok_or_else(|| MigrateError::UnknownMigration {
                id: id.to_owned(),
                scope,
            })
    }

    pub fn len(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
