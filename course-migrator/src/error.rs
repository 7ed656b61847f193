use crate::{Course, Scope, Target};

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("statement failed: {0}")]
    Statement(String),

    #[error("a transaction is already open")]
    TransactionOpen,

    #[error("no transaction is open")]
    NoTransaction,

    #[cfg(feature = "pg")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftKind {
    /// An applied id the registry does not know for this scope.
    Unknown(String),
    /// `applied` is recorded while the earlier `missing` is not.
    Gap { missing: String, applied: String },
}

impl std::fmt::Display for DriftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftKind::Unknown(id) => write!(f, "applied migration `{id}` is not registered"),
            DriftKind::Gap { missing, applied } => write!(
                f,
                "`{applied}` is applied but the earlier `{missing}` is not"
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("malformed migration identifier `{0}`")]
    MalformedIdentifier(String),

    #[error("duplicate migration identifier `{id}` in {scope} scope")]
    DuplicateIdentifier { id: String, scope: Scope },

    #[error("unknown migration `{id}` in {scope} scope")]
    UnknownMigration { id: String, scope: Scope },

    #[error("could not connect to {target}: {cause}")]
    ConnectionError {
        target: Target,
        #[source]
        cause: DatabaseError,
    },

    #[error("migration `{id}` failed: {cause}")]
    MigrationFailed {
        id: String,
        #[source]
        cause: DatabaseError,
    },

    #[error("drift detected on {target}: {kind}")]
    Drift { target: Target, kind: DriftKind },

    #[error("run interrupted")]
    Interrupted,

    #[error("course {0} is not listed")]
    UnknownCourse(Course),

    #[error("course {0} was selected without the course scope")]
    CourseOutOfScope(Course),

    #[error("could not list courses: {0}")]
    CourseListing(#[source] DatabaseError),

    #[error("config `{0}`")]
    Config(String),

    #[error("database `{0}`")]
    Database(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, MigrateError>;
