use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Alias, ColumnDef, Iden, PostgresQueryBuilder, Table};
use sqlx::{
    postgres::{PgConnectOptions, PgConnection},
    ConnectOptions, Connection, Executor,
};

use crate::{
    engine::{AppliedRecord, Connector, Database, Param},
    error::DatabaseError,
    Config, Course, CourseSource, DatabaseConfig, Target,
};

#[derive(Iden)]
enum Tracker {
    MigrationId,
    AppliedAt,
}

fn create_tracker_statement(table: &str) -> String {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(
            ColumnDef::new(Tracker::MigrationId)
                .text()
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(Tracker::AppliedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned()
        .to_string(PostgresQueryBuilder)
}

/// A single PostgreSQL connection to one target.
#[derive(Debug)]
pub struct PgDatabase {
    conn: PgConnection,
    in_transaction: bool,
}

impl PgDatabase {
    pub async fn connect(options: &PgConnectOptions) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: options.connect().await?,
            in_transaction: false,
        })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64, DatabaseError> {
        if params.is_empty() {
            let result = Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?;

            return Ok(result.rows_affected());
        }

        let mut query = sqlx::query(sql);

        for param in params {
            query = match param {
                Param::Null => query.bind(None::<String>),
                Param::Bool(v) => query.bind(*v),
                Param::Int(v) => query.bind(*v),
                Param::Text(v) => query.bind(v.to_owned()),
                Param::Timestamp(v) => query.bind(*v),
            };
        }

        Ok(query.execute(&mut self.conn).await?.rows_affected())
    }

    async fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction {
            return Err(DatabaseError::TransactionOpen);
        }

        Executor::execute(&mut self.conn, sqlx::raw_sql("BEGIN")).await?;
        self.in_transaction = true;

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::NoTransaction);
        }

        self.in_transaction = false;
        Executor::execute(&mut self.conn, sqlx::raw_sql("COMMIT")).await?;

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::NoTransaction);
        }

        self.in_transaction = false;
        Executor::execute(&mut self.conn, sqlx::raw_sql("ROLLBACK")).await?;

        Ok(())
    }

    async fn create_tracker(&mut self, table: &str) -> Result<(), DatabaseError> {
        let statement = create_tracker_statement(table);
        Executor::execute(&mut self.conn, sqlx::raw_sql(&statement)).await?;

        Ok(())
    }

    async fn applied(&mut self, table: &str) -> Result<Vec<AppliedRecord>, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT to_regclass($1::text) IS NOT NULL")
            .bind(table)
            .fetch_one(&mut self.conn)
            .await?;

        if !exists {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, (String, DateTime<Utc>)>(&format!(
            "SELECT migration_id, applied_at FROM {table} ORDER BY migration_id"
        ))
        .fetch_all(&mut self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(migration_id, applied_at)| AppliedRecord {
                migration_id,
                applied_at,
            })
            .collect())
    }

    async fn insert_applied(
        &mut self,
        table: &str,
        record: &AppliedRecord,
    ) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO {table} (migration_id, applied_at) VALUES ($1, $2)"
        ))
        .bind(&record.migration_id)
        .bind(record.applied_at)
        .execute(&mut self.conn)
        .await?;

        Ok(())
    }

    async fn delete_applied(
        &mut self,
        table: &str,
        migration_id: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(&format!("DELETE FROM {table} WHERE migration_id = $1"))
            .bind(migration_id)
            .execute(&mut self.conn)
            .await?;

        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        self.conn.close().await?;

        Ok(())
    }
}

/// Builds connection options for the system and course databases from [`Config`].
#[derive(Debug, Clone)]
pub struct PgConnector {
    database: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            database: config.database.clone(),
        }
    }

    pub fn database_name(&self, target: &Target) -> String {
        match target {
            Target::System => self.database.system_database.to_owned(),
            Target::Course(course) => format!(
                "{}_{}_{}",
                self.database.course_database_prefix, course.semester, course.course
            ),
        }
    }

    pub fn options(&self, target: &Target) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.database.host)
            .port(self.database.port)
            .username(&self.database.user)
            .database(&self.database_name(target));

        if self.database.password.is_empty() {
            options
        } else {
            options.password(&self.database.password)
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, target: &Target) -> Result<Box<dyn Database>, DatabaseError> {
        let database = PgDatabase::connect(&self.options(target)).await?;

        Ok(Box::new(database))
    }
}

/// Lists courses from the `courses` table of the system database.
#[derive(Debug, Clone)]
pub struct PgCourseSource {
    options: PgConnectOptions,
}

impl PgCourseSource {
    pub fn new(config: &Config) -> Self {
        Self {
            options: PgConnector::new(config).options(&Target::System),
        }
    }
}

#[async_trait]
impl CourseSource for PgCourseSource {
    async fn courses(&self) -> Result<Vec<Course>, DatabaseError> {
        let mut conn = self.options.connect().await?;

        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT term, course FROM courses ORDER BY term, course",
        )
        .fetch_all(&mut conn)
        .await;

        conn.close().await?;

        Ok(rows?
            .into_iter()
            .map(|(semester, course)| Course { semester, course })
            .collect())
    }
}
