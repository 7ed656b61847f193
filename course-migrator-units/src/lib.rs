//! Schema migrations of the course-management databases.
//!
//! Every migration is compiled in and registered by [`new`]. Names follow
//! `<YYYYMMDDHHMMSS>_<slug>`; the timestamp decides execution order.
//!
//! ```rust,ignore
//! let registry = course_migrator_units::new()?;
//! let runner = Runner::new(registry, PgConnector::new(&config), PgCourseSource::new(&config), config);
//! runner.run_all(&RunOptions::new(Plan::apply_all())).await?;
//! ```
//!
//! # Migrations
//!
//! - [`LectureChat`] - Creates the `chatrooms` and `chatroom_messages` tables of a course

use course_migrator::{MigrateError, Registry};

mod m20240209021641_lecture_chat;
mod schema;

pub use m20240209021641_lecture_chat::LectureChat;

pub fn new() -> Result<Registry, MigrateError> {
    let mut registry = Registry::default();
    registry.add(Box::new(LectureChat))?;

    Ok(registry)
}
