use async_trait::async_trait;
use parse_display::Display;
use serde::{Deserialize, Serialize};

use crate::{DatabaseError, Scope};

/// One offering of a course in a given semester, backed by its own database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{semester}/{course}")]
pub struct Course {
    pub semester: String,
    pub course: String,
}

impl Course {
    pub fn new(semester: impl Into<String>, course: impl Into<String>) -> Self {
        Self {
            semester: semester.into(),
            course: course.into(),
        }
    }
}

/// A physical database migrations are applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Target {
    #[display("system")]
    System,
    #[display("course {0}")]
    Course(Course),
}

impl Target {
    pub fn course(semester: impl Into<String>, course: impl Into<String>) -> Self {
        Target::Course(Course::new(semester, course))
    }

    pub fn scope(&self) -> Scope {
        match self {
            Target::System => Scope::System,
            Target::Course(_) => Scope::Course,
        }
    }

    pub fn semester(&self) -> Option<&str> {
        match self {
            Target::System => None,
            Target::Course(course) => Some(&course.semester),
        }
    }

    pub fn course_name(&self) -> Option<&str> {
        match self {
            Target::System => None,
            Target::Course(course) => Some(&course.course),
        }
    }
}

/// Lists the courses the runner fans out over.
#[async_trait]
pub trait CourseSource: Send + Sync {
    async fn courses(&self) -> Result<Vec<Course>, DatabaseError>;
}

#[async_trait]
impl CourseSource for Vec<Course> {
    async fn courses(&self) -> Result<Vec<Course>, DatabaseError> {
        Ok(self.clone())
    }
}
