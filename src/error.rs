use thiserror::Error;

/// Errors that reject a scheduling or inspection request before any work is done.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("malformed timeslot '{id}': {reason}")]
    MalformedTimeslot { id: String, reason: String },
    #[error("timeslot '{0}' is declared more than once")]
    DuplicateTimeslot(String),
    #[error("section '{0}' is declared more than once")]
    DuplicateSection(String),
    #[error("section '{section}' references unknown timeslot '{timeslot}'")]
    UnknownTimeslot { section: String, timeslot: String },
    #[error("unknown section '{0}'")]
    UnknownSection(String),
    #[error("invalid course identifier '{0}'")]
    InvalidCourse(String),
    #[error("invalid room identifier '{0}'")]
    InvalidRoom(String),
    #[error("cannot derive a course from section name '{0}'")]
    InvalidSectionName(String),
}

impl ScheduleError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        ScheduleError::MalformedTimeslot {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Startup configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid bind address '{value}': {source}")]
    BindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}
