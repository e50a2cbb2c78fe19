use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};

use crate::error::{DatabaseError, ErrorKind};

/// An error returned by Snowflake for a statement or session request.
pub struct SnowflakeDatabaseError {
    pub(crate) number: i32,
    pub(crate) code: String,
    pub(crate) message: String,
    pub(crate) sql_state: Option<String>,
    pub(crate) query_id: Option<String>,
}

impl SnowflakeDatabaseError {
    pub(crate) fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();

        Self {
            // "000900" and 900 name the same error
            number: code.trim().parse().unwrap_or(-1),
            code,
            message: message.into(),
            sql_state: None,
            query_id: None,
        }
    }

    pub(crate) fn with_sql_state(mut self, sql_state: Option<String>) -> Self {
        self.sql_state = sql_state;
        self
    }

    pub(crate) fn with_query_id(mut self, query_id: Option<String>) -> Self {
        self.query_id = query_id;
        self
    }

    /// The numeric error code, `-1` when the server sent none.
    pub fn number(&self) -> i32 {
        self.number
    }

    /// The error code exactly as the server sent it, e.g. `002003`.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The five character ANSI SQLSTATE, when known.
    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    /// The id of the query that failed, when the server assigned one.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }
}

impl Debug for SnowflakeDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeDatabaseError")
            .field("number", &self.number)
            .field("sql_state", &self.sql_state)
            .field("message", &self.message)
            .field("query_id", &self.query_id)
            .finish()
    }
}

impl Display for SnowflakeDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.sql_state {
            Some(state) => write!(f, "{} ({}): {}", self.code, state, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl StdError for SnowflakeDatabaseError {}

impl DatabaseError for SnowflakeDatabaseError {
    #[inline]
    fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.code))
    }

    #[doc(hidden)]
    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    #[doc(hidden)]
    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    #[doc(hidden)]
    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        // Snowflake only enforces NOT NULL on standard tables; the other
        // constraints are reported by hybrid tables
        match self.sql_state.as_deref() {
            Some("23505") => ErrorKind::UniqueViolation,
            Some("23503") => ErrorKind::ForeignKeyViolation,
            Some("23502") => ErrorKind::NotNullViolation,
            Some("23514") => ErrorKind::CheckViolation,
            _ if self.number == 100_072 => ErrorKind::NotNullViolation,
            _ => ErrorKind::Other,
        }
    }
}
