use std::borrow::Cow;
use std::sync::Arc;

use crate::column::ColumnIndex;
use crate::error::Error;
use crate::snowflake::query::{query_statement, SnowflakeQuery};
use crate::snowflake::SnowflakeColumn;
use crate::HashMap;

/// A statement described by the server without being executed.
///
/// Created by [`SnowflakeConnection::prepare`](crate::snowflake::SnowflakeConnection::prepare).
#[derive(Debug, Clone)]
pub struct SnowflakeStatement<'q> {
    pub(crate) sql: Cow<'q, str>,
    pub(crate) columns: Arc<[SnowflakeColumn]>,
    pub(crate) column_names: Arc<HashMap<String, usize>>,
    pub(crate) parameters: usize,
}

impl<'q> SnowflakeStatement<'q> {
    pub fn to_owned(&self) -> SnowflakeStatement<'static> {
        SnowflakeStatement {
            sql: Cow::Owned(self.sql.clone().into_owned()),
            columns: Arc::clone(&self.columns),
            column_names: Arc::clone(&self.column_names),
            parameters: self.parameters,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The number of bind parameters the statement expects.
    pub fn parameters(&self) -> usize {
        self.parameters
    }

    pub fn columns(&self) -> &[SnowflakeColumn] {
        &self.columns
    }

    pub fn column<I>(&self, index: I) -> Result<&SnowflakeColumn, Error>
    where
        I: ColumnIndex<Self>,
    {
        Ok(&self.columns[index.index(self)?])
    }

    /// Builds a query running this statement.
    pub fn query(&self) -> SnowflakeQuery<'_> {
        query_statement(self)
    }
}

impl ColumnIndex<SnowflakeStatement<'_>> for &'_ str {
    fn index(&self, statement: &SnowflakeStatement<'_>) -> Result<usize, Error> {
        statement
            .column_names
            .get(&SnowflakeColumn::lookup_key(self))
            .copied()
            .ok_or_else(|| Error::ColumnNotFound((*self).into()))
    }
}
