use std::borrow::Cow;
use std::time::Duration;

use futures_core::stream::BoxStream;
use futures_util::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::arguments::Arguments;
use crate::encode::Encode;
use crate::error::{BoxDynError, Error};
use crate::snowflake::cancel::Cancellation;
use crate::snowflake::{
    Snowflake, SnowflakeArguments, SnowflakeConnection, SnowflakeQueryResult, SnowflakeRow,
    SnowflakeRowStream, SnowflakeStatement,
};
use crate::types::Type;

/// A single SQL statement with its bind parameters, ready to run on a
/// [`SnowflakeConnection`].
#[must_use = "query must be executed to affect database"]
pub struct SnowflakeQuery<'q> {
    sql: Cow<'q, str>,
    arguments: SnowflakeArguments,
    // the first bind that failed to encode; reported when the query runs
    error: Option<BoxDynError>,
    timeout: Option<Duration>,
    token: Option<CancellationToken>,
}

/// Make a SQL query. Bind parameters are written `?` or `:1`, `:2`, ...
pub fn query(sql: &str) -> SnowflakeQuery<'_> {
    SnowflakeQuery::new(Cow::Borrowed(sql))
}

pub(crate) fn query_statement<'q>(statement: &'q SnowflakeStatement<'_>) -> SnowflakeQuery<'q> {
    SnowflakeQuery::new(Cow::Borrowed(statement.sql()))
}

impl<'q> SnowflakeQuery<'q> {
    fn new(sql: Cow<'q, str>) -> Self {
        Self {
            sql,
            arguments: SnowflakeArguments::default(),
            error: None,
            timeout: None,
            token: None,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind a value for use with this SQL query.
    ///
    /// Parameters are numbered in the order they are bound, starting at 1.
    pub fn bind<T>(mut self, value: T) -> Self
    where
        T: 'q + Encode<'q, Snowflake> + Type<Snowflake>,
    {
        if self.error.is_none() {
            if let Err(error) = self.arguments.add(value) {
                self.error = Some(error);
            }
        }

        self
    }

    /// Fails the query with [`Error::TimedOut`] if it has not completed
    /// within `timeout`. Overrides the connection's `query_timeout`.
    ///
    /// For `fetch` the deadline also covers reading the rows.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fails the query with [`Error::Cancelled`] once `token` is cancelled.
    ///
    /// A statement still running on the server is aborted.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    fn prepare(self, conn: &SnowflakeConnection) -> Result<Prepared<'q>, Error> {
        if let Some(error) = self.error {
            return Err(Error::Encode(error));
        }

        let mut cancellation = match self.token {
            Some(token) => Cancellation::from_token(token),
            None => Cancellation::new(),
        };

        if let Some(timeout) = self.timeout.or(conn.query_timeout) {
            cancellation = cancellation.with_timeout(timeout);
        }

        let arguments = if self.arguments.is_empty() {
            None
        } else {
            Some(self.arguments)
        };

        Ok(Prepared {
            sql: self.sql,
            arguments,
            cancellation,
        })
    }

    /// Runs the statement and returns what it changed.
    ///
    /// Rows the statement returns are not read.
    pub async fn execute(
        self,
        conn: &mut SnowflakeConnection,
    ) -> Result<SnowflakeQueryResult, Error> {
        let prepared = self.prepare(conn)?;

        conn.execute_query(
            &prepared.sql,
            prepared.arguments.as_ref(),
            &prepared.cancellation,
        )
        .await
    }

    /// Runs the statement and returns a stream of its rows.
    ///
    /// The stream does not borrow the connection. Remote result chunks are
    /// downloaded in the background while it is read; dropping the stream
    /// stops the downloads.
    pub async fn fetch_stream(
        self,
        conn: &mut SnowflakeConnection,
    ) -> Result<SnowflakeRowStream, Error> {
        let prepared = self.prepare(conn)?;

        conn.fetch_query(
            &prepared.sql,
            prepared.arguments.as_ref(),
            &prepared.cancellation,
        )
        .await
    }

    /// Runs the statement when first polled and streams its rows.
    pub fn fetch<'c>(
        self,
        conn: &'c mut SnowflakeConnection,
    ) -> BoxStream<'c, Result<SnowflakeRow, Error>>
    where
        'q: 'c,
    {
        stream::once(self.fetch_stream(conn))
            .try_flatten()
            .boxed()
    }

    pub async fn fetch_all(
        self,
        conn: &mut SnowflakeConnection,
    ) -> Result<Vec<SnowflakeRow>, Error> {
        self.fetch_stream(conn).await?.try_collect().await
    }

    /// The first row of the result. The rest of the result is discarded.
    pub async fn fetch_optional(
        self,
        conn: &mut SnowflakeConnection,
    ) -> Result<Option<SnowflakeRow>, Error> {
        let mut rows = self.fetch_stream(conn).await?;

        rows.try_next().await
    }

    /// Like [`fetch_optional`](Self::fetch_optional), failing with
    /// [`Error::RowNotFound`] when there is no row.
    pub async fn fetch_one(self, conn: &mut SnowflakeConnection) -> Result<SnowflakeRow, Error> {
        self.fetch_optional(conn)
            .await?
            .ok_or(Error::RowNotFound)
    }
}

struct Prepared<'q> {
    sql: Cow<'q, str>,
    arguments: Option<SnowflakeArguments>,
    cancellation: Cancellation,
}

impl std::fmt::Debug for SnowflakeQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeQuery")
            .field("sql", &self.sql)
            .field("arguments", &self.arguments.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
