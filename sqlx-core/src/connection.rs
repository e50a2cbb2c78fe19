use std::str::FromStr;
use std::time::Duration;

use futures_core::future::BoxFuture;
use log::LevelFilter;

use crate::database::Database;
use crate::error::Error;
use crate::transaction::Transaction;

pub(crate) use crate::logger::LogSettings;

/// An open session with the database.
///
/// A connection runs one statement at a time. Results are streamed, so a
/// statement's rows may still be arriving when the next statement starts.
pub trait Connection: Send {
    type Database: Database;

    type Options: ConnectOptions<Connection = Self>;

    /// Ends the session on the server.
    ///
    /// Dropping a connection without closing it is safe, but leaves the
    /// session alive on the server until its token expires.
    fn close(self) -> BoxFuture<'static, Result<(), Error>>;

    /// Checks that the session is still accepted by the server.
    fn ping(&mut self) -> BoxFuture<'_, Result<(), Error>>;

    /// Opens a transaction.
    ///
    /// The returned [`Transaction`] rolls back when dropped without a call to
    /// [`commit`](Transaction::commit).
    fn begin(&mut self) -> BoxFuture<'_, Result<Transaction<'_, Self::Database>, Error>>
    where
        Self: Sized;

    /// Runs `callback` in a transaction, committing when it returns `Ok` and
    /// rolling back when it returns `Err`.
    ///
    /// ```rust
    /// use sqlx_snowflake_core::connection::Connection;
    /// use sqlx_snowflake_core::error::Error;
    /// use sqlx_snowflake_core::snowflake::{query, SnowflakeConnection, SnowflakeRow};
    ///
    /// # pub async fn _f(conn: &mut SnowflakeConnection) -> Result<Vec<SnowflakeRow>, Error> {
    /// conn.transaction(|tx| Box::pin(async move {
    ///     query("update stock set qty = qty - 1 where sku = ?")
    ///         .bind("A-1")
    ///         .execute(&mut **tx)
    ///         .await?;
    ///
    ///     query("select * from stock where sku = ?")
    ///         .bind("A-1")
    ///         .fetch_all(&mut **tx)
    ///         .await
    /// })).await
    /// # }
    /// ```
    fn transaction<'a, F, R, E>(&'a mut self, callback: F) -> BoxFuture<'a, Result<R, E>>
    where
        for<'c> F: FnOnce(&'c mut Transaction<'_, Self::Database>) -> BoxFuture<'c, Result<R, E>>
            + 'a
            + Send
            + Sync,
        Self: Sized,
        R: Send,
        E: From<Error> + Send,
    {
        Box::pin(async move {
            let mut tx = self.begin().await?;

            match callback(&mut tx).await {
                Ok(value) => {
                    tx.commit().await?;
                    Ok(value)
                }

                Err(error) => {
                    tx.rollback().await?;
                    Err(error)
                }
            }
        })
    }

    /// Parses `url` and connects with the options it describes.
    fn connect(url: &str) -> BoxFuture<'static, Result<Self, Error>>
    where
        Self: Sized,
        Self::Options: FromStr<Err = Error>,
    {
        let options = Self::Options::from_str(url);

        Box::pin(async move { options?.connect().await })
    }

    fn connect_with(options: &Self::Options) -> BoxFuture<'_, Result<Self, Error>>
    where
        Self: Sized,
    {
        options.connect()
    }
}

/// Everything needed to open a [`Connection`].
pub trait ConnectOptions: Sized + Send + Sync + 'static {
    type Connection: Connection;

    fn from_url(url: &str) -> Result<Self, Error>
    where
        Self: FromStr<Err = Error>,
    {
        url.parse()
    }

    /// Reads the connection URL from `DATABASE_URL`.
    ///
    /// Variables from a `.env` file in the working directory or one of its
    /// parents are loaded first; variables already set take precedence.
    fn from_env() -> Result<Self, Error>
    where
        Self: FromStr<Err = Error>,
    {
        if let Err(error) = dotenvy::dotenv() {
            if !error.not_found() {
                log::warn!("ignoring unreadable .env file: {}", error);
            }
        }

        std::env::var("DATABASE_URL")
            .map_err(|_| Error::Configuration("DATABASE_URL is not set".into()))?
            .parse()
    }

    fn connect(&self) -> BoxFuture<'_, Result<Self::Connection, Error>>;

    /// The level statements are logged at. `Info` by default.
    fn log_statements(&mut self, level: LevelFilter) -> &mut Self;

    /// The level statements running longer than `duration` are logged at.
    /// `Warn` after one second by default.
    fn log_slow_statements(&mut self, level: LevelFilter, duration: Duration) -> &mut Self;

    /// Stops logging statements altogether.
    fn disable_statement_logging(&mut self) -> &mut Self {
        self.log_statements(LevelFilter::Off)
            .log_slow_statements(LevelFilter::Off, Duration::default())
    }
}
