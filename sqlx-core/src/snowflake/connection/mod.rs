use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use futures_core::future::BoxFuture;

use crate::connection::{Connection, LogSettings};
use crate::error::Error;
use crate::snowflake::downloader::ChunkDownloader;
use crate::snowflake::session::Session;
use crate::snowflake::{Snowflake, SnowflakeConnectOptions};
use crate::transaction::Transaction;

mod establish;
mod execute;

/// A session with a Snowflake account.
///
/// Statements run one at a time on a connection; rows of a result are streamed
/// while further result chunks download in the background.
pub struct SnowflakeConnection {
    pub(crate) session: Session,
    pub(crate) downloader: ChunkDownloader,

    // numbers the statements sent on this session
    pub(crate) sequence_id: u64,

    pub(crate) transaction_depth: usize,

    // a transaction was dropped while open; ROLLBACK goes out before the next statement
    pub(crate) pending_rollback: bool,

    pub(crate) query_timeout: Option<Duration>,
    pub(crate) log_settings: LogSettings,
}

/// An alias for [`Transaction`], specialized for Snowflake.
pub type SnowflakeTransaction<'c> = Transaction<'c, Snowflake>;

impl Debug for SnowflakeConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConnection")
            .field("session", &self.session)
            .field("sequence_id", &self.sequence_id)
            .field("transaction_depth", &self.transaction_depth)
            .finish()
    }
}

impl Connection for SnowflakeConnection {
    type Database = Snowflake;

    type Options = SnowflakeConnectOptions;

    fn close(self) -> BoxFuture<'static, Result<(), Error>> {
        // the server rolls back whatever transaction the session still has open
        Box::pin(async move { self.session.logout().await })
    }

    fn ping(&mut self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(self.session.heartbeat())
    }

    fn begin(&mut self) -> BoxFuture<'_, Result<Transaction<'_, Self::Database>, Error>>
    where
        Self: Sized,
    {
        Transaction::begin(self)
    }
}
