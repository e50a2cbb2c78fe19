use futures_core::future::BoxFuture;

use crate::error::Error;
use crate::snowflake::{Snowflake, SnowflakeConnection};
use crate::transaction::TransactionManager;

/// Implementation of [`TransactionManager`] for Snowflake.
pub struct SnowflakeTransactionManager;

impl TransactionManager for SnowflakeTransactionManager {
    type Database = Snowflake;

    fn begin(conn: &mut SnowflakeConnection) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            if conn.transaction_depth > 0 {
                return Err(Error::Unsupported(
                    "nested transactions; Snowflake has no savepoints".into(),
                ));
            }

            conn.run_control("BEGIN").await?;
            conn.transaction_depth += 1;

            Ok(())
        })
    }

    fn commit(conn: &mut SnowflakeConnection) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            if conn.transaction_depth > 0 {
                conn.run_control("COMMIT").await?;
                conn.transaction_depth -= 1;
            }

            Ok(())
        })
    }

    fn rollback(conn: &mut SnowflakeConnection) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            if conn.transaction_depth > 0 {
                conn.run_control("ROLLBACK").await?;
                conn.transaction_depth -= 1;
            }

            Ok(())
        })
    }

    fn start_rollback(conn: &mut SnowflakeConnection) {
        if conn.transaction_depth > 0 {
            conn.pending_rollback = true;
            conn.transaction_depth -= 1;
        }
    }
}
