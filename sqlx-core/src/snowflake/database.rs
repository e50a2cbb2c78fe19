use crate::database::{Database, HasArguments, HasValueRef};
use crate::snowflake::arguments::SnowflakeArgumentBuffer;
use crate::snowflake::value::{SnowflakeValue, SnowflakeValueRef};
use crate::snowflake::{
    SnowflakeArguments, SnowflakeColumn, SnowflakeConnection, SnowflakeQueryResult, SnowflakeRow,
    SnowflakeTransactionManager, SnowflakeTypeInfo,
};

/// The Snowflake driver.
///
/// Ties the connection, row, value and argument types of the driver
/// together. Values travel as text in both directions: results are decoded
/// from the JSON result format and bind parameters are sent as typed text.
#[derive(Debug)]
pub struct Snowflake;

impl Database for Snowflake {
    type Connection = SnowflakeConnection;

    type TransactionManager = SnowflakeTransactionManager;

    type Row = SnowflakeRow;

    type QueryResult = SnowflakeQueryResult;

    type Column = SnowflakeColumn;

    type TypeInfo = SnowflakeTypeInfo;

    type Value = SnowflakeValue;

    const NAME: &'static str = "Snowflake";

    const URL_SCHEMES: &'static [&'static str] = &["snowflake"];
}

impl<'r> HasValueRef<'r> for Snowflake {
    type Database = Snowflake;

    type ValueRef = SnowflakeValueRef<'r>;
}

impl HasArguments<'_> for Snowflake {
    type Database = Snowflake;

    type Arguments = SnowflakeArguments;

    type ArgumentBuffer = SnowflakeArgumentBuffer;
}
