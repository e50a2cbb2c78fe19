#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use sqlx_core::arguments::Arguments;
pub use sqlx_core::column::{Column, ColumnIndex};
pub use sqlx_core::connection::{ConnectOptions, Connection};
pub use sqlx_core::database::{self, Database};
pub use sqlx_core::decode::Decode;
pub use sqlx_core::encode::{Encode, IsNull};
pub use sqlx_core::error::{self, BoxDynError, DatabaseError, Error, ErrorKind, Result};
pub use sqlx_core::row::Row;
pub use sqlx_core::transaction::{Transaction, TransactionManager};
pub use sqlx_core::type_info::TypeInfo;
pub use sqlx_core::types::Type;
pub use sqlx_core::value::{Value, ValueRef};

#[doc(inline)]
pub use sqlx_core::types;

pub mod snowflake {
    #[doc(inline)]
    pub use sqlx_core::snowflake::*;
}

pub use sqlx_core::snowflake::{
    query, Snowflake, SnowflakeConnectOptions, SnowflakeConnection, SnowflakeQueryResult,
    SnowflakeRow,
};

#[doc(hidden)]
pub use sqlx_rt as rt;

/// Convenience re-export of common traits.
pub mod prelude {
    pub use super::ConnectOptions;
    pub use super::Connection;
    pub use super::Decode;
    pub use super::Encode;
    pub use super::Row;
    pub use super::Type;
}
