//! Conversions between Rust and **Snowflake** types.
//!
//! # Types
//!
//! | Rust type                             | Snowflake type(s)                                    |
//! |---------------------------------------|------------------------------------------------------|
//! | `bool`                                | BOOLEAN                                              |
//! | `i8`, `i16`, `i32`, `i64`             | NUMBER(p, 0), INT, BIGINT, SMALLINT, ...             |
//! | `u8`, `u16`, `u32`, `u64`             | NUMBER(p, 0), INT, BIGINT, SMALLINT, ...             |
//! | `f32`, `f64`                          | FLOAT, DOUBLE, REAL                                  |
//! | `&str`, [`String`]                    | VARCHAR, CHAR, STRING, TEXT                          |
//! | `&[u8]`, `Vec<u8>`                    | BINARY, VARBINARY                                    |
//!
//! Integers decode from `NUMBER` columns with a scale of zero only; a value outside the range
//! of the target type is an error, never a truncation.
//!
//! ### [`chrono`](https://crates.io/crates/chrono)
//!
//! | Rust type                             | Snowflake type(s)                                    |
//! |---------------------------------------|------------------------------------------------------|
//! | `chrono::NaiveDate`                   | DATE                                                 |
//! | `chrono::NaiveTime`                   | TIME                                                 |
//! | `chrono::NaiveDateTime`               | TIMESTAMP_NTZ, DATETIME                              |
//! | `chrono::DateTime<Utc>`               | TIMESTAMP_LTZ, TIMESTAMP_TZ                          |
//! | `chrono::DateTime<Local>`             | TIMESTAMP_LTZ, TIMESTAMP_TZ                          |
//! | `chrono::DateTime<FixedOffset>`       | TIMESTAMP_TZ, TIMESTAMP_LTZ                          |
//!
//! Temporal values decode to the precision of the column: a `TIMESTAMP_NTZ(3)` never yields
//! more than millisecond precision. They are bound as text literals which the server casts to
//! the target column type.
//!
//! ### [`bigdecimal`](https://crates.io/crates/bigdecimal)
//! Requires the `bigdecimal` Cargo feature flag.
//!
//! | Rust type                             | Snowflake type(s)                                    |
//! |---------------------------------------|------------------------------------------------------|
//! | `bigdecimal::BigDecimal`              | NUMBER(p, s), DECIMAL, NUMERIC                       |
//!
//! ### [`uuid`](https://crates.io/crates/uuid)
//!
//! | Rust type                             | Snowflake type(s)                                    |
//! |---------------------------------------|------------------------------------------------------|
//! | `uuid::Uuid`                          | VARCHAR                                              |
//!
//! ### [`json`](https://crates.io/crates/serde_json)
//!
//! | Rust type                             | Snowflake type(s)                                    |
//! |---------------------------------------|------------------------------------------------------|
//! | [`Json<T>`]                           | VARIANT, OBJECT, ARRAY                               |
//! | `serde_json::Value`                   | VARIANT, OBJECT, ARRAY                               |
//!
//! # Nullable
//!
//! In addition, `Option<T>` is supported where `T` implements `Type`. An `Option<T>` represents
//! a potentially `NULL` value from Snowflake.
//!
//! [`Json<T>`]: crate::types::Json

mod bool;
mod bytes;
mod chrono;
mod float;
mod int;
mod json;
mod str;
mod uuid;

#[cfg(feature = "bigdecimal")]
mod bigdecimal;
