//! Core of the Snowflake driver for SQLx, the rust SQL toolkit.
//! Not intended to be used directly.
#![recursion_limit = "512"]
#![warn(future_incompatible, rust_2018_idioms)]
#![allow(
    clippy::needless_doctest_main,
    clippy::type_complexity,
    clippy::should_implement_trait,
    clippy::derivable_impls,
    clippy::module_inception,
    clippy::result_large_err,
    clippy::len_without_is_empty,
    clippy::wrong_self_convention
)]
//
// Allows an API be documented as only available in some specific platforms.
// <https://doc.rust-lang.org/unstable-book/language-features/doc-cfg.html>
#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "bigdecimal")]
extern crate bigdecimal_ as bigdecimal;

#[macro_use]
pub mod error;

#[macro_use]
pub mod column;

pub mod arguments;
pub mod connection;
pub mod database;
pub mod decode;
pub mod encode;
mod logger;
pub mod row;
pub mod transaction;
pub mod type_info;
pub mod types;
pub mod value;

pub mod snowflake;

/// sqlx uses ahash for increased performance, at the cost of reduced DoS resistance.
use ahash::AHashMap as HashMap;
