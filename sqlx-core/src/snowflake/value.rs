use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{BoxDynError, UnexpectedNullError};
use crate::snowflake::codec;
use crate::snowflake::{Snowflake, SnowflakeType, SnowflakeTypeInfo};
use crate::value::{Value, ValueRef};

/// An owned value from Snowflake.
#[derive(Debug, Clone)]
pub struct SnowflakeValue {
    pub(crate) type_info: SnowflakeTypeInfo,
    pub(crate) value: Option<String>,
}

/// A borrowed value from Snowflake.
///
/// Cells arrive as text; decoding happens on access.
#[derive(Debug, Clone, Copy)]
pub struct SnowflakeValueRef<'r> {
    pub(crate) type_info: &'r SnowflakeTypeInfo,
    pub(crate) value: Option<&'r str>,
}

/// A cell decoded according to its column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SnowflakeCell {
    Null,
    Boolean(bool),
    Integer(i64),
    /// A `NUMBER` with a scale, or one beyond the range of `i64`, as received.
    Decimal(String),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    TimestampNtz(NaiveDateTime),
    TimestampLtz(DateTime<Utc>),
    TimestampTz(DateTime<FixedOffset>),
    Variant(serde_json::Value),
}

impl SnowflakeValue {
    pub(crate) fn new(type_info: SnowflakeTypeInfo, value: Option<String>) -> Self {
        Self { type_info, value }
    }
}

impl<'r> SnowflakeValueRef<'r> {
    pub(crate) fn new(type_info: &'r SnowflakeTypeInfo, value: Option<&'r str>) -> Self {
        Self { type_info, value }
    }

    /// The raw text of the cell, or an error for `NULL`.
    pub(crate) fn as_str(&self) -> Result<&'r str, BoxDynError> {
        self.value.ok_or_else(|| UnexpectedNullError.into())
    }

    pub(crate) fn fraction_digits(&self) -> u32 {
        self.type_info.fraction_digits()
    }

    /// Decodes the cell according to the type of its column.
    pub fn decode_cell(&self) -> Result<SnowflakeCell, BoxDynError> {
        let raw = match self.value {
            Some(raw) => raw,
            None => return Ok(SnowflakeCell::Null),
        };

        let digits = self.fraction_digits();

        Ok(match &self.type_info.ty {
            SnowflakeType::Fixed => {
                if self.type_info.scale.unwrap_or(0) == 0 {
                    match raw.parse::<i64>() {
                        Ok(value) => SnowflakeCell::Integer(value),
                        Err(_) => SnowflakeCell::Decimal(raw.to_owned()),
                    }
                } else {
                    SnowflakeCell::Decimal(raw.to_owned())
                }
            }

            SnowflakeType::Real => SnowflakeCell::Float(raw.parse()?),
            SnowflakeType::Text => SnowflakeCell::Text(raw.to_owned()),
            SnowflakeType::Binary => SnowflakeCell::Binary(codec::decode_binary(raw)?),
            SnowflakeType::Boolean => SnowflakeCell::Boolean(codec::decode_bool(raw)?),
            SnowflakeType::Date => SnowflakeCell::Date(codec::decode_date(raw)?),
            SnowflakeType::Time => SnowflakeCell::Time(codec::decode_time(raw, digits)?),

            SnowflakeType::TimestampNtz => {
                SnowflakeCell::TimestampNtz(codec::decode_timestamp_ntz(raw, digits)?)
            }

            SnowflakeType::TimestampLtz => {
                SnowflakeCell::TimestampLtz(codec::decode_timestamp_ltz(raw, digits)?)
            }

            SnowflakeType::TimestampTz => {
                SnowflakeCell::TimestampTz(codec::decode_timestamp_tz(raw, digits)?)
            }

            SnowflakeType::Variant | SnowflakeType::Object | SnowflakeType::Array => {
                SnowflakeCell::Variant(serde_json::from_str(raw)?)
            }

            // GeoJSON by default, WKT or WKB when the session says so
            SnowflakeType::Geography | SnowflakeType::Geometry => {
                match serde_json::from_str(raw) {
                    Ok(value) => SnowflakeCell::Variant(value),
                    Err(_) => SnowflakeCell::Text(raw.to_owned()),
                }
            }

            SnowflakeType::Unknown(name) => {
                return Err(format!(
                    "cannot decode value {:?} of unsupported column type {}",
                    raw, name
                )
                .into());
            }
        })
    }
}

impl Value for SnowflakeValue {
    type Database = Snowflake;

    fn as_ref(&self) -> SnowflakeValueRef<'_> {
        SnowflakeValueRef {
            type_info: &self.type_info,
            value: self.value.as_deref(),
        }
    }

    fn type_info(&self) -> Cow<'_, SnowflakeTypeInfo> {
        Cow::Borrowed(&self.type_info)
    }

    fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

impl<'r> ValueRef<'r> for SnowflakeValueRef<'r> {
    type Database = Snowflake;

    fn to_owned(&self) -> SnowflakeValue {
        SnowflakeValue {
            type_info: self.type_info.clone(),
            value: self.value.map(str::to_owned),
        }
    }

    fn type_info(&self) -> Cow<'_, SnowflakeTypeInfo> {
        Cow::Borrowed(self.type_info)
    }

    fn is_null(&self) -> bool {
        self.value.is_none()
    }
}
