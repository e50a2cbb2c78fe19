use crate::type_info::TypeInfo;
use std::fmt::{self, Display};

/// Type information for Snowflake.
///
/// Besides the type family this carries the column modifiers reported in the
/// result metadata. The `scale` of temporal types is the number of fractional
/// second digits the column keeps.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SnowflakeTypeInfo {
    pub(crate) ty: SnowflakeType,
    pub(crate) precision: Option<u32>,
    pub(crate) scale: Option<u32>,
    pub(crate) length: Option<u64>,
    pub(crate) nullable: Option<bool>,
}

/// The Snowflake data types.
///
/// SQL aliases (`INT`, `VARCHAR`, `DATETIME`, ...) collapse onto the type family the
/// server reports in result metadata. Anything else ends up in [`Unknown`](Self::Unknown).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SnowflakeType {
    // NUMBER, DECIMAL, INT and friends
    Fixed,
    // FLOAT, DOUBLE, REAL and friends
    Real,
    Text,
    Binary,
    Boolean,
    Date,
    Time,
    TimestampNtz,
    TimestampLtz,
    TimestampTz,
    Variant,
    Object,
    Array,
    Geography,
    Geometry,
    Unknown(String),
}

impl SnowflakeTypeInfo {
    pub fn new(ty: SnowflakeType) -> Self {
        Self {
            ty,
            precision: None,
            scale: None,
            length: None,
            nullable: None,
        }
    }

    pub(crate) fn with_precision_scale(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub(crate) fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn r#type(&self) -> &SnowflakeType {
        &self.ty
    }

    pub fn name(&self) -> &str {
        self.ty.name()
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn nullable(&self) -> Option<bool> {
        self.nullable
    }

    /// The type name used for bind parameters of this type.
    ///
    /// Temporal and semi-structured values travel as text literals which the
    /// server casts to the target column type.
    pub(crate) fn binding_type(&self) -> &'static str {
        match self.ty {
            SnowflakeType::Fixed => "FIXED",
            SnowflakeType::Real => "REAL",
            SnowflakeType::Boolean => "BOOLEAN",
            SnowflakeType::Binary => "BINARY",
            _ => "TEXT",
        }
    }

    /// Fractional second digits honoured when decoding a temporal value.
    pub(crate) fn fraction_digits(&self) -> u32 {
        self.scale.unwrap_or(9).min(9)
    }
}

impl Display for SnowflakeTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ty, self.precision, self.scale) {
            (SnowflakeType::Fixed, Some(precision), Some(scale)) => {
                write!(f, "NUMBER({},{})", precision, scale)
            }
            (SnowflakeType::Time, _, Some(scale))
            | (SnowflakeType::TimestampNtz, _, Some(scale))
            | (SnowflakeType::TimestampLtz, _, Some(scale))
            | (SnowflakeType::TimestampTz, _, Some(scale)) => {
                write!(f, "{}({})", self.name(), scale)
            }
            _ => f.write_str(self.name()),
        }
    }
}

impl TypeInfo for SnowflakeTypeInfo {
    fn is_null(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        self.ty.name()
    }

    fn type_compatible(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl SnowflakeType {
    pub fn name(&self) -> &str {
        match self {
            SnowflakeType::Fixed => "NUMBER",
            SnowflakeType::Real => "FLOAT",
            SnowflakeType::Text => "VARCHAR",
            SnowflakeType::Binary => "BINARY",
            SnowflakeType::Boolean => "BOOLEAN",
            SnowflakeType::Date => "DATE",
            SnowflakeType::Time => "TIME",
            SnowflakeType::TimestampNtz => "TIMESTAMP_NTZ",
            SnowflakeType::TimestampLtz => "TIMESTAMP_LTZ",
            SnowflakeType::TimestampTz => "TIMESTAMP_TZ",
            SnowflakeType::Variant => "VARIANT",
            SnowflakeType::Object => "OBJECT",
            SnowflakeType::Array => "ARRAY",
            SnowflakeType::Geography => "GEOGRAPHY",
            SnowflakeType::Geometry => "GEOMETRY",
            SnowflakeType::Unknown(name) => name,
        }
    }

    /// Resolves a SQL type name, as written in DDL or reported in result metadata.
    ///
    /// Modifiers such as `(38,0)` are ignored.
    pub fn from_name(name: &str) -> Self {
        let base = name.split('(').next().unwrap_or(name).trim();

        match base.to_uppercase().as_str() {
            "FIXED" | "NUMBER" | "DECIMAL" | "NUMERIC" | "INT" | "INTEGER" | "BIGINT"
            | "SMALLINT" | "TINYINT" | "BYTEINT" => SnowflakeType::Fixed,
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => {
                SnowflakeType::Real
            }
            "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER" | "STRING" => SnowflakeType::Text,
            "BINARY" | "VARBINARY" => SnowflakeType::Binary,
            "BOOLEAN" => SnowflakeType::Boolean,
            "DATE" => SnowflakeType::Date,
            "TIME" => SnowflakeType::Time,
            "TIMESTAMP_NTZ" | "TIMESTAMP" | "DATETIME" => SnowflakeType::TimestampNtz,
            "TIMESTAMP_LTZ" => SnowflakeType::TimestampLtz,
            "TIMESTAMP_TZ" => SnowflakeType::TimestampTz,
            "VARIANT" => SnowflakeType::Variant,
            "OBJECT" => SnowflakeType::Object,
            "ARRAY" => SnowflakeType::Array,
            "GEOGRAPHY" => SnowflakeType::Geography,
            "GEOMETRY" => SnowflakeType::Geometry,
            other => SnowflakeType::Unknown(other.to_owned()),
        }
    }

    pub(crate) fn is_temporal(&self) -> bool {
        matches!(
            self,
            SnowflakeType::Date
                | SnowflakeType::Time
                | SnowflakeType::TimestampNtz
                | SnowflakeType::TimestampLtz
                | SnowflakeType::TimestampTz
        )
    }

    pub(crate) fn is_semi_structured(&self) -> bool {
        matches!(
            self,
            SnowflakeType::Variant | SnowflakeType::Object | SnowflakeType::Array
        )
    }
}
