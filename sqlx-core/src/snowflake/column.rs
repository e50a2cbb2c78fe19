use crate::column::Column;
use crate::snowflake::protocol::RowType;
use crate::snowflake::{Snowflake, SnowflakeType, SnowflakeTypeInfo};

/// A column of a result, as described by the `rowtype` of the response.
#[derive(Debug, Clone)]
pub struct SnowflakeColumn {
    pub(crate) ordinal: usize,
    pub(crate) name: String,
    pub(crate) type_info: SnowflakeTypeInfo,
}

impl SnowflakeColumn {
    pub(crate) fn from_row_type(ordinal: usize, row_type: &RowType) -> Self {
        Self {
            ordinal,
            name: row_type.name.clone(),
            type_info: SnowflakeTypeInfo {
                ty: SnowflakeType::from_name(&row_type.ty),
                precision: row_type.precision,
                scale: row_type.scale,
                length: row_type.length,
                nullable: row_type.nullable,
            },
        }
    }

    /// The key the column is found under by name: unquoted identifiers come
    /// back upper-cased, so names are compared without regard to case.
    pub(crate) fn lookup_key(name: &str) -> String {
        name.to_lowercase()
    }
}

impl crate::column::private_column::Sealed for SnowflakeColumn {}

impl Column for SnowflakeColumn {
    type Database = Snowflake;

    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_info(&self) -> &SnowflakeTypeInfo {
        &self.type_info
    }
}
