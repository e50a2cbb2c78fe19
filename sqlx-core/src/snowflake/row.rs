use std::sync::Arc;

use crate::column::ColumnIndex;
use crate::error::Error;
use crate::row::Row;
use crate::snowflake::{Snowflake, SnowflakeColumn, SnowflakeValueRef};
use crate::HashMap;

/// Implementation of [`Row`] for Snowflake.
///
/// Cells are kept as the text received from the server and decoded on access.
pub struct SnowflakeRow {
    pub(crate) values: Vec<Option<String>>,
    pub(crate) columns: Arc<[SnowflakeColumn]>,
    pub(crate) column_names: Arc<HashMap<String, usize>>,
}

impl SnowflakeRow {
    /// The raw text of every cell, `None` for `NULL`.
    pub fn raw_values(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.values.iter().map(Option::as_deref)
    }
}

impl crate::row::private_row::Sealed for SnowflakeRow {}

impl Row for SnowflakeRow {
    type Database = Snowflake;

    fn columns(&self) -> &[SnowflakeColumn] {
        &self.columns
    }

    fn try_get_raw<I>(&self, index: I) -> Result<SnowflakeValueRef<'_>, Error>
    where
        I: ColumnIndex<Self>,
    {
        let index = index.index(self)?;
        let column = self
            .columns
            .get(index)
            .ok_or(Error::ColumnIndexOutOfBounds {
                index,
                len: self.columns.len(),
            })?;

        Ok(SnowflakeValueRef::new(
            &column.type_info,
            self.values.get(index).and_then(Option::as_deref),
        ))
    }

    fn len(&self) -> usize {
        self.columns.len()
    }
}

// names match without regard to case
impl ColumnIndex<SnowflakeRow> for &'_ str {
    fn index(&self, row: &SnowflakeRow) -> Result<usize, Error> {
        row.column_names
            .get(&SnowflakeColumn::lookup_key(self))
            .copied()
            .ok_or_else(|| Error::ColumnNotFound((*self).into()))
    }
}

impl std::fmt::Debug for SnowflakeRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();

        for (column, value) in self.columns.iter().zip(&self.values) {
            map.entry(&column.name, value);
        }

        map.finish()
    }
}
