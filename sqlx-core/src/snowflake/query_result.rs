/// The outcome of a statement that was run with `execute`.
#[derive(Debug, Default)]
pub struct SnowflakeQueryResult {
    pub(super) rows_affected: u64,
    pub(super) query_id: Option<String>,
}

impl SnowflakeQueryResult {
    /// The number of rows inserted, updated, deleted or merged.
    ///
    /// Zero for statements that are not DML.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Snowflake does not report generated keys, so this is always `None`.
    pub fn last_insert_id(&self) -> Option<i64> {
        None
    }

    /// The id the server assigned to the statement.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }
}

impl Extend<SnowflakeQueryResult> for SnowflakeQueryResult {
    fn extend<T: IntoIterator<Item = SnowflakeQueryResult>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;

            if elem.query_id.is_some() {
                self.query_id = elem.query_id;
            }
        }
    }
}
