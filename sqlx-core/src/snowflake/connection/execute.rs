use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::error::Error;
use crate::logger::QueryLogger;
use crate::snowflake::cancel::Cancellation;
use crate::snowflake::downloader::{
    chunk_headers, ChunkDescriptor, ChunkSource, RawRow, ResultMetadata, SnowflakeRowStream,
};
use crate::snowflake::http::HttpRequest;
use crate::snowflake::protocol::{
    self, code, AbortRequest, Envelope, QueryRequest, QueryResponseData,
};
use crate::snowflake::{
    SnowflakeArguments, SnowflakeColumn, SnowflakeConnection, SnowflakeDatabaseError,
    SnowflakeQueryResult, SnowflakeStatement,
};
use crate::HashMap;

const POLL_INITIAL_DELAY: Duration = Duration::from_millis(50);
const POLL_MAX_DELAY: Duration = Duration::from_secs(5);

// an abort is a courtesy to the server; don't hold the caller up for long
const ABORT_TIMEOUT: Duration = Duration::from_secs(5);

/// A completed statement, before any remote chunk is fetched.
pub(crate) struct Completed {
    pub(crate) metadata: ResultMetadata,
    pub(crate) rows: Vec<RawRow>,
    pub(crate) rows_affected: u64,
    pub(crate) parameters: usize,
}

impl SnowflakeConnection {
    /// Submits a statement and waits for it to complete.
    pub(crate) async fn run(
        &mut self,
        sql: &str,
        arguments: Option<&SnowflakeArguments>,
        describe_only: bool,
        cancellation: &Cancellation,
    ) -> Result<Completed, Error> {
        if self.pending_rollback {
            self.submit("ROLLBACK", None, false, &Cancellation::new())
                .await?;

            self.pending_rollback = false;
        }

        let data = self
            .submit(sql, arguments, describe_only, cancellation)
            .await?;

        completed(data, describe_only)
    }

    /// Runs a statement that returns nothing of interest, such as `COMMIT`.
    pub(crate) async fn run_control(&mut self, sql: &str) -> Result<(), Error> {
        let mut logger = QueryLogger::new(sql, self.log_settings.clone());
        let completed = self.run(sql, None, false, &Cancellation::new()).await?;

        logger.set_query_id(completed.metadata.query_id.as_deref());

        Ok(())
    }

    pub(crate) async fn execute_query(
        &mut self,
        sql: &str,
        arguments: Option<&SnowflakeArguments>,
        cancellation: &Cancellation,
    ) -> Result<SnowflakeQueryResult, Error> {
        let mut logger = QueryLogger::new(sql, self.log_settings.clone());
        let completed = self.run(sql, arguments, false, cancellation).await?;

        logger.set_query_id(completed.metadata.query_id.as_deref());
        logger.increase_rows_affected(completed.rows_affected);

        Ok(SnowflakeQueryResult {
            rows_affected: completed.rows_affected,
            query_id: completed.metadata.query_id,
        })
    }

    pub(crate) async fn fetch_query(
        &mut self,
        sql: &str,
        arguments: Option<&SnowflakeArguments>,
        cancellation: &Cancellation,
    ) -> Result<SnowflakeRowStream, Error> {
        let mut logger = QueryLogger::new(sql, self.log_settings.clone());
        let completed = self.run(sql, arguments, false, cancellation).await?;

        logger.set_query_id(completed.metadata.query_id.as_deref());
        logger.increase_rows_returned(
            completed
                .metadata
                .total
                .unwrap_or(completed.rows.len() as u64),
        );

        Ok(self
            .downloader
            .stream(completed.metadata, completed.rows, cancellation))
    }

    /// Describes a statement without running it.
    pub async fn prepare<'q>(&mut self, sql: &'q str) -> Result<SnowflakeStatement<'q>, Error> {
        let completed = self.run(sql, None, true, &Cancellation::new()).await?;

        Ok(SnowflakeStatement {
            sql: Cow::Borrowed(sql),
            columns: completed.metadata.columns,
            column_names: completed.metadata.column_names,
            parameters: completed.parameters,
        })
    }

    async fn submit(
        &mut self,
        sql: &str,
        arguments: Option<&SnowflakeArguments>,
        describe_only: bool,
        cancellation: &Cancellation,
    ) -> Result<QueryResponseData, Error> {
        cancellation.check()?;

        self.sequence_id += 1;

        // every retry of this submission carries the same request id
        let request_id = Uuid::new_v4().to_string();

        let body = QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id: self.sequence_id,
            is_internal: false,
            describe_only,
            bindings: arguments.and_then(SnowflakeArguments::to_wire),
            parameters: IndexMap::new(),
        };

        let request = HttpRequest::post(
            self.session
                .url(protocol::QUERY_PATH, &[("requestId", request_id.as_str())])?,
        )
        .json(&body)?;

        let envelope = match self.complete(request, cancellation).await {
            Ok(envelope) => envelope,

            Err(error @ (Error::Cancelled | Error::TimedOut(_))) => {
                self.abort(sql, &request_id).await;
                return Err(error);
            }

            Err(error) => return Err(error),
        };

        if !envelope.success {
            let data: QueryResponseData = envelope.data().unwrap_or_default();

            return Err(SnowflakeDatabaseError::new(
                envelope.code.clone().unwrap_or_default(),
                envelope.message(),
            )
            .with_sql_state(data.sql_state)
            .with_query_id(data.query_id)
            .into());
        }

        envelope.data()
    }

    /// Waits for a submitted statement, polling its result URL while the
    /// server reports it in progress.
    async fn complete(
        &self,
        request: HttpRequest,
        cancellation: &Cancellation,
    ) -> Result<Envelope, Error> {
        let mut envelope = cancellation.run(self.session.send(request)).await?;
        let mut delay = POLL_INITIAL_DELAY;

        while envelope.has_code(code::QUERY_IN_PROGRESS)
            || envelope.has_code(code::QUERY_IN_PROGRESS_ASYNC)
        {
            let data: QueryResponseData = envelope.data()?;

            let result_url = data
                .get_result_url
                .ok_or_else(|| err_protocol!("statement in progress without a result URL"))?;

            log::debug!(
                "query {} still running; polling again in {:?}",
                data.query_id.as_deref().unwrap_or("?"),
                delay
            );

            cancellation.sleep(delay).await?;
            delay = (delay * 2).min(POLL_MAX_DELAY);

            let request = HttpRequest::get(self.session.url(&result_url, &[])?)
                .header("Accept", "application/json");

            envelope = cancellation.run(self.session.send(request)).await?;
        }

        Ok(envelope)
    }

    async fn abort(&self, sql: &str, request_id: &str) {
        let request = self
            .session
            .url(protocol::ABORT_PATH, &[])
            .and_then(|url| {
                HttpRequest::post(url).json(&AbortRequest {
                    sql_text: sql,
                    request_id,
                })
            });

        let result = match request {
            Ok(request) => sqlx_rt::timeout(ABORT_TIMEOUT, self.session.send(request))
                .await
                .map_err(|_| Error::TimedOut(ABORT_TIMEOUT))
                .and_then(|sent| sent),

            Err(error) => Err(error),
        };

        match result {
            Ok(envelope) if envelope.success => {
                log::debug!("aborted request {}", request_id);
            }

            Ok(envelope) => {
                log::debug!("abort of request {} refused: {}", request_id, envelope.message());
            }

            Err(error) => {
                log::warn!("failed to abort request {}: {}", request_id, error);
            }
        }
    }
}

fn completed(mut data: QueryResponseData, describe_only: bool) -> Result<Completed, Error> {
    if let Some(format) = &data.query_result_format {
        if !format.eq_ignore_ascii_case("json") {
            return Err(Error::Unsupported(format!(
                "result format {:?}; the session requests JSON results",
                format
            )));
        }
    }

    let columns: Arc<[SnowflakeColumn]> = data
        .rowtype
        .iter()
        .enumerate()
        .map(|(ordinal, row_type)| SnowflakeColumn::from_row_type(ordinal, row_type))
        .collect();

    let mut column_names = HashMap::with_capacity(columns.len());

    for column in columns.iter() {
        // the first of two same-named columns wins
        column_names
            .entry(SnowflakeColumn::lookup_key(&column.name))
            .or_insert(column.ordinal);
    }

    let rows = std::mem::take(&mut data.rowset);

    let mut chunks = Vec::with_capacity(1 + data.chunks.len());

    chunks.push(ChunkDescriptor {
        index: 0,
        row_count: rows.len() as u64,
        source: ChunkSource::Inline,
    });

    for (index, chunk) in data.chunks.iter().enumerate() {
        chunks.push(ChunkDescriptor {
            index: index + 1,
            row_count: chunk.row_count,
            source: ChunkSource::Remote {
                url: chunk.url.clone(),
            },
        });
    }

    if let Some(total) = data.total.filter(|_| !describe_only) {
        let announced: u64 = chunks.iter().map(|chunk| chunk.row_count).sum();

        if announced != total {
            return Err(err_protocol!(
                "result chunks hold {} rows but the result has {}",
                announced,
                total
            ));
        }
    }

    let rows_affected = match data.statement_type_id {
        Some(id) if protocol::is_dml(id) => rows_affected(&rows),
        _ => 0,
    };

    Ok(Completed {
        metadata: ResultMetadata {
            columns,
            column_names: Arc::new(column_names),
            total: data.total,
            query_id: data.query_id,
            chunks,
            chunk_headers: chunk_headers(data.chunk_headers, data.qrmk),
        },
        rows,
        rows_affected,
        parameters: data.number_of_binds.unwrap_or(0),
    })
}

// a DML statement answers with one row of counts, one per kind of change
// (inserted, updated, deleted, ...)
fn rows_affected(rows: &[RawRow]) -> u64 {
    rows.first()
        .map(|row| {
            row.iter()
                .flatten()
                .filter_map(|cell| cell.trim().parse::<u64>().ok())
                .sum()
        })
        .unwrap_or(0)
}
