//! Concurrent download of result chunks with in-order delivery.
//!
//! Large results arrive as an inline first chunk plus descriptors of further
//! chunks held in cloud storage. A dispatcher task starts one fetch worker
//! per remote chunk, in index order, as long as it can take a permit from a
//! semaphore of the prefetch width. Each chunk has its own oneshot slot and
//! the consumer drains the slots strictly in index order, so rows come out in
//! (chunk, row) order whatever order the fetches complete in. A chunk keeps
//! its permit until the consumer has drained it, which bounds the chunks in
//! flight or buffered to the prefetch width.

use std::borrow::Cow;
use std::collections::{BTreeMap, VecDeque};
use std::io::Read;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use flate2::read::GzDecoder;
use futures_channel::oneshot;
use futures_core::stream::{BoxStream, Stream};
use futures_util::stream;
use sqlx_rt::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::DropGuard;

use crate::error::Error;
use crate::snowflake::cancel::Cancellation;
use crate::snowflake::http::{HttpClient, HttpRequest};
use crate::snowflake::retry::RetryPolicy;
use crate::snowflake::{SnowflakeColumn, SnowflakeRow};
use crate::HashMap;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub(crate) type RawRow = Vec<Option<String>>;

/// What the server said about a result, before any remote chunk is fetched.
#[derive(Debug)]
pub(crate) struct ResultMetadata {
    pub(crate) columns: Arc<[SnowflakeColumn]>,
    pub(crate) column_names: Arc<HashMap<String, usize>>,
    pub(crate) total: Option<u64>,
    pub(crate) query_id: Option<String>,
    /// Chunk 0 is the inline chunk.
    pub(crate) chunks: Vec<ChunkDescriptor>,
    pub(crate) chunk_headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChunkSource {
    Inline,
    Remote { url: String },
}

#[derive(Debug, Clone)]
pub(crate) struct ChunkDescriptor {
    pub(crate) index: usize,
    pub(crate) row_count: u64,
    pub(crate) source: ChunkSource,
}

/// Progress of a chunk through the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkStatus {
    Pending = 0,
    Fetching = 1,
    Ready = 2,
    Failed = 3,
}

impl ChunkStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChunkStatus::Fetching,
            2 => ChunkStatus::Ready,
            3 => ChunkStatus::Failed,
            _ => ChunkStatus::Pending,
        }
    }
}

type StatusTable = Arc<[AtomicU8]>;

fn set_status(statuses: &StatusTable, index: usize, status: ChunkStatus) {
    if let Some(slot) = statuses.get(index) {
        slot.store(status as u8, Ordering::Release);
    }
}

/// A decoded chunk waiting for the consumer, with the permit it holds.
struct ReadyChunk {
    rows: Vec<RawRow>,
    permit: OwnedSemaphorePermit,
}

type ChunkSlot = oneshot::Receiver<Result<ReadyChunk, Error>>;

/// The headers a chunk GET needs.
///
/// Explicit chunk headers win; otherwise the result master key is sent as a
/// customer supplied encryption key.
pub(crate) fn chunk_headers(
    headers: Option<BTreeMap<String, String>>,
    qrmk: Option<String>,
) -> Vec<(String, String)> {
    match (headers, qrmk) {
        (Some(headers), _) if !headers.is_empty() => headers.into_iter().collect(),

        (_, Some(qrmk)) => vec![
            (
                "x-amz-server-side-encryption-customer-algorithm".into(),
                "AES256".into(),
            ),
            ("x-amz-server-side-encryption-customer-key".into(), qrmk),
        ],

        _ => Vec::new(),
    }
}

/// Decodes a chunk body: optionally gzip compressed JSON rows, with or
/// without the enclosing brackets.
pub(crate) fn decode_chunk(body: &[u8], expected_rows: u64) -> Result<Vec<RawRow>, Error> {
    let body = if body.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::with_capacity(body.len() * 4);
        GzDecoder::new(body)
            .read_to_end(&mut inflated)
            .map_err(|err| err_protocol!("malformed result chunk: {}", err))?;
        Cow::Owned(inflated)
    } else {
        Cow::Borrowed(body)
    };

    let rows: Vec<RawRow> = match serde_json::from_slice(&body) {
        Ok(rows) => rows,

        Err(_) => {
            let mut wrapped = Vec::with_capacity(body.len() + 2);
            wrapped.push(b'[');
            wrapped.extend_from_slice(&body);
            wrapped.push(b']');

            serde_json::from_slice(&wrapped)
                .map_err(|err| err_protocol!("malformed result chunk: {}", err))?
        }
    };

    if rows.len() as u64 != expected_rows {
        return Err(err_protocol!(
            "result chunk has {} rows but {} were announced",
            rows.len(),
            expected_rows
        ));
    }

    Ok(rows)
}

/// Streams the rows of a result, fetching remote chunks in the background.
pub(crate) struct ChunkDownloader {
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    width: usize,
}

impl ChunkDownloader {
    pub(crate) fn new(http: Arc<dyn HttpClient>, retry: RetryPolicy, width: usize) -> Self {
        Self {
            http,
            retry,
            width: width.max(1),
        }
    }

    pub(crate) fn stream(
        &self,
        metadata: ResultMetadata,
        inline_rows: Vec<RawRow>,
        cancellation: &Cancellation,
    ) -> SnowflakeRowStream {
        // dropping the stream cancels this scope and with it every worker
        let scope = cancellation.child();
        let guard = scope.token().clone().drop_guard();

        let statuses: StatusTable = metadata
            .chunks
            .iter()
            .map(|chunk| {
                AtomicU8::new(match chunk.source {
                    ChunkSource::Inline => ChunkStatus::Ready as u8,
                    ChunkSource::Remote { .. } => ChunkStatus::Pending as u8,
                })
            })
            .collect();

        let mut remote = Vec::new();
        let mut slots = VecDeque::new();

        for chunk in &metadata.chunks {
            if let ChunkSource::Remote { url } = &chunk.source {
                let (tx, rx) = oneshot::channel();
                remote.push((chunk.index, chunk.row_count, url.clone(), tx));
                slots.push_back(rx);
            }
        }

        if !remote.is_empty() {
            log::debug!(
                "downloading {} result chunk(s) of query {} with {} worker(s)",
                remote.len(),
                metadata.query_id.as_deref().unwrap_or("?"),
                self.width
            );

            sqlx_rt::spawn(dispatch(
                Arc::clone(&self.http),
                self.retry.clone(),
                Arc::new(metadata.chunk_headers.clone()),
                Arc::new(Semaphore::new(self.width)),
                Arc::clone(&statuses),
                scope.clone(),
                remote,
            ));
        }

        let consumer = Consumer {
            columns: Arc::clone(&metadata.columns),
            column_names: Arc::clone(&metadata.column_names),
            current: inline_rows.into_iter(),
            permit: None,
            slots,
            scope,
        };

        SnowflakeRowStream {
            inner: Box::pin(stream::unfold(Some(consumer), Consumer::next)),
            statuses,
            query_id: metadata.query_id,
            total: metadata.total,
            _guard: guard,
        }
    }
}

async fn dispatch(
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    headers: Arc<Vec<(String, String)>>,
    semaphore: Arc<Semaphore>,
    statuses: StatusTable,
    scope: Cancellation,
    remote: Vec<(usize, u64, String, oneshot::Sender<Result<ReadyChunk, Error>>)>,
) {
    for (index, row_count, url, tx) in remote {
        let permit = scope
            .run(async {
                Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::WorkerCrashed)
            })
            .await;

        let permit = match permit {
            Ok(permit) => permit,

            Err(error) => {
                // the consumer is gone or gave up; the slots left unfilled end its stream
                set_status(&statuses, index, ChunkStatus::Failed);
                let _ = tx.send(Err(error));
                return;
            }
        };

        set_status(&statuses, index, ChunkStatus::Fetching);

        sqlx_rt::spawn(fetch_worker(
            Arc::clone(&http),
            retry.clone(),
            Arc::clone(&headers),
            Arc::clone(&statuses),
            scope.clone(),
            index,
            row_count,
            url,
            permit,
            tx,
        ));
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_worker(
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    headers: Arc<Vec<(String, String)>>,
    statuses: StatusTable,
    scope: Cancellation,
    index: usize,
    row_count: u64,
    url: String,
    permit: OwnedSemaphorePermit,
    tx: oneshot::Sender<Result<ReadyChunk, Error>>,
) {
    log::debug!("fetching result chunk {} ({} rows)", index, row_count);

    let result = scope
        .run(fetch_chunk(&*http, &retry, &headers, &url, row_count))
        .await;

    match result {
        Ok(rows) => {
            set_status(&statuses, index, ChunkStatus::Ready);
            let _ = tx.send(Ok(ReadyChunk { rows, permit }));
        }

        Err(error) => {
            log::warn!("result chunk {} failed: {}", index, error);
            set_status(&statuses, index, ChunkStatus::Failed);
            let _ = tx.send(Err(error));
        }
    }
}

async fn fetch_chunk(
    http: &dyn HttpClient,
    retry: &RetryPolicy,
    headers: &[(String, String)],
    url: &str,
    row_count: u64,
) -> Result<Vec<RawRow>, Error> {
    let url = url::Url::parse(url).map_err(|err| err_protocol!("invalid chunk URL: {}", err))?;

    retry
        .run(
            |_| {
                let request = headers.iter().fold(
                    HttpRequest::get(url.clone()),
                    |request, (name, value)| request.header(name.as_str(), value.as_str()),
                );

                async move {
                    let response = http.send(request).await?;

                    if !response.is_success() {
                        return Err(Error::Http {
                            status: response.status,
                            message: "result chunk download failed".into(),
                        });
                    }

                    decode_chunk(&response.body, row_count)
                }
            },
            Error::is_transient,
        )
        .await
}

struct Consumer {
    columns: Arc<[SnowflakeColumn]>,
    column_names: Arc<HashMap<String, usize>>,
    current: std::vec::IntoIter<RawRow>,
    // released once `current` is drained
    permit: Option<OwnedSemaphorePermit>,
    slots: VecDeque<ChunkSlot>,
    scope: Cancellation,
}

impl Consumer {
    async fn next(
        state: Option<Self>,
    ) -> Option<(Result<SnowflakeRow, Error>, Option<Self>)> {
        let mut state = state?;

        loop {
            if let Some(values) = state.current.next() {
                if values.len() != state.columns.len() {
                    let error = err_protocol!(
                        "row has {} values but the result has {} columns",
                        values.len(),
                        state.columns.len()
                    );

                    return Some((Err(error), None));
                }

                let row = SnowflakeRow {
                    values,
                    columns: Arc::clone(&state.columns),
                    column_names: Arc::clone(&state.column_names),
                };

                return Some((Ok(row), Some(state)));
            }

            state.permit = None;

            let slot = state.slots.pop_front()?;

            let chunk = state
                .scope
                .run(async move {
                    match slot.await {
                        Ok(chunk) => chunk,
                        Err(_) => Err(Error::WorkerCrashed),
                    }
                })
                .await;

            match chunk {
                Ok(chunk) => {
                    state.current = chunk.rows.into_iter();
                    state.permit = Some(chunk.permit);
                }

                Err(error) => return Some((Err(error), None)),
            }
        }
    }
}

/// A stream of the rows of a result, in server order.
///
/// Dropping the stream stops all outstanding chunk downloads.
pub struct SnowflakeRowStream {
    inner: BoxStream<'static, Result<SnowflakeRow, Error>>,
    statuses: StatusTable,
    query_id: Option<String>,
    total: Option<u64>,
    _guard: DropGuard,
}

impl SnowflakeRowStream {
    /// The number of chunks of the result, the inline one included.
    pub fn chunk_count(&self) -> usize {
        self.statuses.len()
    }

    pub fn chunk_status(&self, index: usize) -> Option<ChunkStatus> {
        self.statuses
            .get(index)
            .map(|status| ChunkStatus::from_u8(status.load(Ordering::Acquire)))
    }

    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// The row count the server announced, if it did.
    pub fn total_rows(&self) -> Option<u64> {
        self.total
    }
}

impl Stream for SnowflakeRowStream {
    type Item = Result<SnowflakeRow, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for SnowflakeRowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeRowStream")
            .field("query_id", &self.query_id)
            .field("chunks", &self.statuses.len())
            .finish()
    }
}
