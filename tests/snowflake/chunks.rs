use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use fake::{cells, column, column_with_scale, rows, FakeSnowflake, Reply};
use futures::TryStreamExt;
use rand::Rng;
use serde_json::Value;
use sqlx_snowflake::snowflake::ChunkStatus;
use sqlx_snowflake::{query, Error, Row};

mod fake;

fn rowtype() -> Vec<Value> {
    vec![
        column_with_scale("ID", "fixed", 38, 0),
        column("LABEL", "text"),
    ]
}

fn numbered(range: std::ops::Range<usize>) -> Vec<Vec<Option<String>>> {
    range
        .map(|id| cells(&[Some(&id.to_string()), Some(&format!("row {}", id))]))
        .collect()
}

/// Serves `inline` rows in the response and `chunks` remote chunks of
/// `per_chunk` rows each; row ids count up from zero across all of them.
fn serve(
    fake: &Arc<FakeSnowflake>,
    inline: usize,
    chunks: usize,
    per_chunk: usize,
    delay: impl Fn(usize) -> Duration,
    failures: impl Fn(usize) -> u32,
) {
    let mut descriptors = Vec::new();

    for chunk in 0..chunks {
        let start = inline + chunk * per_chunk;
        let url = fake.add_chunk(
            &numbered(start..start + per_chunk),
            chunk % 2 == 0,
            delay(chunk),
            failures(chunk),
        );

        descriptors.push((url, per_chunk));
    }

    let data = rows(rowtype(), numbered(0..inline), &descriptors);

    fake.on_query(move |_| Reply::Success(data.clone()));
}

fn ids(rows: &[sqlx_snowflake::SnowflakeRow]) -> anyhow::Result<Vec<usize>> {
    rows.iter()
        .map(|row| Ok(row.try_get::<i64, _>("id")? as usize))
        .collect()
}

#[tokio::test]
async fn it_delivers_rows_in_server_order() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();

    // chunks finish in random order
    serve(
        &fake,
        3,
        8,
        25,
        |_| Duration::from_millis(rand::thread_rng().gen_range(0..40)),
        |_| 0,
    );

    let mut conn = fake::connect(&fake).await?;
    let rows = query("select id, label from numbers").fetch_all(&mut conn).await?;

    assert_eq!(ids(&rows)?, (0..203).collect::<Vec<_>>());
    assert_eq!(rows[150].try_get::<String, _>("label")?, "row 150");

    Ok(())
}

#[tokio::test]
async fn it_bounds_the_chunks_in_flight() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    serve(&fake, 0, 10, 5, |_| Duration::from_millis(20), |_| 0);

    // prefetch width is 3
    let mut conn = fake::connect(&fake).await?;
    let rows = query("select id, label from numbers").fetch_all(&mut conn).await?;

    assert_eq!(rows.len(), 50);

    let max = fake.max_chunks_in_flight.load(Ordering::SeqCst);
    assert!(max >= 1 && max <= 3, "{} chunks were in flight at once", max);

    Ok(())
}

#[tokio::test]
async fn it_holds_back_downloads_until_rows_are_consumed() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    serve(&fake, 1, 6, 2, |_| Duration::ZERO, |_| 0);

    let mut conn = fake::connect(&fake).await?;
    let mut stream = query("select id, label from numbers")
        .fetch_stream(&mut conn)
        .await?;

    assert_eq!(stream.chunk_count(), 7);
    assert_eq!(stream.chunk_status(0), Some(ChunkStatus::Ready));
    assert_eq!(stream.total_rows(), Some(13));

    let first = stream.try_next().await?.expect("the inline row");
    assert_eq!(first.try_get::<i64, _>(0)?, 0);

    // give the workers time to fill every free slot
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = fake.chunk_requests.lock().unwrap().len();
    assert!(started <= 3, "{} chunks were fetched ahead", started);
    assert_eq!(stream.chunk_status(6), Some(ChunkStatus::Pending));

    let mut rest = Vec::new();

    while let Some(row) = stream.try_next().await? {
        rest.push(row);
    }

    assert_eq!(ids(&rest)?, (1..13).collect::<Vec<_>>());
    assert!((1..7).all(|i| stream.chunk_status(i) == Some(ChunkStatus::Ready)));

    Ok(())
}

#[tokio::test]
async fn it_retries_failed_downloads() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();

    // chunk 2 fails twice, and the policy allows three attempts
    serve(&fake, 0, 4, 10, |_| Duration::ZERO, |chunk| if chunk == 2 { 2 } else { 0 });

    let mut conn = fake::connect(&fake).await?;
    let rows = query("select id, label from numbers").fetch_all(&mut conn).await?;

    assert_eq!(ids(&rows)?, (0..40).collect::<Vec<_>>());
    assert_eq!(fake.chunk_requests.lock().unwrap().len(), 6);

    Ok(())
}

#[tokio::test]
async fn it_fails_the_stream_when_a_chunk_never_arrives() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    serve(
        &fake,
        2,
        4,
        10,
        |_| Duration::ZERO,
        |chunk| if chunk == 1 { u32::MAX } else { 0 },
    );

    let mut conn = fake::connect(&fake).await?;
    let mut stream = query("select id, label from numbers")
        .fetch_stream(&mut conn)
        .await?;

    let mut delivered = Vec::new();

    let err = loop {
        match stream.try_next().await {
            Ok(Some(row)) => delivered.push(row),
            Ok(None) => panic!("the stream ended without an error"),
            Err(err) => break err,
        }
    };

    // everything before the broken chunk is delivered first
    assert_eq!(ids(&delivered)?, (0..12).collect::<Vec<_>>());

    match err {
        Error::RetriesExhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, Error::Http { status: 503, .. }), "{:?}", source);
        }

        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(stream.chunk_status(2), Some(ChunkStatus::Failed));
    assert!(stream.try_next().await?.is_none());

    // the connection is still usable
    fake.on_query(|_| Reply::Success(fake::ddl()));
    query("select 1").execute(&mut conn).await?;

    Ok(())
}

#[tokio::test]
async fn it_refuses_chunks_with_the_wrong_row_count() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();

    let url = fake.add_chunk(&numbered(0..9), false, Duration::ZERO, 0);
    let data = rows(rowtype(), Vec::new(), &[(url, 10)]);
    fake.on_query(move |_| Reply::Success(data.clone()));

    let mut conn = fake::connect(&fake).await?;
    let err = query("select id, label from numbers")
        .fetch_all(&mut conn)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Protocol(_)), "{:?}", err);

    Ok(())
}

#[tokio::test]
async fn it_sends_storage_headers_but_no_session_token() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    serve(&fake, 0, 2, 3, |_| Duration::ZERO, |_| 0);

    let mut conn = fake::connect(&fake).await?;
    query("select id, label from numbers").fetch_all(&mut conn).await?;

    let requests = fake.chunk_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);

    for request in &requests {
        assert_eq!(request.header_value("Authorization"), None);
        assert_eq!(
            request.header_value("x-amz-server-side-encryption-customer-key"),
            Some("c2VjcmV0LWtleQ==")
        );
        assert_eq!(
            request.header_value("x-amz-server-side-encryption-customer-algorithm"),
            Some("AES256")
        );
        assert_eq!(request.query_param("sig").as_deref(), Some("abc"));
    }

    Ok(())
}

#[tokio::test]
async fn it_stops_downloading_when_the_stream_is_dropped() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    serve(&fake, 1, 20, 5, |_| Duration::from_millis(10), |_| 0);

    let mut conn = fake::connect(&fake).await?;

    {
        let mut stream = query("select id, label from numbers")
            .fetch_stream(&mut conn)
            .await?;

        stream.try_next().await?;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    let fetched = fake.chunk_requests.lock().unwrap().len();
    assert!(fetched <= 3, "{} chunks were fetched after the drop", fetched);

    // a new statement runs normally
    fake.on_query(|_| Reply::Success(fake::ddl()));
    query("select 1").execute(&mut conn).await?;

    Ok(())
}
