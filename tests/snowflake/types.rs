use std::sync::Arc;

use chrono::TimeZone;
use fake::{column, column_with_scale, rows, FakeSnowflake, Reply};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx_snowflake::snowflake::{Snowflake, SnowflakeConnection};
use sqlx_snowflake::types::chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc,
};
use sqlx_snowflake::types::{Json, Uuid};
use sqlx_snowflake::{query, Decode, Error, Row, Type};

mod fake;

struct Server {
    fake: Arc<FakeSnowflake>,
    conn: SnowflakeConnection,
}

impl Server {
    async fn start() -> anyhow::Result<Self> {
        let fake = FakeSnowflake::new();
        let conn = fake::connect(&fake).await?;

        Ok(Self { fake, conn })
    }

    /// Decodes a single cell of the given column type.
    async fn decode<T>(&mut self, column: Value, raw: Option<&str>) -> Result<T, Error>
    where
        T: for<'r> Decode<'r, Snowflake> + Type<Snowflake>,
    {
        let rowtype = vec![column];
        let raw = raw.map(str::to_owned);

        self.fake
            .on_query(move |_| Reply::Success(rows(rowtype.clone(), vec![vec![raw.clone()]], &[])));

        let row = query("select v").fetch_one(&mut self.conn).await?;

        row.try_get(0)
    }
}

fn number(scale: u32) -> Value {
    column_with_scale("V", "fixed", 38, scale)
}

fn ymd_hms_nano(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, n: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_nano_opt(h, mi, s, n)
        .unwrap()
}

fn assert_decode_error<T: std::fmt::Debug>(result: Result<T, Error>) {
    match result {
        Err(Error::ColumnDecode { .. }) => {}
        other => panic!("expected a decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn it_decodes_integers() -> anyhow::Result<()> {
    let mut server = Server::start().await?;

    assert_eq!(server.decode::<i64>(number(0), Some("42")).await?, 42);
    assert_eq!(server.decode::<i32>(number(0), Some("-17")).await?, -17);
    assert_eq!(
        server
            .decode::<i64>(number(0), Some("9223372036854775807"))
            .await?,
        i64::MAX
    );
    assert_eq!(server.decode::<u8>(number(0), Some("255")).await?, 255);

    // out of range is an error, never a truncation
    assert_decode_error(server.decode::<u8>(number(0), Some("300")).await);
    assert_decode_error(server.decode::<u32>(number(0), Some("-1")).await);

    // a scaled number does not decode as an integer
    assert_decode_error(server.decode::<i64>(number(2), Some("1.50")).await);

    Ok(())
}

#[tokio::test]
async fn it_decodes_floats() -> anyhow::Result<()> {
    let mut server = Server::start().await?;

    assert_eq!(
        server.decode::<f64>(column("V", "real"), Some("3.25")).await?,
        3.25
    );
    assert_eq!(
        server.decode::<f32>(column("V", "real"), Some("-0.5")).await?,
        -0.5
    );
    assert_eq!(server.decode::<f64>(number(2), Some("1.50")).await?, 1.5);
    assert!(server
        .decode::<f64>(column("V", "real"), Some("NaN"))
        .await?
        .is_nan());
    assert_eq!(
        server.decode::<f64>(column("V", "real"), Some("-inf")).await?,
        f64::NEG_INFINITY
    );

    Ok(())
}

#[tokio::test]
async fn it_decodes_text_binary_and_booleans() -> anyhow::Result<()> {
    let mut server = Server::start().await?;

    assert_eq!(
        server
            .decode::<String>(column("V", "text"), Some("héllo wörld"))
            .await?,
        "héllo wörld"
    );
    assert_eq!(
        server
            .decode::<Vec<u8>>(column("V", "binary"), Some("48656C6C6F"))
            .await?,
        b"Hello"
    );
    assert!(server.decode::<bool>(column("V", "boolean"), Some("1")).await?);
    assert!(!server.decode::<bool>(column("V", "boolean"), Some("0")).await?);

    let id = Uuid::parse_str("4a7b2c9e-7d0f-4e2a-9d65-0c5f0a1b2c3d")?;
    assert_eq!(
        server
            .decode::<Uuid>(column("V", "text"), Some(&id.to_string()))
            .await?,
        id
    );

    // mismatched column types are refused before decoding
    assert_decode_error(server.decode::<i64>(column("V", "text"), Some("42")).await);
    assert_decode_error(server.decode::<String>(number(0), Some("42")).await);

    Ok(())
}

#[tokio::test]
async fn it_decodes_nulls() -> anyhow::Result<()> {
    let mut server = Server::start().await?;

    assert_eq!(server.decode::<Option<i64>>(number(0), None).await?, None);
    assert_eq!(
        server.decode::<Option<String>>(column("V", "text"), None).await?,
        None
    );
    assert_eq!(
        server
            .decode::<Option<String>>(column("V", "text"), Some(""))
            .await?,
        Some(String::new())
    );

    assert_decode_error(server.decode::<i64>(number(0), None).await);

    Ok(())
}

#[tokio::test]
async fn it_decodes_dates_and_times() -> anyhow::Result<()> {
    let mut server = Server::start().await?;

    assert_eq!(
        server
            .decode::<NaiveDate>(column("V", "date"), Some("15298"))
            .await?,
        NaiveDate::from_ymd_opt(2011, 11, 20).unwrap()
    );
    assert_eq!(
        server
            .decode::<NaiveTime>(
                column_with_scale("V", "time", 0, 3),
                Some("77257.123456789")
            )
            .await?,
        NaiveTime::from_hms_milli_opt(21, 27, 37, 123).unwrap()
    );

    Ok(())
}

#[tokio::test]
async fn it_decodes_timestamps_to_the_column_precision() -> anyhow::Result<()> {
    let mut server = Server::start().await?;
    let raw = Some("1321824457.123456789");

    assert_eq!(
        server
            .decode::<NaiveDateTime>(column_with_scale("V", "timestamp_ntz", 0, 9), raw)
            .await?,
        ymd_hms_nano(2011, 11, 20, 21, 27, 37, 123_456_789)
    );
    assert_eq!(
        server
            .decode::<NaiveDateTime>(column_with_scale("V", "timestamp_ntz", 0, 6), raw)
            .await?,
        ymd_hms_nano(2011, 11, 20, 21, 27, 37, 123_456_000)
    );
    assert_eq!(
        server
            .decode::<NaiveDateTime>(column_with_scale("V", "timestamp_ntz", 0, 0), raw)
            .await?,
        ymd_hms_nano(2011, 11, 20, 21, 27, 37, 0)
    );

    let ltz = server
        .decode::<DateTime<Utc>>(column_with_scale("V", "timestamp_ltz", 0, 9), raw)
        .await?;
    assert_eq!(
        ltz,
        Utc.from_utc_datetime(&ymd_hms_nano(2011, 11, 20, 21, 27, 37, 123_456_789))
    );

    let tz = server
        .decode::<DateTime<FixedOffset>>(
            column_with_scale("V", "timestamp_tz", 0, 9),
            Some("1321824457.123456789 1920"),
        )
        .await?;
    assert_eq!(tz.offset().local_minus_utc(), 8 * 3600);
    assert_eq!(tz.with_timezone(&Utc), ltz);

    Ok(())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Customer {
    name: String,
    tags: Vec<String>,
}

#[tokio::test]
async fn it_decodes_semi_structured_values() -> anyhow::Result<()> {
    let mut server = Server::start().await?;
    let raw = "{\n  \"name\": \"Ada\",\n  \"tags\": [\"vip\", \"eu\"]\n}";

    assert_eq!(
        server.decode::<Value>(column("V", "variant"), Some(raw)).await?,
        json!({ "name": "Ada", "tags": ["vip", "eu"] })
    );

    let Json(customer) = server
        .decode::<Json<Customer>>(column("V", "object"), Some(raw))
        .await?;
    assert_eq!(
        customer,
        Customer {
            name: "Ada".into(),
            tags: vec!["vip".into(), "eu".into()],
        }
    );

    assert_eq!(
        server
            .decode::<Value>(column("V", "array"), Some("[1, 2, 3]"))
            .await?,
        json!([1, 2, 3])
    );

    Ok(())
}

#[cfg(feature = "bigdecimal")]
#[tokio::test]
async fn it_decodes_decimals_exactly() -> anyhow::Result<()> {
    use sqlx_snowflake::types::BigDecimal;
    use std::str::FromStr;

    let mut server = Server::start().await?;

    assert_eq!(
        server
            .decode::<BigDecimal>(number(10), Some("12345678901234567890.0123456789"))
            .await?,
        BigDecimal::from_str("12345678901234567890.0123456789")?
    );

    Ok(())
}

#[tokio::test]
async fn it_binds_values_as_typed_text() -> anyhow::Result<()> {
    let mut server = Server::start().await?;

    query("insert into t values (?, ?, ?, ?, ?, ?, ?, ?, ?)")
        .bind(42_i64)
        .bind("forty two")
        .bind(None::<i32>)
        .bind(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
        .bind(ymd_hms_nano(2024, 1, 31, 12, 0, 1, 500_000_000))
        .bind(3.5_f64)
        .bind(vec![0xde_u8, 0xad])
        .bind(Json(json!({ "a": 1 })))
        .bind(false)
        .execute(&mut server.conn)
        .await?;

    let calls = server.fake.statements.lock().unwrap().clone();
    let call = &calls[0];

    let expected = [
        ("FIXED", Some("42")),
        ("TEXT", Some("forty two")),
        ("FIXED", None),
        ("TEXT", Some("2024-01-31")),
        ("TEXT", Some("2024-01-31 12:00:01.500000000")),
        ("REAL", Some("3.5")),
        ("BINARY", Some("DEAD")),
        ("TEXT", Some("{\"a\":1}")),
        ("BOOLEAN", Some("false")),
    ];

    for (i, (ty, value)) in expected.iter().enumerate() {
        assert_eq!(
            call.binding(i + 1),
            Some((ty.to_string(), value.map(str::to_owned))),
            "binding {}",
            i + 1
        );
    }

    assert_eq!(call.binding(expected.len() + 1), None);

    Ok(())
}
