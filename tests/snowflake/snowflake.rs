use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fake::{cells, column, column_with_scale, dml, rows, FakeSnowflake, Reply};
use sqlx_snowflake::snowflake::{
    CancellationToken, SnowflakeAuthenticator, SnowflakeConnectOptions, SnowflakeDatabaseError,
};
use sqlx_snowflake::{query, Column, ConnectOptions, Connection, Error, Row, TypeInfo};

mod fake;

#[tokio::test]
async fn it_connects_pings_and_closes() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    let mut conn = fake::connect(&fake).await?;

    conn.ping().await?;
    conn.close().await?;

    assert_eq!(fake.logins.load(Ordering::SeqCst), 1);
    assert_eq!(fake.heartbeats.load(Ordering::SeqCst), 1);
    assert_eq!(fake.logouts.load(Ordering::SeqCst), 1);

    let bodies = fake.login_bodies.lock().unwrap();
    let login = &bodies[0]["data"];

    assert_eq!(login["ACCOUNT_NAME"], "fake");
    assert_eq!(login["LOGIN_NAME"], "tester");
    assert_eq!(login["PASSWORD"], "secret");
    assert_eq!(login["AUTHENTICATOR"], "SNOWFLAKE");
    assert_eq!(login["SESSION_PARAMETERS"]["QUERY_RESULT_FORMAT"], "JSON");

    Ok(())
}

#[tokio::test]
async fn it_rejects_bad_credentials() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.reject_logins();

    let err = fake::options(&fake).connect().await.unwrap_err();

    assert!(
        matches!(err, Error::Authentication { code: Some(390100), .. }),
        "{:?}",
        err
    );

    Ok(())
}

#[tokio::test]
async fn it_requires_an_account_and_a_user() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();

    let err = fake::options(&fake).user("").connect().await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{:?}", err);

    let err = fake::options(&fake).account("").connect().await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{:?}", err);

    assert_eq!(fake.logins.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn it_rejects_unknown_connection_options() -> anyhow::Result<()> {
    let err = SnowflakeConnectOptions::from_str("snowflake://u:p@acct/db?warehouse=wh&colour=blue")
        .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)), "{:?}", err);
    assert!(err.to_string().contains("colour"), "{}", err);

    let options = SnowflakeConnectOptions::from_str(
        "snowflake://u@acct/db?authenticator=oauth&token=abc&query_timeout=2.5",
    )?;

    assert_eq!(options.get_authenticator(), SnowflakeAuthenticator::OAuth);
    assert_eq!(options.get_database(), Some("db"));

    Ok(())
}

#[tokio::test]
async fn it_can_insert_update_select_and_delete() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();

    // a single row table holding one boolean
    let table: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));

    fake.on_query({
        let table = Arc::clone(&table);

        move |call| {
            let mut table = table.lock().unwrap();
            let sql = call.sql.to_uppercase();

            if sql.starts_with("INSERT") {
                *table = Some(call.bound_bool(1));
                Reply::Success(dml(fake::INSERT, &[1]))
            } else if sql.starts_with("UPDATE") {
                let updated = table.is_some() as u64;
                *table = table.map(|_| call.bound_bool(1));
                Reply::Success(dml(fake::UPDATE, &[updated]))
            } else if sql.starts_with("DELETE") {
                let deleted = table.take().is_some() as u64;
                Reply::Success(dml(fake::DELETE, &[deleted]))
            } else if sql.starts_with("SELECT") {
                let inline = table
                    .iter()
                    .map(|flag| cells(&[Some(if *flag { "1" } else { "0" })]))
                    .collect();

                Reply::Success(rows(vec![column("FLAG", "boolean")], inline, &[]))
            } else {
                Reply::Success(fake::ddl())
            }
        }
    });

    let mut conn = fake::connect(&fake).await?;

    query("create temporary table flags (flag boolean)")
        .execute(&mut conn)
        .await?;

    let done = query("insert into flags (flag) values (?)")
        .bind(true)
        .execute(&mut conn)
        .await?;
    assert_eq!(done.rows_affected(), 1);
    assert!(done.query_id().is_some());

    let flag: bool = query("select flag from flags")
        .fetch_one(&mut conn)
        .await?
        .try_get("flag")?;
    assert!(flag);

    let done = query("update flags set flag = ?")
        .bind(false)
        .execute(&mut conn)
        .await?;
    assert_eq!(done.rows_affected(), 1);

    let flag: bool = query("select flag from flags")
        .fetch_one(&mut conn)
        .await?
        .try_get(0)?;
    assert!(!flag);

    assert_eq!(
        query("delete from flags").execute(&mut conn).await?.rows_affected(),
        1
    );
    assert_eq!(
        query("delete from flags").execute(&mut conn).await?.rows_affected(),
        0
    );

    assert!(query("select flag from flags")
        .fetch_optional(&mut conn)
        .await?
        .is_none());

    let err = query("select flag from flags")
        .fetch_one(&mut conn)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RowNotFound), "{:?}", err);

    let statements = fake.statements.lock().unwrap().clone();

    assert_eq!(statements[1].binding(1), Some(("BOOLEAN".into(), Some("true".into()))));
    assert_eq!(statements[3].binding(1), Some(("BOOLEAN".into(), Some("false".into()))));

    // every statement of a session carries the next sequence number
    let sequence: Vec<u64> = statements.iter().map(|call| call.sequence_id).collect();
    assert_eq!(sequence, (1..=statements.len() as u64).collect::<Vec<_>>());

    Ok(())
}

#[tokio::test]
async fn it_counts_rows_of_multi_table_inserts() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|_| Reply::Success(dml(fake::INSERT, &[3, 2])));

    let mut conn = fake::connect(&fake).await?;

    let done = query("insert all into a values (1) into b values (2) select 1")
        .execute(&mut conn)
        .await?;

    assert_eq!(done.rows_affected(), 5);

    Ok(())
}

#[tokio::test]
async fn it_reports_database_errors() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|call| {
        if call.sql.contains("missing_table") {
            Reply::Failure {
                code: "002003",
                message: "SQL compilation error: Object 'MISSING_TABLE' does not exist or not authorized.",
                sql_state: Some("42S02"),
            }
        } else {
            Reply::Success(fake::ddl())
        }
    });

    let mut conn = fake::connect(&fake).await?;

    let err = query("").execute(&mut conn).await.unwrap_err();
    let db_err = err
        .as_database_error()
        .expect("expected a database error");

    assert_eq!(db_err.code().as_deref(), Some("000900"));
    assert_eq!(db_err.message(), "Empty SQL statement.");

    let snowflake_err = db_err.downcast_ref::<SnowflakeDatabaseError>();
    assert_eq!(snowflake_err.number(), 900);
    assert_eq!(snowflake_err.sql_state(), Some("42000"));
    assert!(snowflake_err.query_id().is_some());

    let err = query("select * from missing_table")
        .fetch_all(&mut conn)
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(2003));
    assert!(err.to_string().contains("MISSING_TABLE"), "{}", err);

    // the connection is still usable
    query("select 1").execute(&mut conn).await?;

    Ok(())
}

#[tokio::test]
async fn it_waits_for_long_running_statements() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|_| Reply::Running {
        polls: 2,
        then: Box::new(Reply::Success(rows(
            vec![column_with_scale("N", "fixed", 38, 0)],
            vec![cells(&[Some("7")])],
            &[],
        ))),
    });

    let mut conn = fake::connect(&fake).await?;

    let n: i64 = query("select count(*) as n from big_table")
        .fetch_one(&mut conn)
        .await?
        .try_get("n")?;

    assert_eq!(n, 7);
    assert_eq!(fake.polls.load(Ordering::SeqCst), 3);
    assert_eq!(fake.aborts.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn it_aborts_statements_that_time_out() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|call| {
        if call.sql.contains("forever") {
            Reply::Hang
        } else {
            Reply::Success(fake::ddl())
        }
    });

    let mut conn = fake::connect(&fake).await?;

    let err = query("call run_forever()")
        .timeout(Duration::from_millis(200))
        .execute(&mut conn)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::TimedOut(d) if d == Duration::from_millis(200)),
        "{:?}",
        err
    );
    assert_eq!(fake.aborts.load(Ordering::SeqCst), 1);

    query("select 1").execute(&mut conn).await?;

    Ok(())
}

#[tokio::test]
async fn it_applies_the_connection_query_timeout() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|_| Reply::Hang);

    let mut conn = fake::options(&fake)
        .query_timeout(Duration::from_millis(150))
        .connect()
        .await?;

    let err = query("call run_forever()").execute(&mut conn).await.unwrap_err();

    assert!(matches!(err, Error::TimedOut(_)), "{:?}", err);
    assert_eq!(fake.aborts.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn it_can_be_cancelled() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|_| Reply::Hang);

    let mut conn = fake::connect(&fake).await?;
    let token = CancellationToken::new();

    tokio::spawn({
        let token = token.clone();

        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        }
    });

    let err = query("call run_forever()")
        .cancel_on(token.clone())
        .execute(&mut conn)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled), "{:?}", err);
    assert_eq!(fake.aborts.load(Ordering::SeqCst), 1);

    // a token that is already cancelled stops the statement before it is sent
    let sent = fake.statements.lock().unwrap().len();

    let err = query("select 1")
        .cancel_on(token)
        .execute(&mut conn)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled), "{:?}", err);
    assert_eq!(fake.statements.lock().unwrap().len(), sent);

    Ok(())
}

#[tokio::test]
async fn it_renews_an_expired_session() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    let mut conn = fake::connect(&fake).await?;

    query("select 1").execute(&mut conn).await?;

    fake.expire_session();

    query("select 2").execute(&mut conn).await?;
    conn.ping().await?;

    assert_eq!(fake.logins.load(Ordering::SeqCst), 1);
    assert_eq!(fake.renewals.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn it_commits_and_rolls_back_transactions() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    let mut conn = fake::connect(&fake).await?;

    let mut tx = conn.begin().await?;
    query("insert into t values (1)").execute(&mut *tx).await?;
    tx.commit().await?;

    let mut tx = conn.begin().await?;
    query("insert into t values (2)").execute(&mut *tx).await?;
    tx.rollback().await?;

    assert_eq!(
        fake.statements(),
        [
            "BEGIN",
            "insert into t values (1)",
            "COMMIT",
            "BEGIN",
            "insert into t values (2)",
            "ROLLBACK",
        ]
    );

    Ok(())
}

#[tokio::test]
async fn it_rolls_back_a_dropped_transaction() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    let mut conn = fake::connect(&fake).await?;

    {
        let mut tx = conn.begin().await?;
        query("insert into t values (1)").execute(&mut *tx).await?;
    }

    // the rollback goes out ahead of the next statement
    query("select 1").execute(&mut conn).await?;

    assert_eq!(
        fake.statements(),
        ["BEGIN", "insert into t values (1)", "ROLLBACK", "select 1"]
    );

    Ok(())
}

#[tokio::test]
async fn it_refuses_nested_transactions() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    let mut conn = fake::connect(&fake).await?;

    let mut tx = conn.begin().await?;
    let err = tx.begin().await.unwrap_err();

    assert!(matches!(err, Error::Unsupported(_)), "{:?}", err);

    tx.rollback().await?;

    Ok(())
}

#[tokio::test]
async fn it_describes_statements() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|call| {
        let mut data = rows(
            vec![
                column_with_scale("ID", "fixed", 38, 0),
                column("NAME", "text"),
                column_with_scale("CREATED_AT", "timestamp_ntz", 0, 3),
            ],
            Vec::new(),
            &[],
        );

        if call.describe_only {
            data["numberOfBinds"] = 1.into();
        }

        Reply::Success(data)
    });

    let mut conn = fake::connect(&fake).await?;

    let statement = conn
        .prepare("select id, name, created_at from users where id = ?")
        .await?;

    assert_eq!(statement.parameters(), 1);
    assert_eq!(statement.columns().len(), 3);
    assert_eq!(statement.columns()[0].name(), "ID");
    assert_eq!(statement.column("name")?.ordinal(), 1);
    assert_eq!(statement.columns()[2].type_info().name(), "TIMESTAMP_NTZ");

    let calls = fake.statements.lock().unwrap().clone();
    assert!(calls[0].describe_only);

    let rows = statement.query().bind(1_i64).fetch_all(&mut conn).await?;
    assert!(rows.is_empty());

    let calls = fake.statements.lock().unwrap().clone();
    assert!(!calls[1].describe_only);
    assert_eq!(calls[1].sql, statement.sql());

    Ok(())
}

#[tokio::test]
async fn it_matches_column_names_without_regard_to_case() -> anyhow::Result<()> {
    let fake = FakeSnowflake::new();
    fake.on_query(|_| {
        Reply::Success(rows(
            vec![
                column_with_scale("ID", "fixed", 38, 0),
                column("id", "text"),
            ],
            vec![cells(&[Some("1"), Some("one")])],
            &[],
        ))
    });

    let mut conn = fake::connect(&fake).await?;
    let row = query("select 1 as ID, 'one' as \"id\"").fetch_one(&mut conn).await?;

    // the first of two same-named columns wins
    assert_eq!(row.try_get::<i64, _>("Id")?, 1);
    assert_eq!(row.try_get::<String, _>(1)?, "one");

    let err = row.try_get::<i64, _>("missing").unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound(_)), "{:?}", err);

    let err = row.try_get::<i64, _>(2).unwrap_err();
    assert!(
        matches!(err, Error::ColumnIndexOutOfBounds { index: 2, len: 2 }),
        "{:?}",
        err
    );

    Ok(())
}
