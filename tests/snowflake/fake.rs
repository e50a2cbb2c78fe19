//! An in-process stand-in for the Snowflake REST API.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use sqlx_snowflake::snowflake::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy, SnowflakeConnectOptions,
    SnowflakeConnection,
};
use sqlx_snowflake::{ConnectOptions, Error};

pub const SELECT: i64 = 0x1000;
pub const INSERT: i64 = 0x3100;
pub const UPDATE: i64 = 0x3200;
pub const DELETE: i64 = 0x3300;
pub const DDL: i64 = 0x6000;

/// A statement as the server received it.
#[derive(Debug, Clone)]
pub struct QueryCall {
    pub sql: String,
    pub bindings: Value,
    pub describe_only: bool,
    pub sequence_id: u64,
    pub request_id: String,
}

impl QueryCall {
    /// The type and value of bind parameter `position` (1-based).
    pub fn binding(&self, position: usize) -> Option<(String, Option<String>)> {
        let binding = self.bindings.get(position.to_string())?;

        Some((
            binding["type"].as_str()?.to_owned(),
            binding["value"].as_str().map(str::to_owned),
        ))
    }

    pub fn bound_bool(&self, position: usize) -> bool {
        self.binding(position)
            .and_then(|(_, value)| value)
            .map_or(false, |value| value == "1" || value.eq_ignore_ascii_case("true"))
    }
}

/// How the server answers a statement.
pub enum Reply {
    Success(Value),
    Failure {
        code: &'static str,
        message: &'static str,
        sql_state: Option<&'static str>,
    },
    /// Answers "in progress" for `polls` result requests, then `then`.
    Running { polls: u32, then: Box<Reply> },
    /// Never completes.
    Hang,
}

struct Chunk {
    body: Vec<u8>,
    delay: Duration,
    failures_left: u32,
}

struct Tokens {
    generation: u32,
    expired: bool,
}

type Handler = Arc<dyn Fn(&QueryCall) -> Reply + Send + Sync>;

pub struct FakeSnowflake {
    handler: Mutex<Handler>,
    tokens: Mutex<Tokens>,
    running: Mutex<HashMap<String, (u32, Option<Reply>)>>,
    chunks: Mutex<HashMap<String, Chunk>>,
    next_id: AtomicU32,
    pub statements: Mutex<Vec<QueryCall>>,
    pub chunk_requests: Mutex<Vec<HttpRequest>>,
    pub login_bodies: Mutex<Vec<Value>>,
    pub logins: AtomicU32,
    pub renewals: AtomicU32,
    pub polls: AtomicU32,
    pub aborts: AtomicU32,
    pub heartbeats: AtomicU32,
    pub logouts: AtomicU32,
    chunks_in_flight: AtomicU32,
    pub max_chunks_in_flight: AtomicU32,
    reject_logins: AtomicBool,
}

impl FakeSnowflake {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handler: Mutex::new(Arc::new(|_: &QueryCall| Reply::Success(ddl()))),
            tokens: Mutex::new(Tokens {
                generation: 0,
                expired: false,
            }),
            running: Mutex::new(HashMap::new()),
            chunks: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(0),
            statements: Mutex::new(Vec::new()),
            chunk_requests: Mutex::new(Vec::new()),
            login_bodies: Mutex::new(Vec::new()),
            logins: AtomicU32::new(0),
            renewals: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            aborts: AtomicU32::new(0),
            heartbeats: AtomicU32::new(0),
            logouts: AtomicU32::new(0),
            chunks_in_flight: AtomicU32::new(0),
            max_chunks_in_flight: AtomicU32::new(0),
            reject_logins: AtomicBool::new(false),
        })
    }

    pub fn on_query(&self, handler: impl Fn(&QueryCall) -> Reply + Send + Sync + 'static) {
        *self.handler.lock().unwrap() = Arc::new(handler);
    }

    /// The next request carrying the current session token is told it expired.
    pub fn expire_session(&self) {
        self.tokens.lock().unwrap().expired = true;
    }

    pub fn reject_logins(&self) {
        self.reject_logins.store(true, Ordering::SeqCst);
    }

    /// Stores a chunk of rows and returns its URL.
    ///
    /// The body is written the way the stage holds it: rows without the
    /// enclosing brackets, optionally gzip compressed.
    pub fn add_chunk(
        &self,
        rows: &[Vec<Option<String>>],
        gzip: bool,
        delay: Duration,
        failures: u32,
    ) -> String {
        let json = serde_json::to_string(rows).unwrap();
        let bare = json[1..json.len() - 1].as_bytes().to_vec();

        let body = if gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&bare).unwrap();
            encoder.finish().unwrap()
        } else {
            bare
        };

        let mut chunks = self.chunks.lock().unwrap();
        let url = format!("https://stage.fake.test/chunks/{}?sig=abc", chunks.len());

        chunks.insert(
            url_path(&url),
            Chunk {
                body,
                delay,
                failures_left: failures,
            },
        );

        url
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.sql.clone())
            .collect()
    }

    fn query_id(&self) -> String {
        format!("01fake-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn session_token(generation: u32) -> String {
        format!("session-{}", generation)
    }

    fn master_token(generation: u32) -> String {
        format!("master-{}", generation)
    }

    /// `None` when the session token is valid.
    fn reject(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let tokens = self.tokens.lock().unwrap();
        let expected = format!(
            "Snowflake Token=\"{}\"",
            Self::session_token(tokens.generation)
        );

        match request.header_value("Authorization") {
            Some(value) if value == expected && !tokens.expired => None,
            Some(value) if value == expected => Some(envelope(json!({
                "data": null,
                "code": "390112",
                "message": "Your session has expired. Please login again.",
                "success": false
            }))),
            _ => Some(HttpResponse::new(401, "unauthorized")),
        }
    }

    fn login(&self, request: &HttpRequest) -> HttpResponse {
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or(&b"{}"[..])).unwrap();
        self.login_bodies.lock().unwrap().push(body);

        if self.reject_logins.load(Ordering::SeqCst) {
            return envelope(json!({
                "data": null,
                "code": 390100,
                "message": "Incorrect username or password was specified.",
                "success": false
            }));
        }

        self.logins.fetch_add(1, Ordering::SeqCst);

        let mut tokens = self.tokens.lock().unwrap();
        tokens.generation += 1;
        tokens.expired = false;

        envelope(json!({
            "data": {
                "token": Self::session_token(tokens.generation),
                "masterToken": Self::master_token(tokens.generation),
                "validityInSeconds": 3600,
                "masterValidityInSeconds": 14400,
                "sessionId": 42
            },
            "success": true
        }))
    }

    fn renew(&self, request: &HttpRequest) -> HttpResponse {
        let mut tokens = self.tokens.lock().unwrap();
        let expected = format!(
            "Snowflake Token=\"{}\"",
            Self::master_token(tokens.generation)
        );

        if request.header_value("Authorization") != Some(expected.as_str()) {
            return envelope(json!({
                "data": null,
                "code": "390114",
                "message": "Authentication token has expired.",
                "success": false
            }));
        }

        self.renewals.fetch_add(1, Ordering::SeqCst);
        tokens.generation += 1;
        tokens.expired = false;

        envelope(json!({
            "data": {
                "sessionToken": Self::session_token(tokens.generation),
                "validityInSecondsST": 3600,
                "masterToken": Self::master_token(tokens.generation),
                "validityInSecondsMT": 14400
            },
            "success": true
        }))
    }

    fn submit(&self, request: &HttpRequest) -> HttpResponse {
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or(&b"{}"[..])).unwrap();

        let call = QueryCall {
            sql: body["sqlText"].as_str().unwrap_or_default().to_owned(),
            bindings: body.get("bindings").cloned().unwrap_or(Value::Null),
            describe_only: body["describeOnly"].as_bool().unwrap_or(false),
            sequence_id: body["sequenceId"].as_u64().unwrap_or(0),
            request_id: request.query_param("requestId").unwrap_or_default(),
        };

        self.statements.lock().unwrap().push(call.clone());

        let reply = if call.sql.trim().is_empty() {
            Reply::Failure {
                code: "000900",
                message: "Empty SQL statement.",
                sql_state: Some("42000"),
            }
        } else {
            let handler = Arc::clone(&*self.handler.lock().unwrap());
            handler(&call)
        };

        self.answer(self.query_id(), reply)
    }

    fn answer(&self, query_id: String, reply: Reply) -> HttpResponse {
        match reply {
            Reply::Success(mut data) => {
                data["queryId"] = json!(query_id);
                envelope(json!({ "data": data, "code": null, "message": null, "success": true }))
            }

            Reply::Failure {
                code,
                message,
                sql_state,
            } => envelope(json!({
                "data": { "sqlState": sql_state, "queryId": query_id },
                "code": code,
                "message": message,
                "success": false
            })),

            Reply::Running { polls, then } => {
                self.running
                    .lock()
                    .unwrap()
                    .insert(query_id.clone(), (polls, Some(*then)));

                in_progress(&query_id, "333334")
            }

            Reply::Hang => {
                self.running
                    .lock()
                    .unwrap()
                    .insert(query_id.clone(), (u32::MAX, None));

                in_progress(&query_id, "333334")
            }
        }
    }

    fn poll(&self, query_id: &str) -> HttpResponse {
        self.polls.fetch_add(1, Ordering::SeqCst);

        let mut running = self.running.lock().unwrap();

        let finished = match running.get_mut(query_id) {
            None => return HttpResponse::new(404, "no such query"),
            Some((_, None)) => false,
            Some((0, Some(_))) => true,
            Some((polls, Some(_))) => {
                *polls -= 1;
                false
            }
        };

        if !finished {
            return in_progress(query_id, "333333");
        }

        let reply = running.remove(query_id).and_then(|(_, reply)| reply);
        drop(running);

        match reply {
            Some(reply) => self.answer(query_id.to_owned(), reply),
            None => in_progress(query_id, "333333"),
        }
    }

    async fn chunk(&self, request: HttpRequest) -> HttpResponse {
        self.chunk_requests.lock().unwrap().push(request.clone());

        let (body, delay, fail) = {
            let mut chunks = self.chunks.lock().unwrap();

            match chunks.get_mut(request.url.path()) {
                None => return HttpResponse::new(404, "no such chunk"),

                Some(chunk) => {
                    let fail = chunk.failures_left > 0;

                    if fail && chunk.failures_left != u32::MAX {
                        chunk.failures_left -= 1;
                    }

                    (chunk.body.clone(), chunk.delay, fail)
                }
            }
        };

        let in_flight = self.chunks_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_chunks_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        tokio::time::sleep(delay).await;

        self.chunks_in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            HttpResponse::new(503, "SlowDown")
        } else {
            HttpResponse::new(200, body)
        }
    }

    async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let path = request.url.path().to_owned();

        if path.starts_with("/chunks/") {
            return Ok(self.chunk(request).await);
        }

        let response = match (request.method, path.as_str()) {
            (HttpMethod::Post, "/session/v1/login-request") => self.login(&request),
            (HttpMethod::Post, "/session/token-request") => self.renew(&request),

            (HttpMethod::Post, "/session/heartbeat") => match self.reject(&request) {
                Some(rejection) => rejection,
                None => {
                    self.heartbeats.fetch_add(1, Ordering::SeqCst);
                    envelope(json!({ "data": null, "success": true }))
                }
            },

            (HttpMethod::Post, "/session") => {
                self.logouts.fetch_add(1, Ordering::SeqCst);
                envelope(json!({ "data": null, "success": true }))
            }

            (HttpMethod::Post, "/queries/v1/query-request") => match self.reject(&request) {
                Some(rejection) => rejection,
                None => self.submit(&request),
            },

            (HttpMethod::Post, "/queries/v1/abort-request") => {
                self.aborts.fetch_add(1, Ordering::SeqCst);
                envelope(json!({ "data": null, "success": true }))
            }

            (HttpMethod::Get, path) if path.starts_with("/queries/") => {
                match self.reject(&request) {
                    Some(rejection) => rejection,
                    None => {
                        let query_id = path
                            .trim_start_matches("/queries/")
                            .trim_end_matches("/result")
                            .to_owned();

                        self.poll(&query_id)
                    }
                }
            }

            _ => HttpResponse::new(404, "not found"),
        };

        Ok(response)
    }
}

impl HttpClient for FakeSnowflake {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, Error>> {
        Box::pin(self.handle(request))
    }
}

fn url_path(url: &str) -> String {
    url::Url::parse(url).unwrap().path().to_owned()
}

fn envelope(body: Value) -> HttpResponse {
    HttpResponse::new(200, serde_json::to_vec(&body).unwrap())
}

fn in_progress(query_id: &str, code: &str) -> HttpResponse {
    envelope(json!({
        "data": {
            "queryId": query_id,
            "getResultUrl": format!("/queries/{}/result", query_id)
        },
        "code": code,
        "message": "Asynchronous execution in progress. Use provided query id to perform query monitoring and management.",
        "success": true
    }))
}

/// Column metadata as found in `rowtype`.
pub fn column(name: &str, ty: &str) -> Value {
    json!({ "name": name, "type": ty, "nullable": true })
}

pub fn column_with_scale(name: &str, ty: &str, precision: u32, scale: u32) -> Value {
    json!({ "name": name, "type": ty, "precision": precision, "scale": scale, "nullable": true })
}

pub fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
    values.iter().map(|value| value.map(str::to_owned)).collect()
}

/// A result set with `inline` rows and remote chunks of the given row counts.
pub fn rows(rowtype: Vec<Value>, inline: Vec<Vec<Option<String>>>, chunks: &[(String, usize)]) -> Value {
    let total = inline.len() + chunks.iter().map(|(_, count)| count).sum::<usize>();

    let mut data = json!({
        "rowtype": rowtype,
        "rowset": inline,
        "total": total,
        "returned": total,
        "statementTypeId": SELECT,
        "queryResultFormat": "json",
    });

    if !chunks.is_empty() {
        data["chunks"] = chunks
            .iter()
            .map(|(url, count)| json!({ "url": url, "rowCount": count }))
            .collect();
        data["qrmk"] = json!("c2VjcmV0LWtleQ==");
    }

    data
}

/// The single row a DML statement answers with.
pub fn dml(statement_type_id: i64, counts: &[u64]) -> Value {
    let rowtype: Vec<Value> = counts
        .iter()
        .enumerate()
        .map(|(i, _)| column_with_scale(&format!("count {}", i), "fixed", 38, 0))
        .collect();

    json!({
        "rowtype": rowtype,
        "rowset": [counts.iter().map(|count| count.to_string()).collect::<Vec<_>>()],
        "total": 1,
        "returned": 1,
        "statementTypeId": statement_type_id,
        "queryResultFormat": "json",
    })
}

pub fn ddl() -> Value {
    json!({
        "rowtype": [{ "name": "status", "type": "text" }],
        "rowset": [["Statement executed successfully."]],
        "total": 1,
        "returned": 1,
        "statementTypeId": DDL,
        "queryResultFormat": "json",
    })
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

pub fn options(fake: &Arc<FakeSnowflake>) -> SnowflakeConnectOptions {
    let _ = env_logger::builder().is_test(true).try_init();

    SnowflakeConnectOptions::new()
        .account("fake")
        .user("tester")
        .password("secret")
        .database("TEST_DB")
        .schema("PUBLIC")
        .warehouse("TEST_WH")
        .http_client(Arc::clone(fake) as Arc<dyn HttpClient>)
        .retry_policy(fast_retry(3))
        .client_prefetch_threads(3)
}

pub async fn connect(fake: &Arc<FakeSnowflake>) -> anyhow::Result<SnowflakeConnection> {
    Ok(options(fake).connect().await?)
}
