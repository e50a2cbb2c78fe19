//! Request and response bodies of the Snowflake REST protocol.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::Error;
use crate::snowflake::arguments::SnowflakeBinding;

pub(crate) const LOGIN_PATH: &str = "/session/v1/login-request";
pub(crate) const RENEW_PATH: &str = "/session/token-request";
pub(crate) const SESSION_PATH: &str = "/session";
pub(crate) const HEARTBEAT_PATH: &str = "/session/heartbeat";
pub(crate) const QUERY_PATH: &str = "/queries/v1/query-request";
pub(crate) const ABORT_PATH: &str = "/queries/v1/abort-request";

pub(crate) const CLIENT_APP_ID: &str = "sqlx-snowflake";
pub(crate) const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Codes the client reacts to instead of surfacing them.
pub(crate) mod code {
    pub(crate) const QUERY_IN_PROGRESS: &str = "333333";
    pub(crate) const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
    pub(crate) const SESSION_EXPIRED: &str = "390112";
    pub(crate) const MASTER_TOKEN_EXPIRED: &str = "390114";
}

/// Statement type ids of DML statements fall in `0x3000..0x4000`.
pub(crate) fn is_dml(statement_type_id: i64) -> bool {
    (0x3000..0x4000).contains(&statement_type_id)
}

/// The wrapper around every response of the REST API.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub(crate) data: Option<Box<RawValue>>,

    #[serde(default, deserialize_with = "deserialize_code")]
    pub(crate) code: Option<String>,

    #[serde(default)]
    pub(crate) message: Option<String>,

    #[serde(default)]
    pub(crate) success: bool,
}

// codes arrive as strings ("000900") from the query service and as numbers
// from the session service
fn deserialize_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Code>::deserialize(deserializer)? {
        Some(Code::Text(code)) => Some(code),
        Some(Code::Number(code)) => Some(code.to_string()),
        None => None,
    })
}

impl Envelope {
    pub(crate) fn data<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let raw = self
            .data
            .as_deref()
            .ok_or_else(|| err_protocol!("response has no data"))?;

        serde_json::from_str(raw.get())
            .map_err(|err| err_protocol!("malformed response data: {}", err))
    }

    pub(crate) fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    pub(crate) fn code_number(&self) -> Option<i32> {
        self.code.as_deref().and_then(|code| code.trim().parse().ok())
    }

    pub(crate) fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("no message")
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub(crate) data: LoginRequestData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) struct LoginRequestData<'a> {
    pub(crate) client_app_id: &'a str,
    pub(crate) client_app_version: &'a str,
    pub(crate) account_name: &'a str,
    pub(crate) login_name: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) password: Option<&'a str>,

    pub(crate) authenticator: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) token: Option<&'a str>,

    pub(crate) client_environment: ClientEnvironment<'a>,

    pub(crate) session_parameters: IndexMap<&'static str, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) struct ClientEnvironment<'a> {
    pub(crate) application: &'a str,
    pub(crate) os: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponseData {
    pub(crate) token: String,
    pub(crate) master_token: String,

    #[serde(default)]
    pub(crate) validity_in_seconds: Option<u64>,

    #[serde(default)]
    pub(crate) master_validity_in_seconds: Option<u64>,

    #[serde(default)]
    pub(crate) session_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenewRequest<'a> {
    pub(crate) old_session_token: &'a str,
    pub(crate) request_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RenewResponseData {
    #[serde(rename = "sessionToken")]
    pub(crate) session_token: String,

    #[serde(rename = "validityInSecondsST", default)]
    pub(crate) validity_in_seconds: Option<u64>,

    #[serde(rename = "masterToken")]
    pub(crate) master_token: String,

    #[serde(rename = "validityInSecondsMT", default)]
    pub(crate) master_validity_in_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest<'a> {
    pub(crate) sql_text: &'a str,
    pub(crate) async_exec: bool,
    pub(crate) sequence_id: u64,
    pub(crate) is_internal: bool,
    pub(crate) describe_only: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) bindings: Option<IndexMap<String, SnowflakeBinding>>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub(crate) parameters: IndexMap<&'static str, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AbortRequest<'a> {
    pub(crate) sql_text: &'a str,
    pub(crate) request_id: &'a str,
}

/// The `data` of a query response. Failed statements fill in only a few fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct QueryResponseData {
    pub(crate) rowtype: Vec<RowType>,
    pub(crate) rowset: Vec<Vec<Option<String>>>,
    pub(crate) total: Option<u64>,
    pub(crate) query_id: Option<String>,
    pub(crate) chunks: Vec<ChunkInfo>,
    pub(crate) chunk_headers: Option<BTreeMap<String, String>>,
    pub(crate) qrmk: Option<String>,
    pub(crate) get_result_url: Option<String>,
    pub(crate) statement_type_id: Option<i64>,
    pub(crate) query_result_format: Option<String>,
    pub(crate) number_of_binds: Option<usize>,
    pub(crate) sql_state: Option<String>,
}

/// Column metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RowType {
    pub(crate) name: String,

    #[serde(rename = "type")]
    pub(crate) ty: String,

    #[serde(default)]
    pub(crate) precision: Option<u32>,

    #[serde(default)]
    pub(crate) scale: Option<u32>,

    #[serde(default)]
    pub(crate) length: Option<u64>,

    #[serde(default)]
    pub(crate) nullable: Option<bool>,
}

/// A result chunk stored outside the response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChunkInfo {
    pub(crate) url: String,
    pub(crate) row_count: u64,

    #[serde(default)]
    pub(crate) uncompressed_size: Option<u64>,

    #[serde(default)]
    pub(crate) compressed_size: Option<u64>,
}
