//! The HTTP transport.
//!
//! Everything the driver sends goes through [`HttpClient`], so tests can
//! swap the network for a scripted server.

use std::fmt::{self, Debug, Formatter};
use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_core::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request as handed to the transport.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// A response with its body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Sends HTTP requests on behalf of the driver.
///
/// Implementations report transport failures (connection refused, reset,
/// timeouts) as [`Error::Io`] so the retry policy can tell them apart from
/// answers the server gave.
pub trait HttpClient: Send + Sync + 'static {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, Error>>;
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: Url) -> Self {
        Self {
            method: HttpMethod::Post,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(body)?.into());

        Ok(self
            .header("Content-Type", "application/json")
            .header("Accept", "application/json"))
    }

    /// Looks up a header, ignoring the case of its name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The value of a query string parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

// headers carry tokens
impl Debug for HttpRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut url = self.url.clone();
        url.set_query(None);

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &url.as_str())
            .field("body_len", &self.body.as_ref().map_or(0, Bytes::len))
            .finish()
    }
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|err| {
            err_protocol!(
                "malformed response body (HTTP {}): {}",
                self.status,
                err
            )
        })
    }

    /// Turns statuses other than success and `401 Unauthorized` into [`Error::Http`].
    ///
    /// A 401 is left for the session layer, which renews its token and retries.
    pub(crate) fn check_status(self) -> Result<Self, Error> {
        if self.is_success() || self.status == 401 {
            return Ok(self);
        }

        let message = String::from_utf8_lossy(&self.body[..self.body.len().min(256)]).into_owned();

        Err(Error::Http {
            status: self.status,
            message,
        })
    }
}

/// The default transport, built on `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("sqlx-snowflake/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().map_err(Error::config)?,
        })
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else if err.is_connect() {
        io::ErrorKind::ConnectionRefused
    } else if err.is_builder() {
        return Error::config(err);
    } else {
        io::ErrorKind::Other
    };

    Error::Io(io::Error::new(kind, err))
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, Error>> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(request.url),
                HttpMethod::Post => self.client.post(request.url),
            };

            for (name, value) in request.headers {
                builder = builder.header(name, value);
            }

            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(transport_error)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(transport_error)?;

            Ok(HttpResponse { status, body })
        })
    }
}
