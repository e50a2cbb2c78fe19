//! Login, token renewal and logout.
//!
//! A session holds one token pair at a time. Requests read the current pair;
//! when the server reports the session token expired, the pair is renewed
//! with the master token and the request is sent once more. Renewals are
//! single-flight: they run under the token lock and a renewal started for a
//! pair that has already been replaced is skipped.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use sqlx_rt::AsyncMutex;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::snowflake::auth::Credential;
use crate::snowflake::http::{HttpClient, HttpRequest, HttpResponse};
use crate::snowflake::protocol::{
    self, code, ClientEnvironment, Envelope, LoginRequest, LoginRequestData, LoginResponseData,
    RenewRequest, RenewResponseData,
};
use crate::snowflake::retry::RetryPolicy;

/// What a session needs to log in.
pub(crate) struct SessionConfig {
    pub(crate) base_url: Url,
    pub(crate) account: String,
    pub(crate) user: String,
    pub(crate) credential: Arc<dyn Credential>,
    pub(crate) database: Option<String>,
    pub(crate) schema: Option<String>,
    pub(crate) warehouse: Option<String>,
    pub(crate) role: Option<String>,
    pub(crate) application: String,
    pub(crate) session_parameters: IndexMap<&'static str, serde_json::Value>,
    pub(crate) retry: RetryPolicy,
}

/// The token pair of a logged in session.
#[derive(Debug)]
pub(crate) struct SessionTokens {
    pub(crate) token: String,
    pub(crate) master_token: String,
    pub(crate) session_id: Option<i64>,
    pub(crate) acquired_at: Instant,
    pub(crate) validity: Option<Duration>,
    pub(crate) master_validity: Option<Duration>,
    /// Incremented by every login and renewal.
    pub(crate) generation: u64,
}

impl SessionTokens {
    fn is_expired(&self) -> bool {
        match self.validity {
            Some(validity) => self.acquired_at.elapsed() >= validity,
            None => false,
        }
    }

    fn is_master_expired(&self) -> bool {
        match self.master_validity {
            Some(validity) => self.acquired_at.elapsed() >= validity,
            None => false,
        }
    }

    fn authorization(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }
}

/// A handle to a Snowflake session, cheap to clone.
#[derive(Clone)]
pub(crate) struct Session {
    shared: Arc<Shared>,
}

struct Shared {
    http: Arc<dyn HttpClient>,
    config: SessionConfig,
    tokens: AsyncMutex<Option<Arc<SessionTokens>>>,
}

fn secs(value: Option<u64>) -> Option<Duration> {
    value.filter(|secs| *secs > 0).map(Duration::from_secs)
}

impl Session {
    pub(crate) fn new(http: Arc<dyn HttpClient>, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                http,
                config,
                tokens: AsyncMutex::new(None),
            }),
        }
    }

    pub(crate) fn http(&self) -> &Arc<dyn HttpClient> {
        &self.shared.http
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.shared.config.retry
    }

    /// A URL on the account host. Every URL carries a fresh `request_guid`.
    pub(crate) fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, Error> {
        let mut url = self.shared.config.base_url.join(path)?;

        {
            let mut pairs = url.query_pairs_mut();

            for (key, value) in query {
                pairs.append_pair(key, value);
            }

            pairs.append_pair("request_guid", &Uuid::new_v4().to_string());
        }

        Ok(url)
    }

    /// Logs in, replacing any current token pair.
    pub(crate) async fn authenticate(&self) -> Result<Arc<SessionTokens>, Error> {
        let mut guard = self.shared.tokens.lock().await;
        let generation = guard.as_ref().map_or(0, |tokens| tokens.generation);

        let tokens = Arc::new(self.login(generation + 1).await?);
        *guard = Some(Arc::clone(&tokens));

        Ok(tokens)
    }

    async fn login(&self, generation: u64) -> Result<SessionTokens, Error> {
        let config = &self.shared.config;
        let payload = config
            .credential
            .login_payload(&config.account, &config.user)?;

        let request_id = Uuid::new_v4().to_string();
        let mut query = vec![("requestId", request_id.as_str())];

        for (key, value) in [
            ("databaseName", &config.database),
            ("schemaName", &config.schema),
            ("warehouse", &config.warehouse),
            ("roleName", &config.role),
        ] {
            if let Some(value) = value {
                query.push((key, value.as_str()));
            }
        }

        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: protocol::CLIENT_APP_ID,
                client_app_version: protocol::CLIENT_APP_VERSION,
                account_name: &config.account,
                login_name: &config.user,
                password: payload.password.as_deref(),
                authenticator: payload.authenticator,
                token: payload.token.as_deref(),
                client_environment: ClientEnvironment {
                    application: &config.application,
                    os: std::env::consts::OS,
                },
                session_parameters: config.session_parameters.clone(),
            },
        };

        let request = HttpRequest::post(self.url(protocol::LOGIN_PATH, &query)?).json(&body)?;

        log::debug!(
            "logging in to account {} as {} ({})",
            config.account,
            config.user,
            payload.authenticator
        );

        let response = self.send_raw(request).await?;
        let envelope = authentication_envelope(&response)?;
        let data: LoginResponseData = envelope.data()?;

        Ok(SessionTokens {
            token: data.token,
            master_token: data.master_token,
            session_id: data.session_id,
            acquired_at: Instant::now(),
            validity: secs(data.validity_in_seconds),
            master_validity: secs(data.master_validity_in_seconds),
            generation,
        })
    }

    /// The current token pair, renewed first if its validity has run out.
    pub(crate) async fn current(&self) -> Result<Arc<SessionTokens>, Error> {
        let tokens = self
            .shared
            .tokens
            .lock()
            .await
            .clone()
            .ok_or_else(|| err_protocol!("session is not logged in"))?;

        if tokens.is_expired() {
            log::debug!("session token validity elapsed; renewing");
            return self.renew(&tokens).await;
        }

        Ok(tokens)
    }

    /// Replaces `observed` with a fresh token pair.
    ///
    /// If `observed` was already replaced, the replacement is returned
    /// without contacting the server. The renewal runs in its own task so
    /// that a caller giving up halfway never leaves it unfinished.
    pub(crate) async fn renew(
        &self,
        observed: &Arc<SessionTokens>,
    ) -> Result<Arc<SessionTokens>, Error> {
        let session = self.clone();
        let generation = observed.generation;

        sqlx_rt::spawn(async move { session.renew_if_current(generation).await })
            .await
            .map_err(|_| Error::WorkerCrashed)?
    }

    async fn renew_if_current(&self, observed: u64) -> Result<Arc<SessionTokens>, Error> {
        let mut guard = self.shared.tokens.lock().await;

        let current = guard
            .clone()
            .ok_or_else(|| err_protocol!("session is not logged in"))?;

        if current.generation != observed {
            return Ok(current);
        }

        let renewed = if current.is_master_expired() {
            None
        } else {
            self.renew_request(&current).await?
        };

        let renewed = match renewed {
            Some(renewed) => renewed,

            None => {
                log::debug!("master token expired; logging in again");
                self.login(current.generation + 1).await?
            }
        };

        let renewed = Arc::new(renewed);
        *guard = Some(Arc::clone(&renewed));

        Ok(renewed)
    }

    /// `None` when the master token has expired too.
    async fn renew_request(&self, current: &SessionTokens) -> Result<Option<SessionTokens>, Error> {
        let request_id = Uuid::new_v4().to_string();
        let request = HttpRequest::post(
            self.url(protocol::RENEW_PATH, &[("requestId", request_id.as_str())])?,
        )
        .header(
            "Authorization",
            format!("Snowflake Token=\"{}\"", current.master_token),
        )
        .json(&RenewRequest {
            old_session_token: &current.token,
            request_type: "RENEW",
        })?;

        let response = self.send_raw(request).await?;

        if response.status == 401 {
            return Ok(None);
        }

        let envelope: Envelope = response.json()?;

        if envelope.has_code(code::MASTER_TOKEN_EXPIRED) {
            return Ok(None);
        }

        if !envelope.success {
            return Err(Error::Authentication {
                code: envelope.code_number(),
                message: envelope.message().to_owned(),
            });
        }

        let data: RenewResponseData = envelope.data()?;

        log::debug!("renewed session token");

        Ok(Some(SessionTokens {
            token: data.session_token,
            master_token: data.master_token,
            session_id: current.session_id,
            acquired_at: Instant::now(),
            validity: secs(data.validity_in_seconds),
            master_validity: secs(data.master_validity_in_seconds).or(current.master_validity),
            generation: current.generation + 1,
        }))
    }

    /// Sends `request` through the retry policy without session handling.
    pub(crate) async fn send_raw(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let http = &self.shared.http;

        self.shared
            .config
            .retry
            .run(
                |_| {
                    let request = request.clone();
                    async move { http.send(request).await?.check_status() }
                },
                Error::is_transient,
            )
            .await
    }

    /// Sends `request` with the session token attached.
    ///
    /// An expired session token is renewed and the request sent once more.
    pub(crate) async fn send(&self, request: HttpRequest) -> Result<Envelope, Error> {
        let mut tokens = self.current().await?;
        let mut renewed = false;

        loop {
            let response = self
                .send_raw(
                    request
                        .clone()
                        .header("Authorization", tokens.authorization()),
                )
                .await?;

            let envelope = if response.status == 401 {
                None
            } else {
                Some(response.json::<Envelope>()?)
            };

            let expired = envelope
                .as_ref()
                .map_or(true, |envelope| envelope.has_code(code::SESSION_EXPIRED));

            match envelope {
                Some(envelope) if !expired => return Ok(envelope),

                _ if !renewed => {
                    log::debug!("session token rejected; renewing");
                    tokens = self.renew(&tokens).await?;
                    renewed = true;
                }

                envelope => {
                    // a fresh token was refused too; the session is gone
                    self.invalidate().await;

                    return Err(Error::Authentication {
                        code: envelope.as_ref().and_then(Envelope::code_number),
                        message: envelope.as_ref().map_or_else(
                            || "session token rejected after renewal".to_owned(),
                            |envelope| envelope.message().to_owned(),
                        ),
                    });
                }
            }
        }
    }

    /// Keeps the session alive; used to check the connection.
    pub(crate) async fn heartbeat(&self) -> Result<(), Error> {
        let request = HttpRequest::post(self.url(protocol::HEARTBEAT_PATH, &[])?)
            .json(&serde_json::json!({}))?;

        let envelope = self.send(request).await?;

        if !envelope.success {
            return Err(Error::Authentication {
                code: envelope.code_number(),
                message: envelope.message().to_owned(),
            });
        }

        Ok(())
    }

    /// Ends the session on the server and forgets the tokens.
    pub(crate) async fn logout(&self) -> Result<(), Error> {
        let tokens = self.shared.tokens.lock().await.take();

        let tokens = match tokens {
            Some(tokens) => tokens,
            None => return Ok(()),
        };

        let request = HttpRequest::post(self.url(protocol::SESSION_PATH, &[("delete", "true")])?)
            .header("Authorization", tokens.authorization())
            .json(&serde_json::json!({}))?;

        let response = self.send_raw(request).await?;

        if response.status == 401 {
            // the session was already gone
            return Ok(());
        }

        let envelope: Envelope = response.json()?;

        if !envelope.success && !envelope.has_code(code::SESSION_EXPIRED) {
            log::warn!("logout failed: {}", envelope.message());
        }

        Ok(())
    }

    /// Forgets the tokens without telling the server.
    pub(crate) async fn invalidate(&self) {
        self.shared.tokens.lock().await.take();
    }
}

fn authentication_envelope(response: &HttpResponse) -> Result<Envelope, Error> {
    if response.status == 401 {
        return Err(Error::Authentication {
            code: None,
            message: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }

    let envelope: Envelope = response.json()?;

    if !envelope.success {
        return Err(Error::Authentication {
            code: envelope.code_number(),
            message: envelope.message().to_owned(),
        });
    }

    Ok(envelope)
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.shared.config.base_url.as_str())
            .field("account", &self.shared.config.account)
            .field("user", &self.shared.config.user)
            .finish()
    }
}
