use std::sync::Arc;

use crate::error::Error;
use crate::snowflake::downloader::ChunkDownloader;
use crate::snowflake::http::{HttpClient, ReqwestClient};
use crate::snowflake::session::{Session, SessionConfig};
use crate::snowflake::{SnowflakeConnectOptions, SnowflakeConnection};

impl SnowflakeConnection {
    pub(crate) async fn establish(options: &SnowflakeConnectOptions) -> Result<Self, Error> {
        if options.account.is_empty() {
            return Err(Error::Configuration("an account is required".into()));
        }

        if options.user.is_empty() {
            return Err(Error::Configuration("a user is required".into()));
        }

        let http: Arc<dyn HttpClient> = match &options.http_client {
            Some(client) => Arc::clone(client),
            None => Arc::new(ReqwestClient::new(options.request_timeout)?),
        };

        let session = Session::new(
            Arc::clone(&http),
            SessionConfig {
                base_url: options.base_url()?,
                account: account_name(&options.account).to_owned(),
                user: options.user.clone(),
                credential: options.resolve_credential()?,
                database: options.database.clone(),
                schema: options.schema.clone(),
                warehouse: options.warehouse.clone(),
                role: options.role.clone(),
                application: options.application.clone(),
                session_parameters: options.session_parameters(),
                retry: options.retry.clone(),
            },
        );

        let tokens = match options.login_timeout {
            Some(timeout) => sqlx_rt::timeout(timeout, session.authenticate())
                .await
                .map_err(|_| Error::TimedOut(timeout))??,

            None => session.authenticate().await?,
        };

        log::debug!(
            "connected to account {} (session {})",
            options.account,
            tokens
                .session_id
                .map_or_else(|| "-".to_owned(), |id| id.to_string())
        );

        Ok(Self {
            session,
            downloader: ChunkDownloader::new(
                http,
                options.retry.clone(),
                options.client_prefetch_threads,
            ),
            sequence_id: 0,
            transaction_depth: 0,
            pending_rollback: false,
            query_timeout: options.query_timeout,
            log_settings: options.log_settings.clone(),
        })
    }
}

// the login names the account without its region or cloud
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}
