use std::future::Future;
use std::time::Duration;

use sqlx_rt::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Cancellation scope of a statement: a token the caller may trigger and an
/// optional deadline.
///
/// Every suspension point of a statement (submission, polling, chunk fetches
/// and the consumer of the row stream) races against it.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Adds a deadline `timeout` from now. The earlier deadline wins.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;

        match self.deadline {
            Some((current, _)) if current <= at => {}
            _ => self.deadline = Some((at, timeout)),
        }

        self
    }

    /// A scope cancelled along with this one, which can also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails if the scope was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), Error> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => Err(Error::TimedOut(timeout)),
            _ => Ok(()),
        }
    }

    /// Runs `fut` unless the scope is cancelled or times out first.
    ///
    /// Cancellation is checked first, so an already cancelled scope never
    /// polls `fut`.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let deadline = self.deadline;

        let expired = async move {
            match deadline {
                Some((at, timeout)) => {
                    sqlx_rt::sleep_until(at).await;
                    timeout
                }

                None => std::future::pending().await,
            }
        };

        sqlx_rt::select! {
            biased;

            _ = self.token.cancelled() => Err(Error::Cancelled),
            timeout = expired => Err(Error::TimedOut(timeout)),
            result = fut => result,
        }
    }

    /// Sleeps for `duration`, waking early with an error on cancellation.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Error> {
        self.run(async move {
            sqlx_rt::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
