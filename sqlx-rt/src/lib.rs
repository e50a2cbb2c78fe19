//! Runtime abstraction used by the Snowflake driver.
//! Not intended to be used directly.

#[cfg(not(feature = "_rt-tokio"))]
compile_error!(
    "one of the features ['runtime-tokio-native-tls', 'runtime-tokio-rustls'] must be enabled"
);

pub use tokio;

pub use tokio::{
    select, spawn,
    sync::{oneshot, Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
    time::{sleep, sleep_until, timeout, Instant},
};
