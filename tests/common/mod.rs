use std::future::Future;
use std::time::Duration;

use hotpool::PoolConfig;
use hotpool::WatchConfig;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

pub const WAIT: Duration = Duration::from_secs(3);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

pub fn watch_config() -> WatchConfig {
    WatchConfig {
        channel_capacity: 16,
        restart_interval_secs: 30,
        retry_delay_ms: 10,
        soft_restart_escalation: 3,
    }
}

pub fn pool_config() -> PoolConfig {
    PoolConfig {
        close_grace_secs: 0,
        probe_timeout_ms: 500,
    }
}

/// Minimal broker: answers the protocol header with a `connection.start` frame.
pub async fn spawn_broker() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut header = [0u8; 8];
                if socket.read_exact(&mut header).await.is_ok() {
                    let frame = [1u8, 0, 0, 0, 0, 0, 4, 0, 10, 0, 10, 0xCE];
                    let _ = socket.write_all(&frame).await;
                }
            });
        }
    });
    addr
}

pub async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

/// Polls `check` until it holds or [`WAIT`] elapses.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
