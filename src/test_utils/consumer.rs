use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ConfigConsumer;
use crate::Error;
use crate::Result;

/// One call observed by [`RecordingConsumer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Put(String, String),
    Delete(String),
}

/// Consumer that records every call and can be told to fail or panic on a key.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    prefix: String,
    calls: Mutex<Vec<Recorded>>,
    fail_on: Mutex<Option<String>>,
    panic_on: Mutex<Option<String>>,
}

impl RecordingConsumer {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ..Default::default()
        }
    }

    pub fn fail_on(
        self,
        key: &str,
    ) -> Self {
        *self.fail_on.lock() = Some(key.to_string());
        self
    }

    pub fn panic_on(
        self,
        key: &str,
    ) -> Self {
        *self.panic_on.lock() = Some(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().clone()
    }

    /// Polls until at least `n` calls were recorded or `wait` elapses.
    pub async fn wait_for_calls(
        &self,
        n: usize,
        wait: Duration,
    ) -> Vec<Recorded> {
        let deadline = tokio::time::Instant::now() + wait;
        while self.calls.lock().len() < n && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.calls()
    }

    fn check(
        &self,
        key: &str,
    ) -> Result<()> {
        if self.panic_on.lock().as_deref() == Some(key) {
            panic!("consumer panicked on {key}");
        }
        if self.fail_on.lock().as_deref() == Some(key) {
            return Err(Error::Fatal(format!("consumer rejected {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigConsumer for RecordingConsumer {
    async fn on_put(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let key = String::from_utf8_lossy(key).into_owned();
        self.check(&key)?;
        self.calls
            .lock()
            .push(Recorded::Put(key, String::from_utf8_lossy(value).into_owned()));
        Ok(())
    }

    async fn on_delete(
        &self,
        key: &[u8],
    ) -> Result<()> {
        let key = String::from_utf8_lossy(key).into_owned();
        self.check(&key)?;
        self.calls.lock().push(Recorded::Delete(key));
        Ok(())
    }

    fn prefix(&self) -> String {
        self.prefix.clone()
    }
}
