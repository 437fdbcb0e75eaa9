//! Mock collaborators for batcher and facade tests.

use crate::cache::TrackCache;
use crate::client::TrackSource;
use crate::errors::{CacheError, FetchError};
use crate::models::{TrackEvent, TrackKey, TrackRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What the mock upstream does with the next batch.
#[derive(Clone)]
pub enum SourceMode {
    /// Return a record for every key.
    AllFound,
    /// Return records only for the listed keys.
    Found(HashSet<TrackKey>),
    /// Fail with a caller-attributable error.
    ClientError(String),
    /// Fail with a transient infrastructure error.
    Unavailable,
    /// Sleep before answering, then return a record for every key.
    SlowAllFound(Duration),
}

pub struct MockTrackSource {
    mode: Mutex<SourceMode>,
    calls: Mutex<Vec<Vec<TrackKey>>>,
}

impl MockTrackSource {
    pub fn new(mode: SourceMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: SourceMode) {
        *self.mode.lock() = mode;
    }

    /// Key sets of every `fetch_batch` call, in call order.
    pub fn calls(&self) -> Vec<Vec<TrackKey>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The key rides in `countries[0]` so tests can assert each caller got
    /// the response for exactly its key.
    pub fn record_for(key: &str) -> TrackRecord {
        TrackRecord {
            countries: vec![key.to_string(), "Unknown".to_string()],
            events: vec![TrackEvent {
                status: "Package received".into(),
                date: "2024-03-01T10:00:00Z".into(),
            }],
        }
    }
}

#[async_trait]
impl TrackSource for MockTrackSource {
    async fn fetch_batch(
        &self,
        _cancel: &CancellationToken,
        keys: &[TrackKey],
    ) -> Result<HashMap<TrackKey, TrackRecord>, FetchError> {
        self.calls.lock().push(keys.to_vec());
        let mode = self.mode.lock().clone();

        let all = |keys: &[TrackKey]| {
            keys.iter()
                .map(|key| (key.clone(), Self::record_for(key)))
                .collect::<HashMap<_, _>>()
        };

        match mode {
            SourceMode::AllFound => Ok(all(keys)),
            SourceMode::Found(known) => Ok(keys
                .iter()
                .filter(|key| known.contains(*key))
                .map(|key| (key.clone(), Self::record_for(key)))
                .collect()),
            SourceMode::ClientError(message) => Err(FetchError::InvalidCode(message)),
            SourceMode::Unavailable => {
                Err(FetchError::RequestFailed("connection refused".into()))
            }
            SourceMode::SlowAllFound(delay) => {
                tokio::time::sleep(delay).await;
                Ok(all(keys))
            }
        }
    }

    async fn health(&self, _cancel: &CancellationToken) -> Result<(), FetchError> {
        Ok(())
    }
}

pub struct MockTrackCache {
    entries: Mutex<HashMap<TrackKey, TrackRecord>>,
    fail_reads: Mutex<bool>,
}

impl MockTrackCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fail_reads: Mutex::new(false),
        }
    }

    pub fn prime(&self, key: &str, record: TrackRecord) {
        self.entries.lock().insert(key.to_string(), record);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }
}

#[async_trait]
impl TrackCache for MockTrackCache {
    async fn get_track_data(
        &self,
        _cancel: &CancellationToken,
        key: &str,
    ) -> Result<Option<TrackRecord>, CacheError> {
        if *self.fail_reads.lock() {
            return Err(CacheError::Unavailable("mock read failure".into()));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set_track_data(
        &self,
        _cancel: &CancellationToken,
        key: &str,
        record: &TrackRecord,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn health(&self, _cancel: &CancellationToken) -> Result<(), CacheError> {
        Ok(())
    }
}
