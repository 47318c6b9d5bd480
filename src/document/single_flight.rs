// src/document/single_flight.rs
//! Per-key memoization of in-flight lookups.

use crate::error::AppError;
use futures::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type SharedLookup<V> = Shared<BoxFuture<'static, Result<V, Arc<AppError>>>>;

/// Deduplicates lookups by key.
///
/// The first caller for a key starts the lookup; every later caller for
/// the same key, whether the lookup is still running or has finished,
/// awaits that same result. Failures are shared too, so a failing key is
/// requested once.
pub struct SingleFlight<V> {
    lookups: Mutex<HashMap<String, SharedLookup<V>>>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            lookups: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V, Arc<AppError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, AppError>> + Send + 'static,
    {
        let lookup = {
            let mut lookups = self.lookups.lock();
            lookups
                .entry(key.to_string())
                .or_insert_with(|| fetch().map_err(Arc::new).boxed().shared())
                .clone()
        };
        lookup.await
    }

    /// Number of distinct keys looked up so far.
    pub fn len(&self) -> usize {
        self.lookups.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
