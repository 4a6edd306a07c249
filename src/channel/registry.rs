//! Process-wide registry of opened channel images.
//!
//! The registry is the "image cache" of the system: opening a pyramid means
//! parsing its directory chain, so opened images are kept in an LRU cache
//! keyed by full path and shared across requests. Opens are coordinated with
//! a singleflight pattern so that at most one task parses any given image at
//! a time; concurrent requesters wait for the leader's result.
//!
//! Because cached images are shared, the histogram memoized on a
//! [`ChannelImage`] by one request is immediately visible to every other
//! request for the same path.

use std::collections::HashMap;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use crate::error::FormatError;
use crate::format::TiffPyramid;

use super::image::ChannelImage;
use super::source::ChannelSource;

/// Default capacity of the image cache (number of channel images).
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 100;

/// Registry and cache for opened channel images.
pub struct ChannelRegistry<S: ChannelSource> {
    /// The source for creating range readers
    source: S,

    /// Cached images indexed by full path
    cache: RwLock<LruCache<String, Arc<ChannelImage<S::Reader>>>>,

    /// In-flight opens for the singleflight pattern
    in_flight: Mutex<HashMap<String, Arc<InFlightState<S>>>>,
}

/// State for an in-flight image open.
struct InFlightState<S: ChannelSource> {
    /// Notification for waiters
    notify: Notify,
    /// Result of the open operation (set when complete)
    result: Mutex<Option<Result<Arc<ChannelImage<S::Reader>>, FormatError>>>,
}

impl<S: ChannelSource> ChannelRegistry<S> {
    /// Create a registry with the default cache capacity.
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_IMAGE_CACHE_CAPACITY)
    }

    /// Create a registry with a custom cache capacity.
    pub fn with_capacity(source: S, capacity: usize) -> Self {
        Self {
            source,
            cache: RwLock::new(LruCache::new(
                std::num::NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get a channel image, opening and caching it if necessary.
    ///
    /// Concurrent calls for the same path perform a single open; every
    /// caller receives the same shared instance.
    pub async fn get_image(
        &self,
        path: &str,
    ) -> Result<Arc<ChannelImage<S::Reader>>, FormatError> {
        // Fast path: check cache
        {
            let mut cache = self.cache.write().await;
            if let Some(image) = cache.get(path) {
                return Ok(image.clone());
            }
        }

        // Slow path: join an in-flight open or become the leader
        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(state) = in_flight.get(path) {
                    state.clone()
                } else {
                    let state = Arc::new(InFlightState::<S> {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(path.to_string(), state.clone());
                    drop(in_flight);

                    let result = self.open_image(path).await;

                    {
                        let mut result_guard = state.result.lock().await;
                        *result_guard = Some(result.clone());
                    }

                    if let Ok(ref image) = result {
                        let mut cache = self.cache.write().await;
                        cache.put(path.to_string(), image.clone());
                    }

                    {
                        let mut in_flight = self.in_flight.lock().await;
                        in_flight.remove(path);
                    }
                    state.notify.notify_waiters();

                    return result;
                }
            };

            // Wait for the leader to finish
            state.notify.notified().await;

            let result_guard = state.result.lock().await;
            if let Some(ref result) = *result_guard {
                return result.clone();
            }
            // Result not yet available; loop back (shouldn't normally happen)
        }
    }

    /// Open an image without caching.
    async fn open_image(&self, path: &str) -> Result<Arc<ChannelImage<S::Reader>>, FormatError> {
        debug!(path, "opening channel image");

        let (reader, timestamp) = self.source.open(path).await?;
        let reader = Arc::new(reader);
        let pyramid = TiffPyramid::open(reader.as_ref()).await?;

        Ok(Arc::new(ChannelImage::new(
            path.to_string(),
            reader,
            pyramid,
            timestamp,
        )))
    }

    /// Remove an image from the cache, forcing a reopen on next access.
    pub async fn invalidate(&self, path: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(path);
    }

    /// Number of cached images.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

// =============================================================================
// Tests
// =============================================================================
