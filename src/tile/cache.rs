//! Process-wide cache for raw channel tiles.
//!
//! Blending touches every participating channel for every output tile, so
//! raw tiles are cached after the first fetch. The cache is shared by all
//! requests and keyed by everything that identifies the pixel data:
//!
//! - Channel image path
//! - Resolution index (request convention)
//! - Tile index within the resolution
//! - Compression of the cached buffer
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached buffers in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;

use super::raw::{Compression, RawTile};

/// Default cache capacity: 100MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 100 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for raw tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Channel image path
    pub path: Arc<str>,

    /// Resolution index, request convention (0 = smallest)
    pub resolution: u32,

    /// Row-major tile index within the resolution
    pub tile: u32,

    /// Compression of the cached buffer
    pub compression: Compression,
}

impl TileCacheKey {
    /// Create a new cache key.
    pub fn new(
        path: impl Into<Arc<str>>,
        resolution: u32,
        tile: u32,
        compression: Compression,
    ) -> Self {
        Self {
            path: path.into(),
            resolution,
            tile,
            compression,
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// LRU cache for raw tiles with size-based capacity.
///
/// Values are `Arc<RawTile>` so that a cache hit costs a pointer clone;
/// the preprocessing pipeline copies on write when it mutates a tile.
///
/// # Thread Safety
///
/// The cache is thread-safe and shared across async tasks via `Arc`.
pub struct TileCache {
    /// The underlying LRU cache
    cache: RwLock<LruCache<TileCacheKey, Arc<RawTile>>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl TileCache {
    /// Create a new tile cache with default capacity (100MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a new tile cache with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(
                std::num::NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap(),
            )),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a tile from the cache, marking it recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Arc<RawTile>> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check if a tile is cached without updating LRU order.
    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a tile in the cache, evicting LRU entries past capacity.
    pub async fn put(&self, key: TileCacheKey, tile: Arc<RawTile>) {
        let tile_size = tile.byte_len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        // If key exists, subtract old size first
        if let Some(old) = cache.peek(&key) {
            *current_size = current_size.saturating_sub(old.byte_len());
        }

        cache.put(key, tile);
        *current_size += tile_size;

        while *current_size > self.max_size {
            if let Some((_, evicted)) = cache.pop_lru() {
                *current_size = current_size.saturating_sub(evicted.byte_len());
            } else {
                break;
            }
        }
    }

    /// Remove a tile from the cache.
    pub async fn remove(&self, key: &TileCacheKey) -> Option<Arc<RawTile>> {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(tile) = cache.pop(key) {
            *current_size = current_size.saturating_sub(tile.byte_len());
            Some(tile)
        } else {
            None
        }
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    /// Get the current number of cached tiles.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Get the current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        let current_size = self.current_size.read().await;
        *current_size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
