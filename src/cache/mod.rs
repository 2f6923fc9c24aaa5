//! Cache
//!
//! Este módulo contiene el sistema de cache: Redis como backend compartido
//! y un cache en memoria como respaldo.

pub mod backend;
pub mod cache_config;
pub mod error;
pub mod manager;
pub mod memory;
pub mod redis_client;

pub use backend::{BackendKind, CacheBackend, CacheSize};
pub use cache_config::{CacheConfig, RetryPolicy};
pub use error::CacheError;
pub use manager::{CacheManager, CacheStats};
