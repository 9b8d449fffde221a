pub mod memory;
pub mod postgres;
pub mod redis;
pub mod repository;

pub use memory::InMemoryStore;
pub use postgres::{create_pool, run_migrations, PgStore};
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
pub use redis::CacheWriterHandle;
pub use repository::{ApplierStore, JobStore, ViewStore};
