pub mod app_config;
pub mod database;
pub mod inventory_client;
pub mod memory;
pub mod redis_repo;
pub mod reservation_repo;

pub use database::DbClient;
pub use inventory_client::HttpInventoryClient;
pub use memory::{MemoryIdempotencyLedger, MemoryInventory, MemoryReservationStore};
pub use redis_repo::{RedisClient, RedisIdempotencyLedger};
pub use reservation_repo::PgReservationStore;
