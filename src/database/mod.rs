pub mod db;
#[cfg(test)]
pub mod memory;
pub mod mongo;
pub mod redis;
pub mod store;

pub use db::connect_to_mongo;
