//! Adapters for Delivery

pub mod kv_repository;

pub use kv_repository::KvMessageRepository;
