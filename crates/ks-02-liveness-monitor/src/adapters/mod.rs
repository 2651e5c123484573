//! Adapters for the Liveness Monitor

pub mod kv_repository;

pub use kv_repository::KvCheckInRepository;
