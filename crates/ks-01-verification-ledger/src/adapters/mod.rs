//! Adapters for the Verification Ledger

pub mod kv_repository;

pub use kv_repository::KvVerificationRepository;
