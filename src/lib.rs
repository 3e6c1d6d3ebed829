//! Bank Integration API Library
//!
//! CRUD service for bank account integration records, with a read-through cache
//! in front of the record store and a circuit breaker plus time limit around every
//! operation.
//!
//! # Modules
//!
//! - `api`: Route table and OpenAPI document.
//! - `cache`: Cache layer (moka-backed region of records keyed by id).
//! - `cache_validator`: Checksummed cache envelopes.
//! - `circuit_breaker`: Circuit breaker state machine.
//! - `config`: Configuration management.
//! - `db`: Database connection pool and schema.
//! - `db_storage`: Postgres record store.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Records, request and response types.
//! - `repository`: Record store contract and in-memory store.
//! - `resilience`: Per-operation guards (breaker + time limit).
//! - `services`: Business operations.

pub mod api;
pub mod cache;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod resilience;
pub mod services;
