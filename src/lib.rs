//! Coverage Estimation API Library
//!
//! Backend for the life cover lead form: validates a submission, enriches it
//! with weather and Bitcoin price lookups, estimates coverage and premium, and
//! keeps an append-only log of submissions and provider responses.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `config`: Configuration management.
//! - `db`: Database pool, schema bootstrap and connection monitor.
//! - `db_storage`: Store trait with PostgreSQL and in-memory implementations.
//! - `errors`: Error handling types.
//! - `estimator`: Coverage formula.
//! - `handlers`: HTTP request handlers.
//! - `models`: Records, request and response types.
//! - `openapi`: OpenAPI document.
//! - `services`: Enrichment clients and the coverage flow.
//! - `validation`: Form validation.

pub mod api;
pub mod core;
pub mod integrations;

pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod estimator;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod services;
pub mod validation;
