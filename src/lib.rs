//! Lead Import Worker Library
//!
//! Turns a customer-import job (industry + location) into scored business leads:
//! places search, place details, optional website contact extraction, scoring, and
//! progressive persistence to a shared job record.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Postgres job store.
//! - `errors`: Error handling types.
//! - `importer`: Job orchestration.
//! - `job_store`: Job store trait and in-memory implementation.
//! - `models`: Job, lead and places data models.
//! - `normalize`: Address and industry mapping.
//! - `places`: Places provider client.
//! - `registry`: Per-process run registry and cancellation.
//! - `scoring`: Lead completeness score.
//! - `website`: Website contact extraction.

pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod importer;
pub mod job_store;
pub mod models;
pub mod normalize;
pub mod places;
pub mod registry;
pub mod scoring;
pub mod website;
