//! # Eligibility Warehouse Common Library
//!
//! Shared code for the eligibility ingestion pipeline including:
//! - Warehouse table schemas and provisioning
//! - Run configuration loading
//! - Load run identifiers and timestamps

pub mod config;
pub mod db;
pub mod error;
pub mod run_id;
pub mod time;

pub use error::{Error, Result};
pub use run_id::LoadRunId;
