//! # Eligibility ingestion engine
//!
//! Loads heterogeneous vendor eligibility feeds into the warehouse:
//! - Stage 0: schema provisioning and the staging manifest
//! - Stage 1: declarative canonicalization and dual-write to
//!   `raw_staging` + `raw_staging_payload`
//! - Stage 2: normalization into `silver_members`
//! - Validation: post-hoc count, join and hash audit
//!
//! [`services::RunController`] sequences the stages and keeps the
//! `load_runs` ledger current.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod source;

pub use crate::error::{IngestError, IngestResult};
