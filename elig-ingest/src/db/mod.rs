//! Warehouse reads and writes for the pipeline stages

pub mod audit;
pub mod raw_staging;
pub mod runs;
pub mod silver;
