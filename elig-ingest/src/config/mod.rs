//! Declarative pipeline configuration: vendor mappings and normalization rules

pub mod document;
pub mod normalization;
pub mod vendor;

pub use normalization::NormalizationConfig;
pub use vendor::{
    Derivation, FileFormat, MappingRule, VendorConfig, VendorRegistry, EXTRA_PAYLOAD_FIELD,
};
