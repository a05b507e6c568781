//! Pipeline stages and the controller that sequences them

pub mod canonicalizer;
pub mod content_hasher;
pub mod ingestor;
pub mod manifest;
pub mod normalizer;
pub mod run_controller;
pub mod validator;

pub use canonicalizer::canonicalize;
pub use content_hasher::content_hash;
pub use ingestor::Ingestor;
pub use normalizer::Normalizer;
pub use run_controller::RunController;
