pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod recovery;
pub mod replay;
pub mod screenshot;
