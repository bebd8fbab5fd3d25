pub mod client;
pub mod context;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod request_mapper;
pub mod response_normalizer;
pub mod schema;
pub mod telemetry;
pub mod types;
