pub mod admin;
pub mod config;
pub mod envelope;
pub mod evaluation;
pub mod events;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod sinks;
pub mod sources;

pub use envelope::Envelope;
pub use evaluation::Evaluator;
