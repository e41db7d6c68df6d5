pub mod backfill_file;
pub mod http_batch;

pub use backfill_file::BackfillFileSource;
pub use http_batch::{ChannelSource, HttpBatchSource};
