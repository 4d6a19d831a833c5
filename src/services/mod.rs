pub mod compression;
pub mod fetcher;
pub mod ingest;
pub mod notifier;
pub mod pipeline;
pub mod status;
pub mod storage;
