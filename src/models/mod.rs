pub mod batch;
pub mod job;
