pub mod ask;
pub mod ingest;
pub mod retrieve;
pub mod status;
