pub mod converter;
pub mod ingest;
pub mod language;
pub mod outcome;
pub mod staging;
