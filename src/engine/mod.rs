pub mod barcode;
pub mod duplicates;
pub mod grading;
pub mod ingest_state;
pub mod pipeline;
pub mod roster;
pub mod scoring;
pub mod sheet;
pub mod structure;
