//! Services orchestrating the storage layer

mod metadata;

pub use metadata::MetadataService;
