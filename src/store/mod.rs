//! Content-addressed storage layer
//!
//! Blobs are stored by their SHA-256 hash; metadata envelopes are stored by
//! content id. Both sit on the same two-level sharded directory layout.

mod blob;
pub mod codec;
mod layout;
mod meta_store;

pub use blob::BlobStore;
pub use layout::{ShardedLayout, MIN_ID_LEN};
pub use meta_store::MetadataStore;
