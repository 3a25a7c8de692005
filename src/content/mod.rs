//! Content assembly: embedding small files, chunking large ones

mod assembler;
mod reader;

pub use assembler::{ContentAssembler, WrittenContent, DEFAULT_CHUNK_SIZE, EMBED_THRESHOLD};
pub use reader::ContentReader;
