mod paths;
mod types;

pub use paths::{
    ItemPaths, SUPPORT_DIR, chunk_temp_path, galaxy_path, normalize_manifest_path, range_header,
};
pub use types::{
    ChunkRef, ChunkedFile, Classified, ItemDescriptor, ItemFlag, RangeSource, RangedFile,
};
