use crate::error::DepotFetchError;
use crate::verification::ContentDigest;
use std::collections::HashSet;
use serde::{Deserialize, Serialize};

/// A single entry of a depot manifest, as handed to a download worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemDescriptor {
    Directory { path: String },
    EmptyFile { path: String },
    /// Protocol V2: zlib-compressed, content-addressed chunks.
    ChunkedFile(ChunkedFile),
    /// Protocol V1: a byte range of one large backing object.
    RangedFile(RangedFile),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedFile {
    pub path: String,
    #[serde(default)]
    pub flags: Vec<ItemFlag>,
    pub product_id: String,
    pub chunks: Vec<ChunkRef>,
    /// Whole-file digest, when the manifest provides one.
    #[serde(default)]
    pub digest: Option<ContentDigest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Zero-based position of the chunk in the reassembled file.
    pub index: u32,
    pub compressed_size: u64,
    #[serde(with = "hex::serde")]
    pub compressed_md5: Vec<u8>,
    pub decompressed_digest: ContentDigest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangedFile {
    pub path: String,
    #[serde(default)]
    pub support: bool,
    pub size: u64,
    pub offset: u64,
    #[serde(with = "hex::serde")]
    pub md5: Vec<u8>,
    pub source: RangeSource,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSource {
    /// A link resolved ahead of time by the manifest layer.
    Link(String),
    /// `<product id>/<rest>`; the product id selects the secure link.
    ProductUrl(String),
}

impl RangeSource {
    pub fn product_id(&self) -> Option<&str> {
        match self {
            RangeSource::Link(_) => None,
            RangeSource::ProductUrl(url) => url.split('/').next().filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemFlag {
    Support,
    Executable,
    Other(String),
}

impl From<String> for ItemFlag {
    fn from(value: String) -> Self {
        match value.as_str() {
            "support" => ItemFlag::Support,
            "executable" => ItemFlag::Executable,
            _ => ItemFlag::Other(value),
        }
    }
}

impl From<ItemFlag> for String {
    fn from(flag: ItemFlag) -> Self {
        match flag {
            ItemFlag::Support => "support".to_string(),
            ItemFlag::Executable => "executable".to_string(),
            ItemFlag::Other(value) => value,
        }
    }
}

/// What a worker has to do for an item, with the size-zero shortcuts applied.
#[derive(Clone, Copy, Debug)]
pub enum Classified<'a> {
    Directory,
    EmptyFile,
    Chunked(&'a ChunkedFile),
    Ranged(&'a RangedFile),
}

impl ItemDescriptor {
    pub fn path(&self) -> &str {
        match self {
            ItemDescriptor::Directory { path } | ItemDescriptor::EmptyFile { path } => path,
            ItemDescriptor::ChunkedFile(file) => &file.path,
            ItemDescriptor::RangedFile(file) => &file.path,
        }
    }

    pub fn is_support(&self) -> bool {
        match self {
            ItemDescriptor::ChunkedFile(file) => file.has_flag(&ItemFlag::Support),
            ItemDescriptor::RangedFile(file) => file.support,
            _ => false,
        }
    }

    pub fn is_executable(&self) -> bool {
        match self {
            ItemDescriptor::ChunkedFile(file) => file.has_flag(&ItemFlag::Executable),
            _ => false,
        }
    }

    /// Rejects descriptors whose chunks share an index or whose byte range
    /// runs past the end of the addressable space.
    pub fn classify(&self) -> Result<Classified<'_>, DepotFetchError> {
        Ok(match self {
            ItemDescriptor::Directory { .. } => Classified::Directory,
            ItemDescriptor::EmptyFile { .. } => Classified::EmptyFile,
            ItemDescriptor::ChunkedFile(file) if file.chunks.is_empty() => Classified::EmptyFile,
            ItemDescriptor::ChunkedFile(file) => {
                let mut seen = HashSet::with_capacity(file.chunks.len());
                if let Some(duplicate) = file.chunks.iter().find(|c| !seen.insert(c.index)) {
                    return Err(DepotFetchError::InvalidDescriptor {
                        path: file.path.clone(),
                        details: format!("chunk index {} appears more than once", duplicate.index),
                    });
                }
                Classified::Chunked(file)
            }
            ItemDescriptor::RangedFile(file) if file.size == 0 => Classified::EmptyFile,
            ItemDescriptor::RangedFile(file) => {
                if file.offset.checked_add(file.size).is_none() {
                    return Err(DepotFetchError::InvalidDescriptor {
                        path: file.path.clone(),
                        details: format!(
                            "range of {} bytes at offset {} overflows",
                            file.size, file.offset
                        ),
                    });
                }
                Classified::Ranged(file)
            }
        })
    }
}

impl ChunkedFile {
    pub fn has_flag(&self, flag: &ItemFlag) -> bool {
        self.flags.contains(flag)
    }

    /// Digest the reassembled file must have. Multi-chunk files rely on the
    /// whole-file digest; a single chunk is the whole file.
    pub fn expected_digest(&self) -> Option<&ContentDigest> {
        match (&self.digest, self.chunks.as_slice()) {
            (Some(digest), _) => Some(digest),
            (None, [only]) => Some(&only.decompressed_digest),
            _ => None,
        }
    }

    pub fn total_compressed_size(&self) -> u64 {
        self.chunks.iter().map(|c| c.compressed_size).sum()
    }
}

impl ChunkRef {
    pub fn compressed_digest(&self) -> ContentDigest {
        ContentDigest::Md5(self.compressed_md5.clone())
    }

    pub fn compressed_md5_hex(&self) -> String {
        hex::encode(&self.compressed_md5)
    }
}

impl RangedFile {
    pub fn expected_digest(&self) -> ContentDigest {
        ContentDigest::Md5(self.md5.clone())
    }
}
