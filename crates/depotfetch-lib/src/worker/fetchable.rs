use super::context::{LinkSource, WorkerContext};
use crate::auth::SecureLinkRequest;
use crate::error::DepotFetchError;
use crate::fetch::{ByteRange, FetchOutcome, FetchRequest, Fetcher, LinkTarget};
use crate::item::{ChunkedFile, RangedFile, RangeSource, chunk_temp_path, galaxy_path};
use crate::progress::ProgressSink;
use crate::reassemble::{ordered_chunk_artifacts, reassemble};
use crate::verification::{ContentDigest, file_matches};
use futures::StreamExt;
use std::path::{Path, PathBuf};

/// The protocol-specific half of a download: how an item's bytes are fetched
/// and turned into the final file.
pub enum Fetchable<'a> {
    Chunked(ChunkedFetch<'a>),
    Ranged(RangedFetch<'a>),
}

/// Protocol V2: every chunk is its own compressed object.
pub struct ChunkedFetch<'a> {
    file: &'a ChunkedFile,
    link_source: LinkSource,
    parallelism: usize,
}

/// Protocol V1: the file is a byte range of a larger object.
pub struct RangedFetch<'a> {
    file: &'a RangedFile,
    link: LinkTarget,
    credit: u64,
}

struct ChunkJob {
    temp_path: PathBuf,
    expected: ContentDigest,
    link: LinkTarget,
}

impl<'a> Fetchable<'a> {
    pub fn chunked(file: &'a ChunkedFile, context: &WorkerContext) -> Self {
        Fetchable::Chunked(ChunkedFetch {
            file,
            link_source: context.link_source,
            parallelism: context.options.chunk_parallelism.max(1),
        })
    }

    pub fn ranged(file: &'a RangedFile, context: &WorkerContext) -> Result<Self, DepotFetchError> {
        let link = match &file.source {
            RangeSource::Link(url) => LinkTarget::Direct(url.clone()),
            RangeSource::ProductUrl(_) => {
                let product_id =
                    file.source
                        .product_id()
                        .ok_or_else(|| DepotFetchError::InvalidDescriptor {
                            path: file.path.clone(),
                            details: "product url has no product id".to_string(),
                        })?;
                LinkTarget::Product {
                    request: SecureLinkRequest::ranged(
                        product_id,
                        context.platform.as_str(),
                        context.build_id.as_deref(),
                    ),
                    content_path: None,
                }
            }
        };
        let credit = match context.link_source {
            LinkSource::Product => file.size,
            LinkSource::Dependency => 0,
        };
        Ok(Fetchable::Ranged(RangedFetch { file, link, credit }))
    }

    /// Digest an existing file must have to count as complete.
    pub fn expected_digest(&self) -> Option<ContentDigest> {
        match self {
            Fetchable::Chunked(chunked) => chunked.file.expected_digest().cloned(),
            Fetchable::Ranged(ranged) => Some(ranged.file.expected_digest()),
        }
    }

    /// Size credited to the progress sink when the item is already complete.
    pub fn already_complete_credit(&self) -> u64 {
        match self {
            Fetchable::Chunked(chunked) => chunked.file.total_compressed_size(),
            Fetchable::Ranged(ranged) => ranged.credit,
        }
    }

    /// Brings every remote piece of the item to disk. Stops at the first piece
    /// that cannot be fetched.
    pub async fn fetch(
        &self,
        fetcher: &Fetcher<'_>,
        target: &Path,
    ) -> Result<FetchOutcome, DepotFetchError> {
        match self {
            Fetchable::Chunked(chunked) => chunked.fetch(fetcher, target).await,
            Fetchable::Ranged(ranged) => {
                let expected = ranged.file.expected_digest();
                fetcher
                    .fetch(FetchRequest {
                        target,
                        expected: &expected,
                        link: &ranged.link,
                        range: Some(ByteRange {
                            offset: ranged.file.offset,
                            size: ranged.file.size,
                        }),
                    })
                    .await
            }
        }
    }

    /// Turns fetched pieces into the final file. Ranged downloads already
    /// wrote the final bytes. Every decompressed chunk is checked against its
    /// own digest; on any failure no chunk file or partial file is left.
    pub async fn reassemble(
        &self,
        target: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<(), DepotFetchError> {
        match self {
            Fetchable::Chunked(chunked) => {
                let chunks = ordered_chunk_artifacts(target, &chunked.file.chunks);
                reassemble(target, &chunks, progress).await?;
                Ok(())
            }
            Fetchable::Ranged(_) => Ok(()),
        }
    }

    /// Checks the reassembled file. Ranged files were verified while fetching;
    /// chunked files without a whole-file digest rely on the per-chunk checks
    /// made during reassembly.
    pub async fn verify_reassembled(
        &self,
        target: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<bool, DepotFetchError> {
        match (self, self.expected_digest()) {
            (Fetchable::Chunked(_), Some(expected)) => {
                Ok(file_matches(target, &expected, |n| progress.update_bytes_read(n)).await?)
            }
            _ => Ok(true),
        }
    }
}

impl ChunkedFetch<'_> {
    fn jobs(&self, target: &Path) -> Vec<ChunkJob> {
        self.file
            .chunks
            .iter()
            .map(|chunk| {
                let content_path = galaxy_path(&chunk.compressed_md5_hex());
                let request = SecureLinkRequest::chunked(self.file.product_id.clone());
                let link = match self.link_source {
                    LinkSource::Product => LinkTarget::Product {
                        request,
                        content_path: Some(content_path),
                    },
                    LinkSource::Dependency => LinkTarget::Dependency {
                        request,
                        content_path,
                    },
                };
                ChunkJob {
                    temp_path: chunk_temp_path(target, chunk.index),
                    expected: chunk.compressed_digest(),
                    link,
                }
            })
            .collect()
    }

    async fn fetch(
        &self,
        fetcher: &Fetcher<'_>,
        target: &Path,
    ) -> Result<FetchOutcome, DepotFetchError> {
        let jobs = self.jobs(target);
        let mut fetches = futures::stream::iter(jobs.iter().map(|job| {
            fetcher.fetch(FetchRequest {
                target: &job.temp_path,
                expected: &job.expected,
                link: &job.link,
                range: None,
            })
        }))
        .buffer_unordered(self.parallelism);

        while let Some(outcome) = fetches.next().await {
            let outcome = outcome?;
            if !outcome.is_success() {
                return Ok(outcome);
            }
        }
        Ok(FetchOutcome::Fetched)
    }
}
