use super::budget::RetryBudget;
use crate::auth::{AuthorizationProvider, SecureLinkRequest};
use crate::error::DepotFetchError;
use crate::item::range_header;
use crate::progress::ProgressSink;
use crate::verification::{ContentDigest, file_matches};
use futures::StreamExt;
use reqwest::StatusCode;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

/// Lower bound for the size of a single buffered write to disk.
const MIN_WRITE_SIZE: u64 = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub size: u64,
}

impl ByteRange {
    pub fn header(&self) -> String {
        range_header(self.offset, self.size)
    }
}

/// How the URL of a remote object is obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    /// A product secure link, optionally narrowed to one content-addressed object.
    Product {
        request: SecureLinkRequest,
        content_path: Option<String>,
    },
    /// An object of the shared dependency pool.
    Dependency {
        request: SecureLinkRequest,
        content_path: String,
    },
    /// A link resolved ahead of time; it cannot be refreshed.
    Direct(String),
}

/// One unit of remote data and the file it lands in.
#[derive(Clone, Copy, Debug)]
pub struct FetchRequest<'a> {
    pub target: &'a Path,
    pub expected: &'a ContentDigest,
    pub link: &'a LinkTarget,
    pub range: Option<ByteRange>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Downloaded and verified.
    Fetched,
    /// A matching file from an earlier run was already on disk.
    AlreadyPresent,
    /// The transient retry budget ran out.
    Abandoned,
    /// The payload kept failing verification.
    IntegrityExhausted,
    /// Refreshed links were still refused after `max_auth_refreshes` attempts.
    AuthorizationExhausted,
}

impl FetchOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, FetchOutcome::Fetched | FetchOutcome::AlreadyPresent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchLimits {
    /// Re-downloads allowed after a payload fails verification.
    pub max_integrity_retries: u32,
    /// Link refreshes allowed after HTTP 403 responses.
    pub max_auth_refreshes: u32,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_integrity_retries: 3,
            max_auth_refreshes: 10,
        }
    }
}

enum Attempt {
    Written,
    Forbidden,
    Failed(String),
}

/// Streams remote objects into local files for one worker.
pub struct Fetcher<'a> {
    provider: &'a dyn AuthorizationProvider,
    progress: &'a dyn ProgressSink,
    budget: &'a RetryBudget,
    limits: FetchLimits,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        provider: &'a dyn AuthorizationProvider,
        progress: &'a dyn ProgressSink,
        budget: &'a RetryBudget,
        limits: FetchLimits,
    ) -> Self {
        Self {
            provider,
            progress,
            budget,
            limits,
        }
    }

    pub async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchOutcome, DepotFetchError> {
        let target = request.target;
        let mut url = self.resolve_url(request.link).await?;
        let mut integrity_failures = 0u32;
        let mut auth_refreshes = 0u32;

        loop {
            if tokio::fs::try_exists(target).await? {
                if self.matches(&request).await? {
                    debug!(path = %target.display(), "Found verified download from a previous run");
                    return Ok(FetchOutcome::AlreadyPresent);
                }
                remove_if_exists(target).await?;
            }

            match self.download_once(&url, &request).await? {
                Attempt::Written => {
                    if self.matches(&request).await? {
                        trace!(path = %target.display(), "Downloaded and verified");
                        return Ok(FetchOutcome::Fetched);
                    }
                    warn!(path = %target.display(), "Checksums mismatch for downloaded data");
                    remove_if_exists(target).await?;
                    integrity_failures += 1;
                    if integrity_failures > self.limits.max_integrity_retries {
                        warn!(
                            path = %target.display(),
                            attempts = integrity_failures,
                            "Giving up after repeated checksum mismatches"
                        );
                        return Ok(FetchOutcome::IntegrityExhausted);
                    }
                }
                Attempt::Forbidden if matches!(request.link, LinkTarget::Direct(_)) => {
                    // Pre-resolved links cannot be refreshed.
                    if !self.consume_retry(target, "HTTP 403 on a pre-resolved link") {
                        return Ok(FetchOutcome::Abandoned);
                    }
                }
                Attempt::Forbidden => {
                    auth_refreshes += 1;
                    if auth_refreshes > self.limits.max_auth_refreshes {
                        warn!(
                            path = %target.display(),
                            refreshes = self.limits.max_auth_refreshes,
                            "Still forbidden after the refresh limit, giving up on the item"
                        );
                        return Ok(FetchOutcome::AuthorizationExhausted);
                    }
                    self.refresh(request.link).await?;
                    url = self.resolve_url(request.link).await?;
                }
                Attempt::Failed(reason) => {
                    if !self.consume_retry(target, &reason) {
                        return Ok(FetchOutcome::Abandoned);
                    }
                }
            }
        }
    }

    fn consume_retry(&self, target: &Path, reason: &str) -> bool {
        if self.budget.try_consume() {
            warn!(
                path = %target.display(),
                retries_left = self.budget.remaining(),
                "Download failed ({}), retrying",
                reason
            );
            true
        } else {
            warn!(path = %target.display(), "Download failed ({}), no retries left", reason);
            false
        }
    }

    async fn matches(&self, request: &FetchRequest<'_>) -> Result<bool, DepotFetchError> {
        let progress = self.progress;
        Ok(file_matches(request.target, request.expected, |n| progress.update_bytes_read(n)).await?)
    }

    async fn resolve_url(&self, link: &LinkTarget) -> Result<String, DepotFetchError> {
        match link {
            LinkTarget::Product {
                request,
                content_path,
            } => {
                let secure_link = self.provider.secure_link(request).await?;
                match content_path {
                    Some(content_path) => secure_link.with_content_path(content_path).to_url(),
                    None => secure_link.to_url(),
                }
            }
            LinkTarget::Dependency { content_path, .. } => {
                self.provider.dependency_link(content_path).await
            }
            LinkTarget::Direct(url) => Ok(url.clone()),
        }
    }

    async fn refresh(&self, link: &LinkTarget) -> Result<(), DepotFetchError> {
        match link {
            LinkTarget::Product { request, .. } | LinkTarget::Dependency { request, .. } => {
                debug!(product = %request.product_id, "Secure link expired, refreshing");
                self.provider.refresh_secure_link(request).await
            }
            LinkTarget::Direct(_) => Ok(()),
        }
    }

    async fn download_once(
        &self,
        url: &str,
        request: &FetchRequest<'_>,
    ) -> Result<Attempt, DepotFetchError> {
        let mut http = self.provider.http_client().get(url);
        if let Some(range) = request.range {
            http = http.header(reqwest::header::RANGE, range.header());
        }

        let response = match http.send().await {
            Ok(response) => response,
            Err(e) => return Ok(Attempt::Failed(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Ok(Attempt::Forbidden);
        }
        if !status.is_success() {
            return Ok(Attempt::Failed(format!("HTTP {status}")));
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(request.target)
            .await?;

        match response.content_length() {
            None => {
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(e) => return Ok(Attempt::Failed(e.to_string())),
                };
                self.progress.update_download_speed(body.len() as u64);
                file.write_all(&body).await?;
                self.progress.update_bytes_written(body.len() as u64);
            }
            Some(total) => {
                let write_size = (total / 1000).max(MIN_WRITE_SIZE) as usize;
                let mut buffer = Vec::with_capacity(write_size.min(total as usize));
                let mut stream = response.bytes_stream();

                while let Some(next) = stream.next().await {
                    let bytes = match next {
                        Ok(bytes) => bytes,
                        Err(e) => return Ok(Attempt::Failed(e.to_string())),
                    };
                    self.progress.update_download_speed(bytes.len() as u64);
                    buffer.extend_from_slice(&bytes);

                    if buffer.len() >= write_size {
                        file.write_all(&buffer).await?;
                        self.progress.update_bytes_written(buffer.len() as u64);
                        buffer.clear();
                    }
                }

                if !buffer.is_empty() {
                    file.write_all(&buffer).await?;
                    self.progress.update_bytes_written(buffer.len() as u64);
                }
            }
        }

        file.flush().await?;
        Ok(Attempt::Written)
    }
}

pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SecureLink;
    use crate::progress::ProgressCounters;
    use async_trait::async_trait;
    use md5::{Digest, Md5};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct ServerLinks {
        client: reqwest::Client,
        base_url: String,
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationProvider for ServerLinks {
        fn http_client(&self) -> &reqwest::Client {
            &self.client
        }

        async fn secure_link(
            &self,
            _request: &SecureLinkRequest,
        ) -> Result<SecureLink, DepotFetchError> {
            Ok(SecureLink {
                url_format: "{base_url}{path}".to_string(),
                parameters: BTreeMap::from([
                    ("base_url".to_string(), self.base_url.clone()),
                    ("path".to_string(), "/store".to_string()),
                ]),
            })
        }

        async fn refresh_secure_link(
            &self,
            _request: &SecureLinkRequest,
        ) -> Result<(), DepotFetchError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn dependency_link(&self, content_path: &str) -> Result<String, DepotFetchError> {
            Ok(format!("{}/deps/{}", self.base_url, content_path))
        }
    }

    fn provider(server: &MockServer) -> ServerLinks {
        ServerLinks {
            client: reqwest::Client::new(),
            base_url: server.uri(),
            refreshes: AtomicUsize::new(0),
        }
    }

    fn md5_digest(data: &[u8]) -> ContentDigest {
        ContentDigest::Md5(Md5::digest(data).to_vec())
    }

    fn object_link() -> LinkTarget {
        LinkTarget::Product {
            request: SecureLinkRequest::chunked("1"),
            content_path: Some("ab/cd/abcd".to_string()),
        }
    }

    #[tokio::test]
    async fn test_forbidden_refreshes_without_consuming_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/store/ab/cd/abcd"))
            .respond_with(ResponseTemplate::new(403))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/store/ab/cd/abcd"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chunk.tmp0");
        let links = provider(&server);
        let progress = ProgressCounters::default();
        let budget = RetryBudget::new(3);
        let expected = md5_digest(b"payload");
        let link = object_link();

        let fetcher = Fetcher::new(&links, &progress, &budget, FetchLimits::default());
        let outcome = fetcher
            .fetch(FetchRequest {
                target: &target,
                expected: &expected,
                link: &link,
                range: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Fetched);
        assert_eq!(links.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(budget.remaining(), 3);
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
        assert_eq!(progress.snapshot().bytes_downloaded, 7);
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_budget_and_abandon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chunk.tmp0");
        let links = provider(&server);
        let progress = ProgressCounters::default();
        let budget = RetryBudget::new(3);
        let expected = md5_digest(b"payload");
        let link = object_link();

        let fetcher = Fetcher::new(&links, &progress, &budget, FetchLimits::default());
        let outcome = fetcher
            .fetch(FetchRequest {
                target: &target,
                expected: &expected,
                link: &link,
                range: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Abandoned);
        assert_eq!(budget.remaining(), 0);
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_persistent_mismatch_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"corrupt".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chunk.tmp0");
        let links = provider(&server);
        let progress = ProgressCounters::default();
        let budget = RetryBudget::new(3);
        let expected = md5_digest(b"payload");
        let link = object_link();
        let limits = FetchLimits {
            max_integrity_retries: 2,
            ..FetchLimits::default()
        };

        let fetcher = Fetcher::new(&links, &progress, &budget, limits);
        let outcome = fetcher
            .fetch(FetchRequest {
                target: &target,
                expected: &expected,
                link: &link,
                range: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::IntegrityExhausted);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert_eq!(budget.remaining(), 3);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_existing_verified_file_skips_network() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chunk.tmp0");
        std::fs::write(&target, b"payload").unwrap();

        let links = provider(&server);
        let progress = ProgressCounters::default();
        let budget = RetryBudget::new(3);
        let expected = md5_digest(b"payload");
        let link = object_link();

        let fetcher = Fetcher::new(&links, &progress, &budget, FetchLimits::default());
        let outcome = fetcher
            .fetch(FetchRequest {
                target: &target,
                expected: &expected,
                link: &link,
                range: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::AlreadyPresent);
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_eq!(progress.snapshot().bytes_read, 7);
    }

    #[tokio::test]
    async fn test_refused_refreshes_end_with_authorization_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chunk.tmp0");
        let links = provider(&server);
        let progress = ProgressCounters::default();
        let budget = RetryBudget::new(3);
        let expected = md5_digest(b"payload");
        let link = object_link();
        let limits = FetchLimits {
            max_auth_refreshes: 2,
            ..FetchLimits::default()
        };

        let fetcher = Fetcher::new(&links, &progress, &budget, limits);
        let outcome = fetcher
            .fetch(FetchRequest {
                target: &target,
                expected: &expected,
                link: &link,
                range: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::AuthorizationExhausted);
        assert!(!outcome.is_success());
        assert_eq!(links.refreshes.load(Ordering::SeqCst), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert_eq!(budget.remaining(), 3);
    }
}
