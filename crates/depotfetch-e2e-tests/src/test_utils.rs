use async_trait::async_trait;
use depotfetch_lib::auth::{AuthorizationProvider, SecureLink, SecureLinkRequest};
use depotfetch_lib::error::DepotFetchError;
use depotfetch_lib::item::{ChunkRef, ChunkedFile, ItemFlag, galaxy_path};
use depotfetch_lib::progress::ProgressCounters;
use depotfetch_lib::verification::ContentDigest;
use depotfetch_lib::worker::{LinkSource, TargetPlatform, WorkerContext, WorkerOptions};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GAME_ID: &str = "1207658924";
pub const BUILD_ID: &str = "56234";
pub const PRODUCT_ID: &str = "1207658924";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("depotfetch_lib=debug,depotfetch_e2e_tests=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

/// Hands out links pointing at a mock server and records what was asked for.
///
/// V2 objects live under `/store/<product>/`, V1 objects at
/// `/v1/<product>/main.bin` and dependency objects under `/deps/`.
pub struct MockLinks {
    client: reqwest::Client,
    base_url: String,
    requests: Mutex<Vec<SecureLinkRequest>>,
    refreshed: Mutex<Vec<SecureLinkRequest>>,
}

impl MockLinks {
    pub fn new(server: &MockServer) -> Arc<Self> {
        Arc::new(Self {
            client: reqwest::Client::new(),
            base_url: server.uri(),
            requests: Mutex::new(Vec::new()),
            refreshed: Mutex::new(Vec::new()),
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refreshed.lock().unwrap().len()
    }

    pub fn refreshed_requests(&self) -> Vec<SecureLinkRequest> {
        self.refreshed.lock().unwrap().clone()
    }

    pub fn link_requests(&self) -> Vec<SecureLinkRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorizationProvider for MockLinks {
    fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn secure_link(
        &self,
        request: &SecureLinkRequest,
    ) -> Result<SecureLink, DepotFetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let path = match request.generation {
            1 => format!("/v1/{}/main.bin", request.product_id),
            _ => format!("/store/{}", request.product_id),
        };
        Ok(SecureLink {
            url_format: "{base_url}{path}".to_string(),
            parameters: BTreeMap::from([
                ("base_url".to_string(), self.base_url.clone()),
                ("path".to_string(), path),
            ]),
        })
    }

    async fn refresh_secure_link(
        &self,
        request: &SecureLinkRequest,
    ) -> Result<(), DepotFetchError> {
        self.refreshed.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn dependency_link(&self, content_path: &str) -> Result<String, DepotFetchError> {
        Ok(format!("{}/deps/{}", self.base_url, content_path))
    }
}

pub fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn md5(data: &[u8]) -> Vec<u8> {
    Md5::digest(data).to_vec()
}

/// Server path of the compressed object `compressed` for `product_id`.
pub fn chunk_object_path(product_id: &str, compressed: &[u8]) -> String {
    format!("/store/{}/{}", product_id, galaxy_path(&hex::encode(md5(compressed))))
}

/// Describes `pieces` as consecutive chunks of one file, with a whole-file
/// digest.
pub fn chunked_file(path: &str, pieces: &[&[u8]], flags: Vec<ItemFlag>) -> ChunkedFile {
    let chunks = pieces
        .iter()
        .enumerate()
        .map(|(index, piece)| {
            let compressed = zlib_compress(piece);
            ChunkRef {
                index: index as u32,
                compressed_size: compressed.len() as u64,
                compressed_md5: md5(&compressed),
                decompressed_digest: ContentDigest::Md5(md5(piece)),
            }
        })
        .collect();
    ChunkedFile {
        path: path.to_string(),
        flags,
        product_id: PRODUCT_ID.to_string(),
        chunks,
        digest: Some(ContentDigest::Md5(md5(&pieces.concat()))),
    }
}

/// Serves every piece as a compressed chunk object.
pub async fn serve_chunks(server: &MockServer, pieces: &[&[u8]]) {
    for piece in pieces {
        let compressed = zlib_compress(piece);
        Mock::given(method("GET"))
            .and(path(chunk_object_path(PRODUCT_ID, &compressed)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(compressed))
            .mount(server)
            .await;
    }
}

pub fn worker_context(
    install_path: &Path,
    provider: Arc<MockLinks>,
    progress: Arc<ProgressCounters>,
) -> Arc<WorkerContext> {
    Arc::new(WorkerContext {
        install_path: install_path.to_path_buf(),
        game_id: GAME_ID.to_string(),
        build_id: Some(BUILD_ID.to_string()),
        platform: TargetPlatform::Linux,
        link_source: LinkSource::Product,
        options: WorkerOptions::default(),
        provider,
        progress,
    })
}

pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |requests| requests.len())
}
