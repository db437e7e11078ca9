use super::provider::{AuthorizationProvider, SecureLink, SecureLinkRequest};
use crate::error::DepotFetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// On-disk format of a links file, written by whatever talks to the content
/// service's authorization API.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinksFile {
    #[serde(default)]
    pub products: HashMap<String, SecureLink>,
    /// Link to the root of the shared dependency pool.
    #[serde(default)]
    pub dependencies: Option<SecureLink>,
}

impl LinksFile {
    pub async fn load(path: &Path) -> Result<Self, DepotFetchError> {
        let content = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

/// Serves secure links from a JSON file. A refresh re-reads the file, so an
/// external process can rotate expired links while a download is running.
pub struct FileLinkProvider {
    path: PathBuf,
    client: reqwest::Client,
    links: RwLock<LinksFile>,
}

impl FileLinkProvider {
    pub async fn load(
        path: impl Into<PathBuf>,
        client: reqwest::Client,
    ) -> Result<Self, DepotFetchError> {
        let path = path.into();
        let links = LinksFile::load(&path).await?;
        tracing::debug!(
            path = %path.display(),
            products = links.products.len(),
            "Loaded links file"
        );
        Ok(Self {
            path,
            client,
            links: RwLock::new(links),
        })
    }
}

#[async_trait]
impl AuthorizationProvider for FileLinkProvider {
    fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn secure_link(
        &self,
        request: &SecureLinkRequest,
    ) -> Result<SecureLink, DepotFetchError> {
        let links = self.links.read().await;
        links
            .products
            .get(&request.product_id)
            .cloned()
            .ok_or_else(|| DepotFetchError::Authorization {
                product: request.product_id.clone(),
                reason: format!("no secure link in {}", self.path.display()),
            })
    }

    async fn refresh_secure_link(
        &self,
        request: &SecureLinkRequest,
    ) -> Result<(), DepotFetchError> {
        let mut links = self.links.write().await;
        tracing::debug!(
            product = %request.product_id,
            path = %self.path.display(),
            "Reloading links file"
        );
        *links = LinksFile::load(&self.path).await?;
        Ok(())
    }

    async fn dependency_link(&self, content_path: &str) -> Result<String, DepotFetchError> {
        let links = self.links.read().await;
        let root = links
            .dependencies
            .as_ref()
            .ok_or_else(|| DepotFetchError::Authorization {
                product: "dependencies".to_string(),
                reason: format!("no dependency link in {}", self.path.display()),
            })?;
        root.with_content_path(content_path).to_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_links(path: &Path, hmac: &str) {
        let links = json!({
            "products": {
                "1207658924": {
                    "url_format": "{base_url}{path}?hmac={hmac}",
                    "parameters": {
                        "base_url": "https://cdn.example.com",
                        "path": "/store/1207658924",
                        "hmac": hmac
                    }
                }
            },
            "dependencies": {
                "url_format": "{base_url}{path}",
                "parameters": { "base_url": "https://deps.example.com", "path": "/deps" }
            }
        });
        std::fs::write(path, serde_json::to_vec(&links).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rereads_links_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        write_links(&path, "first");

        let provider = FileLinkProvider::load(&path, reqwest::Client::new())
            .await
            .unwrap();
        let request = SecureLinkRequest::chunked("1207658924");
        let link = provider.secure_link(&request).await.unwrap();
        assert_eq!(link.parameters["hmac"], "first");

        write_links(&path, "second");
        let link = provider.secure_link(&request).await.unwrap();
        assert_eq!(link.parameters["hmac"], "first");

        provider.refresh_secure_link(&request).await.unwrap();
        let link = provider.secure_link(&request).await.unwrap();
        assert_eq!(link.parameters["hmac"], "second");
    }

    #[tokio::test]
    async fn test_unknown_product_is_an_authorization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        write_links(&path, "first");

        let provider = FileLinkProvider::load(&path, reqwest::Client::new())
            .await
            .unwrap();
        let result = provider
            .secure_link(&SecureLinkRequest::chunked("42"))
            .await;
        assert!(matches!(result, Err(DepotFetchError::Authorization { .. })));

        let url = provider.dependency_link("ab/cd/abcd").await.unwrap();
        assert_eq!(url, "https://deps.example.com/deps/ab/cd/abcd");
    }
}
