use crate::error::DepotFetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A time-limited link as issued by the content service. The final URL is the
/// format string with every `{name}` placeholder replaced by its parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureLink {
    pub url_format: String,
    pub parameters: BTreeMap<String, String>,
}

impl SecureLink {
    /// Points the link at one content-addressed object by extending its `path`
    /// parameter.
    pub fn with_content_path(&self, content_path: &str) -> Self {
        let mut link = self.clone();
        let path = link.parameters.entry("path".to_string()).or_default();
        path.push('/');
        path.push_str(content_path);
        link
    }

    pub fn to_url(&self) -> Result<String, DepotFetchError> {
        merge_url_with_params(&self.url_format, &self.parameters)
    }
}

pub fn merge_url_with_params(
    url_format: &str,
    parameters: &BTreeMap<String, String>,
) -> Result<String, DepotFetchError> {
    let merged = parameters
        .iter()
        .fold(url_format.to_string(), |url, (key, value)| {
            url.replace(&format!("{{{key}}}"), value)
        });

    url::Url::parse(&merged).map_err(|e| DepotFetchError::InvalidUrl {
        url: merged.clone(),
        reason: e.to_string(),
    })?;
    Ok(merged)
}

/// Identifies which secure link a worker needs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SecureLinkRequest {
    pub product_id: String,
    /// Path prefix the link is scoped to; V1 links are scoped to a build.
    pub root: Option<String>,
    pub generation: u8,
}

impl SecureLinkRequest {
    pub fn chunked(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            root: None,
            generation: 2,
        }
    }

    pub fn ranged(product_id: impl Into<String>, platform: &str, build_id: Option<&str>) -> Self {
        Self {
            product_id: product_id.into(),
            root: build_id.map(|build_id| format!("/{platform}/{build_id}")),
            generation: 1,
        }
    }
}

/// Source of signed download links, shared by all workers of a run.
///
/// Implementations own their caching and must tolerate concurrent refreshes
/// from several workers.
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// HTTP client used for every download issued against this provider's links.
    fn http_client(&self) -> &reqwest::Client;

    async fn secure_link(&self, request: &SecureLinkRequest)
    -> Result<SecureLink, DepotFetchError>;

    /// Drops the cached link so the next `secure_link` call mints a fresh one.
    async fn refresh_secure_link(&self, request: &SecureLinkRequest)
    -> Result<(), DepotFetchError>;

    /// Link for an object of the shared dependency pool.
    async fn dependency_link(&self, content_path: &str) -> Result<String, DepotFetchError>;
}

/// Builds the HTTP client downloads go through. Redirects are followed.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, DepotFetchError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("depotfetch/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> SecureLink {
        SecureLink {
            url_format: "{base_url}/token=nva={expires}~hmac={hmac}{path}".to_string(),
            parameters: BTreeMap::from([
                ("base_url".to_string(), "https://cdn.example.com".to_string()),
                ("expires".to_string(), "1700000000".to_string()),
                ("hmac".to_string(), "abcdef".to_string()),
                ("path".to_string(), "/content-system/v2/store/1207658924".to_string()),
            ]),
        }
    }

    #[test]
    fn test_merge_url_replaces_all_placeholders() {
        let url = link().to_url().unwrap();
        assert_eq!(
            url,
            "https://cdn.example.com/token=nva=1700000000~hmac=abcdef/content-system/v2/store/1207658924"
        );
    }

    #[test]
    fn test_with_content_path_extends_path_only() {
        let original = link();
        let chunk = original.with_content_path("0a/1b/0a1b");
        assert_eq!(
            chunk.parameters["path"],
            "/content-system/v2/store/1207658924/0a/1b/0a1b"
        );
        assert_eq!(
            original.parameters["path"],
            "/content-system/v2/store/1207658924"
        );
    }

    #[test]
    fn test_merge_url_rejects_unresolved_base() {
        let result = merge_url_with_params("{base_url}/x", &BTreeMap::new());
        assert!(matches!(result, Err(DepotFetchError::InvalidUrl { .. })));
    }

    #[test]
    fn test_ranged_request_is_scoped_to_build() {
        let request = SecureLinkRequest::ranged("1207658924", "windows", Some("51234"));
        assert_eq!(request.root.as_deref(), Some("/windows/51234"));
        assert_eq!(request.generation, 1);
    }
}
