mod file_provider;
mod provider;

pub use file_provider::{FileLinkProvider, LinksFile};
pub use provider::{
    AuthorizationProvider, SecureLink, SecureLinkRequest, build_http_client,
    merge_url_with_params,
};
