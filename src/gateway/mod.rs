//! The session-aware request gateway and its request/response types.

pub mod client;
pub mod request;
pub mod response;

pub use client::{normalize_base_url, Gateway};
pub use request::ApiRequest;
pub use response::ApiResponse;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::{normalize_base_url, Gateway};
    use crate::session::{HttpRenewer, SessionCoordinator};
    use crate::store::MemoryStore;

    /// A gateway talking to `base_url`, renewing through `{base_url}/auth/refresh`.
    pub(crate) fn gateway_for(base_url: &str, store: MemoryStore) -> Gateway {
        let base_url = normalize_base_url(base_url).unwrap();
        let http = reqwest::Client::new();
        let renewer = HttpRenewer::new(http.clone(), base_url.join("auth/refresh").unwrap());
        let session = SessionCoordinator::new(Arc::new(store), Arc::new(renewer));
        Gateway::new(http, base_url, Arc::new(session))
    }
}
