use std::sync::Arc;

use crate::{application::render::DocumentRenderer, infra::site::StaticSite};

/// Shared state for the server router.
#[derive(Clone)]
pub struct HttpState {
    pub renderer: Arc<dyn DocumentRenderer>,
    /// Built site served for every non-API path, when configured.
    pub site: Option<Arc<StaticSite>>,
}

impl HttpState {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, site: Option<StaticSite>) -> Self {
        Self {
            renderer,
            site: site.map(Arc::new),
        }
    }
}
