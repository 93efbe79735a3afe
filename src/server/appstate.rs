use std::sync::Arc;

use crate::backend::oelo::OeloBackend;

#[derive(Clone)]
pub struct AppState {
    backend: Arc<OeloBackend>,
}

impl AppState {
    #[must_use]
    pub const fn new(backend: Arc<OeloBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend(&self) -> &OeloBackend {
        &self.backend
    }
}
