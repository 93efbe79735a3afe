use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;

use crate::error::ApiResult;

pub struct HttpServer {
    addr: SocketAddr,
    handle: Handle,
}

impl HttpServer {
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handle: Handle::new(),
        }
    }

    /// Handle for stopping the server from another task
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub async fn run(self, router: Router) -> ApiResult<()> {
        log::info!("Opening listen port on {}", self.addr);
        axum_server::bind(self.addr)
            .handle(self.handle)
            .serve(router.into_make_service())
            .await?;
        log::info!("Stopped server {}", self.addr);
        Ok(())
    }
}

/// Ask the server to stop, giving open connections a moment to finish.
pub fn signal_stop(handle: &Handle) {
    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}
