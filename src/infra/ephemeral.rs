//! Loopback static server that lives only for the duration of a batch run.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{Router, extract::State, http::Uri, response::Response};
use tokio::{
    net::TcpListener,
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, timeout},
};
use tracing::{info, warn};

use crate::application::origin::loopback_origin;

use super::{error::InfraError, site::StaticSite};

/// How long open connections (the browser keeps some alive) may delay shutdown
/// before the server task is aborted.
const STOP_GRACE: Duration = Duration::from_secs(2);

pub struct EphemeralStaticServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl EphemeralStaticServer {
    /// Bind `127.0.0.1:<port>` (0 picks a free port) and start serving `site`
    /// with single-page-application fallback.
    pub async fn start(site: StaticSite, port: u16) -> Result<Self, InfraError> {
        let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|err| InfraError::bind(requested, err))?;
        let addr = listener.local_addr()?;

        let root = site.root().display().to_string();
        let router = Router::new()
            .fallback(serve_site)
            .with_state(Arc::new(site));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(
            target = "infra::ephemeral",
            op = "ephemeral::start",
            %addr,
            root = %root,
            "static server listening"
        );

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn origin(&self) -> String {
        loopback_origin(self.addr)
    }

    /// Stop serving and release the port. Returns once the listener is closed.
    pub async fn stop(mut self) {
        let started_at = Instant::now();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };

        match timeout(STOP_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => warn!(
                target = "infra::ephemeral",
                op = "ephemeral::stop",
                error = %err,
                "static server exited with an error"
            ),
            Ok(Err(err)) => warn!(
                target = "infra::ephemeral",
                op = "ephemeral::stop",
                error = %err,
                "static server task failed"
            ),
            Err(_) => {
                task.abort();
                let _ = task.await;
            }
        }

        info!(
            target = "infra::ephemeral",
            op = "ephemeral::stop",
            addr = %self.addr,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "static server stopped"
        );
    }
}

impl Drop for EphemeralStaticServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn serve_site(State(site): State<Arc<StaticSite>>, uri: Uri) -> Response {
    site.serve(&uri).await
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener as StdListener;

    use super::*;
    use crate::infra::site::tests::sample_site;

    #[tokio::test]
    async fn serves_until_stopped_then_releases_port() {
        let dir = sample_site();
        let server = EphemeralStaticServer::start(StaticSite::new(dir.path(), true), 0)
            .await
            .expect("start");
        let addr = server.addr();
        assert!(server.origin().starts_with("http://127.0.0.1:"));

        let body = reqwest::get(format!("{}/business-model/antares", server.origin()))
            .await
            .expect("request")
            .text()
            .await
            .expect("body");
        assert_eq!(body, "<html>root</html>");

        server.stop().await;
        TcpListener::bind(addr).await.expect("port is free again");
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let taken = StdListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind");
        let port = taken.local_addr().expect("addr").port();
        let dir = sample_site();

        let err = EphemeralStaticServer::start(StaticSite::new(dir.path(), true), port)
            .await
            .err()
            .expect("port in use");
        assert!(matches!(err, InfraError::Bind { .. }));
    }
}
