use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::app::App;
use crate::http::connection::Connection;

/// Binds `addr` and serves connections until accepting fails.
pub async fn run(addr: &str, app: Arc<App>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, app).await
}

/// Accepts connections on `listener` and serves each on its own task.
pub async fn serve(listener: TcpListener, app: Arc<App>) -> anyhow::Result<()> {
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let (socket, peer) = listener.accept().await?;
        tracing::debug!("Accepted connection from {}", peer);

        let app = Arc::clone(&app);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer, app);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
