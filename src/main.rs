mod controllers;

use std::sync::Arc;
use std::time::Duration;

use keel::config::Config;
use keel::middleware::{self, Middleware};
use keel::server;
use keel::session::{MemorySessionStore, SessionStore, SqlSessionStore};
use keel::App;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.level)),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let store: Arc<dyn SessionStore> = match &cfg.database.url {
        Some(url) => Arc::new(SqlSessionStore::connect(url, cfg.session.advisory_lock).await?),
        None => {
            tracing::warn!("No database.url configured, sessions are kept in memory");
            Arc::new(MemorySessionStore::new(cfg.session.advisory_lock))
        }
    };

    let listen_addr = cfg.server.listen_addr.clone();
    let gc_interval = cfg.session.gc_interval();

    let mut app = App::new(cfg);
    app.register_session_store(store)
        .add_middleware(middleware::trace_requests())
        .add_middleware(Middleware::new(|ctx, next| {
            let mut response = next.run(ctx);
            response.set_header("X-Powered-By", "keel");
            response
        }));
    controllers::routes(&mut app)?;
    app.open().await?;

    let app = Arc::new(app);
    let gc = tokio::spawn(collect_sessions(Arc::clone(&app), gc_interval));

    tokio::select! {
        res = server::listener::run(&listen_addr, app) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    gc.abort();
    Ok(())
}

async fn collect_sessions(app: Arc<App>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match app.collect_garbage().await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
            Err(e) => tracing::warn!(error = %e, "Session GC failed"),
        }
    }
}
