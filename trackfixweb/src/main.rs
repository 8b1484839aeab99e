#![forbid(unsafe_code)]

use std::sync::Arc;

use args::parse_args;
use trackfix_core::registry::SessionRegistry;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;

mod api;
mod args;
mod error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    configure_tracing();

    let args = parse_args();
    info!("Command line arguments: {args:?}");

    let state = AppState {
        registry: Arc::new(SessionRegistry::new()),
    };

    let app = api::router().with_state(state);

    // If the user did not specify a port, let the OS choose a random one.
    let url = if let Some(port) = args.port {
        &format!("localhost:{port}")
    } else {
        "localhost:0"
    };

    let listener = tokio::net::TcpListener::bind(url).await?;

    // Figure out which port was actually used.
    let addr = listener.local_addr()?;
    info!("Listening on http://localhost:{}", addr.port());

    axum::serve(listener, app).await?;

    Ok(())
}

fn configure_tracing() {
    tracing_subscriber::fmt()
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_max_level(tracing::Level::INFO)
        .init();
}

/// Shared application state: the process-wide session registry. Sessions
/// live until deleted; nothing is persisted.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<SessionRegistry>,
}
