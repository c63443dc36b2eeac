//! Serve command - HTTP run trigger, optionally on a schedule

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use ynabber_core::{RunMode, YnabberContext};

pub async fn run(ctx: YnabberContext) -> Result<()> {
    let addr = format!("0.0.0.0:{}", ctx.config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let state = ctx.trigger_state();
    if state.mode() == RunMode::Once {
        tracing::info!("single-shot mode, exiting after the first successful run");
    }

    ynabber_core::server::serve(listener, state).await?;
    Ok(())
}
