use std::sync::Arc;

use color_eyre::{eyre::bail, Result};
use trellis_core::MemoryHistory;
use trellis_router::{Router, RouterMode, RouterOptions, RouterState};

use crate::config;

/// Navigate a fresh in-memory router through `paths`, printing each state.
pub async fn handle(paths: Vec<String>, config: &config::Config) -> Result<()> {
    let router = build_router(&config.router)?;
    for path in paths {
        let state = navigate(&router, &path).await?;
        if state.route_id.is_none() {
            println!("No route matches {path}");
        }
        println!("{}", serde_json::to_string_pretty(&state)?);
    }
    Ok(())
}

fn build_router(options: &RouterOptions) -> Result<Router> {
    let start = match options.mode {
        RouterMode::Hash => "/".to_string(),
        RouterMode::History => format!("{}/", options.base_url.trim_end_matches('/')),
    };
    let history = MemoryHistory::new(&start)?;
    Ok(Router::new(options.clone(), Arc::new(history)))
}

async fn navigate(router: &Router, path: &str) -> Result<RouterState> {
    if !router.push(path, None).await {
        bail!("navigation to {path} did not complete");
    }
    Ok(router.get_state())
}
