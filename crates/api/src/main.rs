use std::sync::Arc;

use anyhow::Result;
use novacite_agents::AssistantRuntime;
use novacite_api::{build_app, ApiConfig};
use novacite_core::Settings;
use novacite_observability::init_tracing;
use novacite_scrape::{run_daily, ListOnlySelector};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let settings = Settings::from_env();
    init_tracing("novacite_api", Some(settings.log_dir.as_path()));

    let config = ApiConfig::from_env();
    let runtime = AssistantRuntime::connect(settings).await?;

    let desk = runtime.circulars_desk(Arc::new(ListOnlySelector));
    let scrape_hour = runtime.settings().scrape_hour;
    tokio::spawn(async move {
        if let Err(err) = run_daily(&desk, scrape_hour).await {
            tracing::error!(error = %err, "circulars scheduler stopped");
        }
    });

    let app = build_app(&runtime, &config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, "novacite api started");

    axum::serve(listener, app).await?;
    Ok(())
}
