use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use university_records::{Registry, Result, config::settings::Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();

    // 3. Read runtime settings
    let settings = Settings::from_env()
        .inspect_err(|e| error!("Failed to read settings: {}", e))?;
    info!(
        lock_hold = ?settings.lock_hold,
        strict = settings.strict_status_transitions,
        "Settings loaded"
    );

    // 4. Connect and create missing tables
    let registry = Registry::connect(settings)
        .await
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed the catalog, if a catalog file is present
    if let Some(report) = registry
        .seed_from_settings()
        .await
        .inspect_err(|e| error!(kind = %e.kind(), "Failed to seed catalog: {}", e))?
    {
        info!(?report, "Catalog seeded");
    }

    let students = registry.list_active_students().await?;
    info!(active_students = students.len(), "Records core ready");
    Ok(())
}
