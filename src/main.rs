use anyhow::Context;
use portfolio_bridge::{cli::CliArgs, config::Config, logging::init_tracing, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::from_env()?;
    let config_source = args
        .config_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "environment".to_string());
    let mut config = Config::load(args.config_path.as_deref())
        .with_context(|| format!("failed to load config from {}", config_source))?;
    args.apply_to(&mut config);

    let logging_guard = init_tracing(&config.logging)?;
    tracing::info!(
        target: "main",
        run_id = %logging_guard.run_id(),
        config_source = %config_source,
        "gateway_starting"
    );
    for warning in config.startup_warnings() {
        tracing::warn!(target: "config", warning = %warning, "config_startup_warning");
    }

    server::run(config).await
}
