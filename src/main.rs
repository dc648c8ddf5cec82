use anyhow::Context;
use jamf_provider::{config, run};

const CONFIG_ENV: &str = "JAMF_PROVIDER_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .context("Usage: jamf-provider <manifest.yaml> (or set JAMF_PROVIDER_CONFIG)")?;

    let config = config::load(&path).with_context(|| format!("Failed to load {path}"))?;

    run(config).await
}
