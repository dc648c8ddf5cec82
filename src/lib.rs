pub mod client;
pub mod config;
pub mod error;
pub mod operator;
pub mod reconciler;
pub mod resources;
pub mod state;
pub mod xml;

pub use error::{Error, Result};
pub use operator::*;

use crate::config::Config;

pub async fn run(config: Config) -> anyhow::Result<()> {
    log::info!("Config: {config:#?}");

    let summary = Operator::new(config).run().await;

    if !summary.is_success() {
        anyhow::bail!(
            "{} resource(s) failed to converge: {}",
            summary.failed.len(),
            summary.failed.join(", ")
        );
    }

    Ok(())
}
