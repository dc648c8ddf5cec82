use crate::config::{Config, ResourceConfig};
use crate::reconciler::{Action, Provider, ResourceClient};
use crate::resources::{ApiRoleClient, MobileDeviceGroupClient};
use crate::state::DesiredState;
use anyhow::Context;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub unchanged: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// `kind 'name'` of every resource which failed to converge
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, action: Action) {
        match action {
            Action::None => self.unchanged += 1,
            Action::Create => self.created += 1,
            Action::Update => self.updated += 1,
            Action::Delete => self.deleted += 1,
        }
    }
}

/// Runs one convergence pass over every declared resource.
///
/// Each resource gets its own client and provider, so a failure leaves the
/// others untouched.
pub struct Operator {
    resources: Vec<ResourceConfig>,
}

impl Operator {
    pub fn new(config: Config) -> Self {
        Self {
            resources: config.resources,
        }
    }

    pub async fn run(&self) -> RunSummary {
        log::info!("Converging {} resources", self.resources.len());

        let mut summary = RunSummary::default();
        for resource in &self.resources {
            match self.converge(resource).await {
                Ok(action) => summary.record(action),
                Err(err) => {
                    log::warn!("Failed to converge: {err:#}");
                    summary
                        .failed
                        .push(format!("{} '{}'", resource.kind(), resource.name()));
                }
            }
        }

        log::info!(
            "Done: {} unchanged, {} created, {} updated, {} deleted, {} failed",
            summary.unchanged,
            summary.created,
            summary.updated,
            summary.deleted,
            summary.failed.len()
        );
        summary
    }

    async fn converge(&self, resource: &ResourceConfig) -> anyhow::Result<Action> {
        let context = || format!("{} '{}'", resource.kind(), resource.name());

        match resource {
            ResourceConfig::ApiRole(config) => {
                let connection = &config.connection;
                let client = ApiRoleClient::new(
                    connection.build_client().with_context(context)?,
                    &connection.api_url,
                    connection.match_policy,
                )
                .with_context(context)?;
                converge(client, config.desired()).await
            }
            ResourceConfig::MobileDeviceGroup(config) => {
                let connection = &config.connection;
                let client = MobileDeviceGroupClient::new(
                    connection.build_client().with_context(context)?,
                    &connection.api_url,
                    connection.match_policy,
                )
                .with_context(context)?;
                converge(client, config.desired()).await
            }
        }
    }
}

async fn converge<C>(client: C, desired: DesiredState<C::Attributes>) -> anyhow::Result<Action>
where
    C: ResourceClient,
{
    let kind = client.kind();
    let name = desired.name.clone();
    log::info!("Converging {kind} '{name}' (ensure: {:?})", desired.ensure);

    let report = Provider::new(client, desired)
        .converge()
        .await
        .with_context(|| format!("{kind} '{name}'"))?;

    match report.action {
        Action::None => log::info!("{kind} '{name}' is in sync"),
        Action::Create => log::info!("Created {kind} '{name}'"),
        Action::Update => log::info!(
            "Updated {kind} '{name}' ({})",
            report.changed.join(", ")
        ),
        Action::Delete => log::info!("Deleted {kind} '{name}'"),
    }
    log::debug!("{kind} '{name}' now: {:?}", report.state);

    Ok(report.action)
}
