//! Script to run one duplicate resolution from the command line.
//!
//! Usage: dedup_contact <contact_id>

use crm_dedup_api::config::Config;
use crm_dedup_api::models::ResolutionStatus;
use crm_dedup_api::resolution::resolve_contact_workflow;
use crm_dedup_api::zoho_client::ZohoClient;
use std::env;

/// Main entry point for the resolution script.
///
/// Reads CRM credentials from the environment, runs the full resolution
/// workflow for the given contact id and prints the report as JSON.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let contact_id = env::args()
        .nth(1)
        .ok_or("usage: dedup_contact <contact_id>")?;

    let config = Config::from_env()?;
    let zoho = ZohoClient::from_config(&config)?;

    tracing::info!("Running duplicate resolution for contact {}", contact_id);
    let report = resolve_contact_workflow(&zoho, &contact_id).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    match report.status {
        ResolutionStatus::Success | ResolutionStatus::NoDuplicates => Ok(()),
        ResolutionStatus::Partial => {
            tracing::warn!("Resolution partially complete: {}", report.message);
            Ok(())
        }
        ResolutionStatus::Failed => Err(report.message.into()),
    }
}
