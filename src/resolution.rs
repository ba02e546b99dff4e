use crate::consolidation::consolidate_account;
use crate::discovery::discover_contact_candidates;
use crate::errors::{AppError, ResultExt};
use crate::field_transfer::{apply_merge_plan, build_contact_merge_plan, normalize_consent_updates};
use crate::merge::resolve_merge;
use crate::models::{
    ContactRecord, DuplicateSearch, ResolutionReport, ResolutionStatus, CONTACTS_MODULE,
};
use crate::relationships::{transfer_relationships, CONTACT_REFERENCING};
use crate::zoho_client::ZohoClient;
use chrono::Utc;
use serde_json::{Map, Value};

/// Fold an update map into the in-memory record so later steps see the
/// normalized state without a re-fetch.
fn apply_updates_locally(contact: &ContactRecord, updates: &Map<String, Value>) -> ContactRecord {
    let mut value = serde_json::to_value(contact).unwrap_or(Value::Null);
    if let Value::Object(ref mut object) = value {
        for (field, new_value) in updates {
            object.insert(field.clone(), new_value.clone());
        }
    }
    serde_json::from_value(value).unwrap_or_else(|_| contact.clone())
}

/// Complete resolution run for one Contact.
///
/// Steps are strictly sequential; each depends on the previous step's
/// committed state:
/// 1. Fetch the subject (fatal on failure, nothing was mutated yet)
/// 2. Consent normalization of the subject
/// 3. Candidate Discovery
/// 4. Merge resolution (winner/loser)
/// 5. Field transfer onto the target
/// 6. Relationship transfer
/// 7. Account consolidation check on the target's Account
/// 8. Source deletion
///
/// Recoverable step failures accumulate into a `Partial` report naming the
/// failed steps; the source is only deleted once its data and relationships
/// have demonstrably moved.
pub async fn resolve_contact_workflow(
    client: &ZohoClient,
    contact_id: &str,
) -> Result<ResolutionReport, AppError> {
    tracing::info!("Starting resolution run for contact {}", contact_id);

    // Step 1: Fetch the subject record
    tracing::info!("Step 1: Fetching subject contact {}", contact_id);
    let mut subject = client
        .get_contact(contact_id)
        .await
        .context("fetching subject contact")?;

    // Step 2: Consent normalization (RODO) before any matching
    tracing::info!("Step 2: Normalizing consent state");
    let consent_updates = normalize_consent_updates(&subject);
    if !consent_updates.is_empty() {
        match client
            .update_record(CONTACTS_MODULE, contact_id, consent_updates.clone())
            .await
        {
            Ok(()) => subject = apply_updates_locally(&subject, &consent_updates),
            Err(e) => {
                tracing::warn!("Consent normalization update failed, continuing: {}", e);
            }
        }
    }

    // Step 3: Candidate Discovery
    tracing::info!("Step 3: Discovering duplicate candidates");
    let candidate_ids = match discover_contact_candidates(client, &subject).await {
        DuplicateSearch::Candidates(ids) => ids,
        DuplicateSearch::NoneFound => {
            tracing::info!("No duplicates found for contact {}", contact_id);
            return Ok(ResolutionReport::no_duplicates(contact_id));
        }
    };
    tracing::info!("Found {} candidate(s)", candidate_ids.len());

    // Step 4: Merge resolution
    tracing::info!("Step 4: Resolving merge winner/loser");
    let Some(decision) = resolve_merge(client, &subject, &candidate_ids).await? else {
        tracing::info!("No scorable candidates for contact {}", contact_id);
        return Ok(ResolutionReport::no_duplicates(contact_id));
    };

    let mut failures: Vec<String> = Vec::new();

    // Step 5: Field transfer onto the target
    tracing::info!("Step 5: Transferring fields onto target {}", decision.target.id);
    let plan = build_contact_merge_plan(&decision.target, &decision.source);
    let transfer_ok;
    let fields_transferred = match apply_merge_plan(client, &decision.target.id, &plan).await {
        Ok(count) => {
            transfer_ok = true;
            count
        }
        Err(e) => {
            transfer_ok = false;
            failures.push(format!("field transfer: {}", e));
            0
        }
    };

    // Step 6: Relationship transfer
    tracing::info!(
        "Step 6: Re-pointing relationships from {} to {}",
        decision.source.id,
        decision.target.id
    );
    let transfer_summary = transfer_relationships(
        client,
        &CONTACT_REFERENCING,
        &decision.source.id,
        &decision.target.id,
    )
    .await;
    if !transfer_summary.clean() {
        failures.push(format!(
            "relationship transfer: {} record(s) failed",
            transfer_summary.failed
        ));
    }

    // Step 7: Account consolidation check on the target's Account. When the
    // link itself arrived with this merge, it only exists in the store if
    // the field transfer went through.
    let account_id = decision
        .target
        .account
        .as_ref()
        .map(|a| a.id.clone())
        .or_else(|| {
            if !transfer_ok {
                return None;
            }
            plan.updates
                .get("Account_Name")
                .and_then(|v| v.get("id"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
    let consolidation = match account_id {
        Some(account_id) => {
            tracing::info!("Step 7: Consolidation check on account {}", account_id);
            let outcome = consolidate_account(client, &decision.target.id, &account_id).await;
            if let crate::models::ConsolidationOutcome::Failed { reason } = &outcome {
                failures.push(format!("account consolidation: {}", reason));
            }
            Some(outcome)
        }
        None => {
            tracing::info!("Step 7: Target has no linked account, consolidation skipped");
            None
        }
    };

    // Step 8: Source deletion, only once data and relationships have moved
    if transfer_ok && transfer_summary.clean() {
        tracing::info!("Step 8: Deleting source contact {}", decision.source.id);
        if let Err(e) = client
            .delete_record(CONTACTS_MODULE, &decision.source.id)
            .await
        {
            // Fields are already transferred; only the delete needs a retry
            failures.push(format!("source delete: {}", e));
        }
    } else {
        tracing::warn!(
            "Step 8: Source {} retained, earlier steps failed",
            decision.source.id
        );
        failures.push("source retained pending earlier failures".to_string());
    }

    let status = if failures.is_empty() {
        ResolutionStatus::Success
    } else {
        ResolutionStatus::Partial
    };
    let message = if failures.is_empty() {
        format!(
            "merged {} into {}",
            decision.source.id, decision.target.id
        )
    } else {
        format!(
            "merged {} into {}; incomplete steps: {}",
            decision.source.id,
            decision.target.id,
            failures.join("; ")
        )
    };
    tracing::info!("Resolution run for {} finished: {}", contact_id, message);

    Ok(ResolutionReport {
        contact_id: contact_id.to_string(),
        status,
        message,
        winner_id: Some(decision.target.id.clone()),
        loser_id: Some(decision.source.id.clone()),
        fields_transferred,
        relationships_repointed: transfer_summary.repointed,
        relationship_failures: transfer_summary.failed,
        consolidation,
        completed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_updates_locally() {
        let contact = ContactRecord {
            id: "1".to_string(),
            marketing_email: Some("a@x.pl".to_string()),
            marketing_unsubscribed: false,
            ..Default::default()
        };

        let mut updates = Map::new();
        updates.insert("Mail_marketingowy".to_string(), Value::Null);
        updates.insert("Email_Opt_Out".to_string(), json!(true));

        let updated = apply_updates_locally(&contact, &updates);
        assert!(updated.marketing_email.is_none());
        assert!(updated.marketing_unsubscribed);
        assert_eq!(updated.id, "1");
    }
}
