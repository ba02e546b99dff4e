use crate::discovery::discover_account_candidates;
use crate::models::{
    AccountRecord, ConsolidationOutcome, DuplicateSearch, ACCOUNTS_MODULE, CONTACTS_MODULE,
};
use crate::normalize::is_blank;
use crate::scoring::score_account;
use crate::zoho_client::ZohoClient;
use serde_json::{json, Map};

/// Accounts scoring at or above this are always kept, even when a better
/// one absorbs their Contact.
pub const MIN_KEEP_SCORE: i64 = 5;

/// Best-scoring candidate Account, discovered and scored.
async fn best_candidate_account(
    client: &ZohoClient,
    account: &AccountRecord,
) -> Option<(AccountRecord, i64)> {
    let candidate_ids = match discover_account_candidates(client, account).await {
        DuplicateSearch::Candidates(ids) => ids,
        DuplicateSearch::NoneFound => return None,
    };

    let mut best: Option<(AccountRecord, i64)> = None;
    for candidate_id in candidate_ids {
        let candidate = match client.get_account(&candidate_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping account candidate {}: {}", candidate_id, e);
                continue;
            }
        };
        let score = score_account(client, &candidate).await.total;
        let beats_current = best
            .as_ref()
            .map(|(_, best_score)| score > *best_score)
            .unwrap_or(true);
        if beats_current {
            best = Some((candidate, score));
        }
    }
    best
}

/// Re-queried at decision time, never from cached state: another in-flight
/// run may have attached a Contact since this one started.
async fn linked_contacts_remain(client: &ZohoClient, account_id: &str) -> Result<bool, String> {
    let criteria = format!("(Account_Name:equals:{})", account_id);
    match client.search_ids(CONTACTS_MODULE, &criteria).await {
        Ok(ids) => Ok(!ids.is_empty()),
        Err(e) => Err(format!("linked-contact check failed: {}", e)),
    }
}

/// Account Consolidation Check, run after a Contact merge on the target's
/// linked Account.
///
/// An Account that already carries a tax id is authoritative and is left
/// alone. Otherwise the Contact is re-linked to the best-scoring duplicate
/// Account, and the inferior one is deleted only when it scores below
/// [`MIN_KEEP_SCORE`] and no Contacts reference it anymore.
pub async fn consolidate_account(
    client: &ZohoClient,
    contact_id: &str,
    account_id: &str,
) -> ConsolidationOutcome {
    let account = match client.get_account(account_id).await {
        Ok(record) => record,
        Err(e) => {
            return ConsolidationOutcome::Failed {
                reason: format!("could not fetch account {}: {}", account_id, e),
            }
        }
    };

    if !is_blank(&account.tax_id) {
        tracing::info!(
            "Account {} has tax id {}, consolidation skipped",
            account_id,
            account.tax_id.as_deref().unwrap_or("")
        );
        return ConsolidationOutcome::Skipped;
    }

    let current_score = score_account(client, &account).await.total;

    let Some((best, best_score)) = best_candidate_account(client, &account).await else {
        tracing::info!(
            "No candidate accounts for {} (score {}), left as is",
            account_id,
            current_score
        );
        return ConsolidationOutcome::LeftAsIs;
    };

    if best_score <= current_score {
        tracing::info!(
            "Account {} (score {}) already best among candidates (best {}), left as is",
            account_id,
            current_score,
            best_score
        );
        return ConsolidationOutcome::LeftAsIs;
    }

    tracing::info!(
        "Re-linking contact {} from account {} (score {}) to {} (score {})",
        contact_id,
        account_id,
        current_score,
        best.id,
        best_score
    );
    let mut fields = Map::new();
    fields.insert("Account_Name".to_string(), json!({ "id": best.id }));
    if let Err(e) = client.update_record(CONTACTS_MODULE, contact_id, fields).await {
        return ConsolidationOutcome::Failed {
            reason: format!("re-link to {} failed: {}", best.id, e),
        };
    }

    // High-completeness accounts are never deleted, only bypassed.
    if current_score >= MIN_KEEP_SCORE {
        return ConsolidationOutcome::Relinked {
            account_id: best.id,
        };
    }

    match linked_contacts_remain(client, account_id).await {
        Ok(true) => {
            tracing::info!(
                "Account {} still has linked contacts, keeping it",
                account_id
            );
            ConsolidationOutcome::Relinked {
                account_id: best.id,
            }
        }
        Ok(false) => match client.delete_record(ACCOUNTS_MODULE, account_id).await {
            Ok(()) => ConsolidationOutcome::RelinkedAndDeleted {
                account_id: best.id,
                deleted_account_id: account_id.to_string(),
            },
            Err(e) => {
                tracing::error!("Could not delete superseded account {}: {}", account_id, e);
                ConsolidationOutcome::Relinked {
                    account_id: best.id,
                }
            }
        },
        Err(reason) => {
            // Without a trustworthy contact count, deleting is unsafe.
            tracing::warn!("{}; keeping account {}", reason, account_id);
            ConsolidationOutcome::Relinked {
                account_id: best.id,
            }
        }
    }
}
