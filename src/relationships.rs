use crate::models::LookupRef;
use crate::zoho_client::ZohoClient;
use serde_json::{json, Map};

/// Modules referencing a Contact by foreign key, with the lookup field to
/// re-point.
pub const CONTACT_REFERENCING: [(&str, &str); 8] = [
    ("Deals", "Contact_Name"),
    ("Tasks", "Who_Id"),
    ("Calls", "Who_Id"),
    ("Events", "Who_Id"),
    ("Notes", "Parent_Id"),
    ("Campaigns", "Kontakt"),
    ("Leads", "Kontakt"),
    ("Archived_Leads", "Kontakt"),
];

/// Modules referencing an Account by foreign key.
pub const ACCOUNT_REFERENCING: [(&str, &str); 6] = [
    ("Contacts", "Account_Name"),
    ("Deals", "Account_Name"),
    ("Tasks", "What_Id"),
    ("Accounts", "Parent_Account"),
    ("Klienci_serwisowi", "Firma"),
    ("Klienci_handlowi", "Firma"),
];

/// Totals of one relationship-transfer pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferSummary {
    pub repointed: usize,
    pub failed: usize,
}

impl TransferSummary {
    pub fn clean(&self) -> bool {
        self.failed == 0
    }
}

/// Re-point every record still referencing `source_id` to `target_id`.
///
/// Queries the record store per referencing module at call time, so a re-run
/// after a partial failure only touches the records that still reference the
/// source; the operation is idempotent. Per-record failures are counted and
/// logged, never fatal.
pub async fn transfer_relationships(
    client: &ZohoClient,
    referencing: &[(&str, &str)],
    source_id: &str,
    target_id: &str,
) -> TransferSummary {
    let mut summary = TransferSummary::default();

    for (module, lookup_field) in referencing {
        let criteria = format!("({}:equals:{})", lookup_field, source_id);
        let ids = match client.search_ids(module, &criteria).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(
                    "Could not list {} records referencing {}: {}",
                    module,
                    source_id,
                    e
                );
                summary.failed += 1;
                continue;
            }
        };

        if ids.is_empty() {
            continue;
        }
        tracing::info!(
            "Re-pointing {} {} record(s) from {} to {}",
            ids.len(),
            module,
            source_id,
            target_id
        );

        for id in ids {
            let mut fields = Map::new();
            fields.insert(
                lookup_field.to_string(),
                json!(LookupRef::new(target_id.to_string())),
            );
            match client.update_record(module, &id, fields).await {
                Ok(()) => summary.repointed += 1,
                Err(e) => {
                    tracing::error!(
                        "Failed to re-point {}/{} from {} to {}: {}",
                        module,
                        id,
                        source_id,
                        target_id,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    tracing::info!(
        "Relationship transfer {} -> {}: {} re-pointed, {} failed",
        source_id,
        target_id,
        summary.repointed,
        summary.failed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_clean() {
        let summary = TransferSummary {
            repointed: 4,
            failed: 0,
        };
        assert!(summary.clean());

        let summary = TransferSummary {
            repointed: 4,
            failed: 1,
        };
        assert!(!summary.clean());
    }

    #[test]
    fn test_referencing_tables_have_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for entry in CONTACT_REFERENCING {
            assert!(seen.insert(entry));
        }
        seen.clear();
        for entry in ACCOUNT_REFERENCING {
            assert!(seen.insert(entry));
        }
    }
}
