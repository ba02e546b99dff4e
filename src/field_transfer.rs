use crate::errors::AppError;
use crate::models::{ContactRecord, MergePlan, CONTACTS_MODULE};
use crate::normalize::{emails_match, is_blank, phones_match};
use crate::zoho_client::ZohoClient;
use serde_json::{json, Map, Value};

/// Mutable view of the target's email group while the plan is being built:
/// pending fills must be visible to later source slots so two source emails
/// never land in the same target slot.
#[derive(Debug, Clone)]
struct EmailSlotState {
    field: &'static str,
    flag_field: &'static str,
    value: Option<String>,
    withdrawn: bool,
}

fn email_slot_states(contact: &ContactRecord) -> Vec<EmailSlotState> {
    contact
        .email_slots()
        .iter()
        .map(|(field, value, flag_field, flag)| EmailSlotState {
            field,
            flag_field,
            value: value.map(str::to_string),
            withdrawn: *flag,
        })
        .collect()
}

/// Decide whether the marketing selection needs to change.
///
/// The selection is valid while it is non-empty, not unsubscribed, and names
/// a filled slot whose consent flag is false. Otherwise the first consent-
/// clear filled slot (slot order) becomes the selection; with none left the
/// selection is cleared and the record marked unsubscribed.
///
/// Returns `None` when nothing needs to change.
fn recompute_marketing_selection(
    slots: &[EmailSlotState],
    selected: Option<&str>,
    unsubscribed: bool,
) -> Option<(Option<String>, bool)> {
    let selection_valid = selected
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            !unsubscribed
                && slots.iter().any(|slot| {
                    !slot.withdrawn
                        && slot
                            .value
                            .as_deref()
                            .map(|v| emails_match(v, s))
                            .unwrap_or(false)
                })
        })
        .unwrap_or(false);

    if selection_valid {
        return None;
    }

    let replacement = slots.iter().find_map(|slot| {
        slot.value
            .as_deref()
            .filter(|v| !v.trim().is_empty() && !slot.withdrawn)
            .map(str::to_string)
    });

    match replacement {
        Some(email) => {
            // Already selected and only the flags were stale
            if selected.map(|s| emails_match(s, &email)).unwrap_or(false) && !unsubscribed {
                return None;
            }
            Some((Some(email), false))
        }
        None => {
            let already_cleared =
                selected.map(|s| s.trim().is_empty()).unwrap_or(true) && unsubscribed;
            if already_cleared {
                None
            } else {
                Some((None, true))
            }
        }
    }
}

/// Consent (RODO) normalization of a single record: field updates needed to
/// restore the marketing-selection invariant, or an empty map when the
/// record is already consistent. Run at the start of every resolution.
pub fn normalize_consent_updates(contact: &ContactRecord) -> Map<String, Value> {
    let slots = email_slot_states(contact);
    let mut updates = Map::new();

    if let Some((selection, unsubscribed)) = recompute_marketing_selection(
        &slots,
        contact.marketing_email.as_deref(),
        contact.marketing_unsubscribed,
    ) {
        updates.insert(
            "Mail_marketingowy".to_string(),
            selection.map(Value::String).unwrap_or(Value::Null),
        );
        updates.insert("Email_Opt_Out".to_string(), json!(unsubscribed));
    }

    updates
}

/// Scalar fields copied only into an empty target.
fn fill_scalars(plan: &mut MergePlan, target: &ContactRecord, source: &ContactRecord) {
    let pairs: [(&str, &Option<String>, &Option<String>); 5] = [
        ("First_Name", &target.first_name, &source.first_name),
        ("Last_Name", &target.last_name, &source.last_name),
        ("Title", &target.title, &source.title),
        ("Stanowisko", &target.position, &source.position),
        (
            "Typ_adresu_z_firmy",
            &target.address_type_from_account,
            &source.address_type_from_account,
        ),
    ];

    for (field, target_value, source_value) in pairs {
        if is_blank(target_value) && !is_blank(source_value) {
            plan.set(field, json!(source_value.as_ref().unwrap().trim()));
        }
    }

    if !target.purchase_influence && source.purchase_influence {
        plan.set("Wplyw_na_zakup", json!(true));
    }

    if target.account.is_none() {
        if let Some(account) = &source.account {
            plan.set("Account_Name", json!({ "id": account.id }));
        }
    }
}

/// Email slot-fill with consent propagation. A source email already present
/// on the target only propagates a withdrawn-consent flag; a new one takes
/// the first free slot (carrying its flag); with no free slot the value is
/// dropped (the documented lossy edge case).
fn fill_email_group(plan: &mut MergePlan, slots: &mut [EmailSlotState], source: &ContactRecord) {
    for (_, source_value, _, source_withdrawn) in source.email_slots() {
        let Some(value) = source_value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };

        let existing = slots.iter().position(|slot| {
            slot.value
                .as_deref()
                .map(|v| emails_match(v, value))
                .unwrap_or(false)
        });

        if let Some(idx) = existing {
            if source_withdrawn && !slots[idx].withdrawn {
                slots[idx].withdrawn = true;
                plan.set(slots[idx].flag_field, json!(true));
                tracing::debug!(
                    "Propagating withdrawn consent for {} onto target slot {}",
                    value,
                    slots[idx].field
                );
            }
            continue;
        }

        let free = slots
            .iter()
            .position(|slot| slot.value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true));

        match free {
            Some(idx) => {
                slots[idx].value = Some(value.to_string());
                plan.set(slots[idx].field, json!(value));
                if source_withdrawn {
                    slots[idx].withdrawn = true;
                    plan.set(slots[idx].flag_field, json!(true));
                }
            }
            None => {
                tracing::warn!(
                    "Email {} from source not transferred: all target slots filled",
                    value
                );
            }
        }
    }
}

/// Phone slot-fill, shared by the mobile and landline groups. Equality is
/// digits-only, so "+48 601 234 567" and "601234567" occupy one slot.
fn fill_phone_group(
    plan: &mut MergePlan,
    target_slots: [(&'static str, Option<&str>); 3],
    source_values: impl IntoIterator<Item = Option<String>>,
) {
    let mut slots: Vec<(&'static str, Option<String>)> = target_slots
        .iter()
        .map(|(field, value)| (*field, value.map(str::to_string)))
        .collect();

    for source_value in source_values {
        let Some(value) = source_value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        else {
            continue;
        };

        let already_present = slots.iter().any(|(_, v)| {
            v.as_deref().map(|existing| phones_match(existing, value)).unwrap_or(false)
        });
        if already_present {
            continue;
        }

        let free = slots
            .iter()
            .position(|(_, v)| v.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true));

        match free {
            Some(idx) => {
                slots[idx].1 = Some(value.to_string());
                plan.set(slots[idx].0, json!(value));
            }
            None => {
                tracing::warn!(
                    "Phone {} from source not transferred: all target slots filled",
                    value
                );
            }
        }
    }
}

/// Compute the full field-transfer plan for merging `source` into `target`.
///
/// The plan is a single update map; an empty plan means the target already
/// holds everything the source had to offer.
pub fn build_contact_merge_plan(target: &ContactRecord, source: &ContactRecord) -> MergePlan {
    let mut plan = MergePlan::default();

    fill_scalars(&mut plan, target, source);

    let mut email_slots = email_slot_states(target);
    fill_email_group(&mut plan, &mut email_slots, source);

    fill_phone_group(
        &mut plan,
        target.mobile_slots(),
        source.mobile_slots().iter().map(|(_, v)| v.map(str::to_string)),
    );
    fill_phone_group(
        &mut plan,
        target.landline_slots(),
        source.landline_slots().iter().map(|(_, v)| v.map(str::to_string)),
    );

    // Marketing selection is recomputed against the post-transfer email
    // state so a slot filled by this very plan can become the selection.
    if let Some((selection, unsubscribed)) = recompute_marketing_selection(
        &email_slots,
        target.marketing_email.as_deref(),
        target.marketing_unsubscribed,
    ) {
        plan.set(
            "Mail_marketingowy",
            selection.map(Value::String).unwrap_or(Value::Null),
        );
        plan.set("Email_Opt_Out", json!(unsubscribed));
    }

    plan
}

/// Apply the plan in one update call; an empty plan performs no call.
/// Returns the number of fields written.
pub async fn apply_merge_plan(
    client: &ZohoClient,
    target_id: &str,
    plan: &MergePlan,
) -> Result<usize, AppError> {
    if plan.is_empty() {
        tracing::info!("Merge plan for {} is empty, skipping update", target_id);
        return Ok(0);
    }

    let fields = plan.updates.len();
    client
        .update_record(CONTACTS_MODULE, target_id, plan.updates.clone())
        .await?;
    tracing::info!("Transferred {} fields onto contact {}", fields, target_id);
    Ok(fields)
}
