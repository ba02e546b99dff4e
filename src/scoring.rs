use crate::models::{
    AccountRecord, ContactRecord, ScoreResult, ACCOUNTS_MODULE, CONTACTS_MODULE,
};
use crate::zoho_client::ZohoClient;

/// Modules whose related lists contribute to a Contact's score.
pub const CONTACT_RELATED_MODULES: [&str; 6] =
    ["Deals", "Notes", "Tasks", "Calls", "Events", "Campaigns"];

/// Lead-family modules referencing a Contact through a lookup field.
pub const CONTACT_LEAD_LOOKUPS: [(&str, &str); 2] =
    [("Leads", "Kontakt"), ("Archived_Leads", "Kontakt")];

/// Modules whose related lists contribute to an Account's score.
pub const ACCOUNT_RELATED_MODULES: [&str; 6] =
    ["Contacts", "Deals", "Notes", "Tasks", "Calls", "Events"];

/// Lead-family modules referencing an Account.
pub const ACCOUNT_LEAD_LOOKUPS: [(&str, &str); 2] =
    [("Leads", "Firma"), ("Archived_Leads", "Firma")];

/// Customer cross-reference modules referencing an Account.
pub const ACCOUNT_CUSTOMER_LOOKUPS: [(&str, &str); 2] =
    [("Klienci_serwisowi", "Firma"), ("Klienci_handlowi", "Firma")];

/// A linked Account outweighs any single filled field.
pub const ACCOUNT_LINK_BONUS: i64 = 3;

fn count_filled<'a>(fields: impl IntoIterator<Item = Option<&'a str>>) -> u32 {
    fields
        .into_iter()
        .filter(|v| v.map(|s| !s.trim().is_empty()).unwrap_or(false))
        .count() as u32
}

/// Field-completeness part of a Contact score. Pure: no lookups.
pub fn contact_field_score(contact: &ContactRecord) -> ScoreResult {
    let mut filled = count_filled([
        contact.first_name.as_deref(),
        contact.last_name.as_deref(),
        contact.title.as_deref(),
        contact.position.as_deref(),
        contact.email.as_deref(),
        contact.secondary_email.as_deref(),
        contact.email_3.as_deref(),
        contact.mobile.as_deref(),
        contact.mobile_2.as_deref(),
        contact.mobile_3.as_deref(),
        contact.phone.as_deref(),
        contact.home_phone.as_deref(),
        contact.other_phone.as_deref(),
        contact.address_type_from_account.as_deref(),
    ]);

    if contact.purchase_influence {
        filled += 1;
    }

    let mut total = filled as i64;
    if contact.account.is_some() {
        total += ACCOUNT_LINK_BONUS;
    }

    ScoreResult {
        total,
        filled_fields: filled,
        related_modules: 0,
        related_count: 0,
    }
}

/// Field-completeness part of an Account score. HQ/Branch address blocks are
/// gated by the address type; service-scope sub-fields only count while
/// their channel is filled.
pub fn account_field_score(account: &AccountRecord) -> ScoreResult {
    let mut fields: Vec<Option<&str>> = vec![
        account.account_name.as_deref(),
        account.alternate_name.as_deref(),
        account.short_name.as_deref(),
        account.tax_id.as_deref(),
        account.regon.as_deref(),
        account.krs.as_deref(),
        account.registration_status.as_deref(),
        account.website.as_deref(),
    ];

    if account.includes_hq() {
        fields.extend([
            account.billing_street.as_deref(),
            account.billing_city.as_deref(),
            account.billing_code.as_deref(),
            account.billing_state.as_deref(),
            account.billing_country.as_deref(),
        ]);
    }
    if account.includes_branch() {
        fields.extend([
            account.shipping_street.as_deref(),
            account.shipping_city.as_deref(),
            account.shipping_code.as_deref(),
            account.shipping_state.as_deref(),
            account.shipping_country.as_deref(),
        ]);
    }

    for (channel, scope) in account.channel_scope_pairs() {
        fields.push(channel);
        if channel.map(|c| !c.trim().is_empty()).unwrap_or(false) {
            fields.push(scope);
        }
    }

    let mut filled = count_filled(fields);
    if !account.tags.is_empty() {
        filled += 1;
    }

    ScoreResult {
        total: filled as i64,
        filled_fields: filled,
        related_modules: 0,
        related_count: 0,
    }
}

/// Count records in a related list; lookup failure contributes nothing.
async fn related_contribution(
    client: &ZohoClient,
    module: &str,
    id: &str,
    related_list: &str,
) -> u32 {
    match client.related_records(module, id, related_list).await {
        Ok(records) => records.len() as u32,
        Err(e) => {
            tracing::warn!(
                "Related lookup {} of {}/{} failed, counting 0: {}",
                related_list,
                module,
                id,
                e
            );
            0
        }
    }
}

/// Count records in another module referencing `id` through a lookup field;
/// failure contributes nothing.
async fn lookup_contribution(client: &ZohoClient, module: &str, field: &str, id: &str) -> u32 {
    let criteria = format!("({}:equals:{})", field, id);
    match client.search_ids(module, &criteria).await {
        Ok(ids) => ids.len() as u32,
        Err(e) => {
            tracing::warn!(
                "Cross-module lookup {}.{} for {} failed, counting 0: {}",
                module,
                field,
                id,
                e
            );
            0
        }
    }
}

/// Full Contact score: field completeness plus connectedness. Partial lookup
/// failures never abort scoring; they contribute 0 and are logged.
pub async fn score_contact(client: &ZohoClient, contact: &ContactRecord) -> ScoreResult {
    let mut score = contact_field_score(contact);

    for module in CONTACT_RELATED_MODULES {
        let count = related_contribution(client, CONTACTS_MODULE, &contact.id, module).await;
        if count > 0 {
            score.related_modules += 1;
            score.related_count += count;
            score.total += 1;
        }
    }

    for (module, field) in CONTACT_LEAD_LOOKUPS {
        let count = lookup_contribution(client, module, field, &contact.id).await;
        if count > 0 {
            score.related_modules += 1;
            score.related_count += count;
            score.total += 1;
        }
    }

    tracing::debug!(
        "Contact {} scored {} ({} fields, {} related modules, {} related records)",
        contact.id,
        score.total,
        score.filled_fields,
        score.related_modules,
        score.related_count
    );
    score
}

/// Full Account score: field completeness, connectedness, and the Account
/// family (parent link plus child Accounts).
pub async fn score_account(client: &ZohoClient, account: &AccountRecord) -> ScoreResult {
    let mut score = account_field_score(account);

    for module in ACCOUNT_RELATED_MODULES {
        let count = related_contribution(client, ACCOUNTS_MODULE, &account.id, module).await;
        if count > 0 {
            score.related_modules += 1;
            score.related_count += count;
            score.total += 1;
        }
    }

    for (module, field) in ACCOUNT_LEAD_LOOKUPS
        .iter()
        .chain(ACCOUNT_CUSTOMER_LOOKUPS.iter())
    {
        let count = lookup_contribution(client, module, field, &account.id).await;
        if count > 0 {
            score.related_modules += 1;
            score.related_count += count;
            score.total += 1;
        }
    }

    // Account family: children referencing this record as parent, plus the
    // parent link itself.
    let children =
        lookup_contribution(client, ACCOUNTS_MODULE, "Parent_Account", &account.id).await;
    if children > 0 {
        score.related_count += children;
        score.total += 1;
    }
    if account.parent_account.is_some() {
        score.total += 1;
    }

    tracing::debug!(
        "Account {} scored {} ({} fields, {} related modules)",
        account.id,
        score.total,
        score.filled_fields,
        score.related_modules
    );
    score
}

/// Completeness score of either record kind, dispatched by module name.
pub async fn score_by_module(
    client: &ZohoClient,
    module: &str,
    id: &str,
) -> Result<ScoreResult, crate::errors::AppError> {
    match module {
        CONTACTS_MODULE => {
            let contact = client.get_contact(id).await?;
            Ok(score_contact(client, &contact).await)
        }
        ACCOUNTS_MODULE => {
            let account = client.get_account(id).await?;
            Ok(score_account(client, &account).await)
        }
        other => Err(crate::errors::AppError::BadRequest(format!(
            "Unsupported module for scoring: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LookupRef;

    fn contact_with_fields() -> ContactRecord {
        ContactRecord {
            id: "1".to_string(),
            first_name: Some("Jan".to_string()),
            last_name: Some("Kowalski".to_string()),
            email: Some("jan@x.pl".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_contact_field_score_counts_non_empty() {
        let contact = contact_with_fields();
        let score = contact_field_score(&contact);
        assert_eq!(score.filled_fields, 3);
        assert_eq!(score.total, 3);
    }

    #[test]
    fn test_account_link_bonus() {
        let mut contact = contact_with_fields();
        let without = contact_field_score(&contact).total;
        contact.account = Some(LookupRef::new("42"));
        let with = contact_field_score(&contact).total;
        assert_eq!(with, without + ACCOUNT_LINK_BONUS);
    }

    #[test]
    fn test_blank_fields_do_not_count() {
        let mut contact = contact_with_fields();
        contact.title = Some("   ".to_string());
        let score = contact_field_score(&contact);
        assert_eq!(score.filled_fields, 3);
    }

    #[test]
    fn test_account_address_blocks_gated_by_type() {
        let mut account = AccountRecord {
            id: "a1".to_string(),
            account_name: Some("Acme".to_string()),
            billing_city: Some("Warszawa".to_string()),
            shipping_city: Some("Krakow".to_string()),
            ..Default::default()
        };

        // Default type counts HQ only
        assert_eq!(account_field_score(&account).filled_fields, 2);

        account.address_type = Some("Centrala i oddzial".to_string());
        assert_eq!(account_field_score(&account).filled_fields, 3);

        account.address_type = Some("Oddzial".to_string());
        assert_eq!(account_field_score(&account).filled_fields, 2);
    }

    #[test]
    fn test_service_scope_only_counts_with_channel() {
        let mut account = AccountRecord {
            id: "a1".to_string(),
            mobile_scope: Some("serwis".to_string()),
            ..Default::default()
        };
        // Scope without its channel contributes nothing
        assert_eq!(account_field_score(&account).filled_fields, 0);

        account.mobile = Some("601234567".to_string());
        assert_eq!(account_field_score(&account).filled_fields, 2);
    }
}
