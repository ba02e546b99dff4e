use crate::models::{AccountRecord, ContactRecord, DuplicateSearch, ACCOUNTS_MODULE, CONTACTS_MODULE};
use crate::normalize::{escape_coql_value, escape_criteria_value, phone_digits, phone_variants};
use crate::zoho_client::ZohoClient;
use std::collections::BTreeSet;

/// One executable match criterion: the same predicate rendered for both
/// lookup paths (criteria search grammar and COQL).
#[derive(Debug, Clone)]
pub struct MatchCriterion {
    pub label: String,
    pub criteria: String,
    pub coql_where: String,
}

/// A predicate rendered in both grammars at once.
#[derive(Debug, Clone)]
struct Expr {
    criteria: String,
    coql: String,
}

fn eq(field: &str, value: &str) -> Expr {
    Expr {
        criteria: format!("({}:equals:{})", field, escape_criteria_value(value)),
        coql: format!("({} = '{}')", field, escape_coql_value(value)),
    }
}

fn any_of(exprs: Vec<Expr>) -> Expr {
    join(exprs, "or")
}

fn all_of(exprs: Vec<Expr>) -> Expr {
    join(exprs, "and")
}

fn join(exprs: Vec<Expr>, op: &str) -> Expr {
    if exprs.len() == 1 {
        return exprs.into_iter().next().unwrap();
    }
    Expr {
        criteria: format!(
            "({})",
            exprs
                .iter()
                .map(|e| e.criteria.as_str())
                .collect::<Vec<_>>()
                .join(op)
        ),
        coql: format!(
            "({})",
            exprs
                .iter()
                .map(|e| e.coql.as_str())
                .collect::<Vec<_>>()
                .join(&format!(" {} ", op))
        ),
    }
}

const CONTACT_EMAIL_FIELDS: [&str; 3] = ["Email", "Secondary_Email", "Email_3"];
const CONTACT_PHONE_FIELDS: [&str; 6] = [
    "Mobile",
    "Telefon_komorkowy",
    "Telefon_komorkowy_2",
    "Phone",
    "Home_Phone",
    "Other_Phone",
];
const ACCOUNT_NAME_FIELDS: [&str; 3] = ["Account_Name", "Nazwa_alternatywna", "Nazwa_skrocona"];

/// A value may hide in any slot of the candidate's group.
fn email_in_any_slot(value: &str) -> Expr {
    any_of(CONTACT_EMAIL_FIELDS.iter().map(|f| eq(f, value)).collect())
}

fn phone_in_any_slot(forms: &[String]) -> Expr {
    let mut exprs = Vec::new();
    for field in CONTACT_PHONE_FIELDS {
        for form in forms {
            exprs.push(eq(field, form));
        }
    }
    any_of(exprs)
}

fn non_empty_emails(contact: &ContactRecord) -> Vec<String> {
    contact
        .email_slots()
        .iter()
        .filter_map(|(_, v, _, _)| v.map(str::trim))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_phones(contact: &ContactRecord) -> Vec<String> {
    contact
        .phone_slots()
        .iter()
        .filter_map(|(_, v)| v.map(str::trim))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the ranked criteria tiers for a Contact. Each tier is emitted only
/// when the fields it depends on are present; if no tier produced anything,
/// a name-only fallback criterion is issued instead.
pub fn build_contact_criteria(contact: &ContactRecord) -> Vec<MatchCriterion> {
    let mut criteria = Vec::new();

    let first = contact.first_name.as_deref().map(str::trim).unwrap_or("");
    let last = contact.last_name.as_deref().map(str::trim).unwrap_or("");
    let account_name = contact
        .account
        .as_ref()
        .and_then(|a| a.name.as_deref())
        .map(str::trim)
        .unwrap_or("");

    let emails = non_empty_emails(contact);
    let phones = non_empty_phones(contact);

    // Tier 1: full name + any email slot
    if !first.is_empty() && !last.is_empty() {
        for email in &emails {
            let expr = all_of(vec![
                eq("First_Name", first),
                eq("Last_Name", last),
                email_in_any_slot(email),
            ]);
            criteria.push(MatchCriterion {
                label: format!("name+email:{}", email),
                criteria: expr.criteria,
                coql_where: expr.coql,
            });
        }
    }

    // Tier 2: full name + any phone slot, digits-only comparison (stored
    // values may be formatted, so both the raw and the digit form are tried)
    if !first.is_empty() && !last.is_empty() {
        for phone in &phones {
            let mut forms = vec![phone.clone()];
            let digits = phone_digits(phone);
            if !digits.is_empty() && digits != *phone {
                forms.push(digits);
            }
            let expr = all_of(vec![
                eq("First_Name", first),
                eq("Last_Name", last),
                phone_in_any_slot(&forms),
            ]);
            criteria.push(MatchCriterion {
                label: format!("name+phone:{}", phone),
                criteria: expr.criteria,
                coql_where: expr.coql,
            });
        }
    }

    // Tier 3: last name + account name + email or phone
    if !last.is_empty() && !account_name.is_empty() && (!emails.is_empty() || !phones.is_empty()) {
        for email in &emails {
            let expr = all_of(vec![
                eq("Last_Name", last),
                eq("Account_Name", account_name),
                email_in_any_slot(email),
            ]);
            criteria.push(MatchCriterion {
                label: format!("lastname+account+email:{}", email),
                criteria: expr.criteria,
                coql_where: expr.coql,
            });
        }
        for phone in &phones {
            let mut forms = vec![phone.clone()];
            let digits = phone_digits(phone);
            if !digits.is_empty() && digits != *phone {
                forms.push(digits);
            }
            let expr = all_of(vec![
                eq("Last_Name", last),
                eq("Account_Name", account_name),
                phone_in_any_slot(&forms),
            ]);
            criteria.push(MatchCriterion {
                label: format!("lastname+account+phone:{}", phone),
                criteria: expr.criteria,
                coql_where: expr.coql,
            });
        }
    }

    // Tier 4: first name + account name + email or phone, phones widened to
    // every CRM spelling (bare digits, mobile/landline spacing, E.164)
    if !first.is_empty() && !account_name.is_empty() && (!emails.is_empty() || !phones.is_empty()) {
        for email in &emails {
            let expr = all_of(vec![
                eq("First_Name", first),
                eq("Account_Name", account_name),
                email_in_any_slot(email),
            ]);
            criteria.push(MatchCriterion {
                label: format!("firstname+account+email:{}", email),
                criteria: expr.criteria,
                coql_where: expr.coql,
            });
        }
        for phone in &phones {
            let forms = phone_variants(phone);
            if forms.is_empty() {
                continue;
            }
            let expr = all_of(vec![
                eq("First_Name", first),
                eq("Account_Name", account_name),
                phone_in_any_slot(&forms),
            ]);
            criteria.push(MatchCriterion {
                label: format!("firstname+account+phone:{}", phone),
                criteria: expr.criteria,
                coql_where: expr.coql,
            });
        }
    }

    // Fallback: plain full-name match when nothing field-qualified was built
    if criteria.is_empty() && !first.is_empty() && !last.is_empty() {
        let expr = all_of(vec![eq("First_Name", first), eq("Last_Name", last)]);
        criteria.push(MatchCriterion {
            label: "name-only fallback".to_string(),
            criteria: expr.criteria,
            coql_where: expr.coql,
        });
    }

    criteria
}

/// Name-based criteria for Account candidates: each known name is looked up
/// across all three name fields.
pub fn build_account_criteria(account: &AccountRecord) -> Vec<MatchCriterion> {
    let mut criteria = Vec::new();
    let names = [
        account.account_name.as_deref(),
        account.alternate_name.as_deref(),
        account.short_name.as_deref(),
    ];

    for name in names.iter().filter_map(|n| n.map(str::trim)) {
        if name.is_empty() {
            continue;
        }
        let expr = any_of(ACCOUNT_NAME_FIELDS.iter().map(|f| eq(f, name)).collect());
        criteria.push(MatchCriterion {
            label: format!("account-name:{}", name),
            criteria: expr.criteria,
            coql_where: expr.coql,
        });
    }

    criteria
}

/// Run every criterion through both lookup paths, union the returned ids and
/// drop the subject. A failing or rejected criterion on either path is
/// skipped, never fatal.
async fn execute_criteria(
    client: &ZohoClient,
    module: &str,
    criteria: &[MatchCriterion],
    subject_id: &str,
) -> DuplicateSearch {
    let mut ids: BTreeSet<String> = BTreeSet::new();

    for criterion in criteria {
        let select = format!(
            "select id from {} where {} limit 200",
            module, criterion.coql_where
        );
        // The two paths are independent and can return different result
        // sets; query them concurrently and take the union.
        let (search_result, coql_result) = tokio::join!(
            client.search_ids(module, &criterion.criteria),
            client.coql_ids(&select)
        );

        match search_result {
            Ok(found) => ids.extend(found),
            Err(e) => tracing::warn!(
                "Criteria search skipped for '{}': {}",
                criterion.label,
                e
            ),
        }
        match coql_result {
            Ok(found) => ids.extend(found),
            Err(e) => tracing::warn!("COQL query skipped for '{}': {}", criterion.label, e),
        }
    }

    ids.remove(subject_id);

    if ids.is_empty() {
        DuplicateSearch::NoneFound
    } else {
        DuplicateSearch::Candidates(ids.into_iter().collect())
    }
}

/// Candidate Discovery for a Contact. Returns an explicit `NoneFound` when
/// every criterion came back empty, so callers can tell "executed, nothing
/// found" from "not executed".
pub async fn discover_contact_candidates(
    client: &ZohoClient,
    contact: &ContactRecord,
) -> DuplicateSearch {
    let criteria = build_contact_criteria(contact);
    if criteria.is_empty() {
        tracing::warn!(
            "Contact {} has no usable match fields, skipping discovery",
            contact.id
        );
        return DuplicateSearch::NoneFound;
    }

    tracing::info!(
        "Discovering duplicates of contact {} across {} criteria",
        contact.id,
        criteria.len()
    );
    execute_criteria(client, CONTACTS_MODULE, &criteria, &contact.id).await
}

/// Candidate Discovery for an Account (name-based).
pub async fn discover_account_candidates(
    client: &ZohoClient,
    account: &AccountRecord,
) -> DuplicateSearch {
    let criteria = build_account_criteria(account);
    if criteria.is_empty() {
        tracing::warn!(
            "Account {} has no usable name fields, skipping discovery",
            account.id
        );
        return DuplicateSearch::NoneFound;
    }

    tracing::info!(
        "Discovering duplicates of account {} across {} criteria",
        account.id,
        criteria.len()
    );
    execute_criteria(client, ACCOUNTS_MODULE, &criteria, &account.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LookupRef;

    fn subject() -> ContactRecord {
        ContactRecord {
            id: "100".to_string(),
            first_name: Some("Jan".to_string()),
            last_name: Some("Kowalski".to_string()),
            email: Some("jan@x.pl".to_string()),
            mobile: Some("601 234 567".to_string()),
            account: Some(LookupRef {
                id: "200".to_string(),
                name: Some("Acme Sp. z o.o.".to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_tiers_built_for_complete_subject() {
        let criteria = build_contact_criteria(&subject());
        let labels: Vec<&str> = criteria.iter().map(|c| c.label.as_str()).collect();
        assert!(labels.iter().any(|l| l.starts_with("name+email")));
        assert!(labels.iter().any(|l| l.starts_with("name+phone")));
        assert!(labels.iter().any(|l| l.starts_with("lastname+account")));
        assert!(labels.iter().any(|l| l.starts_with("firstname+account")));
        assert!(!labels.contains(&"name-only fallback"));
    }

    #[test]
    fn test_tier_gating_skips_incomplete_tiers() {
        let mut contact = subject();
        contact.account = None;
        let criteria = build_contact_criteria(&contact);
        assert!(criteria.iter().all(|c| !c.label.contains("account")));
    }

    #[test]
    fn test_fallback_only_when_no_tier_qualified() {
        let contact = ContactRecord {
            id: "100".to_string(),
            first_name: Some("Jan".to_string()),
            last_name: Some("Kowalski".to_string()),
            ..Default::default()
        };
        let criteria = build_contact_criteria(&contact);
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].label, "name-only fallback");
        assert_eq!(
            criteria[0].criteria,
            "((First_Name:equals:Jan)and(Last_Name:equals:Kowalski))"
        );
        assert_eq!(
            criteria[0].coql_where,
            "((First_Name = 'Jan') and (Last_Name = 'Kowalski'))"
        );
    }

    #[test]
    fn test_no_identity_builds_nothing() {
        let contact = ContactRecord {
            id: "100".to_string(),
            email: Some("jan@x.pl".to_string()),
            ..Default::default()
        };
        assert!(build_contact_criteria(&contact).is_empty());
    }

    #[test]
    fn test_email_criterion_covers_all_candidate_slots() {
        let criteria = build_contact_criteria(&subject());
        let tier1 = criteria
            .iter()
            .find(|c| c.label.starts_with("name+email"))
            .unwrap();
        assert!(tier1.criteria.contains("(Email:equals:jan@x.pl)"));
        assert!(tier1.criteria.contains("(Secondary_Email:equals:jan@x.pl)"));
        assert!(tier1.criteria.contains("(Email_3:equals:jan@x.pl)"));
    }

    #[test]
    fn test_phone_criterion_includes_digit_form() {
        let criteria = build_contact_criteria(&subject());
        let tier2 = criteria
            .iter()
            .find(|c| c.label.starts_with("name+phone"))
            .unwrap();
        assert!(tier2.criteria.contains("601 234 567"));
        assert!(tier2.criteria.contains("601234567"));
    }

    #[test]
    fn test_tier4_expands_formatted_variants() {
        let criteria = build_contact_criteria(&subject());
        let tier4 = criteria
            .iter()
            .find(|c| c.label.starts_with("firstname+account+phone"))
            .unwrap();
        assert!(tier4.criteria.contains("+48601234567"));
        assert!(tier4.criteria.contains("60 123 45 67"));
    }

    #[test]
    fn test_account_criteria_cross_checks_name_fields() {
        let account = AccountRecord {
            id: "200".to_string(),
            account_name: Some("Acme Sp. z o.o.".to_string()),
            short_name: Some("Acme".to_string()),
            ..Default::default()
        };
        let criteria = build_account_criteria(&account);
        assert_eq!(criteria.len(), 2);
        assert!(criteria[0].criteria.contains("(Nazwa_skrocona:equals:Acme Sp. z o.o.)"));
    }

    #[test]
    fn test_criteria_values_escaped() {
        let account = AccountRecord {
            id: "200".to_string(),
            account_name: Some("Acme (PL), Ltd".to_string()),
            ..Default::default()
        };
        let criteria = build_account_criteria(&account);
        assert!(criteria[0].criteria.contains("Acme \\(PL\\)\\, Ltd"));
    }
}
