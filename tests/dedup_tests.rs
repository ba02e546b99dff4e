/// Unit tests for the duplicate-resolution building blocks:
/// normalization, criteria tiers, merge plans and consent propagation.
use crm_dedup_api::models::{ContactRecord, LookupRef};

fn contact(id: &str) -> ContactRecord {
    ContactRecord {
        id: id.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod normalization_tests {
    use crm_dedup_api::normalize::{
        is_valid_email, phone_digits, phone_variants, phones_match, validate_pl_phone,
    };

    #[test]
    fn test_digit_stripping() {
        assert_eq!(phone_digits("(+48) 601-234-567"), "601234567");
        assert_eq!(phone_digits("601 234 567"), "601234567");
        assert_eq!(phone_digits("0048 601 234 567"), "601234567");
        // Non-Polish prefixes are left alone
        assert_eq!(phone_digits("+49 170 1234567"), "491701234567");
    }

    #[test]
    fn test_phones_match_across_formats() {
        assert!(phones_match("+48 601 234 567", "601 234 567"));
        assert!(phones_match("601234567", "601-234-567"));
        assert!(!phones_match("601234567", "601234568"));
        // Empty never matches anything, including itself
        assert!(!phones_match("", ""));
    }

    #[test]
    fn test_variants_cover_crm_spellings() {
        let variants = phone_variants("601234567");
        assert!(variants.contains(&"601234567".to_string()));
        assert!(variants.contains(&"601 234 567".to_string()));
        assert!(variants.contains(&"60 123 45 67".to_string()));
        assert!(variants.contains(&"+48601234567".to_string()));
    }

    #[test]
    fn test_valid_polish_phones() {
        let (valid, normalized) = validate_pl_phone("601234567");
        assert!(valid);
        assert_eq!(normalized, "+48601234567");

        let (valid, normalized) = validate_pl_phone("+48 601 234 567");
        assert!(valid);
        assert_eq!(normalized, "+48601234567");

        let (valid, normalized) = validate_pl_phone("22 620 03 21");
        assert!(valid);
        assert_eq!(normalized, "+48226200321");
    }

    #[test]
    fn test_invalid_phones() {
        let (valid, _) = validate_pl_phone("123");
        assert!(!valid);

        let (valid, _) = validate_pl_phone("");
        assert!(!valid);

        let (valid, _) = validate_pl_phone("   ");
        assert!(!valid);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jan.kowalski@firma.pl"));
        assert!(is_valid_email("biuro@acme.com.pl"));
        assert!(!is_valid_email("janfirma.pl"));
        assert!(!is_valid_email("jan@"));
        assert!(!is_valid_email("111111@firma.pl"));
    }
}

#[cfg(test)]
mod discovery_tests {
    use super::*;
    use crm_dedup_api::discovery::build_contact_criteria;

    fn subject() -> ContactRecord {
        let mut c = contact("100");
        c.first_name = Some("Jan".to_string());
        c.last_name = Some("Kowalski".to_string());
        c.email = Some("jan@x.pl".to_string());
        c.secondary_email = Some("j.kowalski@acme.pl".to_string());
        c.mobile = Some("601 234 567".to_string());
        c.account = Some(LookupRef {
            id: "200".to_string(),
            name: Some("Acme".to_string()),
        });
        c
    }

    #[test]
    fn test_criteria_building_is_deterministic() {
        let subject = subject();
        let first = build_contact_criteria(&subject);
        let second = build_contact_criteria(&subject);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.criteria, b.criteria);
            assert_eq!(a.coql_where, b.coql_where);
        }
    }

    #[test]
    fn test_one_criterion_per_email() {
        let criteria = build_contact_criteria(&subject());
        let tier1: Vec<_> = criteria
            .iter()
            .filter(|c| c.label.starts_with("name+email"))
            .collect();
        assert_eq!(tier1.len(), 2);
    }

    #[test]
    fn test_both_grammars_rendered() {
        let criteria = build_contact_criteria(&subject());
        for criterion in &criteria {
            assert!(criterion.criteria.starts_with('('));
            assert!(criterion.coql_where.starts_with('('));
            // COQL uses quoted literals, the criteria grammar does not
            assert!(criterion.coql_where.contains('\''));
            assert!(!criterion.criteria.contains('\''));
        }
    }

    #[test]
    fn test_name_only_subject_gets_fallback() {
        let mut c = contact("100");
        c.first_name = Some("Jan".to_string());
        c.last_name = Some("Kowalski".to_string());

        let criteria = build_contact_criteria(&c);
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].label, "name-only fallback");
    }

    #[test]
    fn test_empty_subject_builds_no_criteria() {
        assert!(build_contact_criteria(&contact("100")).is_empty());
    }
}

#[cfg(test)]
mod merge_plan_tests {
    use super::*;
    use crm_dedup_api::field_transfer::build_contact_merge_plan;
    use serde_json::json;

    #[test]
    fn test_scenario_full_target_group_is_lossy() {
        // Target has emails [a, b, c] all filled; source has unique email d.
        // d must NOT be copied anywhere: no free slot.
        let mut target = contact("t");
        target.email = Some("a@x.pl".to_string());
        target.secondary_email = Some("b@x.pl".to_string());
        target.email_3 = Some("c@x.pl".to_string());
        target.marketing_email = Some("a@x.pl".to_string());

        let mut source = contact("s");
        source.email = Some("d@x.pl".to_string());

        let plan = build_contact_merge_plan(&target, &source);
        assert!(
            !plan.updates.values().any(|v| v == &json!("d@x.pl")),
            "lossy edge case: d@x.pl must be dropped, not slotted"
        );
        assert!(!plan.updates.contains_key("Email"));
        assert!(!plan.updates.contains_key("Secondary_Email"));
        assert!(!plan.updates.contains_key("Email_3"));
    }

    #[test]
    fn test_source_values_fill_in_slot_order() {
        let mut target = contact("t");
        target.email = Some("a@x.pl".to_string());

        let mut source = contact("s");
        source.email = Some("d@x.pl".to_string());
        source.secondary_email = Some("e@x.pl".to_string());

        let plan = build_contact_merge_plan(&target, &source);
        assert_eq!(plan.updates.get("Secondary_Email"), Some(&json!("d@x.pl")));
        assert_eq!(plan.updates.get("Email_3"), Some(&json!("e@x.pl")));
    }

    #[test]
    fn test_mobile_and_landline_groups_fill_independently() {
        let mut target = contact("t");
        target.mobile = Some("601 234 567".to_string());
        target.phone = Some("22 620 03 21".to_string());

        let mut source = contact("s");
        source.mobile = Some("502 111 222".to_string());
        source.phone = Some("22 499 55 66".to_string());

        let plan = build_contact_merge_plan(&target, &source);
        assert_eq!(
            plan.updates.get("Telefon_komorkowy"),
            Some(&json!("502 111 222"))
        );
        assert_eq!(plan.updates.get("Home_Phone"), Some(&json!("22 499 55 66")));
    }

    #[test]
    fn test_account_reference_transferred_when_target_has_none() {
        let target = contact("t");
        let mut source = contact("s");
        source.account = Some(LookupRef::new("777"));

        let plan = build_contact_merge_plan(&target, &source);
        assert_eq!(plan.updates.get("Account_Name"), Some(&json!({"id": "777"})));
    }

    #[test]
    fn test_account_reference_kept_when_target_has_one() {
        let mut target = contact("t");
        target.account = Some(LookupRef::new("111"));
        let mut source = contact("s");
        source.account = Some(LookupRef::new("777"));

        let plan = build_contact_merge_plan(&target, &source);
        assert!(!plan.updates.contains_key("Account_Name"));
    }

    #[test]
    fn test_empty_plan_for_identical_records() {
        let mut target = contact("t");
        target.first_name = Some("Jan".to_string());
        target.email = Some("jan@x.pl".to_string());
        target.marketing_email = Some("jan@x.pl".to_string());

        let mut source = contact("s");
        source.first_name = Some("Jan".to_string());
        source.email = Some("jan@x.pl".to_string());

        let plan = build_contact_merge_plan(&target, &source);
        assert!(plan.is_empty());
    }
}

#[cfg(test)]
mod consent_tests {
    use super::*;
    use crm_dedup_api::field_transfer::{build_contact_merge_plan, normalize_consent_updates};
    use serde_json::{json, Value};

    #[test]
    fn test_withdrawn_selection_moves_to_next_clear_slot() {
        let mut c = contact("100");
        c.email = Some("a@x.pl".to_string());
        c.consent_withdrawn_email = true;
        c.secondary_email = Some("b@x.pl".to_string());
        c.marketing_email = Some("a@x.pl".to_string());
        c.marketing_unsubscribed = true;

        let updates = normalize_consent_updates(&c);
        assert_eq!(updates.get("Mail_marketingowy"), Some(&json!("b@x.pl")));
        assert_eq!(updates.get("Email_Opt_Out"), Some(&json!(false)));
    }

    #[test]
    fn test_no_clear_slot_clears_selection() {
        let mut c = contact("100");
        c.email = Some("a@x.pl".to_string());
        c.consent_withdrawn_email = true;
        c.marketing_email = Some("a@x.pl".to_string());

        let updates = normalize_consent_updates(&c);
        assert_eq!(updates.get("Mail_marketingowy"), Some(&Value::Null));
        assert_eq!(updates.get("Email_Opt_Out"), Some(&json!(true)));
    }

    #[test]
    fn test_consistent_record_needs_no_updates() {
        let mut c = contact("100");
        c.email = Some("a@x.pl".to_string());
        c.marketing_email = Some("a@x.pl".to_string());

        assert!(normalize_consent_updates(&c).is_empty());
    }

    #[test]
    fn test_propagated_withdrawal_invalidates_selection() {
        // Source withdrew consent for the very address the target markets to
        let mut target = contact("t");
        target.email = Some("a@x.pl".to_string());
        target.secondary_email = Some("b@x.pl".to_string());
        target.marketing_email = Some("a@x.pl".to_string());

        let mut source = contact("s");
        source.email = Some("a@x.pl".to_string());
        source.consent_withdrawn_email = true;

        let plan = build_contact_merge_plan(&target, &source);
        assert_eq!(plan.updates.get("Wycofana_zgoda_email"), Some(&json!(true)));
        assert_eq!(plan.updates.get("Mail_marketingowy"), Some(&json!("b@x.pl")));
        assert_eq!(plan.updates.get("Email_Opt_Out"), Some(&json!(false)));
    }
}

#[cfg(test)]
mod error_handling_tests {
    use crm_dedup_api::errors::{AppError, ResultExt};

    #[test]
    fn test_error_taxonomy_variants() {
        let not_found = AppError::NotFound("Contact 100 not found".to_string());
        assert!(matches!(not_found, AppError::NotFound(_)));

        let lookup = AppError::LookupFailure("related list timed out".to_string());
        assert!(matches!(lookup, AppError::LookupFailure(_)));

        let criteria = AppError::InvalidCriteria("unbalanced parentheses".to_string());
        assert!(matches!(criteria, AppError::InvalidCriteria(_)));

        let credential = AppError::CredentialFailure("refresh token expired".to_string());
        assert!(matches!(credential, AppError::CredentialFailure(_)));
    }

    #[test]
    fn test_context_is_prepended() {
        let result: Result<(), AppError> =
            Err(AppError::UpdateFailure("status 400".to_string())).context("applying merge plan");
        let message = format!("{}", result.unwrap_err());
        assert!(message.starts_with("applying merge plan"));
        assert!(message.contains("Update failure"));
    }
}
