use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;

/// Reduce a phone value to bare digits for equality checks, dropping the
/// Polish country prefix when present. "+48 601 234 567", "601-234-567" and
/// "0048601234567" all collapse to "601234567".
pub fn phone_digits(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 11 && digits.starts_with("48") {
        return digits[2..].to_string();
    }
    if digits.len() == 13 && digits.starts_with("0048") {
        return digits[4..].to_string();
    }
    digits
}

/// Two phone values are the same channel when their digit forms match.
pub fn phones_match(a: &str, b: &str) -> bool {
    let da = phone_digits(a);
    let db = phone_digits(b);
    !da.is_empty() && da == db
}

/// All CRM spellings a Polish phone number may be stored under: bare digits,
/// mobile spacing (XXX XXX XXX), landline spacing (XX XXX XX XX) and E.164.
/// Non-Polish or unparseable input falls back to the trimmed raw value.
pub fn phone_variants(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let clean = phone_digits(trimmed);
    if clean.len() != 9 {
        return vec![trimmed.to_string()];
    }

    let mut variants = vec![
        clean.clone(),
        format!("{} {} {}", &clean[0..3], &clean[3..6], &clean[6..9]),
        format!(
            "{} {} {} {}",
            &clean[0..2],
            &clean[2..5],
            &clean[5..7],
            &clean[7..9]
        ),
        format!("+48{}", clean),
    ];
    if !variants.contains(&trimmed.to_string()) {
        variants.push(trimmed.to_string());
    }
    variants
}

/// Validate and normalize a Polish phone number.
///
/// Uses the phonenumber library (port of Google's libphonenumber) to:
/// - Parse the number with the Polish region (PL)
/// - Validate it
/// - Return the normalized E.164 form (+48601234567)
///
/// Returns: (is_valid, normalized_phone_or_error_msg)
pub fn validate_pl_phone(raw: &str) -> (bool, String) {
    // Skip empty or very short strings
    if raw.trim().is_empty() || raw.len() < 7 {
        return (false, "Phone too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::PL), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("Valid PL phone: {} -> {}", raw, formatted);
                (true, formatted)
            } else {
                tracing::warn!("Invalid PL phone number: {}", raw);
                (false, "Invalid Polish phone number".to_string())
            }
        }
        Err(e) => {
            tracing::warn!("Failed to parse PL phone '{}': {:?}", raw, e);
            (false, format!("Parse error: {:?}", e))
        }
    }
}

/// Validate an email address.
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Fake/placeholder patterns (repeated digits like 9999, 1111)
/// - Minimum length requirements
/// - Valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // Detect fake patterns (repeated digits)
    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    for pattern in &fake_patterns {
        if email.contains(pattern) {
            tracing::warn!("Invalid email detected (fake pattern '{}'): {}", pattern, email);
            return false;
        }
    }

    // RFC 5322 simplified email regex
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    if !email_regex.is_match(email) {
        tracing::warn!("Invalid email format: {}", email);
        return false;
    }

    true
}

/// Case-insensitive email equality.
pub fn emails_match(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && a.trim().eq_ignore_ascii_case(b.trim())
}

/// Escape a value for the criteria search grammar: parentheses and commas
/// are grammar characters and must be backslash-escaped.
pub fn escape_criteria_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | ',') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a value for a COQL string literal (single quotes are doubled).
pub fn escape_coql_value(value: &str) -> String {
    value.replace('\'', "''")
}

/// True for None, empty and whitespace-only values.
pub fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_digits_strips_formatting_and_prefix() {
        assert_eq!(phone_digits("601 234 567"), "601234567");
        assert_eq!(phone_digits("+48 601-234-567"), "601234567");
        assert_eq!(phone_digits("0048601234567"), "601234567");
        assert_eq!(phone_digits("22 345 67 89"), "223456789");
        assert_eq!(phone_digits(""), "");
    }

    #[test]
    fn test_phones_match() {
        assert!(phones_match("+48 601 234 567", "601234567"));
        assert!(phones_match("601-234-567", "601 234 567"));
        assert!(!phones_match("601234567", "601234568"));
        assert!(!phones_match("", ""));
    }

    #[test]
    fn test_phone_variants() {
        let variants = phone_variants("+48 601 234 567");
        assert!(variants.contains(&"601234567".to_string()));
        assert!(variants.contains(&"601 234 567".to_string()));
        assert!(variants.contains(&"60 123 45 67".to_string()));
        assert!(variants.contains(&"+48601234567".to_string()));
    }

    #[test]
    fn test_phone_variants_non_polish_falls_back() {
        assert_eq!(phone_variants("12345"), vec!["12345".to_string()]);
        assert!(phone_variants("   ").is_empty());
    }

    #[test]
    fn test_criteria_escaping() {
        assert_eq!(escape_criteria_value("Acme (PL), Ltd"), "Acme \\(PL\\)\\, Ltd");
        assert_eq!(escape_coql_value("O'Brien"), "O''Brien");
    }

    #[test]
    fn test_email_matching() {
        assert!(emails_match("Jan@X.pl", "jan@x.pl"));
        assert!(!emails_match("", ""));
        assert!(!emails_match("a@x.pl", "b@x.pl"));
    }
}
