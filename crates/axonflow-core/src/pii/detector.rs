//! PII detection and redaction primitives.
//!
//! Two detection layers: category regexes over the string form, and a
//! structural scan over map keys. Redaction strategies are deterministic
//! and idempotent: masked output never re-matches its own category.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RedactionManifest;

/// Literal substituted for structurally flagged field values.
pub const REDACTED: &str = "[REDACTED]";

/// PII categories known to the detector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Ssn,
    CreditCard,
    Email,
    Phone,
    IpAddress,
    BankAccount,
    /// Structural-only: medical record numbers and diagnoses have no
    /// reliable textual pattern.
    Medical,
}

impl PiiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Ssn => "ssn",
            PiiCategory::CreditCard => "credit_card",
            PiiCategory::Email => "email",
            PiiCategory::Phone => "phone",
            PiiCategory::IpAddress => "ip_address",
            PiiCategory::BankAccount => "bank_account",
            PiiCategory::Medical => "medical",
        }
    }

    /// Every category, including structural-only ones.
    pub fn all() -> [PiiCategory; 7] {
        [
            PiiCategory::Ssn,
            PiiCategory::CreditCard,
            PiiCategory::Email,
            PiiCategory::Phone,
            PiiCategory::IpAddress,
            PiiCategory::BankAccount,
            PiiCategory::Medical,
        ]
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static SSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn regex"));

static CREDIT_CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").expect("card regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
});

// The area code alternation keeps a leading "(" inside the match while
// still requiring a word boundary for bare digit runs.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-. ]?)?(?:\(\d{3}\)|\b\d{3})[-. ]?\d{3}[-. ]?\d{4}\b")
        .expect("phone regex")
});

static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 regex"));

// Deliberately loose; overmatching is preferred to leaking.
static BANK_ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{8,17}\b").expect("bank account regex"));

static SENSITIVE_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)ssn|social_security|credit_card|card_number|account_number|routing_number|medical_record|diagnosis",
    )
    .expect("field regex")
});

/// Pattern-scan categories in redaction order. More specific shapes run
/// before the loose bank-account pattern so overlapping digit runs get
/// the precise strategy.
const SCAN_ORDER: [PiiCategory; 6] = [
    PiiCategory::Ssn,
    PiiCategory::CreditCard,
    PiiCategory::Phone,
    PiiCategory::Email,
    PiiCategory::IpAddress,
    PiiCategory::BankAccount,
];

fn pattern(category: PiiCategory) -> Option<&'static Regex> {
    match category {
        PiiCategory::Ssn => Some(&SSN_RE),
        PiiCategory::CreditCard => Some(&CREDIT_CARD_RE),
        PiiCategory::Email => Some(&EMAIL_RE),
        PiiCategory::Phone => Some(&PHONE_RE),
        PiiCategory::IpAddress => Some(&IPV4_RE),
        PiiCategory::BankAccount => Some(&BANK_ACCOUNT_RE),
        PiiCategory::Medical => None,
    }
}

/// The structural category for a map key, if the key names a sensitive
/// field.
pub(crate) fn field_category(key: &str) -> Option<PiiCategory> {
    let matched = SENSITIVE_FIELD_RE.find(key)?;
    Some(match matched.as_str().to_ascii_lowercase().as_str() {
        "ssn" | "social_security" => PiiCategory::Ssn,
        "credit_card" | "card_number" => PiiCategory::CreditCard,
        "account_number" | "routing_number" => PiiCategory::BankAccount,
        _ => PiiCategory::Medical,
    })
}

fn last4_digits(text: &str) -> String {
    let digits: Vec<char> = text.chars().filter(char::is_ascii_digit).collect();
    digits[digits.len().saturating_sub(4)..].iter().collect()
}

/// Deterministic per-category redaction strategy.
pub(crate) fn mask(category: PiiCategory, matched: &str) -> String {
    match category {
        PiiCategory::Ssn => format!("XXX-XX-{}", last4_digits(matched)),
        PiiCategory::CreditCard => format!("****-****-****-{}", last4_digits(matched)),
        // Length-derived placeholder, not a cryptographic hash.
        PiiCategory::Email => format!("[HASHED_{}]", matched.chars().count() + 1),
        PiiCategory::Phone => format!("***-***-{}", last4_digits(matched)),
        PiiCategory::IpAddress => "***.***.***.***".to_string(),
        PiiCategory::BankAccount => format!("****{}", last4_digits(matched)),
        PiiCategory::Medical => REDACTED.to_string(),
    }
}

/// Pattern-scan the text and redact every match whose category the caller
/// may not view. Returns the redacted text; the manifest accumulates.
pub(crate) fn redact_text(
    content: &str,
    allowed: &BTreeSet<PiiCategory>,
    manifest: &mut RedactionManifest,
) -> String {
    let mut out = content.to_string();
    for category in SCAN_ORDER {
        if allowed.contains(&category) {
            continue;
        }
        let Some(re) = pattern(category) else {
            continue;
        };
        let mut count = 0usize;
        let replaced = re
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                count += 1;
                mask(category, &caps[0])
            })
            .into_owned();
        if count > 0 {
            manifest.redacted_categories.insert(category);
            manifest.redaction_count += count;
            manifest.had_redactions = true;
        }
        out = replaced;
    }
    out
}

/// Walk a parsed JSON tree at arbitrary depth: sensitive map keys are
/// flagged regardless of value, string scalars get the pattern scan.
pub(crate) fn redact_value(
    value: &mut Value,
    allowed: &BTreeSet<PiiCategory>,
    manifest: &mut RedactionManifest,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if let Some(category) = field_category(key) {
                    if !allowed.contains(&category) {
                        // Already-masked values keep the pass idempotent.
                        if child.as_str() != Some(REDACTED) {
                            *child = Value::String(REDACTED.to_string());
                            manifest.redacted_categories.insert(category);
                            manifest.redaction_count += 1;
                            manifest.had_redactions = true;
                        }
                        continue;
                    }
                }
                redact_value(child, allowed, manifest);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_value(item, allowed, manifest);
            }
        }
        Value::String(text) => {
            let redacted = redact_text(text, allowed, manifest);
            if redacted != *text {
                *text = redacted;
            }
        }
        _ => {}
    }
}

/// Whether any substring of `content` matches the given category's
/// pattern. Used by tests and the manifest invariant check.
pub fn matches_category(content: &str, category: PiiCategory) -> bool {
    pattern(category).is_some_and(|re| re.is_match(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_allowances() -> BTreeSet<PiiCategory> {
        BTreeSet::new()
    }

    #[test]
    fn test_ssn_mask() {
        let mut manifest = RedactionManifest::default();
        let out = redact_text("SSN: 123-45-6789", &no_allowances(), &mut manifest);
        assert_eq!(out, "SSN: XXX-XX-6789");
        assert!(manifest.redacted_categories.contains(&PiiCategory::Ssn));
        assert_eq!(manifest.redaction_count, 1);
    }

    #[test]
    fn test_credit_card_mask_with_separators() {
        let mut manifest = RedactionManifest::default();
        let out = redact_text(
            "card 4111-1111 1111-1234 on file",
            &no_allowances(),
            &mut manifest,
        );
        assert_eq!(out, "card ****-****-****-1234 on file");
    }

    #[test]
    fn test_email_placeholder_is_length_derived() {
        let mut manifest = RedactionManifest::default();
        let out = redact_text("email alice@ex.com", &no_allowances(), &mut manifest);
        assert_eq!(out, "email [HASHED_13]");
    }

    #[test]
    fn test_phone_mask() {
        let mut manifest = RedactionManifest::default();
        let out = redact_text("call (555) 123-4567", &no_allowances(), &mut manifest);
        assert_eq!(out, "call ***-***-4567");
        assert!(manifest.redacted_categories.contains(&PiiCategory::Phone));
    }

    #[test]
    fn test_phone_with_country_code() {
        let mut manifest = RedactionManifest::default();
        let out = redact_text("call +1 555-123-4567", &no_allowances(), &mut manifest);
        assert_eq!(out, "call ***-***-4567");
    }

    #[test]
    fn test_ipv4_mask() {
        let mut manifest = RedactionManifest::default();
        let out = redact_text("host 192.168.1.100 up", &no_allowances(), &mut manifest);
        assert_eq!(out, "host ***.***.***.*** up");
    }

    #[test]
    fn test_bank_account_mask() {
        let mut manifest = RedactionManifest::default();
        let out = redact_text("account 123456789012", &no_allowances(), &mut manifest);
        assert_eq!(out, "account ****9012");
        assert!(manifest
            .redacted_categories
            .contains(&PiiCategory::BankAccount));
    }

    #[test]
    fn test_allowed_category_is_kept() {
        let allowed = BTreeSet::from([PiiCategory::Email]);
        let mut manifest = RedactionManifest::default();
        let out = redact_text("email alice@ex.com", &allowed, &mut manifest);
        assert_eq!(out, "email alice@ex.com");
        assert_eq!(manifest.redaction_count, 0);
        assert!(!manifest.had_redactions);
    }

    #[test]
    fn test_masked_output_never_rematches() {
        let content = "SSN 123-45-6789 card 4111 1111 1111 1234 mail bob@corp.io \
                       tel 555-123-4567 ip 10.0.0.1 acct 12345678";
        let mut manifest = RedactionManifest::default();
        let out = redact_text(content, &no_allowances(), &mut manifest);
        for category in manifest.redacted_categories.iter() {
            assert!(
                !matches_category(&out, *category),
                "{category} still matches in {out:?}"
            );
        }
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let mut first = RedactionManifest::default();
        let once = redact_text(
            "SSN: 123-45-6789, email alice@ex.com",
            &no_allowances(),
            &mut first,
        );
        let mut second = RedactionManifest::default();
        let twice = redact_text(&once, &no_allowances(), &mut second);
        assert_eq!(once, twice);
        assert_eq!(second.redaction_count, 0);
    }

    #[test]
    fn test_field_categories() {
        assert_eq!(field_category("ssn"), Some(PiiCategory::Ssn));
        assert_eq!(field_category("customer_ssn"), Some(PiiCategory::Ssn));
        assert_eq!(field_category("card_number"), Some(PiiCategory::CreditCard));
        assert_eq!(
            field_category("routing_number"),
            Some(PiiCategory::BankAccount)
        );
        assert_eq!(field_category("diagnosis"), Some(PiiCategory::Medical));
        assert_eq!(
            field_category("medical_record_id"),
            Some(PiiCategory::Medical)
        );
        assert_eq!(field_category("username"), None);
    }

    #[test]
    fn test_structural_scan_handles_nesting() {
        let mut value = serde_json::json!({
            "patient": {
                "name": "Alice",
                "records": [
                    {"diagnosis": "confidential", "visit": 3},
                ],
                "ssn": "123-45-6789",
            },
        });
        let mut manifest = RedactionManifest::default();
        redact_value(&mut value, &no_allowances(), &mut manifest);

        assert_eq!(value["patient"]["ssn"], REDACTED);
        assert_eq!(value["patient"]["records"][0]["diagnosis"], REDACTED);
        assert_eq!(value["patient"]["records"][0]["visit"], 3);
        assert_eq!(value["patient"]["name"], "Alice");
        assert_eq!(manifest.redaction_count, 2);
    }

    #[test]
    fn test_structural_scan_is_idempotent() {
        let mut value = serde_json::json!({"ssn": "123-45-6789"});
        let mut first = RedactionManifest::default();
        redact_value(&mut value, &no_allowances(), &mut first);
        assert_eq!(first.redaction_count, 1);

        let mut second = RedactionManifest::default();
        redact_value(&mut value, &no_allowances(), &mut second);
        assert_eq!(second.redaction_count, 0);
    }

    #[test]
    fn test_string_scalars_inside_trees_are_pattern_scanned() {
        let mut value = serde_json::json!({
            "notes": ["reach me at bob@corp.io"],
        });
        let mut manifest = RedactionManifest::default();
        redact_value(&mut value, &no_allowances(), &mut manifest);
        assert_eq!(value["notes"][0], "reach me at [HASHED_12]");
        assert!(manifest.redacted_categories.contains(&PiiCategory::Email));
    }
}
