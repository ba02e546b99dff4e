use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// CRM module names used throughout the engine.
pub const CONTACTS_MODULE: &str = "Contacts";
pub const ACCOUNTS_MODULE: &str = "Accounts";

/// A lookup reference to another record, as the CRM returns it
/// (`{"id": "...", "name": "..."}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LookupRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// A person record in the `Contacts` module.
///
/// Three fixed-size channel groups (email, mobile, landline) hold up to
/// three values each; every email slot carries its own consent-withdrawn
/// flag. `Mail_marketingowy` is the single active marketing address and,
/// when non-empty, must equal one of the email slots whose consent flag
/// is false.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactRecord {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "First_Name", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "Last_Name", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Stanowisko", default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    #[serde(rename = "Email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "Secondary_Email", default, skip_serializing_if = "Option::is_none")]
    pub secondary_email: Option<String>,
    #[serde(rename = "Email_3", default, skip_serializing_if = "Option::is_none")]
    pub email_3: Option<String>,

    #[serde(rename = "Wycofana_zgoda_email", default)]
    pub consent_withdrawn_email: bool,
    #[serde(rename = "Wycofana_zgoda_email_2", default)]
    pub consent_withdrawn_email_2: bool,
    #[serde(rename = "Wycofana_zgoda_email_3", default)]
    pub consent_withdrawn_email_3: bool,

    /// The single active marketing address; must match a consent-clear slot.
    #[serde(rename = "Mail_marketingowy", default, skip_serializing_if = "Option::is_none")]
    pub marketing_email: Option<String>,
    #[serde(rename = "Email_Opt_Out", default)]
    pub marketing_unsubscribed: bool,

    #[serde(rename = "Mobile", default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(rename = "Telefon_komorkowy", default, skip_serializing_if = "Option::is_none")]
    pub mobile_2: Option<String>,
    #[serde(rename = "Telefon_komorkowy_2", default, skip_serializing_if = "Option::is_none")]
    pub mobile_3: Option<String>,

    #[serde(rename = "Phone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "Home_Phone", default, skip_serializing_if = "Option::is_none")]
    pub home_phone: Option<String>,
    #[serde(rename = "Other_Phone", default, skip_serializing_if = "Option::is_none")]
    pub other_phone: Option<String>,

    #[serde(rename = "Wplyw_na_zakup", default)]
    pub purchase_influence: bool,

    #[serde(rename = "Account_Name", default, skip_serializing_if = "Option::is_none")]
    pub account: Option<LookupRef>,

    #[serde(rename = "Typ_adresu_z_firmy", default, skip_serializing_if = "Option::is_none")]
    pub address_type_from_account: Option<String>,
}

/// One email slot: CRM field name, value, consent-flag field name, flag.
pub type EmailSlot<'a> = (&'static str, Option<&'a str>, &'static str, bool);
/// One phone slot: CRM field name and value.
pub type PhoneSlot<'a> = (&'static str, Option<&'a str>);

impl ContactRecord {
    /// Email slots in fixed slot order, paired with their consent flags.
    pub fn email_slots(&self) -> [EmailSlot<'_>; 3] {
        [
            (
                "Email",
                self.email.as_deref(),
                "Wycofana_zgoda_email",
                self.consent_withdrawn_email,
            ),
            (
                "Secondary_Email",
                self.secondary_email.as_deref(),
                "Wycofana_zgoda_email_2",
                self.consent_withdrawn_email_2,
            ),
            (
                "Email_3",
                self.email_3.as_deref(),
                "Wycofana_zgoda_email_3",
                self.consent_withdrawn_email_3,
            ),
        ]
    }

    pub fn mobile_slots(&self) -> [PhoneSlot<'_>; 3] {
        [
            ("Mobile", self.mobile.as_deref()),
            ("Telefon_komorkowy", self.mobile_2.as_deref()),
            ("Telefon_komorkowy_2", self.mobile_3.as_deref()),
        ]
    }

    pub fn landline_slots(&self) -> [PhoneSlot<'_>; 3] {
        [
            ("Phone", self.phone.as_deref()),
            ("Home_Phone", self.home_phone.as_deref()),
            ("Other_Phone", self.other_phone.as_deref()),
        ]
    }

    /// All six phone values in slot order (mobiles first).
    pub fn phone_slots(&self) -> [PhoneSlot<'_>; 6] {
        [
            ("Mobile", self.mobile.as_deref()),
            ("Telefon_komorkowy", self.mobile_2.as_deref()),
            ("Telefon_komorkowy_2", self.mobile_3.as_deref()),
            ("Phone", self.phone.as_deref()),
            ("Home_Phone", self.home_phone.as_deref()),
            ("Other_Phone", self.other_phone.as_deref()),
        ]
    }

    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// An organization record in the `Accounts` module.
///
/// `Typ_adresu` selects which of the two parallel address blocks (HQ =
/// Billing, Branch = Shipping) participate in scoring. Channel slots carry
/// a paired service-scope sub-field that only counts while the channel
/// itself is filled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "Account_Name", default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(rename = "Nazwa_alternatywna", default, skip_serializing_if = "Option::is_none")]
    pub alternate_name: Option<String>,
    #[serde(rename = "Nazwa_skrocona", default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    #[serde(rename = "Firma_NIP", default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(rename = "REGON", default, skip_serializing_if = "Option::is_none")]
    pub regon: Option<String>,
    #[serde(rename = "KRS", default, skip_serializing_if = "Option::is_none")]
    pub krs: Option<String>,
    #[serde(rename = "Status_rejestrowy", default, skip_serializing_if = "Option::is_none")]
    pub registration_status: Option<String>,

    /// "Centrala", "Oddzial" or "Centrala i oddzial".
    #[serde(rename = "Typ_adresu", default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,

    #[serde(rename = "Billing_Street", default, skip_serializing_if = "Option::is_none")]
    pub billing_street: Option<String>,
    #[serde(rename = "Billing_City", default, skip_serializing_if = "Option::is_none")]
    pub billing_city: Option<String>,
    #[serde(rename = "Billing_Code", default, skip_serializing_if = "Option::is_none")]
    pub billing_code: Option<String>,
    #[serde(rename = "Billing_State", default, skip_serializing_if = "Option::is_none")]
    pub billing_state: Option<String>,
    #[serde(rename = "Billing_Country", default, skip_serializing_if = "Option::is_none")]
    pub billing_country: Option<String>,

    #[serde(rename = "Shipping_Street", default, skip_serializing_if = "Option::is_none")]
    pub shipping_street: Option<String>,
    #[serde(rename = "Shipping_City", default, skip_serializing_if = "Option::is_none")]
    pub shipping_city: Option<String>,
    #[serde(rename = "Shipping_Code", default, skip_serializing_if = "Option::is_none")]
    pub shipping_code: Option<String>,
    #[serde(rename = "Shipping_State", default, skip_serializing_if = "Option::is_none")]
    pub shipping_state: Option<String>,
    #[serde(rename = "Shipping_Country", default, skip_serializing_if = "Option::is_none")]
    pub shipping_country: Option<String>,

    #[serde(rename = "Mobile", default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(rename = "Telefon_komorkowy", default, skip_serializing_if = "Option::is_none")]
    pub mobile_2: Option<String>,
    #[serde(rename = "Telefon_komorkowy_2", default, skip_serializing_if = "Option::is_none")]
    pub mobile_3: Option<String>,
    #[serde(rename = "Zakres_obslugi_kom", default, skip_serializing_if = "Option::is_none")]
    pub mobile_scope: Option<String>,
    #[serde(rename = "Zakres_obslugi_kom_2", default, skip_serializing_if = "Option::is_none")]
    pub mobile_scope_2: Option<String>,
    #[serde(rename = "Zakres_obslugi_kom_3", default, skip_serializing_if = "Option::is_none")]
    pub mobile_scope_3: Option<String>,

    #[serde(rename = "Phone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "Telefon_stacjonarny", default, skip_serializing_if = "Option::is_none")]
    pub phone_2: Option<String>,
    #[serde(rename = "Telefon_stacjonarny_2", default, skip_serializing_if = "Option::is_none")]
    pub phone_3: Option<String>,
    #[serde(rename = "Zakres_obslugi_tel", default, skip_serializing_if = "Option::is_none")]
    pub phone_scope: Option<String>,
    #[serde(rename = "Zakres_obslugi_tel_2", default, skip_serializing_if = "Option::is_none")]
    pub phone_scope_2: Option<String>,
    #[serde(rename = "Zakres_obslugi_tel_3", default, skip_serializing_if = "Option::is_none")]
    pub phone_scope_3: Option<String>,

    #[serde(rename = "Email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "Email_2", default, skip_serializing_if = "Option::is_none")]
    pub email_2: Option<String>,
    #[serde(rename = "Email_3", default, skip_serializing_if = "Option::is_none")]
    pub email_3: Option<String>,
    #[serde(rename = "Zakres_obslugi_email", default, skip_serializing_if = "Option::is_none")]
    pub email_scope: Option<String>,
    #[serde(rename = "Zakres_obslugi_email_2", default, skip_serializing_if = "Option::is_none")]
    pub email_scope_2: Option<String>,
    #[serde(rename = "Zakres_obslugi_email_3", default, skip_serializing_if = "Option::is_none")]
    pub email_scope_3: Option<String>,

    #[serde(rename = "Website", default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(rename = "Parent_Account", default, skip_serializing_if = "Option::is_none")]
    pub parent_account: Option<LookupRef>,

    #[serde(rename = "Tag", default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Value>,
}

impl AccountRecord {
    /// HQ address fields count when the address type names the HQ
    /// ("Centrala"). A missing type defaults to HQ-only.
    pub fn includes_hq(&self) -> bool {
        match self.address_type.as_deref() {
            None | Some("") => true,
            Some(t) => t.contains("Centrala"),
        }
    }

    /// Branch fields count only when the type names a branch ("Oddzial",
    /// with or without diacritics).
    pub fn includes_branch(&self) -> bool {
        self.address_type
            .as_deref()
            .map(|t| t.contains("Oddzia"))
            .unwrap_or(false)
    }

    /// Channel/scope pairs: the scope only scores while its channel is filled.
    pub fn channel_scope_pairs(&self) -> [(Option<&str>, Option<&str>); 9] {
        [
            (self.mobile.as_deref(), self.mobile_scope.as_deref()),
            (self.mobile_2.as_deref(), self.mobile_scope_2.as_deref()),
            (self.mobile_3.as_deref(), self.mobile_scope_3.as_deref()),
            (self.phone.as_deref(), self.phone_scope.as_deref()),
            (self.phone_2.as_deref(), self.phone_scope_2.as_deref()),
            (self.phone_3.as_deref(), self.phone_scope_3.as_deref()),
            (self.email.as_deref(), self.email_scope.as_deref()),
            (self.email_2.as_deref(), self.email_scope_2.as_deref()),
            (self.email_3.as_deref(), self.email_scope_3.as_deref()),
        ]
    }
}

/// Completeness/engagement score, always recomputed on demand.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct ScoreResult {
    /// Final score; never negative.
    pub total: i64,
    /// Count of non-empty scored fields.
    pub filled_fields: u32,
    /// Count of other modules with at least one related record.
    pub related_modules: u32,
    /// Total related records across modules.
    pub related_count: u32,
}

/// Result of Candidate Discovery. `NoneFound` is an explicit signal so
/// callers can tell "executed, nothing found" from "not yet executed".
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateSearch {
    Candidates(Vec<String>),
    NoneFound,
}

/// Winner/loser decision of the Merge Resolver, with both full records.
#[derive(Debug, Clone)]
pub struct MergeDecision {
    pub target: ContactRecord,
    pub source: ContactRecord,
    pub target_score: i64,
    pub source_score: i64,
}

/// Field-level transfer plan: the update map applied to the target in a
/// single call. Empty plan means no update call at all.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    pub updates: Map<String, Value>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.updates.insert(field.to_string(), value);
    }
}

/// Outcome of the Account Consolidation Check (spec step after a Contact
/// merge).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsolidationOutcome {
    /// Account already carries a tax id; nothing to do.
    Skipped,
    /// Contact re-linked to a better-scoring Account; original kept.
    Relinked { account_id: String },
    /// Contact re-linked and the inferior, contact-less Account deleted.
    RelinkedAndDeleted {
        account_id: String,
        deleted_account_id: String,
    },
    /// No better Account found; nothing changed.
    LeftAsIs,
    /// Lookup or mutation failed; nothing changed.
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Every step completed.
    Success,
    /// Fields transferred but a later step failed; the report names it.
    Partial,
    /// Discovery executed and found no duplicates.
    NoDuplicates,
    /// Run aborted before any mutation.
    Failed,
}

/// Human-readable result of one resolution run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolutionReport {
    pub contact_id: String,
    pub status: ResolutionStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loser_id: Option<String>,
    pub fields_transferred: usize,
    pub relationships_repointed: usize,
    pub relationship_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidation: Option<ConsolidationOutcome>,
    pub completed_at: DateTime<Utc>,
}

impl ResolutionReport {
    pub fn no_duplicates(contact_id: &str) -> Self {
        Self {
            contact_id: contact_id.to_string(),
            status: ResolutionStatus::NoDuplicates,
            message: "no duplicates found".to_string(),
            winner_id: None,
            loser_id: None,
            fields_transferred: 0,
            relationships_repointed: 0,
            relationship_failures: 0,
            consolidation: None,
            completed_at: Utc::now(),
        }
    }
}
