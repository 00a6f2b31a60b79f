use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============ Job Record ============

/// Lifecycle state of an import job.
///
/// Transitions are monotone: `pending → running → {completed | failed | cancelled}`.
/// An external canceller may also move a job straight from `pending` to `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Completed | JobStatus::Failed
        )
    }

    /// Whether a store may move a record from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Running) => true,
            (JobStatus::Pending, JobStatus::Cancelled) => true,
            (JobStatus::Running, JobStatus::Completed)
            | (JobStatus::Running, JobStatus::Failed)
            | (JobStatus::Running, JobStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "cancelled" => Ok(JobStatus::Cancelled),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("Unknown job status '{}'", other)),
        }
    }
}

/// Search parameters captured when the job was created. Never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    /// Business category, e.g. "Dachdecker".
    #[serde(rename = "branche")]
    pub industry_query: String,
    /// City or postal code, e.g. "Berlin".
    #[serde(rename = "standort")]
    pub location: String,
    #[serde(rename = "anzahlErgebnisse")]
    pub max_results: u32,
    #[serde(rename = "websiteAnalysieren", default)]
    pub analyze_website: bool,
    #[serde(rename = "kontaktdatenHinzufuegen", default)]
    pub extract_contacts: bool,
}

impl JobParams {
    /// Website enrichment runs when either flag is set.
    pub fn wants_website_analysis(&self) -> bool {
        self.analyze_website || self.extract_contacts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Searching,
    LoadingDetails,
    AnalyzingWebsites,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
    pub phase: JobPhase,
}

impl Progress {
    pub fn new(current: u32, total: u32, phase: JobPhase) -> Self {
        Self {
            current,
            total,
            phase,
        }
    }
}

/// The shared job document. Field names are the contract with the polling front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub params: JobParams,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub results: Vec<Lead>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Builds a fresh `pending` record, the way the job creator inserts it.
    pub fn new_pending(id: impl Into<String>, params: JobParams) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: Progress::new(0, params.max_results, JobPhase::Searching),
            params,
            results: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

// ============ Lead ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "strasse", default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(rename = "hausnummer", default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(rename = "plz", default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(rename = "ort", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "land", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// A person found on the company's website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteContact {
    pub name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefon")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteAnalysis {
    #[serde(rename = "beschreibung")]
    pub description: Option<String>,
    #[serde(rename = "dienstleistungen", default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub extracted_emails: Vec<String>,
    #[serde(default)]
    pub extracted_phones: Vec<String>,
    #[serde(rename = "ansprechpartner", default)]
    pub contacts: Vec<WebsiteContact>,
}

/// The first website contact, with the name split for the CRM form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryContact {
    #[serde(rename = "vorname")]
    pub first_name: Option<String>,
    #[serde(rename = "nachname")]
    pub last_name: Option<String>,
    pub position: Option<String>,
    #[serde(rename = "telefon")]
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// One scored business record in `results[]`. Built once, never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub external_id: String,
    #[serde(rename = "firmenname")]
    pub company_name: String,
    #[serde(rename = "standort")]
    pub location: String,
    #[serde(rename = "adresse")]
    pub address: Address,
    #[serde(rename = "branche")]
    pub industry: Option<String>,
    #[serde(rename = "telefon")]
    pub phone: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "websiteAnalyse")]
    pub website_analysis: Option<WebsiteAnalysis>,
    #[serde(rename = "ansprechpartner")]
    pub primary_contact: Option<PrimaryContact>,
    #[serde(rename = "analyseScore")]
    pub score: u8,
}

// ============ Places API Models ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedText {
    #[serde(default)]
    pub text: String,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressComponent {
    #[serde(default)]
    pub long_text: String,
    pub short_text: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Raw place record as returned by text search or place details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceCandidate {
    pub id: Option<String>,
    pub display_name: Option<LocalizedText>,
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    pub national_phone_number: Option<String>,
    pub website_uri: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

impl PlaceCandidate {
    pub fn display_name(&self) -> &str {
        self.display_name
            .as_ref()
            .map(|name| name.text.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchTextResponse {
    #[serde(default)]
    pub places: Vec<PlaceCandidate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTextRequest<'a> {
    pub text_query: String,
    pub language_code: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_transitions_are_monotone() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));

        assert!(!Running.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        for terminal in [Completed, Failed, Cancelled] {
            for next in [Pending, Running, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_job_params_wire_names() {
        let params: JobParams = serde_json::from_value(json!({
            "branche": "Dachdecker",
            "standort": "Berlin",
            "anzahlErgebnisse": 25
        }))
        .unwrap();

        assert_eq!(params.industry_query, "Dachdecker");
        assert_eq!(params.max_results, 25);
        assert!(!params.analyze_website);
        assert!(!params.wants_website_analysis());
    }

    #[test]
    fn test_progress_phase_serializes_snake_case() {
        let value = serde_json::to_value(Progress::new(3, 10, JobPhase::AnalyzingWebsites)).unwrap();
        assert_eq!(
            value,
            json!({"current": 3, "total": 10, "phase": "analyzing_websites"})
        );
    }

    #[test]
    fn test_lead_serializes_external_field_names() {
        let lead = Lead {
            id: "p1".to_string(),
            external_id: "p1".to_string(),
            company_name: "Dach GmbH".to_string(),
            location: "Berlin".to_string(),
            address: Address {
                postal_code: Some("10115".to_string()),
                ..Default::default()
            },
            industry: Some("Dachdecker".to_string()),
            phone: None,
            website: None,
            email: None,
            website_analysis: None,
            primary_contact: None,
            score: 70,
        };

        let value = serde_json::to_value(&lead).unwrap();
        assert_eq!(value["firmenname"], "Dach GmbH");
        assert_eq!(value["externalId"], "p1");
        assert_eq!(value["adresse"], json!({"plz": "10115"}));
        assert_eq!(value["analyseScore"], 70);
        assert!(value["websiteAnalyse"].is_null());
    }

    #[test]
    fn test_place_candidate_tolerates_missing_fields() {
        let place: PlaceCandidate = serde_json::from_value(json!({
            "id": "abc",
            "displayName": {"text": "Maler Meier", "languageCode": "de"}
        }))
        .unwrap();

        assert_eq!(place.display_name(), "Maler Meier");
        assert!(place.address_components.is_empty());
        assert!(place.website_uri.is_none());
    }
}
