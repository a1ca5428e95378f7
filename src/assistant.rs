//! Adherence support assistant backed by the Gemini API.
//!
//! The client is synchronous (blocking reqwest); async callers run it on
//! a blocking task. Prompt assembly is separate from transport so it can
//! be tested without a network.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::doses::DoseRecord;
use crate::db::medications::Medication;
use crate::db::patients::Patient;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// System framing prepended to every assistant prompt.
const SYSTEM_CONTEXT: &str = "\
You are a compassionate mental health support assistant for medication adherence.
You provide emotional support, answer questions about medication management, and offer coping strategies.
Be empathetic, encouraging, and supportive.

You have access to the patient's profile information, current medications, and medication consumption history.
When the user asks questions about themselves, their medications, their health, or their treatment plan,
use the provided patient context to give personalized and relevant responses.

For general mental health questions, provide helpful advice and encouragement.
Always maintain patient privacy and speak in a warm, supportive tone.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant is not configured (missing API key)")]
    NotConfigured,
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Gemini API returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse Gemini response: {0}")]
    ResponseParsing(String),
    #[error("Gemini returned no candidates")]
    EmptyResponse,
}

/// Text-in, text-out generation seam. Implementations must be safe to
/// call from a blocking task.
pub trait LlmGenerate: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, AssistantError>;
}

/// Gemini HTTP client.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, AssistantError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AssistantError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }

    /// Build a client from the environment, or `None` when no API key is
    /// configured.
    pub fn from_env() -> Result<Option<Self>, AssistantError> {
        match crate::config::gemini_api_key() {
            Some(key) => Ok(Some(Self::new(GEMINI_BASE_URL, &key, GEMINI_MODEL)?)),
            None => Ok(None),
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl LlmGenerate for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| AssistantError::HttpClient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| AssistantError::ResponseParsing(e.to_string()))?;

        let text: String = parsed
            .candidates
            .first()
            .ok_or(AssistantError::EmptyResponse)?
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(AssistantError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Summarize a patient's profile, schedules and recent consumption as a
/// bulleted context block for the assistant prompt.
pub fn build_patient_context(
    patient: &Patient,
    medications: &[Medication],
    recent_doses: &[DoseRecord],
) -> String {
    let mut ctx = String::new();

    ctx.push_str("Patient Profile:\n");
    ctx.push_str(&format!("\u{2022} Name: {}\n", patient.name));
    ctx.push_str(&format!("\u{2022} Email: {}\n", patient.email));
    if !patient.description.is_empty() {
        ctx.push_str(&format!(
            "\u{2022} Medical History/Notes: {}\n",
            patient.description
        ));
    }
    if !patient.bp.is_empty() {
        ctx.push_str(&format!("\u{2022} Blood Pressure: {}\n", patient.bp));
    }
    if !patient.regular_doctor.is_empty() {
        ctx.push_str(&format!(
            "\u{2022} Regular Doctor: Dr. {}\n",
            patient.regular_doctor
        ));
    }
    if !patient.caretaker_email.is_empty() {
        ctx.push_str(&format!("\u{2022} Caretaker: {}\n", patient.caretaker_email));
    }
    ctx.push('\n');

    if medications.is_empty() {
        ctx.push_str("No medications currently prescribed.\n\n");
    } else {
        ctx.push_str("Current Medications:\n");
        for med in medications {
            ctx.push_str(&format!(
                "\u{2022} {} - Prescribed by: Dr. {}, Timing: {}, Quantity: {}\n",
                med.name, med.doctor, med.timing, med.prescribed_qty
            ));
        }
        ctx.push('\n');
    }

    if !recent_doses.is_empty() {
        ctx.push_str("Recent Medication Consumption:\n");
        // Last seven distinct days per medication, from the 50 most
        // recent events (the caller supplies them newest first).
        let mut order: Vec<&str> = Vec::new();
        let mut days: std::collections::HashMap<&str, Vec<NaiveDate>> =
            std::collections::HashMap::new();
        for dose in recent_doses.iter().take(50) {
            let name = dose.medication_name.as_str();
            let entry = days.entry(name).or_insert_with(|| {
                order.push(name);
                Vec::new()
            });
            let date = dose.taken_at.date();
            if !entry.contains(&date) {
                entry.push(date);
            }
        }
        for name in order {
            let mut dates = days.remove(name).unwrap_or_default();
            dates.sort();
            let recent: Vec<String> = dates
                .iter()
                .rev()
                .take(7)
                .rev()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            ctx.push_str(&format!("\u{2022} {}: Taken on {}\n", name, recent.join(", ")));
        }
        ctx.push('\n');
    }

    ctx
}

/// Assemble the full prompt sent to the model.
pub fn compose_prompt(patient_context: &str, question: &str) -> String {
    format!(
        "{SYSTEM_CONTEXT}\n\nPatient Context:\n{patient_context}\n\nUser Question: {question}"
    )
}

/// Canned-response client for tests.
pub struct MockLlm {
    response: String,
}

impl MockLlm {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

impl LlmGenerate for MockLlm {
    fn generate(&self, _prompt: &str) -> Result<String, AssistantError> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn patient() -> Patient {
        let now = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Patient {
            id: Uuid::new_v4(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            description: "Type 2 diabetes".into(),
            bp: "120/80".into(),
            regular_doctor: "Rao".into(),
            caretaker_email: "care@example.com".into(),
            alert: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn medication(name: &str) -> Medication {
        let now = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Medication {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            name: name.into(),
            prescribed_qty: 30,
            timing: "Morning,Evening".into(),
            doctor: "Rao".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn dose(name: &str, day: u32) -> DoseRecord {
        DoseRecord {
            id: Uuid::new_v4(),
            medication_id: Uuid::new_v4(),
            medication_name: name.into(),
            timing: "Morning".into(),
            prescribed_qty: 30,
            taken_at: NaiveDate::from_ymd_opt(2026, 3, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn context_includes_profile_and_medications() {
        let ctx = build_patient_context(&patient(), &[medication("Metformin")], &[]);
        assert!(ctx.contains("Name: Asha"));
        assert!(ctx.contains("Blood Pressure: 120/80"));
        assert!(ctx.contains("Regular Doctor: Dr. Rao"));
        assert!(ctx.contains("Metformin - Prescribed by: Dr. Rao"));
        assert!(ctx.contains("Timing: Morning,Evening"));
    }

    #[test]
    fn context_omits_blank_profile_fields() {
        let mut p = patient();
        p.description = String::new();
        p.bp = String::new();
        let ctx = build_patient_context(&p, &[], &[]);
        assert!(!ctx.contains("Medical History"));
        assert!(!ctx.contains("Blood Pressure"));
        assert!(ctx.contains("No medications currently prescribed."));
    }

    #[test]
    fn consumption_lists_last_seven_distinct_days() {
        // Nine distinct days, newest first; only the last seven appear.
        let doses: Vec<_> = (1..=9).rev().map(|d| dose("Metformin", d)).collect();
        let ctx = build_patient_context(&patient(), &[medication("Metformin")], &doses);
        assert!(ctx.contains("Metformin: Taken on"));
        assert!(!ctx.contains("2026-03-01"));
        assert!(!ctx.contains("2026-03-02"));
        assert!(ctx.contains("2026-03-03"));
        assert!(ctx.contains("2026-03-09"));
    }

    #[test]
    fn duplicate_days_are_collapsed() {
        let doses = vec![dose("Metformin", 5), dose("Metformin", 5)];
        let ctx = build_patient_context(&patient(), &[medication("Metformin")], &doses);
        assert_eq!(ctx.matches("2026-03-05").count(), 1);
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let prompt = compose_prompt("CONTEXT-BLOCK", "How am I doing?");
        assert!(prompt.starts_with("You are a compassionate"));
        assert!(prompt.contains("Patient Context:\nCONTEXT-BLOCK"));
        assert!(prompt.ends_with("User Question: How am I doing?"));
    }

    #[test]
    fn mock_returns_configured_response() {
        let llm = MockLlm::new("take a deep breath");
        assert_eq!(llm.generate("anything").unwrap(), "take a deep breath");
    }

    #[test]
    fn gemini_client_trims_trailing_slash() {
        let client = GeminiClient::new("http://localhost:9999/", "key", "gemini-2.5-flash")
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
