//! MedlinePlus Connect tools: multilingual patient-education topics, ICD-10
//! diagnosis lookups and RxNorm medication information.

use crate::tools::args;
use crate::tools::http::SourceClient;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://connect.medlineplus.gov/service";

/// ICD-10-CM code system OID.
const ICD10_CM: &str = "2.16.840.1.113883.6.90";

/// RxNorm code system OID.
const RXNORM: &str = "2.16.840.1.113883.6.88";

pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("ar", "Arabic"),
    ("zh", "Chinese"),
    ("fr", "French"),
    ("hi", "Hindi"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("vi", "Vietnamese"),
];

pub fn register(registry: &mut ToolRegistry, client: SourceClient) {
    registry.register(Arc::new(SearchTopicsTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(Icd10LookupTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(MedicationInfoTool { client }));
}

fn language_arg(args: &Value) -> Result<&str> {
    let language = args::optional_str(args, "language")?.unwrap_or("en");
    if SUPPORTED_LANGUAGES.iter().any(|(code, _)| *code == language) {
        Ok(language)
    } else {
        let codes: Vec<&str> = SUPPORTED_LANGUAGES.iter().map(|(c, _)| *c).collect();
        Err(AppError::InvalidInput(format!(
            "Unsupported language '{}'; supported: {}",
            language,
            codes.join(", ")
        )))
    }
}

fn value_text(entry: &Value, key: &str) -> Value {
    entry
        .get(key)
        .and_then(|v| v.get("_value").or(Some(v)))
        .filter(|v| v.is_string())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Flatten the Atom-style `feed.entry` list into topic records.
pub fn parse_feed(data: &Value, max: usize) -> Vec<Value> {
    let entries: Vec<&Value> = match data.pointer("/feed/entry") {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .take(max)
        .map(|entry| {
            let links: Vec<Value> = match entry.get("link") {
                Some(Value::Array(list)) => list.iter().collect::<Vec<_>>(),
                Some(single @ Value::Object(_)) => vec![single],
                _ => Vec::new(),
            }
            .into_iter()
            .map(|l| json!({"href": l.get("href"), "title": l.get("title")}))
            .collect();

            json!({
                "title": value_text(entry, "title"),
                "summary": value_text(entry, "summary"),
                "updated": value_text(entry, "updated"),
                "links": links,
            })
        })
        .collect()
}

pub struct SearchTopicsTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for SearchTopicsTool {
    fn name(&self) -> &str {
        "medlineplus_search_topics"
    }

    fn description(&self) -> &str {
        "Search MedlinePlus patient-education health topics for a condition, symptom or test, in one of several languages"
    }

    fn parameters_schema(&self) -> Value {
        let codes: Vec<&str> = SUPPORTED_LANGUAGES.iter().map(|(c, _)| *c).collect();
        json!({
            "type": "object",
            "properties": {
                "search_term": {"type": "string", "description": "Condition, symptom or topic"},
                "language": {"type": "string", "enum": codes, "default": "en"},
                "max_results": {"type": "integer", "default": 10}
            },
            "required": ["search_term"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let term = args::required_str(&args, "search_term")?;
        let language = language_arg(&args)?;
        let max = args::limit_or(&args, "max_results", 10, 50)? as usize;

        let data = self
            .client
            .get_json(
                "",
                &[
                    ("mainSearchCriteria.v.c", term.to_string()),
                    ("knowledgeResponseType", "application/json".to_string()),
                    ("informationRecipient.languageCode.c", language.to_string()),
                ],
            )
            .await?;

        let topics = parse_feed(&data, max);
        Ok(json!({
            "source": "medlineplus",
            "search_term": term,
            "language": language,
            "total_found": topics.len(),
            "topics": topics,
        }))
    }
}

pub struct Icd10LookupTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for Icd10LookupTool {
    fn name(&self) -> &str {
        "medlineplus_icd10_lookup"
    }

    fn description(&self) -> &str {
        "Look up patient-education information for an ICD-10-CM diagnosis code (e.g. 'E11.9' for type 2 diabetes)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "icd10_code": {"type": "string"},
                "language": {"type": "string", "default": "en"}
            },
            "required": ["icd10_code"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let code = args::required_str(&args, "icd10_code")?.to_uppercase();
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
            return Err(AppError::InvalidInput(format!("Invalid ICD-10 code '{}'", code)));
        }
        let language = language_arg(&args)?;

        let data = self
            .client
            .get_json(
                "",
                &[
                    ("mainSearchCriteria.v.cs", ICD10_CM.to_string()),
                    ("mainSearchCriteria.v.c", code.clone()),
                    ("knowledgeResponseType", "application/json".to_string()),
                    ("informationRecipient.languageCode.c", language.to_string()),
                ],
            )
            .await?;

        let information = parse_feed(&data, 25);
        Ok(json!({
            "source": "medlineplus",
            "icd10_code": code,
            "language": language,
            "total_resources": information.len(),
            "health_information": information,
        }))
    }
}

/// Buckets for medication feed entries, matched against the entry title.
const MEDICATION_BUCKETS: &[(&str, &[&str])] = &[
    ("interactions", &["interaction"]),
    ("side_effects", &["side effect", "adverse", "reaction"]),
    ("usage_instructions", &["dosage", "how to", "usage", "administration"]),
];

/// Search criteria for a medication: an RxCUI goes in as a code, anything
/// else as a display name.
pub fn medication_criteria(medication: &str) -> (&'static str, String) {
    if medication.chars().all(|c| c.is_ascii_digit()) {
        ("mainSearchCriteria.v.c", medication.to_string())
    } else {
        ("mainSearchCriteria.v.dn", medication.to_string())
    }
}

/// Sort medication entries into interaction, side effect, usage and general buckets.
pub fn categorize_medication(entries: Vec<Value>, include_interactions: bool) -> Value {
    let mut buckets = serde_json::Map::new();
    for (name, _) in MEDICATION_BUCKETS {
        buckets.insert(name.to_string(), json!([]));
    }
    buckets.insert("drug_information".to_string(), json!([]));

    for entry in entries {
        let title = entry["title"].as_str().unwrap_or_default().to_lowercase();
        let bucket = MEDICATION_BUCKETS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| title.contains(k)))
            .map(|(name, _)| *name)
            .unwrap_or("drug_information");
        if let Some(Value::Array(items)) = buckets.get_mut(bucket) {
            items.push(entry);
        }
    }
    if !include_interactions {
        buckets.remove("interactions");
    }
    Value::Object(buckets)
}

/// Medication information keyed by RxNorm.
pub struct MedicationInfoTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for MedicationInfoTool {
    fn name(&self) -> &str {
        "medlineplus_medication_info"
    }

    fn description(&self) -> &str {
        "Look up patient medication information by RxNorm code (RxCUI) or drug name, grouped into general information, interactions, side effects and usage"
    }

    fn parameters_schema(&self) -> Value {
        let codes: Vec<&str> = SUPPORTED_LANGUAGES.iter().map(|(c, _)| *c).collect();
        json!({
            "type": "object",
            "properties": {
                "medication_name": {"type": "string", "description": "Drug name or RxCUI"},
                "language": {"type": "string", "enum": codes, "default": "en"},
                "include_interactions": {"type": "boolean", "default": true}
            },
            "required": ["medication_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let medication = args::required_str(&args, "medication_name")?;
        let language = language_arg(&args)?;
        let include_interactions = args::bool_or(&args, "include_interactions", true)?;
        let (criteria_key, criteria_value) = medication_criteria(medication);

        let data = self
            .client
            .get_json(
                "",
                &[
                    ("mainSearchCriteria.v.cs", RXNORM.to_string()),
                    (criteria_key, criteria_value),
                    ("knowledgeResponseType", "application/json".to_string()),
                    ("informationRecipient.languageCode.c", language.to_string()),
                ],
            )
            .await?;

        let entries = parse_feed(&data, 25);
        let total = entries.len();
        Ok(json!({
            "source": "medlineplus",
            "medication_name": medication,
            "language": language,
            "total_resources": total,
            "medication_info": categorize_medication(entries, include_interactions),
        }))
    }
}
