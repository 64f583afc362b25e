//! openFDA tools: drug adverse events (FAERS), labeling, recalls, a combined
//! drug safety profile, and medical device adverse events (MAUDE).

use crate::tools::args;
use crate::tools::http::SourceClient;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.fda.gov";

/// Longest accepted `date_range_days` look-back (100 years).
pub const MAX_DATE_RANGE_DAYS: u64 = 36_500;

const LABEL_SECTIONS: &[&str] = &[
    "warnings",
    "indications",
    "dosage",
    "contraindications",
    "adverse_reactions",
];

pub fn register(registry: &mut ToolRegistry, client: SourceClient) {
    registry.register(Arc::new(AdverseEventsTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(LabelingTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(RecallsTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(SafetyProfileTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(DeviceEventsTool { client }));
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', ""))
}

fn total_found(data: &Value) -> Value {
    data.pointer("/meta/results/total").cloned().unwrap_or(json!(0))
}

fn results(data: &Value) -> &[Value] {
    data.get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn first_str(value: &Value, key: &str) -> Value {
    value.get(key).cloned().unwrap_or(Value::Null)
}

/// Start and end of a look-back window ending now.
///
/// Ranges past [`MAX_DATE_RANGE_DAYS`] are rejected as invalid input.
pub fn date_window(days: u64) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let out_of_range = || {
        AppError::InvalidInput(format!(
            "date_range_days must be at most {}, got {}",
            MAX_DATE_RANGE_DAYS, days
        ))
    };
    if days > MAX_DATE_RANGE_DAYS {
        return Err(out_of_range());
    }
    let span = i64::try_from(days)
        .ok()
        .and_then(TimeDelta::try_days)
        .ok_or_else(out_of_range)?;
    let end = Utc::now();
    let start = end.checked_sub_signed(span).ok_or_else(out_of_range)?;
    Ok((start, end))
}

fn date_range_term(field: &str, days: u64) -> Result<String> {
    let (start, end) = date_window(days)?;
    Ok(format!(
        "{}:[{} TO {}]",
        field,
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    ))
}

/// Build the openFDA `search` expression for adverse events.
pub fn adverse_event_search(drug: &str, serious_only: bool, days: Option<u64>) -> Result<String> {
    let q = quote(drug);
    let mut terms = vec![format!(
        "(patient.drug.medicinalproduct:{q} OR patient.drug.openfda.brand_name:{q} OR patient.drug.openfda.generic_name:{q})"
    )];
    if serious_only {
        terms.push("serious:1".to_string());
    }
    if let Some(days) = days {
        terms.push(date_range_term("receivedate", days)?);
    }
    Ok(terms.join(" AND "))
}

/// Build the openFDA `search` expression for enforcement reports.
pub fn recall_search(
    drug: Option<&str>,
    status: Option<&str>,
    classification: Option<&str>,
    days: Option<u64>,
) -> Result<String> {
    let mut terms = Vec::new();
    if let Some(drug) = drug {
        let q = quote(drug);
        terms.push(format!(
            "(product_description:{q} OR openfda.brand_name:{q} OR openfda.generic_name:{q})"
        ));
    }
    if let Some(status) = status {
        terms.push(format!("status:{}", quote(status)));
    }
    if let Some(class) = classification {
        let label = match class.to_lowercase().as_str() {
            "class_i" | "class i" | "i" => "Class I",
            "class_ii" | "class ii" | "ii" => "Class II",
            "class_iii" | "class iii" | "iii" => "Class III",
            other => {
                return Err(AppError::InvalidInput(format!(
                    "classification must be class_i, class_ii or class_iii, got '{}'",
                    other
                )));
            }
        };
        terms.push(format!("classification:{}", quote(label)));
    }
    if let Some(days) = days {
        terms.push(date_range_term("report_date", days)?);
    }
    Ok(terms.join(" AND "))
}

/// Build the openFDA `search` expression for device adverse events.
pub fn device_event_search(device: &str, days: Option<u64>) -> Result<String> {
    let q = quote(device);
    let mut terms = vec![format!(
        "(device.generic_name:{q} OR device.brand_name:{q} OR device.manufacturer_d_name:{q})"
    )];
    if let Some(days) = days {
        terms.push(date_range_term("date_received", days)?);
    }
    Ok(terms.join(" AND "))
}

fn normalize_event(event: &Value) -> Value {
    let patient = event.get("patient").cloned().unwrap_or(json!({}));
    let drugs: Vec<Value> = patient
        .get("drug")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|d| {
                    json!({
                        "name": first_str(d, "medicinalproduct"),
                        "indication": first_str(d, "drugindication"),
                        "characterization": first_str(d, "drugcharacterization"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let reactions: Vec<Value> = patient
        .get("reaction")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(|r| first_str(r, "reactionmeddrapt")).collect())
        .unwrap_or_default();

    json!({
        "report_id": first_str(event, "safetyreportid"),
        "receive_date": first_str(event, "receivedate"),
        "serious": first_str(event, "serious"),
        "seriousness_death": first_str(event, "seriousnessdeath"),
        "seriousness_hospitalization": first_str(event, "seriousnesshospitalization"),
        "patient": {
            "age": first_str(&patient, "patientonsetage"),
            "sex": first_str(&patient, "patientsex"),
        },
        "drugs": drugs,
        "reactions": reactions,
    })
}

async fn fetch_adverse_events(
    client: &SourceClient,
    drug: &str,
    limit: u64,
    serious_only: bool,
    days: Option<u64>,
) -> Result<Value> {
    let search = adverse_event_search(drug, serious_only, days)?;
    let data = client
        .get_json(
            "drug/event.json",
            &[("search", search), ("limit", limit.to_string())],
        )
        .await?;

    // Reaction frequency across the returned reports.
    let mut reaction_counts: Map<String, Value> = Map::new();
    let events: Vec<Value> = results(&data).iter().map(normalize_event).collect();
    for event in &events {
        for reaction in event["reactions"].as_array().into_iter().flatten() {
            if let Some(term) = reaction.as_str() {
                let count = reaction_counts.get(term).and_then(Value::as_u64).unwrap_or(0);
                reaction_counts.insert(term.to_string(), json!(count + 1));
            }
        }
    }

    Ok(json!({
        "source": "openfda",
        "drug_name": drug,
        "total_found": total_found(&data),
        "returned_count": events.len(),
        "reaction_counts": reaction_counts,
        "adverse_events": events,
        "disclaimer": "FAERS reports do not by themselves establish that the drug caused the event.",
    }))
}

fn section_fields(section: Option<&str>) -> Vec<&'static str> {
    match section {
        Some("warnings") => vec!["boxed_warning", "warnings", "warnings_and_cautions"],
        Some("indications") => vec!["indications_and_usage"],
        Some("dosage") => vec!["dosage_and_administration"],
        Some("contraindications") => vec!["contraindications"],
        Some("adverse_reactions") => vec!["adverse_reactions"],
        _ => vec![
            "boxed_warning",
            "warnings",
            "warnings_and_cautions",
            "indications_and_usage",
            "dosage_and_administration",
            "contraindications",
            "adverse_reactions",
            "drug_interactions",
            "pregnancy",
            "pediatric_use",
            "geriatric_use",
        ],
    }
}

async fn fetch_labels(
    client: &SourceClient,
    drug: &str,
    section: Option<&str>,
    limit: u64,
) -> Result<Value> {
    let q = quote(drug);
    let search = format!(
        "(openfda.brand_name:{q} OR openfda.generic_name:{q} OR openfda.substance_name:{q})"
    );
    let data = client
        .get_json(
            "drug/label.json",
            &[("search", search), ("limit", limit.to_string())],
        )
        .await?;

    let fields = section_fields(section);
    let labels: Vec<Value> = results(&data)
        .iter()
        .map(|label| {
            let sections: Map<String, Value> = fields
                .iter()
                .filter_map(|f| label.get(*f).map(|v| (f.to_string(), v.clone())))
                .collect();
            json!({
                "brand_names": label.pointer("/openfda/brand_name").cloned().unwrap_or(json!([])),
                "generic_names": label.pointer("/openfda/generic_name").cloned().unwrap_or(json!([])),
                "manufacturer": label.pointer("/openfda/manufacturer_name").cloned().unwrap_or(json!([])),
                "route": label.pointer("/openfda/route").cloned().unwrap_or(json!([])),
                "sections": sections,
            })
        })
        .collect();

    Ok(json!({
        "source": "openfda",
        "drug_name": drug,
        "section_requested": section.unwrap_or("all"),
        "total_found": total_found(&data),
        "returned_count": labels.len(),
        "labels": labels,
    }))
}

async fn fetch_recalls(
    client: &SourceClient,
    drug: Option<&str>,
    status: Option<&str>,
    classification: Option<&str>,
    limit: u64,
    days: Option<u64>,
) -> Result<Value> {
    let search = recall_search(drug, status, classification, days)?;
    let data = client
        .get_json(
            "drug/enforcement.json",
            &[("search", search), ("limit", limit.to_string())],
        )
        .await?;

    let recalls: Vec<Value> = results(&data)
        .iter()
        .map(|r| {
            json!({
                "recall_number": first_str(r, "recall_number"),
                "status": first_str(r, "status"),
                "classification": first_str(r, "classification"),
                "product_description": first_str(r, "product_description"),
                "reason_for_recall": first_str(r, "reason_for_recall"),
                "report_date": first_str(r, "report_date"),
                "recalling_firm": first_str(r, "recalling_firm"),
                "distribution_pattern": first_str(r, "distribution_pattern"),
            })
        })
        .collect();

    Ok(json!({
        "source": "openfda",
        "drug_name": drug,
        "status": status,
        "classification": classification,
        "total_found": total_found(&data),
        "returned_count": recalls.len(),
        "recalls": recalls,
    }))
}

pub struct AdverseEventsTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for AdverseEventsTool {
    fn name(&self) -> &str {
        "fda_drug_adverse_events"
    }

    fn description(&self) -> &str {
        "Search FDA adverse event reports (FAERS) for a drug by brand or generic name. Reports do not establish causation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "drug_name": {"type": "string", "description": "Brand or generic drug name"},
                "limit": {"type": "integer", "default": 10},
                "serious_only": {"type": "boolean", "default": false},
                "date_range_days": {"type": "integer", "maximum": MAX_DATE_RANGE_DAYS, "description": "Only reports received in the last N days"}
            },
            "required": ["drug_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let drug = args::required_str(&args, "drug_name")?;
        let limit = args::limit_or(&args, "limit", 10, 100)?;
        let serious_only = args::bool_or(&args, "serious_only", false)?;
        let days = args::optional_u64(&args, "date_range_days")?;

        fetch_adverse_events(&self.client, drug, limit, serious_only, days).await
    }
}

pub struct LabelingTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for LabelingTool {
    fn name(&self) -> &str {
        "fda_drug_labeling"
    }

    fn description(&self) -> &str {
        "Get FDA drug label sections (warnings, indications, dosage, contraindications, adverse reactions) for a drug"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "drug_name": {"type": "string"},
                "section": {"type": "string", "enum": LABEL_SECTIONS},
                "limit": {"type": "integer", "default": 5}
            },
            "required": ["drug_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let drug = args::required_str(&args, "drug_name")?;
        let section = args::optional_str(&args, "section")?;
        if section.is_some_and(|s| !LABEL_SECTIONS.contains(&s)) {
            return Err(AppError::InvalidInput(format!(
                "section must be one of {:?}",
                LABEL_SECTIONS
            )));
        }
        let limit = args::limit_or(&args, "limit", 5, 20)?;

        fetch_labels(&self.client, drug, section, limit).await
    }
}

pub struct RecallsTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for RecallsTool {
    fn name(&self) -> &str {
        "fda_drug_recalls"
    }

    fn description(&self) -> &str {
        "Get FDA drug recall and enforcement reports, optionally filtered by drug, status and recall class"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "drug_name": {"type": "string"},
                "status": {"type": "string", "description": "Ongoing, Completed or Terminated", "default": "Ongoing"},
                "classification": {"type": "string", "enum": ["class_i", "class_ii", "class_iii"]},
                "limit": {"type": "integer", "default": 10},
                "date_range_days": {"type": "integer", "default": 365, "maximum": MAX_DATE_RANGE_DAYS}
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let drug = args::optional_str(&args, "drug_name")?;
        let status = args::optional_str(&args, "status")?.unwrap_or("Ongoing");
        let classification = args::optional_str(&args, "classification")?;
        let limit = args::limit_or(&args, "limit", 10, 100)?;
        let days = args::optional_u64(&args, "date_range_days")?.or(Some(365));

        fetch_recalls(&self.client, drug, Some(status), classification, limit, days).await
    }
}

/// Count occurrences of `key` across `items`, most frequent first.
fn tally(items: &[Value], key: &str, top: usize) -> Vec<Value> {
    let mut counts: Vec<(String, u64)> = Vec::new();
    for item in items {
        let label = item
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
        .into_iter()
        .take(top)
        .map(|(label, count)| json!({"value": label, "count": count}))
        .collect()
}

/// Condense adverse events into the most frequent reactions.
fn summarize_adverse_events(data: &Value) -> Value {
    let mut reactions: Vec<(&String, u64)> = data["reaction_counts"]
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k, v.as_u64().unwrap_or(0))).collect())
        .unwrap_or_default();
    reactions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let serious = data["adverse_events"]
        .as_array()
        .map(|events| events.iter().filter(|e| e["serious"] == "1").count())
        .unwrap_or(0);

    json!({
        "total_reports": data["total_found"],
        "analyzed_reports": data["returned_count"],
        "serious_reports": serious,
        "most_common_reactions": reactions
            .into_iter()
            .take(10)
            .map(|(term, count)| json!({"reaction": term, "count": count}))
            .collect::<Vec<_>>(),
        "data_source": "FDA Adverse Event Reporting System (FAERS)",
    })
}

/// Collect safety-relevant label sections across every returned label.
fn summarize_labels(data: &Value) -> Value {
    let labels = data["labels"].as_array().map(Vec::as_slice).unwrap_or_default();
    let collect = |fields: &[&str]| -> Vec<Value> {
        labels
            .iter()
            .flat_map(|label| {
                fields
                    .iter()
                    .filter_map(|f| label["sections"].get(*f).and_then(Value::as_array))
                    .flatten()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    json!({
        "labels_analyzed": labels.len(),
        "boxed_warnings": collect(&["boxed_warning"]),
        "warnings": collect(&["warnings", "warnings_and_cautions"]),
        "contraindications": collect(&["contraindications"]),
        "labeled_adverse_reactions": collect(&["adverse_reactions"]),
    })
}

fn summarize_recalls(data: &Value) -> Value {
    let recalls = data["recalls"].as_array().map(Vec::as_slice).unwrap_or_default();
    json!({
        "total_recalls": data["total_found"],
        "analyzed_recalls": recalls.len(),
        "by_status": tally(recalls, "status", 10),
        "by_classification": tally(recalls, "classification", 10),
        "top_reasons": tally(recalls, "reason_for_recall", 5),
    })
}

/// Adverse events, label warnings and recall history for one drug.
pub struct SafetyProfileTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for SafetyProfileTool {
    fn name(&self) -> &str {
        "fda_drug_safety_profile"
    }

    fn description(&self) -> &str {
        "Build a drug safety profile combining the last year of FAERS reports, label warnings and contraindications, and five years of recall history"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "drug_name": {"type": "string"},
                "include_adverse_events": {"type": "boolean", "default": true},
                "include_labeling": {"type": "boolean", "default": true},
                "include_recalls": {"type": "boolean", "default": true},
                "serious_events_only": {"type": "boolean", "default": false}
            },
            "required": ["drug_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let drug = args::required_str(&args, "drug_name")?;
        let include_events = args::bool_or(&args, "include_adverse_events", true)?;
        let include_labels = args::bool_or(&args, "include_labeling", true)?;
        let include_recalls = args::bool_or(&args, "include_recalls", true)?;
        let serious_only = args::bool_or(&args, "serious_events_only", false)?;
        if !(include_events || include_labels || include_recalls) {
            return Err(AppError::InvalidInput(
                "at least one profile section must be included".to_string(),
            ));
        }

        let events = async {
            if include_events {
                Some(fetch_adverse_events(&self.client, drug, 50, serious_only, Some(365)).await)
            } else {
                None
            }
        };
        let labels = async {
            if include_labels {
                Some(fetch_labels(&self.client, drug, None, 3).await)
            } else {
                None
            }
        };
        let recalls = async {
            if include_recalls {
                Some(fetch_recalls(&self.client, Some(drug), None, None, 20, Some(1825)).await)
            } else {
                None
            }
        };
        let (events, labels, recalls) = tokio::join!(events, labels, recalls);

        // Partial profiles are still useful; fail only when nothing came back.
        let mut profile = Map::new();
        let mut first_error = None;
        let mut succeeded = 0;
        let sections = [
            ("adverse_events", events.map(|r| r.map(|d| summarize_adverse_events(&d)))),
            ("labeling_warnings", labels.map(|r| r.map(|d| summarize_labels(&d)))),
            ("recall_history", recalls.map(|r| r.map(|d| summarize_recalls(&d)))),
        ];
        for (name, result) in sections {
            let value = match result {
                None => continue,
                Some(Ok(summary)) => {
                    succeeded += 1;
                    summary
                }
                Some(Err(e)) => {
                    let value = json!({"error": e.to_string(), "error_kind": e.kind()});
                    first_error.get_or_insert(e);
                    value
                }
            };
            profile.insert(name.to_string(), value);
        }
        if succeeded == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(json!({
            "source": "openfda",
            "drug_name": drug,
            "analysis_date": Utc::now().format("%Y-%m-%d").to_string(),
            "safety_profile": profile,
            "disclaimer": "Spontaneous reports and recalls describe signals, not established risk.",
        }))
    }
}

fn normalize_device_event(event: &Value) -> Value {
    let devices: Vec<Value> = event
        .get("device")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|d| {
                    json!({
                        "generic_name": first_str(d, "generic_name"),
                        "brand_name": first_str(d, "brand_name"),
                        "manufacturer": first_str(d, "manufacturer_d_name"),
                        "model_number": first_str(d, "model_number"),
                        "device_class": d.pointer("/openfda/device_class").cloned().unwrap_or(Value::Null),
                        "implant_flag": first_str(d, "implant_flag"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "report_number": first_str(event, "report_number"),
        "date_received": first_str(event, "date_received"),
        "event_type": first_str(event, "event_type"),
        "report_source": first_str(event, "report_source_code"),
        "adverse_event_flag": first_str(event, "adverse_event_flag"),
        "product_problem_flag": first_str(event, "product_problem_flag"),
        "devices": devices,
    })
}

/// Medical device adverse events from MAUDE.
pub struct DeviceEventsTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for DeviceEventsTool {
    fn name(&self) -> &str {
        "fda_device_adverse_events"
    }

    fn description(&self) -> &str {
        "Search FDA medical device adverse event reports (MAUDE) by device generic name, brand or manufacturer"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "device_name": {"type": "string", "description": "Device type, brand or manufacturer"},
                "limit": {"type": "integer", "default": 10},
                "date_range_days": {"type": "integer", "default": 365, "maximum": MAX_DATE_RANGE_DAYS}
            },
            "required": ["device_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let device = args::required_str(&args, "device_name")?;
        let limit = args::limit_or(&args, "limit", 10, 100)?;
        let days = args::optional_u64(&args, "date_range_days")?.or(Some(365));

        let search = device_event_search(device, days)?;
        let data = self
            .client
            .get_json(
                "device/event.json",
                &[("search", search), ("limit", limit.to_string())],
            )
            .await?;
        let events: Vec<Value> = results(&data).iter().map(normalize_device_event).collect();

        Ok(json!({
            "source": "openfda",
            "device_name": device,
            "total_found": total_found(&data),
            "returned_count": events.len(),
            "device_events": events,
            "disclaimer": "MAUDE reports do not by themselves establish that the device caused the event.",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adverse_event_search_terms() {
        let search = adverse_event_search("metformin", true, None).unwrap();
        assert!(search.starts_with("(patient.drug.medicinalproduct:\"metformin\""));
        assert!(search.ends_with(" AND serious:1"));

        let dated = adverse_event_search("x", false, Some(30)).unwrap();
        assert!(dated.contains("receivedate:["));
    }

    #[test]
    fn test_huge_date_range_is_invalid_input() {
        for days in [MAX_DATE_RANGE_DAYS + 1, 200_000_000, u64::MAX] {
            let err = adverse_event_search("metformin", false, Some(days)).unwrap_err();
            assert_eq!(err.kind(), "invalid_input");
            let err = recall_search(None, None, None, Some(days)).unwrap_err();
            assert_eq!(err.kind(), "invalid_input");
            assert!(device_event_search("pump", Some(days)).is_err());
        }

        let (start, end) = date_window(MAX_DATE_RANGE_DAYS).unwrap();
        assert!(start < end);
    }

    #[test]
    fn test_recall_search_classification() {
        let search = recall_search(None, Some("Ongoing"), Some("class_ii"), None).unwrap();
        assert_eq!(search, "status:\"Ongoing\" AND classification:\"Class II\"");
        assert!(recall_search(None, None, Some("class_iv"), None).is_err());
    }

    #[test]
    fn test_device_event_search_terms() {
        let search = device_event_search("insulin pump", None).unwrap();
        assert_eq!(
            search,
            "(device.generic_name:\"insulin pump\" OR device.brand_name:\"insulin pump\" OR device.manufacturer_d_name:\"insulin pump\")"
        );
    }

    #[test]
    fn test_quote_strips_embedded_quotes() {
        assert_eq!(quote("a\"b"), "\"ab\"");
    }

    #[test]
    fn test_recall_summary_tallies() {
        let data = json!({
            "total_found": 3,
            "recalls": [
                {"status": "Ongoing", "classification": "Class II", "reason_for_recall": "NDMA"},
                {"status": "Terminated", "classification": "Class II", "reason_for_recall": "NDMA"},
                {"status": "Ongoing", "classification": "Class I", "reason_for_recall": "Mislabeling"}
            ]
        });
        let summary = summarize_recalls(&data);
        assert_eq!(summary["analyzed_recalls"], 3);
        assert_eq!(summary["by_classification"][0], json!({"value": "Class II", "count": 2}));
        assert_eq!(summary["top_reasons"][0]["value"], "NDMA");
    }

    #[test]
    fn test_normalize_event() {
        let event = json!({
            "safetyreportid": "1001",
            "serious": "1",
            "patient": {
                "patientsex": "2",
                "drug": [{"medicinalproduct": "METFORMIN"}],
                "reaction": [{"reactionmeddrapt": "Nausea"}, {"reactionmeddrapt": "Lactic acidosis"}]
            }
        });
        let normalized = normalize_event(&event);
        assert_eq!(normalized["report_id"], "1001");
        assert_eq!(normalized["drugs"][0]["name"], "METFORMIN");
        assert_eq!(normalized["reactions"][1], "Lactic acidosis");
    }
}
