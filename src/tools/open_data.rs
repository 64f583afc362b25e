//! CDC Open Data (Socrata) tools

use crate::tools::args;
use crate::tools::http::SourceClient;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://data.cdc.gov";

const MAX_RECORDS: usize = 100;

const COMMON_DATASETS: &[(&str, &str)] = &[
    ("nndss_weekly", "x9gk-5huc"),
    ("covid_deaths_provisional", "9bhg-hcku"),
    ("flu_surveillance", "pk7k-8jbr"),
    ("chronic_disease", "g4ie-h725"),
    ("behavioral_risk", "dttw-5yxu"),
    ("birth_data", "3h58-x6cd"),
    ("mortality_data", "bi63-dtpu"),
    ("cancer_statistics", "hiyb-xunq"),
    ("diabetes_surveillance", "37jh-ykv3"),
    ("heart_disease", "6x7h-usvx"),
];

const COVID_DATASETS: &[(&str, &str)] = &[
    ("cases", "9mfq-cb36"),
    ("deaths", "r8kw-7aab"),
    ("hospitalizations", "g62h-syeh"),
];

pub fn register(registry: &mut ToolRegistry, client: SourceClient) {
    registry.register(Arc::new(CommonDatasetsTool));
    registry.register(Arc::new(SearchOpenDataTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(CovidDataTool { client }));
}

/// Socrata four-by-four identifier, e.g. `9mfq-cb36`.
pub fn is_dataset_id(id: &str) -> bool {
    let parts: Vec<&str> = id.split('-').collect();
    parts.len() == 2
        && parts
            .iter()
            .all(|p| p.len() == 4 && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_soql(value: &str) -> String {
    value.replace('\'', "''")
}

pub struct CommonDatasetsTool;

#[async_trait]
impl Tool for CommonDatasetsTool {
    fn name(&self) -> &str {
        "cdc_common_datasets"
    }

    fn description(&self) -> &str {
        "List commonly used CDC Open Data datasets with their dataset ids"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        let datasets: Vec<Value> = COMMON_DATASETS
            .iter()
            .map(|(name, id)| {
                json!({
                    "id": id,
                    "name": title_case(name),
                    "description": format!("CDC {} data", name.replace('_', " ")),
                })
            })
            .collect();

        Ok(json!({
            "source": "open_data",
            "datasets": datasets,
            "note": "Use these ids with cdc_search_open_data",
        }))
    }
}

/// Query one dataset's rows, or search the dataset catalog.
pub struct SearchOpenDataTool {
    client: SourceClient,
}

impl SearchOpenDataTool {
    fn normalize_catalog(data: &Value) -> Value {
        let datasets: Vec<Value> = data
            .get("results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| r.get("resource"))
                    .map(|res| {
                        json!({
                            "id": res.get("id").cloned().unwrap_or(Value::Null),
                            "name": res.get("name").cloned().unwrap_or(Value::Null),
                            "description": res
                                .get("description")
                                .and_then(Value::as_str)
                                .map(|d| d.chars().take(300).collect::<String>()),
                            "updated_at": res.get("updatedAt").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        json!({
            "total": data.get("resultSetSize").cloned().unwrap_or(json!(datasets.len())),
            "datasets": datasets,
        })
    }
}

#[async_trait]
impl Tool for SearchOpenDataTool {
    fn name(&self) -> &str {
        "cdc_search_open_data"
    }

    fn description(&self) -> &str {
        "Query rows of a CDC Open Data dataset by id, or search the CDC dataset catalog by keyword when no dataset id is given"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dataset_id": {"type": "string", "description": "Dataset id, e.g. '9mfq-cb36'"},
                "query": {"type": "string", "description": "Full-text search terms"},
                "limit": {"type": "integer", "default": 100},
                "offset": {"type": "integer", "default": 0}
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let dataset_id = args::optional_str(&args, "dataset_id")?;
        let query = args::optional_str(&args, "query")?;
        let limit = args::limit_or(&args, "limit", 100, 1000)?;
        let offset = args::optional_u64(&args, "offset")?.unwrap_or(0);

        match dataset_id {
            Some(id) => {
                if !is_dataset_id(id) {
                    return Err(AppError::InvalidInput(format!(
                        "dataset_id '{}' is not a Socrata id like 'abcd-1234'",
                        id
                    )));
                }
                let mut params = vec![("$limit", limit.to_string()), ("$offset", offset.to_string())];
                if let Some(q) = query {
                    params.push(("$q", q.to_string()));
                }
                let data = self
                    .client
                    .get_json(&format!("resource/{}.json", id), &params)
                    .await?;
                let rows = data.as_array().cloned().unwrap_or_default();
                Ok(json!({
                    "source": "open_data",
                    "dataset_id": id,
                    "query": query,
                    "record_count": rows.len(),
                    "records": rows.into_iter().take(MAX_RECORDS).collect::<Vec<_>>(),
                }))
            }
            None => {
                let mut params = vec![("limit", limit.min(50).to_string()), ("offset", offset.to_string())];
                if let Some(q) = query {
                    params.push(("q", q.to_string()));
                }
                let data = self.client.get_json("api/catalog/v1", &params).await?;
                let mut result = Self::normalize_catalog(&data);
                if let Some(obj) = result.as_object_mut() {
                    obj.insert("source".into(), json!("open_data"));
                    obj.insert("query".into(), json!(query));
                }
                Ok(result)
            }
        }
    }
}

/// COVID-19 cases, deaths or hospitalizations filtered by state and dates.
pub struct CovidDataTool {
    client: SourceClient,
}

impl CovidDataTool {
    /// Build the SoQL `$where` clause for state and `YYYY-MM-DD/YYYY-MM-DD` range.
    pub fn where_clause(state: Option<&str>, date_range: Option<&str>) -> Result<Option<String>> {
        let mut conditions = Vec::new();
        if let Some(state) = state {
            conditions.push(format!("state = '{}'", escape_soql(&state.to_uppercase())));
        }
        if let Some(range) = date_range {
            let (start, end) = range.split_once('/').ok_or_else(|| {
                AppError::InvalidInput("date_range must look like 'YYYY-MM-DD/YYYY-MM-DD'".into())
            })?;
            for date in [start, end] {
                chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                    AppError::InvalidInput(format!("Invalid date '{}' in date_range", date))
                })?;
            }
            conditions.push(format!(
                "submission_date between '{}T00:00:00.000' and '{}T23:59:59.999'",
                start, end
            ));
        }
        Ok((!conditions.is_empty()).then(|| conditions.join(" AND ")))
    }
}

#[async_trait]
impl Tool for CovidDataTool {
    fn name(&self) -> &str {
        "cdc_search_covid_data"
    }

    fn description(&self) -> &str {
        "Search CDC COVID-19 case, death or hospitalization data by state and submission date range"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "state": {"type": "string", "description": "State abbreviation, e.g. 'NY'"},
                "date_range": {"type": "string", "description": "'YYYY-MM-DD/YYYY-MM-DD'"},
                "data_type": {"type": "string", "enum": ["cases", "deaths", "hospitalizations"], "default": "cases"},
                "limit": {"type": "integer", "default": 1000}
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let data_type = args::optional_str(&args, "data_type")?.unwrap_or("cases");
        let dataset_id = COVID_DATASETS
            .iter()
            .find(|(name, _)| *name == data_type)
            .map(|(_, id)| *id)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "data_type must be cases, deaths or hospitalizations, got '{}'",
                    data_type
                ))
            })?;
        let state = args::optional_str(&args, "state")?;
        let date_range = args::optional_str(&args, "date_range")?;
        let limit = args::limit_or(&args, "limit", 1000, 5000)?;

        let mut params = vec![("$limit", limit.to_string())];
        if let Some(clause) = Self::where_clause(state, date_range)? {
            params.push(("$where", clause));
        }

        let data = self
            .client
            .get_json(&format!("resource/{}.json", dataset_id), &params)
            .await?;
        let rows = data.as_array().cloned().unwrap_or_default();

        Ok(json!({
            "source": "open_data",
            "data_type": data_type,
            "dataset_id": dataset_id,
            "state": state,
            "date_range": date_range,
            "record_count": rows.len(),
            "records": rows.into_iter().take(MAX_RECORDS).collect::<Vec<_>>(),
        }))
    }
}
