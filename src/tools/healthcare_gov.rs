//! data.healthcare.gov (DKAN) tools: catalog search, dataset metadata and
//! datastore queries.

use crate::tools::args;
use crate::tools::http::SourceClient;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::types::{AppError, Result, SourceError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://data.healthcare.gov/api/1";

const CATALOG_SCAN_LIMIT: u64 = 100;

pub fn register(registry: &mut ToolRegistry, client: SourceClient) {
    registry.register(Arc::new(SearchCatalogTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(GetDatasetTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(QueryDatastoreTool { client }));
}

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn validate_identifier(id: &str) -> Result<()> {
    if id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("Invalid dataset identifier '{}'", id)))
    }
}

/// Rank catalog items whose title or description mention `term`.
///
/// Title matches come first, then alphabetical by title.
pub fn rank_catalog_matches(items: &[Value], term: &str, limit: usize) -> (usize, Vec<Value>) {
    let term = term.to_lowercase();
    let mut matches: Vec<(bool, String, Value)> = items
        .iter()
        .filter_map(|item| {
            let title = str_field(item, "title");
            let description = str_field(item, "description");
            let in_title = title.to_lowercase().contains(&term);
            if !in_title && !description.to_lowercase().contains(&term) {
                return None;
            }
            let summary: String = description.chars().take(200).collect();
            Some((
                in_title,
                title.to_string(),
                json!({
                    "title": if title.is_empty() { "Untitled" } else { title },
                    "identifier": str_field(item, "identifier"),
                    "modified": str_field(item, "modified"),
                    "description": summary,
                    "relevance": if in_title { "title" } else { "description" },
                }),
            ))
        })
        .collect();

    matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    let total = matches.len();
    (total, matches.into_iter().take(limit).map(|(_, _, v)| v).collect())
}

pub struct SearchCatalogTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for SearchCatalogTool {
    fn name(&self) -> &str {
        "healthcare_search_catalog"
    }

    fn description(&self) -> &str {
        "Search data.healthcare.gov datasets (marketplace, coverage, enrollment, quality) by a term in their title or description"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_term": {"type": "string", "description": "Term to look for, e.g. 'enrollment'"},
                "limit": {"type": "integer", "default": 20}
            },
            "required": ["search_term"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let term = args::required_str(&args, "search_term")?;
        let limit = args::limit_or(&args, "limit", 20, 100)? as usize;

        let data = self
            .client
            .get_json(
                "metastore/schemas/dataset/items",
                &[("limit", CATALOG_SCAN_LIMIT.to_string())],
            )
            .await?;
        let items = data.as_array().ok_or_else(|| {
            SourceError::MalformedResponse("healthcare_gov: dataset list is not an array".into())
        })?;

        let (total, matches) = rank_catalog_matches(items, term, limit);
        Ok(json!({
            "source": "healthcare_gov",
            "search_term": term,
            "searched_datasets": items.len(),
            "total_matches": total,
            "matches": matches,
        }))
    }
}

pub struct GetDatasetTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for GetDatasetTool {
    fn name(&self) -> &str {
        "healthcare_get_dataset"
    }

    fn description(&self) -> &str {
        "Get metadata (title, description, publisher, distributions) of one data.healthcare.gov dataset by identifier"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": {"type": "string", "description": "Dataset identifier"}
            },
            "required": ["identifier"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let identifier = args::required_str(&args, "identifier")?;
        validate_identifier(identifier)?;

        let item = self
            .client
            .get_json(&format!("metastore/schemas/dataset/items/{}", identifier), &[])
            .await?;

        let distributions: Vec<Value> = item
            .get("distribution")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|d| {
                        json!({
                            "title": str_field(d, "title"),
                            "format": str_field(d, "format"),
                            "media_type": str_field(d, "mediaType"),
                            "download_url": str_field(d, "downloadURL"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "source": "healthcare_gov",
            "identifier": identifier,
            "title": str_field(&item, "title"),
            "description": str_field(&item, "description"),
            "modified": str_field(&item, "modified"),
            "publisher": item.pointer("/publisher/data/name").or_else(|| item.pointer("/publisher/name")).cloned(),
            "keywords": item.get("keyword").cloned().unwrap_or(json!([])),
            "distributions": distributions,
        }))
    }
}

/// Rows from a dataset's datastore.
///
/// DKAN exposes the datastore under several shapes; each is tried in order
/// and a 404 moves on to the next.
pub struct QueryDatastoreTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for QueryDatastoreTool {
    fn name(&self) -> &str {
        "healthcare_query_datastore"
    }

    fn description(&self) -> &str {
        "Query data rows of a data.healthcare.gov dataset from its datastore"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dataset_id": {"type": "string", "description": "Dataset identifier"},
                "limit": {"type": "integer", "default": 10}
            },
            "required": ["dataset_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let dataset_id = args::required_str(&args, "dataset_id")?;
        validate_identifier(dataset_id)?;
        let limit = args::limit_or(&args, "limit", 10, 500)?;

        let attempts: [(String, Vec<(&str, String)>); 3] = [
            (
                format!("datastore/query/{}", dataset_id),
                vec![("limit", limit.to_string())],
            ),
            (
                format!("datastore/query/{}/0", dataset_id),
                vec![("limit", limit.to_string())],
            ),
            (
                "datastore/query".to_string(),
                vec![("limit", limit.to_string()), ("resource_id", dataset_id.to_string())],
            ),
        ];

        for (path, params) in &attempts {
            match self.client.get_json(path, params).await {
                Ok(data) => {
                    let rows = data
                        .get("results")
                        .and_then(Value::as_array)
                        .or_else(|| data.as_array())
                        .cloned()
                        .unwrap_or_default();
                    return Ok(json!({
                        "source": "healthcare_gov",
                        "dataset_id": dataset_id,
                        "query_path": path,
                        "total": data.get("count").cloned().unwrap_or(json!(rows.len())),
                        "record_count": rows.len(),
                        "records": rows,
                    }));
                }
                Err(AppError::Source(SourceError::NotFound(_))) => {
                    tracing::debug!(dataset_id, path = %path, "datastore path not found, trying next");
                }
                Err(e) => return Err(e),
            }
        }

        Err(SourceError::NotFound(format!(
            "healthcare_gov: no datastore found for dataset '{}'",
            dataset_id
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_catalog_matches_prefers_title() {
        let items = vec![
            json!({"title": "Plan Attributes", "identifier": "a", "description": "Marketplace enrollment plan data"}),
            json!({"title": "Enrollment by State", "identifier": "b", "description": "Counts"}),
            json!({"title": "Broker list", "identifier": "c", "description": "Agents"}),
            json!({"title": "Assister enrollment", "identifier": "d"}),
        ];
        let (total, matches) = rank_catalog_matches(&items, "Enrollment", 10);
        assert_eq!(total, 3);
        assert_eq!(matches[0]["identifier"], "d");
        assert_eq!(matches[1]["identifier"], "b");
        assert_eq!(matches[2]["relevance"], "description");
    }

    #[test]
    fn test_rank_catalog_matches_respects_limit() {
        let items: Vec<Value> = (0..5)
            .map(|i| json!({"title": format!("Quality {}", i), "identifier": i.to_string()}))
            .collect();
        let (total, matches) = rank_catalog_matches(&items, "quality", 2);
        assert_eq!(total, 5);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("abcd-1234_x").is_ok());
        assert!(validate_identifier("../secret").is_err());
    }
}
