//! CDC Environmental Public Health Tracking (EPHT) tools
//!
//! The measure catalog is static; measure data comes from the tracking
//! network's `getCoreHolder` endpoint.

use crate::tools::args;
use crate::tools::http::SourceClient;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://ephtracking.cdc.gov/apigateway/api/v1";

const MAX_RECORDS: usize = 50;

struct MeasureCategory {
    name: &'static str,
    description: &'static str,
    measures: &'static [(&'static str, &'static str)],
}

const MEASURE_CATEGORIES: &[MeasureCategory] = &[
    MeasureCategory {
        name: "air_quality",
        description: "Air quality measures including PM2.5, ozone, and air toxics",
        measures: &[
            ("pm25_annual", "296"),
            ("ozone_8hr", "297"),
            ("air_toxics_cancer_risk", "298"),
            ("air_toxics_respiratory", "299"),
        ],
    },
    MeasureCategory {
        name: "water_quality",
        description: "Drinking water quality and violations",
        measures: &[
            ("drinking_water_violations", "300"),
            ("water_fluoridation", "301"),
            ("nitrate_violations", "302"),
        ],
    },
    MeasureCategory {
        name: "climate",
        description: "Climate and weather-related health impacts",
        measures: &[
            ("heat_related_illness", "303"),
            ("extreme_heat_events", "304"),
            ("drought_conditions", "305"),
        ],
    },
    MeasureCategory {
        name: "health_outcomes",
        description: "Health outcomes potentially linked to environmental factors",
        measures: &[
            ("asthma_hospitalizations", "306"),
            ("heart_disease_mortality", "307"),
            ("cancer_incidence", "308"),
            ("birth_defects", "309"),
        ],
    },
    MeasureCategory {
        name: "community_design",
        description: "Built environment and community design factors",
        measures: &[
            ("walkability_index", "310"),
            ("green_space_access", "311"),
            ("food_environment", "312"),
        ],
    },
];

const GEOGRAPHIC_TYPES: &[&str] = &["state", "county", "city", "tract", "zip"];
const TEMPORAL_TYPES: &[&str] = &["annual", "monthly", "daily", "seasonal"];

const HEALTH_OUTCOMES: &[(&str, &str)] = &[
    ("asthma", "306"),
    ("heart_disease", "307"),
    ("cancer", "308"),
    ("birth_defects", "309"),
];

const ENVIRONMENTAL_FACTORS: &[(&str, &str)] = &[
    ("air_quality", "296"),
    ("water_quality", "300"),
    ("climate", "303"),
];

const POLLUTANTS: &[(&str, &str)] = &[
    ("pm25", "296"),
    ("ozone", "297"),
    ("air_toxics_cancer", "298"),
    ("air_toxics_respiratory", "299"),
];

fn lookup_measure(table: &[(&str, &str)], key: &str, what: &str) -> Result<String> {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, id)| id.to_string())
        .ok_or_else(|| {
            let names: Vec<&str> = table.iter().map(|(n, _)| *n).collect();
            AppError::InvalidInput(format!(
                "Unknown {} '{}'; expected one of {:?}",
                what, key, names
            ))
        })
}

fn year_arg(args: &Value) -> Result<Option<String>> {
    Ok(args::optional_u64(args, "year")?.map(|y| y.to_string()))
}

fn category_json(category: &MeasureCategory) -> Value {
    let measures: Map<String, Value> = category
        .measures
        .iter()
        .map(|(name, id)| (name.to_string(), Value::String(id.to_string())))
        .collect();
    json!({"description": category.description, "measures": measures})
}

/// Register every EPHT tool on `registry`.
pub fn register(registry: &mut ToolRegistry, client: SourceClient) {
    registry.register(Arc::new(MeasureCategoriesTool));
    registry.register(Arc::new(SearchMeasuresTool));
    registry.register(Arc::new(QueryMeasureTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(AirQualityTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(OutcomesByEnvironmentTool {
        client: client.clone(),
    }));
    registry.register(Arc::new(CommunityProfileTool { client }));
}

/// Static catalog of measure categories and ids.
pub struct MeasureCategoriesTool;

#[async_trait]
impl Tool for MeasureCategoriesTool {
    fn name(&self) -> &str {
        "epht_measure_categories"
    }

    fn description(&self) -> &str {
        "List environmental health measure categories with their EPHT measure ids, plus the supported geographic and temporal levels"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        let categories: Map<String, Value> = MEASURE_CATEGORIES
            .iter()
            .map(|c| (c.name.to_string(), category_json(c)))
            .collect();

        Ok(json!({
            "source": "epht",
            "categories": categories,
            "geographic_types": GEOGRAPHIC_TYPES,
            "temporal_types": TEMPORAL_TYPES,
            "note": "Use measure ids with epht_query_measure",
        }))
    }
}

/// Keyword search over the static catalog.
pub struct SearchMeasuresTool;

#[async_trait]
impl Tool for SearchMeasuresTool {
    fn name(&self) -> &str {
        "epht_search_measures"
    }

    fn description(&self) -> &str {
        "Find EPHT measures related to a health or environmental topic (e.g. 'asthma', 'ozone', 'water')"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {"type": "string", "description": "Topic to search for"}
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let topic = args::required_str(&args, "topic")?.to_lowercase();
        let mut matches = Map::new();

        for category in MEASURE_CATEGORIES {
            if category.name.contains(&topic) || category.description.to_lowercase().contains(&topic) {
                matches.insert(category.name.to_string(), category_json(category));
                continue;
            }

            let measures: Map<String, Value> = category
                .measures
                .iter()
                .filter(|(name, _)| name.contains(&topic))
                .map(|(name, id)| (name.to_string(), Value::String(id.to_string())))
                .collect();
            if !measures.is_empty() {
                matches.insert(category.name.to_string(), json!({"measures": measures}));
            }
        }

        Ok(json!({
            "source": "epht",
            "topic": topic,
            "total_matches": matches.len(),
            "category_matches": matches,
        }))
    }
}

/// Parameters of one `getCoreHolder` query.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeasureQuery {
    pub measure_id: String,
    pub geographic_type: String,
    pub temporal_type: String,
    pub year_filter: Option<String>,
    pub state_filter: Option<String>,
    pub county_filter: Option<String>,
    pub stratification: Option<String>,
}

impl MeasureQuery {
    fn validate(&self) -> Result<()> {
        if self.measure_id.is_empty() || !self.measure_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::InvalidInput(format!(
                "measure_id must be numeric, got '{}'",
                self.measure_id
            )));
        }
        if !GEOGRAPHIC_TYPES.contains(&self.geographic_type.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "geographic_type must be one of {:?}",
                GEOGRAPHIC_TYPES
            )));
        }
        if !TEMPORAL_TYPES.contains(&self.temporal_type.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "temporal_type must be one of {:?}",
                TEMPORAL_TYPES
            )));
        }
        Ok(())
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("measureId", self.measure_id.clone()),
            ("geographicTypeId", self.geographic_type.clone()),
            ("temporalTypeId", self.temporal_type.clone()),
        ];
        let optional = [
            ("yearFilter", &self.year_filter),
            ("stateFilter", &self.state_filter),
            ("countyFilter", &self.county_filter),
            ("stratificationId", &self.stratification),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                params.push((key, v.clone()));
            }
        }
        params
    }
}

async fn fetch_measure(client: &SourceClient, query: &MeasureQuery) -> Result<Value> {
    query.validate()?;
    let data = client.get_json("getCoreHolder", &query.query_params()).await?;

    let records: Vec<Value> = match &data {
        Value::Array(items) => items.clone(),
        Value::Object(obj) => obj
            .get("tableResult")
            .or_else(|| obj.get("results"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    Ok(json!({
        "source": "epht",
        "measure_id": query.measure_id,
        "geographic_type": query.geographic_type,
        "temporal_type": query.temporal_type,
        "year_filter": query.year_filter,
        "state_filter": query.state_filter,
        "record_count": records.len(),
        "records": records.into_iter().take(MAX_RECORDS).collect::<Vec<_>>(),
    }))
}

/// Query one measure by id.
pub struct QueryMeasureTool {
    client: SourceClient,
}

#[async_trait]
impl Tool for QueryMeasureTool {
    fn name(&self) -> &str {
        "epht_query_measure"
    }

    fn description(&self) -> &str {
        "Query environmental health data for an EPHT measure id (e.g. '296' for annual PM2.5) at a geographic and temporal level"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "measure_id": {"type": "string", "description": "Numeric measure id"},
                "geographic_type": {"type": "string", "enum": GEOGRAPHIC_TYPES, "default": "state"},
                "temporal_type": {"type": "string", "enum": TEMPORAL_TYPES, "default": "annual"},
                "year_filter": {"type": "string", "description": "Year or range, e.g. '2020' or '2018-2020'"},
                "state_filter": {"type": "string", "description": "State FIPS code or abbreviation"},
                "county_filter": {"type": "string", "description": "County FIPS code"},
                "stratification": {"type": "string", "description": "Stratification id"}
            },
            "required": ["measure_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let query = MeasureQuery {
            measure_id: args::required_str(&args, "measure_id")?.to_string(),
            geographic_type: args::optional_str(&args, "geographic_type")?
                .unwrap_or("state")
                .to_lowercase(),
            temporal_type: args::optional_str(&args, "temporal_type")?
                .unwrap_or("annual")
                .to_lowercase(),
            year_filter: args::optional_str(&args, "year_filter")?.map(str::to_string),
            state_filter: args::optional_str(&args, "state_filter")?.map(str::to_uppercase),
            county_filter: args::optional_str(&args, "county_filter")?.map(str::to_string),
            stratification: args::optional_str(&args, "stratification")?.map(str::to_string),
        };
        fetch_measure(&self.client, &query).await
    }
}

/// Air quality shortcut: pollutant name instead of a measure id.
pub struct AirQualityTool {
    client: SourceClient,
}

impl AirQualityTool {
    /// Translate pollutant, level, years and states into a measure query.
    pub fn build_query(args: &Value) -> Result<MeasureQuery> {
        let pollutant = args::optional_str(args, "pollutant")?.unwrap_or("pm25");
        let measure_id = lookup_measure(POLLUTANTS, pollutant, "pollutant")?;

        let years: Vec<i64> = args::optional_list(args, "years")
            .into_iter()
            .filter_map(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .collect();
        let year_filter = match (years.iter().min(), years.iter().max()) {
            (Some(min), Some(max)) if min == max => Some(min.to_string()),
            (Some(min), Some(max)) => Some(format!("{}-{}", min, max)),
            _ => None,
        };

        let states: Vec<String> = args::optional_list(args, "states")
            .into_iter()
            .filter_map(Value::as_str)
            .map(str::to_uppercase)
            .collect();

        Ok(MeasureQuery {
            measure_id,
            geographic_type: args::optional_str(args, "geographic_level")?
                .unwrap_or("county")
                .to_lowercase(),
            temporal_type: "annual".to_string(),
            year_filter,
            state_filter: (!states.is_empty()).then(|| states.join(",")),
            county_filter: None,
            stratification: None,
        })
    }
}

#[async_trait]
impl Tool for AirQualityTool {
    fn name(&self) -> &str {
        "epht_air_quality"
    }

    fn description(&self) -> &str {
        "Get air quality data (pm25, ozone, air_toxics_cancer, air_toxics_respiratory) for selected years and states"
    }

    fn parameters_schema(&self) -> Value {
        let pollutants: Vec<&str> = POLLUTANTS.iter().map(|(n, _)| *n).collect();
        json!({
            "type": "object",
            "properties": {
                "pollutant": {"type": "string", "enum": pollutants, "default": "pm25"},
                "geographic_level": {"type": "string", "enum": ["state", "county", "city"], "default": "county"},
                "years": {"type": "array", "items": {"type": "integer"}, "description": "Years to include"},
                "states": {"type": "array", "items": {"type": "string"}, "description": "State abbreviations"}
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let query = Self::build_query(&args)?;
        let mut result = fetch_measure(&self.client, &query).await?;
        if let Some(obj) = result.as_object_mut() {
            obj.insert("pollutant".to_string(), args.get("pollutant").cloned().unwrap_or(json!("pm25")));
        }
        Ok(result)
    }
}

/// Pairs a health outcome measure with an environmental exposure measure.
pub struct OutcomesByEnvironmentTool {
    client: SourceClient,
}

impl OutcomesByEnvironmentTool {
    /// Outcome and exposure queries sharing one level and year.
    pub fn build_queries(args: &Value) -> Result<(MeasureQuery, MeasureQuery)> {
        let outcome = args::required_str(args, "health_outcome")?;
        let factor = args::required_str(args, "environmental_factor")?;
        let outcome_id = lookup_measure(HEALTH_OUTCOMES, outcome, "health outcome")?;
        let factor_id = lookup_measure(ENVIRONMENTAL_FACTORS, factor, "environmental factor")?;

        let base = MeasureQuery {
            geographic_type: args::optional_str(args, "geographic_level")?
                .unwrap_or("county")
                .to_lowercase(),
            temporal_type: "annual".to_string(),
            year_filter: year_arg(args)?,
            ..Default::default()
        };
        Ok((
            MeasureQuery {
                measure_id: outcome_id,
                ..base.clone()
            },
            MeasureQuery {
                measure_id: factor_id,
                ..base
            },
        ))
    }
}

#[async_trait]
impl Tool for OutcomesByEnvironmentTool {
    fn name(&self) -> &str {
        "epht_health_outcomes_by_environment"
    }

    fn description(&self) -> &str {
        "Fetch a health outcome (asthma, heart_disease, cancer, birth_defects) alongside an environmental factor (air_quality, water_quality, climate) at the same geographic level for comparison"
    }

    fn parameters_schema(&self) -> Value {
        let outcomes: Vec<&str> = HEALTH_OUTCOMES.iter().map(|(n, _)| *n).collect();
        let factors: Vec<&str> = ENVIRONMENTAL_FACTORS.iter().map(|(n, _)| *n).collect();
        json!({
            "type": "object",
            "properties": {
                "health_outcome": {"type": "string", "enum": outcomes},
                "environmental_factor": {"type": "string", "enum": factors},
                "geographic_level": {"type": "string", "enum": ["state", "county"], "default": "county"},
                "year": {"type": "integer"}
            },
            "required": ["health_outcome", "environmental_factor"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let (outcome_query, factor_query) = Self::build_queries(&args)?;
        let (outcome_data, factor_data) = futures::try_join!(
            fetch_measure(&self.client, &outcome_query),
            fetch_measure(&self.client, &factor_query),
        )?;

        Ok(json!({
            "source": "epht",
            "health_outcome": args["health_outcome"],
            "environmental_factor": args["environmental_factor"],
            "geographic_type": outcome_query.geographic_type,
            "year_filter": outcome_query.year_filter,
            "health_outcome_data": outcome_data,
            "environmental_data": factor_data,
            "note": "Geographic co-occurrence only; compare patterns, do not infer causation.",
        }))
    }
}

/// Air, water and asthma measures for one state or county.
pub struct CommunityProfileTool {
    client: SourceClient,
}

impl CommunityProfileTool {
    /// Profile sections to fetch, keyed by section name.
    pub fn build_queries(args: &Value) -> Result<Vec<(&'static str, MeasureQuery)>> {
        let state = args::required_str(args, "state")?.to_uppercase();
        let county = args::optional_str(args, "county")?.map(str::to_string);
        let base = MeasureQuery {
            geographic_type: if county.is_some() { "county" } else { "state" }.to_string(),
            temporal_type: "annual".to_string(),
            year_filter: year_arg(args)?,
            state_filter: Some(state),
            county_filter: county,
            ..Default::default()
        };

        let sections = [
            ("air_quality", "include_air_quality", "296"),
            ("water_quality", "include_water_quality", "300"),
            ("health_outcomes", "include_health_outcomes", "306"),
        ];
        let mut queries = Vec::new();
        for (section, flag, measure_id) in sections {
            if args::bool_or(args, flag, true)? {
                queries.push((
                    section,
                    MeasureQuery {
                        measure_id: measure_id.to_string(),
                        ..base.clone()
                    },
                ));
            }
        }
        if queries.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one profile section must be included".to_string(),
            ));
        }
        Ok(queries)
    }
}

#[async_trait]
impl Tool for CommunityProfileTool {
    fn name(&self) -> &str {
        "epht_community_health_profile"
    }

    fn description(&self) -> &str {
        "Build a community profile for a state (and optionally a county FIPS code): PM2.5, drinking water violations and asthma hospitalizations"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "state": {"type": "string", "description": "State abbreviation, e.g. 'CA'"},
                "county": {"type": "string", "description": "County FIPS code"},
                "include_air_quality": {"type": "boolean", "default": true},
                "include_water_quality": {"type": "boolean", "default": true},
                "include_health_outcomes": {"type": "boolean", "default": true},
                "year": {"type": "integer"}
            },
            "required": ["state"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let queries = Self::build_queries(&args)?;
        let fetched = futures::future::join_all(
            queries
                .iter()
                .map(|(_, query)| fetch_measure(&self.client, query)),
        )
        .await;

        // One failing section does not sink the profile.
        let mut profile = Map::new();
        let mut first_error = None;
        let mut succeeded = 0;
        for ((section, _), result) in queries.iter().zip(fetched) {
            let value = match result {
                Ok(data) => {
                    succeeded += 1;
                    data
                }
                Err(e) => {
                    let value = json!({"error": e.to_string(), "error_kind": e.kind()});
                    first_error.get_or_insert(e);
                    value
                }
            };
            profile.insert(section.to_string(), value);
        }
        if succeeded == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let first = &queries[0].1;
        Ok(json!({
            "source": "epht",
            "location": {
                "state": first.state_filter,
                "county": first.county_filter,
                "geographic_level": first.geographic_type,
            },
            "year_filter": first.year_filter,
            "community_profile": profile,
        }))
    }
}
