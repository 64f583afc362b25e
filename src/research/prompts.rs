//! Prompt construction for decomposition and synthesis.

use crate::agents::AgentSpec;
use crate::research::state::{AgentRecord, PromptSource, Query, SubPrompt};
use crate::utils::text::truncate_with_marker;
use serde_json::Value;
use std::sync::Arc;

/// Appended to an agent section cut to its budget.
pub const SECTION_TRUNCATED: &str = "\n… [findings truncated]";

/// Ask for one research prompt per agent, as a JSON object keyed by agent id.
pub fn decompose_prompt(query: &Query, specs: &[Arc<AgentSpec>]) -> String {
    let agents = specs
        .iter()
        .map(|s| format!("- \"{}\": {}", s.id, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a health data research coordinator. Analyze this user query and write one focused research prompt for each specialized health data agent below.

User Query: "{query}"

Agents:
{agents}

Each prompt should:
1. Clearly state what data and insights are needed from that agent's data source
2. Include any relevant geographic, temporal, or demographic parameters
3. Specify the type of analysis or correlations to look for

Respond with only a JSON object mapping each agent id to its prompt, for example:
{{"agent_id": "prompt text"}}"#
    )
}

/// Deterministic prompt used when decomposition is off or unusable.
pub fn fallback_prompt(spec: &AgentSpec, query: &Query) -> SubPrompt {
    SubPrompt {
        agent_id: spec.id.clone(),
        text: format!(
            "As the {}, research the following health data question using your tools:\n\n{}",
            spec.description.to_lowercase(),
            query
        ),
        source: PromptSource::Fallback,
    }
}

/// Turn the decomposition reply into one sub-prompt per spec, in spec order.
///
/// A JSON object (optionally fenced) maps agent ids to prompts. Any other
/// non-empty reply is shared by all agents. Agents without a usable prompt get
/// the fallback.
pub fn parse_decomposition(reply: &str, specs: &[Arc<AgentSpec>], query: &Query) -> Vec<SubPrompt> {
    let reply = reply.trim();
    if reply.is_empty() {
        return specs.iter().map(|s| fallback_prompt(s, query)).collect();
    }

    if let Some(map) = extract_json_object(reply) {
        return specs
            .iter()
            .map(|spec| {
                match map
                    .get(&spec.id)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                {
                    Some(text) => SubPrompt {
                        agent_id: spec.id.clone(),
                        text: text.to_string(),
                        source: PromptSource::Decomposed,
                    },
                    None => fallback_prompt(spec, query),
                }
            })
            .collect();
    }

    specs
        .iter()
        .map(|spec| SubPrompt {
            agent_id: spec.id.clone(),
            text: format!("As the {}:\n\n{}", spec.description.to_lowercase(), reply),
            source: PromptSource::Shared,
        })
        .collect()
}

fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// One agent's block of synthesis input, with its findings cut to `budget`
/// characters. Returns the section and whether it was truncated.
pub fn agent_section(record: &AgentRecord, budget: usize) -> (String, bool) {
    let tools = record.tools_used();
    let tools = if tools.is_empty() {
        "none".to_string()
    } else {
        tools.join(", ")
    };
    let (body, truncated) =
        truncate_with_marker(&record.outcome.synthesis_text(), budget, SECTION_TRUNCATED);

    let section = format!(
        "## {} ({})\n**Outcome**: {}\n**Tools Used**: {} invocation(s) - {}\n**Findings**:\n{}\n",
        record.agent_id,
        record.description,
        record.outcome.label(),
        record.invocations.len(),
        tools,
        body
    );
    (section, truncated)
}

pub fn synthesis_prompt(query: &Query, sections: &[String]) -> String {
    format!(
        r#"You are a health data research coordinator. Synthesize the findings from multiple specialized agents into a comprehensive final report.

Original User Query: "{query}"

Agent Research Results:
{results}

Create a comprehensive final report that:
1. Provides an executive summary answering the user's query
2. Integrates findings across all data sources
3. Identifies patterns and correlations between environmental, health, and healthcare data
4. Provides actionable insights and recommendations
5. Notes any data limitations or gaps, including agents that failed or timed out
6. Includes specific data points and statistics from the agents' findings

Structure your response as a well-formatted markdown report with clear sections."#,
        results = sections.join("\n")
    )
}

/// Report assembled without the LLM from the raw agent sections.
pub fn degraded_report(query: &Query, sections: &[String], reason: &str) -> String {
    format!(
        "# Health Data Report (unsynthesized)\n\n\
         **Query**: {}\n\n\
         > Synthesis was unavailable ({}). The raw findings of each agent follow.\n\n{}",
        query,
        reason,
        sections.join("\n")
    )
}
