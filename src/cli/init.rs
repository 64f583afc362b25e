//! Init command implementation
//!
//! Scaffolds `healthscope.toml`, `.env.example` and the report directory.

use super::output::Output;
use crate::utils::toml_config::{DEFAULT_CONFIG_FILE, ProviderKind};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    Success,
    /// healthscope.toml exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    pub provider: ProviderKind,
    pub host: String,
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing healthscope");

    let base_path = &config.path;
    let config_path = base_path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", DEFAULT_CONFIG_FILE));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let reports_dir = base_path.join("reports");
    if reports_dir.exists() {
        output.skipped("reports/", "already exists");
    } else if let Err(e) = fs::create_dir_all(&reports_dir) {
        output.error(&format!("Failed to create reports/: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("dir", "reports/");
    }

    let files = [
        (DEFAULT_CONFIG_FILE, generate_config_toml(&config), "config"),
        (".env.example", generate_env_example(config.provider), "env"),
    ];
    for (name, content, kind) in files {
        if let Err(e) = write_file(&base_path.join(name), &content, config.force) {
            output.error(&format!("Failed to create {}: {}", name, e));
            return InitResult::Error(e.to_string());
        }
        output.created(kind, name);
    }

    let gitignore_path = base_path.join(".gitignore");
    if gitignore_path.exists() {
        output.skipped(".gitignore", "already exists");
    } else if let Err(e) = write_file(&gitignore_path, GITIGNORE, false) {
        output.warning(&format!("Failed to create .gitignore: {}", e));
    } else {
        output.created("file", ".gitignore");
    }

    output.success("healthscope initialized");
    output.header("Next Steps");
    output.info("cp .env.example .env   # then set your API key");
    output.info("healthscope-server ask \"Asthma and air quality in Ohio\"");
    output.info("healthscope-server serve");
    output.hint(&format!(
        "Server will be available at http://{}:{}/api/query",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_config_toml(config: &InitConfig) -> String {
    let llm_section = match config.provider {
        ProviderKind::Anthropic => {
            r#"[llm]
provider = "anthropic"
model = "claude-3-5-sonnet-latest"
api_key_env = "ANTHROPIC_API_KEY"
max_tokens = 4096
request_timeout_secs = 120"#
        }
        ProviderKind::OpenAI => {
            r#"[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
# Any Chat Completions compatible endpoint works; the key is optional when api_base is set.
# api_base = "http://localhost:8000/v1"
max_tokens = 4096
request_timeout_secs = 120"#
        }
    };

    format!(
        r#"# healthscope configuration
# Every value below is the default unless noted; delete what you do not change.

[server]
host = "{host}"
port = {port}
# Used when RUST_LOG is not set
log_level = "info"
# "plain" or "json"
log_format = "plain"

{llm_section}

[orchestration]
agent_timeout_secs = 180
synthesis_timeout_secs = 120
# Extra synthesis attempts, with exponential backoff starting at synthesis_backoff_ms
synthesis_retry_count = 2
synthesis_backoff_ms = 1000
# Characters of each agent's findings passed to synthesis
per_agent_truncation_budget = 6000
max_agent_iterations = 8
tool_timeout_secs = 30
tool_response_preview_chars = 2000
tool_result_max_chars = 12000
# Ask the LLM for one prompt per agent; false uses a fixed template
decompose = true
record_trace = true

[sources]
request_timeout_secs = 30
# epht_base_url = "https://ephtracking.cdc.gov/apigateway/api/v1"
# open_data_base_url = "https://data.cdc.gov"
# healthcare_gov_base_url = "https://data.healthcare.gov/api/1"
# openfda_base_url = "https://api.fda.gov"
# medlineplus_base_url = "https://connect.medlineplus.gov/service"

[agents]
# Available: epht, open_data, healthcare_gov, openfda, medlineplus
roster = ["medlineplus", "openfda", "open_data", "healthcare_gov"]

[agents.timeouts]
# openfda = 120

[reports]
enabled = true
directory = "reports"
write_trace = false
"#,
        host = config.host,
        port = config.port,
        llm_section = llm_section
    )
}

fn generate_env_example(provider: ProviderKind) -> String {
    let key_line = match provider {
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY=your_anthropic_api_key_here",
        ProviderKind::OpenAI => "OPENAI_API_KEY=your_openai_api_key_here",
    };
    format!(
        "# Copy to .env and fill in\n{}\n\n# Log filter, overrides server.log_level\n# RUST_LOG=info,healthscope=debug\n",
        key_line
    )
}

const GITIGNORE: &str = "/target/\n.env\n/reports/\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::HealthscopeConfig;
    use tempfile::TempDir;

    fn create_test_config(temp_dir: &TempDir, provider: ProviderKind) -> InitConfig {
        InitConfig {
            path: temp_dir.path().to_path_buf(),
            force: false,
            provider,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }

    #[test]
    fn test_generated_config_parses() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for provider in [ProviderKind::Anthropic, ProviderKind::OpenAI] {
            let content = generate_config_toml(&create_test_config(&temp_dir, provider));
            let parsed = HealthscopeConfig::parse(&content).expect("generated config parses");
            assert_eq!(parsed.llm.provider, provider);
            assert_eq!(parsed.agents.roster.len(), 4);
        }
    }

    #[test]
    fn test_env_example_names_provider_key() {
        assert!(generate_env_example(ProviderKind::Anthropic).contains("ANTHROPIC_API_KEY="));
        assert!(generate_env_example(ProviderKind::OpenAI).contains("OPENAI_API_KEY="));
    }

    #[test]
    fn test_write_file_skips_existing_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "original").expect("Failed to write");

        write_file(&file_path, "new content", false).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "original");

        write_file(&file_path, "new content", true).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_run_creates_files_then_refuses_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output = Output::no_color();

        let result = run(create_test_config(&temp_dir, ProviderKind::Anthropic), &output);
        assert_eq!(result, InitResult::Success);
        assert!(temp_dir.path().join(DEFAULT_CONFIG_FILE).exists());
        assert!(temp_dir.path().join(".env.example").exists());
        assert!(temp_dir.path().join("reports").is_dir());
        assert!(temp_dir.path().join(".gitignore").exists());

        let again = run(create_test_config(&temp_dir, ProviderKind::Anthropic), &output);
        assert_eq!(again, InitResult::AlreadyExists);

        let mut forced = create_test_config(&temp_dir, ProviderKind::OpenAI);
        forced.force = true;
        assert_eq!(run(forced, &output), InitResult::Success);
        let content = fs::read_to_string(temp_dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert!(content.contains("provider = \"openai\""));
    }
}
