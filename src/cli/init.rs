//! Init command implementation
//!
//! Scaffolds a ubo-trace working directory with a configuration file and an
//! environment template.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (ubo.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing UBO Trace");

    let base_path = &config.path;

    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
        output.created("directory", &base_path.display().to_string());
    }

    let config_path = base_path.join("ubo.toml");
    if config_path.exists() && !config.force {
        output.warning("ubo.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_ubo_toml(&config), config.force) {
        output.error(&format!("Failed to create ubo.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "ubo.toml");

    let env_example_path = base_path.join(".env.example");
    if env_example_path.exists() && !config.force {
        output.skipped(".env.example", "already exists");
    } else if let Err(e) = write_file(&env_example_path, &generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("env", ".env.example");
    }

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, &generate_gitignore(), false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("UBO Trace initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Set up environment variables:");
    output.command("cp .env.example .env");
    output.command("# Edit .env and set LYZR_API_KEY and LYZR_USER_ID");
    output.newline();
    output.info("2. Fill in the agent and session ids under [agent.stages.*] in ubo.toml");
    output.newline();
    output.info("3. Check the configuration:");
    output.command("ubo-trace config --validate");
    output.newline();
    output.info("4. Run a trace or start the server:");
    output.command("ubo-trace trace --entity \"Acme Holdings Ltd\" --ubo \"Jane Doe\" --location \"United Kingdom\"");
    output.command("ubo-trace serve");

    output.hint(&format!(
        "Server will be available at http://{}:{}/api/v1",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(()); // Skip existing files unless force is true
    }
    fs::write(path, content)
}

fn generate_ubo_toml(config: &InitConfig) -> String {
    format!(
        r#"# UBO Trace Configuration
# =======================
# Secrets are read from the environment variables named by *_env keys.

[server]
host = "{host}"
port = {port}
log_level = "info"

# Research agent queried once per stage attempt
[agent]
api_url = "https://agent-prod.studio.lyzr.ai/v3/inference/chat/"
api_key_env = "LYZR_API_KEY"
user_id_env = "LYZR_USER_ID"
timeout_secs = 60

# Stage 1A: direct evidence, all time
[agent.stages.stage_1a]
agent_id = "replace-with-agent-id"
session_id = "replace-with-session-id"

# Stage 1B: direct evidence since trace.time_filter_from
[agent.stages.stage_1b]
agent_id = "replace-with-agent-id"
session_id = "replace-with-session-id"

# Stage 2A: indirect evidence, all time
[agent.stages.stage_2a]
agent_id = "replace-with-agent-id"
session_id = "replace-with-session-id"

# Stage 2B: indirect evidence since trace.time_filter_from
[agent.stages.stage_2b]
agent_id = "replace-with-agent-id"
session_id = "replace-with-session-id"

# Optional: expert agent that scores candidate domains
# [expert]
# agent_id = "replace-with-agent-id"
# session_id = "replace-with-session-id"
# timeout_secs = 30

# Optional: people enrichment
[apollo]
base_url = "https://api.apollo.io/v1"
api_key_env = "APOLLO_API_KEY"
timeout_secs = 30

# Optional: domain discovery via web search
[searchapi]
base_url = "https://www.searchapi.io/api/v1/search"
api_key_env = "SEARCHAPI_API_KEY"
timeout_secs = 30
num_results = 20

[trace]
max_retries = 3
retry_delay_ms = 5000
stage_delay_ms = 5000
time_filter_from = "2023-01-01"
"#,
        host = config.host,
        port = config.port
    )
}

fn generate_env_example() -> String {
    r#"# UBO Trace Environment Variables
# ===============================
# Copy this file to .env and fill in the values.

# REQUIRED: research agent credentials
LYZR_API_KEY=your-api-key-here
LYZR_USER_ID=your-user-id-here

# Optional: enrichment services (unset disables the enrichment)
# APOLLO_API_KEY=your-apollo-key
# SEARCHAPI_API_KEY=your-searchapi-key

# Optional: Logging level (trace, debug, info, warn, error)
RUST_LOG=info,ubo_trace=debug
"#
    .to_string()
}

fn generate_gitignore() -> String {
    r#"# Environment
.env
.env.local
.env.*.local

# Rust
/target/

# IDE
.idea/
.vscode/
*.swp

# OS
.DS_Store
Thumbs.db
"#
    .to_string()
}
