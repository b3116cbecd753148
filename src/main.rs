use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use ubo_trace::{
    AppState, InMemoryTraceStore, UboConfig, UboConfigManager,
    api::routes::build_app,
    build_orchestrator,
    cli::{
        Cli, Commands,
        init::{self, InitConfig, InitResult},
        output::Output,
    },
    trace::aggregate::stages_with_evidence,
    types::TraceRequest,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env is fine; variables may come from the real environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<ExitCode> {
    match cli.command {
        Commands::Init {
            path,
            force,
            host,
            port,
        } => {
            let config = InitConfig {
                path,
                force,
                host,
                port,
            };
            Ok(match init::run(config, output) {
                InitResult::Success => ExitCode::SUCCESS,
                InitResult::AlreadyExists | InitResult::Error(_) => ExitCode::FAILURE,
            })
        }
        Commands::Config { validate } => cmd_config(&cli.config, validate, output),
        Commands::Serve => {
            let config = load_config(&cli.config)?;
            init_logging(&config.server.log_level, cli.verbose, cli.json_logs);
            cmd_serve(&cli.config, output).await
        }
        Commands::Trace {
            entity,
            ubo,
            location,
            domain,
            json,
        } => {
            let config = load_config(&cli.config)?;
            init_logging(&config.server.log_level, cli.verbose, cli.json_logs);
            let request = TraceRequest::new(entity, ubo, location, domain);
            cmd_trace(&config, request, json, output).await
        }
    }
}

fn init_logging(log_level: &str, verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("ubo_trace=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

fn load_config(path: &Path) -> Result<UboConfig> {
    UboConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn cmd_config(path: &Path, validate: bool, output: &Output) -> Result<ExitCode> {
    let config = load_config(path)?;
    let warnings = config.validate_with_warnings()?;

    if validate {
        output.success(&format!("{} is valid", path.display()));
    } else {
        output.header("Configuration");
        output.kv("file", &path.display().to_string());
        output.kv("bind", &config.bind_address());
        output.kv("agent", &config.agent.api_url);
        output.kv("max retries", &config.trace.max_retries.to_string());
        output.kv("retry delay", &format!("{}ms", config.trace.retry_delay_ms));
        output.kv("stage delay", &format!("{}ms", config.trace.stage_delay_ms));
        output.kv("time filter", &config.trace.time_filter_from.to_string());

        output.subheader("Enrichments");
        output.list_item(&format!("people search: {}", enabled(config.apollo.is_some())));
        output.list_item(&format!("domain search: {}", enabled(config.searchapi.is_some())));
        output.list_item(&format!(
            "domain confidence: {}",
            enabled(config.expert.is_some())
        ));
    }

    for warning in &warnings {
        output.warning(&warning.message);
    }

    Ok(ExitCode::SUCCESS)
}

fn enabled(flag: bool) -> &'static str {
    if flag { "configured" } else { "not configured" }
}

async fn cmd_serve(path: &Path, output: &Output) -> Result<ExitCode> {
    let manager = UboConfigManager::new(path)?;
    if let Err(e) = manager.start_watching() {
        tracing::warn!(error = %e, "Config hot reload disabled");
    }

    let config = manager.config();
    for warning in config.validate_with_warnings()? {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
    }

    let bind_address = config.bind_address();
    let state = AppState::from_config_manager(
        Arc::new(InMemoryTraceStore::new()),
        Arc::new(manager),
    );
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    output.banner();
    output.info(&format!("Listening on http://{}", bind_address));
    tracing::info!(address = %bind_address, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

async fn cmd_trace(
    config: &UboConfig,
    request: TraceRequest,
    json: bool,
    output: &Output,
) -> Result<ExitCode> {
    request.validate()?;
    let orchestrator = build_orchestrator(config)?;

    if !json {
        output.banner();
        output.header(&format!("{} / {}", request.entity, request.ubo_name));
        output.kv("location", &request.location);
        if let Some(domain) = request.domain() {
            output.kv("domain", domain);
        }
        output.newline();
    }

    let summary = orchestrator.run_trace(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for result in &summary.stage_results {
            output.stage(result);
        }
        output.verdict(&summary);
        output.kv("trace id", &summary.trace_id.to_string());
        output.kv("status", summary.overall_status.as_str());
        output.kv("unique urls", &summary.total_urls.to_string());

        let evidence: Vec<String> = stages_with_evidence(&summary)
            .iter()
            .map(ToString::to_string)
            .collect();
        if !evidence.is_empty() {
            output.kv("evidence in", &evidence.join(", "));
        }
        output.kv(
            "elapsed",
            &format!("{}ms", summary.total_processing_time_ms),
        );

        for failure in &summary.stage_failures {
            output.warning(&format!(
                "Stage {} failed: {}",
                failure.stage_id,
                failure.reasons.join("; ")
            ));
        }
    }

    Ok(if summary.stage_failures.len() == summary.stage_results.len() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
