use anyhow::Context;
use healthscope::{
    AgentRegistry, AppState, HealthscopeConfig, build_app,
    cli::{self, Cli, Commands, init, output::Output},
    utils::toml_config::LogFormat,
};
use std::path::Path;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = cli.output();

    if let Some(Commands::Init {
        path,
        force,
        provider,
        host,
        port,
    }) = &cli.command
    {
        let result = init::run(
            init::InitConfig {
                path: path.clone(),
                force: *force,
                provider: (*provider).into(),
                host: host.clone(),
                port: *port,
            },
            &output,
        );
        return match result {
            init::InitResult::Error(e) => Err(anyhow::anyhow!(e)),
            _ => Ok(()),
        };
    }

    let config = load_config(&cli.config, &output)?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Some(Commands::Agents) => {
            let registry = AgentRegistry::from_config(&config).context("building agent roster")?;
            cli::list_agents(&registry, &output);
            Ok(())
        }
        Some(Commands::Ask { query, no_save }) => {
            let mut config = config;
            if no_save {
                config.reports.enabled = false;
            }
            let state = AppState::from_config(config).context("initializing healthscope")?;
            let run = cli::ask(&state, &query.join(" "), &output).await?;
            output.newline();
            output.success(&format!("Run {} finished: {}", run.short_id(), run.phase));
            Ok(())
        }
        Some(Commands::Serve { host, port }) => serve(config, host, port).await,
        None => serve(config, None, None).await,
        Some(Commands::Init { .. }) => Ok(()),
    }
}

fn load_config(path: &Path, output: &Output) -> anyhow::Result<HealthscopeConfig> {
    if !path.exists() {
        output.warning(&format!(
            "{} not found, using defaults (run `healthscope-server init` to create one)",
            path.display()
        ));
    }
    HealthscopeConfig::load_or_default(path)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

fn init_tracing(config: &HealthscopeConfig, verbose: bool) {
    let fallback = if verbose {
        "debug".to_string()
    } else {
        config.server.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(
    config: HealthscopeConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let state = AppState::from_config(config).context("initializing healthscope")?;
    let app = build_app(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("healthscope listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
