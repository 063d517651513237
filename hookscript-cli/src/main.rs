//! Hookscript CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hookscript_config::{load_settings, Settings};
use hookscript_core::schema::{cache_config_schema, script_config_schema};
use hookscript_core::{
    ApiEvent, Event, EventEnvelope, EventResponse, ServiceEvent, ServiceRequest,
};
use hookscript_dispatch::Runtime;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hookscript")]
#[command(about = "Event script dispatch engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info", env = "HOOKSCRIPT_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a settings file
    Validate {
        /// Path to settings file
        #[arg(short, long, default_value = "hookscript.yaml", env = "HOOKSCRIPT_CONFIG")]
        config: PathBuf,
    },

    /// Fire one event through the configured scripts and print the outcome
    Fire {
        /// Path to settings file
        #[arg(short, long, default_value = "hookscript.yaml", env = "HOOKSCRIPT_CONFIG")]
        config: PathBuf,

        /// Event name, e.g. `db._table.contact.get.pre_process`
        name: String,

        /// Event kind
        #[arg(short, long, value_enum, default_value_t = Kind::PreProcess)]
        kind: Kind,

        /// Request method (request-lifecycle events)
        #[arg(long, default_value = "GET")]
        method: String,

        /// Request path (request-lifecycle events)
        #[arg(long, default_value = "")]
        path: String,

        /// JSON payload: request payload (pre-process), response (post-process), or event payload
        #[arg(long)]
        payload: Option<String>,
    },

    /// Print the service script configuration schema
    Schema,

    /// Print the merged script configuration of a seeded service
    ServiceConfig {
        /// Path to settings file
        #[arg(short, long, default_value = "hookscript.yaml", env = "HOOKSCRIPT_CONFIG")]
        config: PathBuf,

        /// Service identifier
        service_id: i64,

        /// Script type the service runs
        #[arg(short = 't', long = "type", default_value = "rhai")]
        script_type: String,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    PreProcess,
    PostProcess,
    Api,
    Service,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => {
            init_tracing(&cli.log_level, cli.json)?;

            tracing::info!("Validating settings: {}", config.display());

            match load_settings(&config) {
                Ok(settings) => {
                    tracing::info!("✓ Settings are valid");
                    tracing::info!("  Scripts: {}", settings.scripts.len());
                    tracing::info!("  Services: {}", settings.services.len());
                    tracing::info!("  Lookups: {}", settings.lookups.len());
                    tracing::info!("  Scripting: {}", settings.disable_policy());
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Settings validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Fire {
            config,
            name,
            kind,
            method,
            path,
            payload,
        } => {
            init_tracing(&cli.log_level, cli.json)?;

            let settings = load(&config)?;
            let payload = match payload {
                Some(raw) => serde_json::from_str(&raw).context("payload is not valid JSON")?,
                None => Value::Null,
            };

            let mut event = build_event(&name, kind, &method, &path, payload);
            let runtime = Runtime::builder().settings(settings).build().await?;

            let outcome = runtime.fire(&mut event).await;
            let unfinished = runtime.shutdown().await;
            if unfinished > 0 {
                tracing::warn!(unfinished, "Deferred jobs still running at exit");
            }

            let proceed = outcome?;
            let output = json!({
                "continue": proceed,
                "event": envelope(&event).into_value(),
                "failed_jobs": runtime.failures().len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }

        Commands::Schema => {
            let mut schema = script_config_schema();
            schema.extend(cache_config_schema());
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }

        Commands::ServiceConfig {
            config,
            service_id,
            script_type,
        } => {
            init_tracing(&cli.log_level, cli.json)?;

            let settings = load(&config)?;
            if !settings.services.iter().any(|s| s.service_id == service_id) {
                bail!("service {service_id} is not configured in {}", config.display());
            }

            let runtime = Runtime::builder().settings(settings).build().await?;
            let merged = runtime
                .config_resolver(&script_type)
                .get_config(service_id)
                .await?;
            runtime.shutdown().await;

            println!("{}", serde_json::to_string_pretty(&merged)?);
            Ok(())
        }

        Commands::Version => {
            println!("Hookscript");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<Settings> {
    tracing::debug!("Settings file: {}", path.display());
    load_settings(path).with_context(|| format!("failed to load {}", path.display()))
}

fn build_event(name: &str, kind: Kind, method: &str, path: &str, payload: Value) -> Event {
    match kind {
        Kind::PreProcess => {
            let request = ServiceRequest::new(method, path).with_payload(payload);
            ApiEvent::pre_process(name, request).with_resource(path).into()
        }
        Kind::PostProcess => {
            let request = ServiceRequest::new(method, path);
            let response = (!payload.is_null()).then(|| EventResponse::Payload(payload));
            ApiEvent::post_process(name, request, response)
                .with_resource(path)
                .into()
        }
        Kind::Api => ServiceEvent::api(name, payload).into(),
        Kind::Service => ServiceEvent::service(name, payload).into(),
    }
}

fn envelope(event: &Event) -> EventEnvelope {
    match event {
        Event::Request(event) => event.make_data(),
        Event::Service(event) => event.make_data(),
    }
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into());

    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(fmt.json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry().with(fmt).with(filter).init();
    }

    Ok(())
}
