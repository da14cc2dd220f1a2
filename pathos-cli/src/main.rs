//! Pathos CLI - serve turns over HTTP or chat from the terminal

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pathos_core::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

mod error;
mod server;

#[derive(Parser)]
#[command(name = "pathos")]
#[command(about = "Affect-aware clinician avatar turns", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file layered over pathos.toml (default: $PATHOS_CONFIG_PATH);
    /// PATHOS_* variables still apply on top
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat from the terminal
    Chat {
        /// Use canned responses instead of the inference service
        #[arg(long)]
        offline: bool,
        /// Print per-turn timings and states
        #[arg(short, long)]
        verbose: bool,
    },
    /// List the candidate expression labels
    Expressions,
    /// Version information
    Version,
}

fn load_config(path: Option<&Path>) -> Result<PathosConfig> {
    Ok(PathosConfig::load_with(path)?)
}

/// Provider that answers without a model, for trying the pipeline locally
fn offline_provider(fallback: &str) -> ScriptedProvider {
    ScriptedProvider::new()
        .on(CallKind::Affect, ScriptedOutcome::text("calm, attentive"))
        .on_fn(CallKind::Reply, |request| {
            let message = request
                .prompt()
                .lines()
                .rev()
                .find_map(|line| line.strip_prefix("Patient: "))
                .unwrap_or_default();
            ScriptedOutcome::text(format!("I hear you saying: \"{}\". Tell me more.", message))
        })
        .on(CallKind::Expression, ScriptedOutcome::text(fallback))
}

async fn chat(config: &PathosConfig, offline: bool, verbose: bool) -> Result<()> {
    let expressions = config.expressions.candidate_set()?;
    let client = if offline {
        let provider = offline_provider(expressions.fallback());
        InferenceClient::new(Arc::new(provider), config.inference.max_in_flight)
    } else {
        InferenceClient::from_config(&config.inference)?
    };
    let orchestrator = TurnOrchestrator::new(client, expressions, config);

    println!("Chatting with the clinician. Type /quit to exit.");
    let mut session_id: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let mut request = TurnRequest::new(line);
        request.session_id = session_id.clone();

        match orchestrator.run_turn(request).await {
            Ok(result) => {
                println!("[{}] {}", result.expression_state, result.reply);
                if verbose {
                    println!(
                        "    affect: {} | affect {}ms, reply {}ms, expression {}ms, total {}ms",
                        result.affect_state,
                        result.timing.affect_call_ms,
                        result.timing.reply_call_ms,
                        result.timing.expression_call_ms,
                        result.timing.total_ms
                    );
                }
                session_id = Some(result.session_id);
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("pathos {}", env!("CARGO_PKG_VERSION"));
            println!("pathos-core {}", pathos_core::VERSION);
        }
        Commands::Expressions => {
            let config = load_config(cli.config.as_deref())?;
            let expressions = config.expressions.candidate_set()?;
            for label in expressions.iter() {
                if label == expressions.fallback() {
                    println!("{} (fallback)", label);
                } else {
                    println!("{}", label);
                }
            }
        }
        Commands::Chat { offline, verbose } => {
            let config = load_config(cli.config.as_deref())?;
            chat(&config, offline, verbose).await?;
        }
        Commands::Serve { host, port } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let orchestrator = TurnOrchestrator::from_config(&config)
                .context("Failed to initialise the turn pipeline")?;
            tracing::info!(
                model = %config.inference.model,
                base_url = %config.inference.base_url,
                expressions = orchestrator.expressions().len(),
                "Pathos server starting"
            );
            server::serve(&config, orchestrator).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_keeps_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("pathos-dev.toml", "[inference]\nmodel = \"llama3\"\n")?;
            jail.set_env("PATHOS_CONFIG_PATH", "pathos-dev.toml");
            jail.set_env("PATHOS_INFERENCE__MODEL", "mistral");

            let cli = Cli::parse_from(["pathos", "version"]);
            assert!(cli.config.is_none());
            let config = load_config(cli.config.as_deref()).unwrap();
            assert_eq!(config.inference.model, "mistral");

            let cli = Cli::parse_from(["pathos", "--config", "pathos-dev.toml", "version"]);
            let config = load_config(cli.config.as_deref()).unwrap();
            assert_eq!(config.inference.model, "mistral");
            Ok(())
        });
    }
}
