use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trustshake_core::handshake::prover;
use trustshake_core::{
    config, did, janitor, metrics, AgentIdentity, Handshake, HandshakeEngine, TrustConfig,
    TrustResult,
};

#[derive(Parser)]
#[command(name = "trustshake")]
#[command(about = "Trustshake - bidirectional DID trust handshake", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate default configuration")]
    Config {
        #[arg(short, long, default_value = "trustshake.toml")]
        output: PathBuf,
    },

    #[command(about = "Validate one or more DIDs")]
    Did {
        #[arg(required = true)]
        dids: Vec<String>,
    },

    #[command(about = "Run a complete handshake between two ephemeral agents")]
    Simulate {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, value_delimiter = ',', default_value = "security")]
        requirements: Vec<String>,

        #[arg(short, long, default_value = "0")]
        invalid_pop: u32,

        #[arg(short, long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match &cli.command {
        Commands::Simulate {
            config: Some(path), ..
        } => TrustConfig::load(path)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string()),
        _ => "info".to_string(),
    };
    let filter = std::env::var("RUST_LOG").unwrap_or(level);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Config { output } => handle_config(&output),
        Commands::Did { dids } => handle_did(&dids),
        Commands::Simulate {
            config,
            requirements,
            invalid_pop,
            metrics,
        } => handle_simulate(config, requirements, invalid_pop, metrics).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn handle_config(output: &Path) -> TrustResult<()> {
    config::generate_default(output)?;
    println!("Generated default config at: {}", output.display());
    Ok(())
}

fn handle_did(dids: &[String]) -> TrustResult<()> {
    let mut invalid = 0;
    for candidate in dids {
        match candidate.parse::<did::Did>() {
            Ok(parsed) => println!("valid    {} (method: {})", parsed, parsed.method()),
            Err(e) => {
                invalid += 1;
                println!("invalid  {}: {}", candidate, e);
            }
        }
    }

    if invalid > 0 {
        std::process::exit(2);
    }
    Ok(())
}

async fn handle_simulate(
    config_path: Option<PathBuf>,
    requirements: Vec<String>,
    invalid_pop: u32,
    show_metrics: bool,
) -> TrustResult<()> {
    let config = match config_path {
        Some(path) => TrustConfig::load(path)?,
        None => TrustConfig::default(),
    };

    let engine = Arc::new(HandshakeEngine::new(&config));
    let shutdown = CancellationToken::new();
    let janitor_handle = config
        .janitor
        .enabled
        .then(|| janitor::spawn(engine.clone(), config.janitor.interval(), shutdown.clone()));

    let initiator = AgentIdentity::generate();
    let responder = AgentIdentity::generate();
    tracing::info!("Initiator: {} ({})", initiator.did(), initiator.fingerprint());
    tracing::info!("Responder: {} ({})", responder.did(), responder.fingerprint());

    let mut handshake = engine.initiate(
        &initiator.did(),
        &responder.did(),
        &initiator.public_key_multibase(),
        requirements.as_slice(),
    )?;

    let mut remaining_invalid = invalid_pop;
    while handshake.is_active() {
        handshake = step(&engine, &handshake, &responder, &mut remaining_invalid)?;
    }

    let report = json!({
        "handshake": summarize(&handshake),
        "statistics": engine.get_statistics(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if show_metrics {
        println!("{}", String::from_utf8_lossy(&metrics::gather()));
    }

    shutdown.cancel();
    if let Some(handle) = janitor_handle {
        if tokio::time::timeout(Duration::from_secs(1), handle).await.is_err() {
            tracing::warn!("Janitor did not stop in time");
        }
    }

    Ok(())
}

fn step(
    engine: &HandshakeEngine,
    handshake: &Handshake,
    responder: &AgentIdentity,
    remaining_invalid: &mut u32,
) -> TrustResult<Handshake> {
    let Some(challenge) = handshake.current_challenge() else {
        return Ok(handshake.clone());
    };

    let response = if *remaining_invalid > 0 {
        *remaining_invalid -= 1;
        json!({ "computation": "", "signature": "" })
    } else {
        prover::build_response(challenge, responder).unwrap_or_default()
    };

    engine.respond(
        &handshake.id,
        &challenge.id,
        &response,
        &responder.did(),
        &responder.public_key_multibase(),
    )
}

fn summarize(handshake: &Handshake) -> serde_json::Value {
    json!({
        "id": handshake.id,
        "status": handshake.status,
        "phase": handshake.phase,
        "attempts": handshake.metadata.attempts,
        "challenges": handshake.challenges.len(),
        "trustScore": handshake.metadata.trust_score,
        "failureReason": handshake.metadata.failure_reason,
        "durationMs": handshake.duration_ms(),
    })
}
