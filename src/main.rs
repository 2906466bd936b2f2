//! Fairround binary
//!
//! `serve` runs the HTTP API, `verify` replays a revealed seed offline and
//! `commit` prints the commitment of a bucket for operators.

use clap::{Parser, Subcommand};
use fairround::{
    api::{ApiConfig, ApiServer},
    clock::{bucket_at, SystemClock},
    config::{ConfigLoader, SecretPolicy},
    fairness::{seed_message, SeedCommitment},
    rounds::{check_reveal, NoopPayout},
    WageringEngine,
};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "fairround")]
#[command(about = "Provably-fair round-based wagering engine", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Allowed CORS origins (comma-separated, use * for all)
        #[arg(long, default_value = "*")]
        cors_origins: String,
    },
    /// Recompute the hash and outcome of a revealed seed
    Verify {
        /// Revealed seed, hex
        #[arg(long)]
        seed: String,
        /// Published seed hash, hex
        #[arg(long)]
        hash: String,
        /// Game id whose knobs decide the outcome
        #[arg(long)]
        game: String,
        /// Winning choices to compare against (comma-separated)
        #[arg(long)]
        outcome: Option<String>,
    },
    /// Print the commitment for a bucket (needs the server secret)
    Commit {
        #[arg(long)]
        game: String,
        /// Bucket start in unix seconds, aligned down when it is not
        #[arg(long)]
        bucket: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairround=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let secret_policy = match cli.command {
        Command::Serve { .. } => SecretPolicy::EphemeralIfMissing,
        Command::Verify { .. } => SecretPolicy::NotNeeded,
        Command::Commit { .. } => SecretPolicy::Required,
    };
    let mut loader = ConfigLoader::new().with_secret_policy(secret_policy);
    if let Some(ref path) = cli.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;

    match cli.command {
        Command::Serve { cors_origins } => {
            let engine = Arc::new(WageringEngine::from_config(
                &config,
                Arc::new(SystemClock),
                Arc::new(NoopPayout),
            )?);
            let sweeper = engine.spawn_sweeper(config.engine.sweep_interval_secs);

            let api_config = ApiConfig {
                allowed_origins: cors_origins.split(',').map(|s| s.trim().to_string()).collect(),
                ..ApiConfig::from(&config.server)
            };
            ApiServer::new(api_config, engine).run().await?;

            if let Some(sweeper) = sweeper {
                sweeper.stop();
            }
        }
        Command::Verify {
            seed,
            hash,
            game,
            outcome,
        } => {
            let catalog = config.catalog()?;
            let game = catalog.require(&game)?;
            let claimed: Option<Vec<String>> =
                outcome.map(|o| o.split(',').map(|s| s.trim().to_string()).collect());
            let check = check_reveal(&game.knobs, &seed, &hash, claimed.as_deref())?;

            println!("{}", serde_json::to_string_pretty(&check)?);
            if !check.hash_matches || check.outcome_matches == Some(false) {
                std::process::exit(1);
            }
        }
        Command::Commit { game, bucket } => {
            let catalog = config.catalog()?;
            let game = catalog.require(&game)?;
            let bucket_start = bucket_at(bucket, game.round_duration_secs).start;
            let commitment = SeedCommitment::new(config.engine.secret_bytes()?);

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "game_id": game.id,
                    "bucket_start": bucket_start,
                    "seed_message": seed_message(&game.id, bucket_start),
                    "seed_hash": commitment.commit(&game.id, bucket_start).to_hex(),
                }))?
            );
        }
    }

    Ok(())
}
