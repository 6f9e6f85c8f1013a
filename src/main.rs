use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ruleflow_rs::engine::config::EngineConfig;
use ruleflow_rs::engine::memory::{MemoryAppCache, MemoryDump};
use ruleflow_rs::engine::registry::Dependencies;
use ruleflow_rs::ruleflow::engine::RequestInput;
use ruleflow_rs::ruleflow::loader::FlowLoader;
use ruleflow_rs::Engine;

use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a flow document against in-memory adapters
    Run {
        /// Path to the flow document (.json or .yaml)
        #[arg(short, long)]
        file: String,

        /// Request body as JSON
        #[arg(short, long, default_value = "{}")]
        body: String,

        /// Stop flows after this many state transitions
        #[arg(long)]
        max_transitions: Option<u64>,
    },
    /// Load and validate a flow document
    Validate {
        /// Path to the flow document
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let loader = FlowLoader::new();

    match args.command {
        Commands::Run {
            file,
            body,
            max_transitions,
        } => {
            let definition = Arc::new(loader.load(&file)?);
            let body: serde_json::Value = serde_json::from_str(&body)?;

            let mut config = EngineConfig::from_env()?;
            if max_transitions.is_some() {
                config = config.with_max_transitions(max_transitions);
            }

            let deps = Dependencies::new()
                .with_app_cache(Arc::new(MemoryAppCache::new()))
                .with_dump(Arc::new(MemoryDump::new()))
                .with_http_timeout(config.http_timeout_ms)?;
            log::info!("Registered capabilities: {:?}", deps.capabilities());

            let engine = Engine::new(deps, config);
            let (response, outcome) = engine
                .run_to_completion(definition, RequestInput { body, ..Default::default() })
                .await?;

            println!("{}", serde_json::to_string_pretty(&response)?);
            if let Err(e) = outcome {
                log::error!("Run failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { file } => {
            let definition = loader.load(&file)?;
            println!(
                "{} is valid: '{}' with {} trigger(s)",
                file,
                definition.name,
                definition.triggers.len()
            );
        }
    }

    Ok(())
}
