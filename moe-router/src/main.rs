//! Batch predictions from the command line.
//!
//! Reads a JSON array of matches, predicts each one through the router and
//! prints the outcomes together with the service metrics.

use std::env;
use std::sync::Arc;

use moe_router::{
    logging, BackendRegistry, Config, OddsImpliedPredictor, PerformanceRegistry, PredictionService,
};
use predict_common::{MatchDetails, PredictionType};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: moe-router [--config <file>] [--type <prediction_type>] <matches.json>";

struct Args {
    config: Option<String>,
    prediction_type: PredictionType,
    matches: String,
}

fn parse_args() -> Result<Option<Args>, Box<dyn std::error::Error>> {
    let mut config = None;
    let mut prediction_type = PredictionType::default();
    let mut matches = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("moe-router {}", VERSION);
                return Ok(None);
            }
            "--config" => config = Some(args.next().ok_or(USAGE)?),
            "--type" => {
                let value = args.next().ok_or(USAGE)?;
                prediction_type = serde_json::from_value(serde_json::Value::String(value.clone()))
                    .map_err(|_| format!("unknown prediction type: {}", value))?;
            }
            _ if matches.is_none() => matches = Some(arg),
            _ => return Err(USAGE.into()),
        }
    }

    Ok(Some(Args {
        config,
        prediction_type,
        matches: matches.ok_or(USAGE)?,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = Config::load(args.config.as_deref())
        .map_err(|e| format!("Failed to load configuration: {}", e))?;
    logging::init_tracing(&config.logging.level);

    tracing::info!(
        strategy = %config.routing.strategy,
        max_concurrent = config.batch.max_concurrent,
        "Starting moe-router {}",
        VERSION
    );

    let registry = Arc::new(BackendRegistry::new());
    for kind in config.backends.enabled_kinds() {
        registry.register(Arc::new(OddsImpliedPredictor::new(kind))).await;
        tracing::info!(backend = %kind, "Registered odds-implied backend");
    }

    let service = PredictionService::from_config(
        &config,
        registry,
        Arc::new(PerformanceRegistry::with_defaults()),
    )?;

    let text = std::fs::read_to_string(&args.matches)
        .map_err(|e| format!("Failed to read {}: {}", args.matches, e))?;
    let matches: Vec<MatchDetails> = serde_json::from_str(&text)?;

    let outcomes = service
        .predict_batch(&matches, args.prediction_type, None, None)
        .await;
    let metrics = service.service_metrics().await;

    let report = serde_json::json!({
        "outcomes": outcomes,
        "metrics": metrics,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
