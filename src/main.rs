use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use smart_suggestions::config::{AppConfig, EngineConfig};
use smart_suggestions::engine::domain::RawDocument;
use smart_suggestions::engine::{
    DocumentRecord, ModelCache, SuggestionComposer, SuggestionResponse,
};
use smart_suggestions::error::AppError;
use smart_suggestions::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
    composer: Arc<SuggestionComposer>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Smart Suggestions Engine",
    about = "Serve and demonstrate document-renewal and geofence suggestions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Build a one-off suggestion list from the command line
    Suggest(SuggestArgs),
    /// Retrain the notification model and print the holdout accuracy
    Train,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct SuggestArgs {
    /// Document to evaluate as TYPE=YYYY-MM-DD (repeatable)
    #[arg(long = "document", value_parser = parse_document_arg)]
    documents: Vec<DocumentArg>,
    /// User latitude for the geofence check
    #[arg(long, requires = "longitude")]
    latitude: Option<f64>,
    /// User longitude for the geofence check
    #[arg(long, requires = "latitude")]
    longitude: Option<f64>,
    /// Observation date (defaults to today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
struct DocumentArg {
    document_type: String,
    expiry_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct SuggestionRequest {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Suggest(args) => run_suggest(args),
        Command::Train => run_train(),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn parse_document_arg(raw: &str) -> Result<DocumentArg, String> {
    let (document_type, date) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=YYYY-MM-DD, got '{raw}'"))?;
    let document_type = document_type.trim();
    if document_type.is_empty() {
        return Err(format!("document type missing in '{raw}'"));
    }

    Ok(DocumentArg {
        document_type: document_type.to_string(),
        expiry_date: parse_date(date)?,
    })
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

fn build_composer(engine: &EngineConfig) -> Arc<SuggestionComposer> {
    let cache = Arc::new(ModelCache::new(
        engine.dataset_path.clone(),
        engine.forest_config(),
    ));
    Arc::new(SuggestionComposer::new(cache, engine.geofence.clone()))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
        composer: build_composer(&config.engine),
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/suggestions", post(suggestions_endpoint))
        .layer(prometheus_layer)
        .with_state(state);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "suggestion engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_suggest(args: SuggestArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let composer = build_composer(&config.engine);

    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let documents: Vec<DocumentRecord> = args
        .documents
        .iter()
        .map(|doc| DocumentRecord::derive(doc.document_type.clone(), doc.expiry_date, today))
        .collect();
    let position = args.latitude.zip(args.longitude);

    let response = composer.build(&documents, position)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&response).expect("response serializes")
    );
    Ok(())
}

fn run_train() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let cache = ModelCache::new(
        config.engine.dataset_path.clone(),
        config.engine.forest_config(),
    );

    let model = cache.retrain()?;
    match model.holdout_accuracy() {
        Some(accuracy) => println!("Model trained. Holdout accuracy: {accuracy:.3}"),
        None => println!("Model trained. Dataset too small for a holdout partition."),
    }
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn suggestions_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, AppError> {
    let response = build_suggestions(&state.composer, payload)?;
    Ok(Json(response))
}

/// Validate the raw payload and run the composer. A document missing required
/// fields is skipped, leaving the rest of the batch intact.
fn build_suggestions(
    composer: &SuggestionComposer,
    payload: SuggestionRequest,
) -> Result<SuggestionResponse, AppError> {
    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());

    let documents: Vec<DocumentRecord> = payload
        .documents
        .iter()
        .filter_map(|raw| match raw.validate(today) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(%err, "skipping document with invalid payload");
                None
            }
        })
        .collect();

    let position = payload.latitude.zip(payload.longitude);
    Ok(composer.build(&documents, position)?)
}
