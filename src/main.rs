//! voltcast CLI - household power prediction services
//!
//! # Commands
//!
//! - `evaluate` - Serve predictions and metrics for a fixed labelled file
//! - `upload` - Serve predictions for uploaded files
//! - `inspect` - Print a model summary

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use voltcast::{
    api::{create_evaluate_router, create_upload_router, EvaluateState, UploadState},
    archive::ElasticsearchArchiver,
    config::{EvaluateConfig, UploadConfig},
    error::{Result, VoltcastError},
    logging,
    model::{feature_order_mismatch, load_model, warn_on_feature_order, Regressor, SharedModel},
    schema::Schema,
    upload::UploadPolicy,
};

/// voltcast - LightGBM predictions for household power readings
#[derive(Parser)]
#[command(name = "voltcast")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (when RUST_LOG is unset)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve `GET /predict` over a fixed labelled test file
    ///
    /// Unset options fall back to VOLTCAST_* environment variables, then
    /// to built-in defaults.
    Evaluate {
        /// Host to bind to [env: VOLTCAST_HOST, default: 0.0.0.0]
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on [env: VOLTCAST_PORT, default: 5000]
        #[arg(short, long)]
        port: Option<u16>,

        /// LightGBM text model [env: VOLTCAST_MODEL, default: lgbm_model.txt]
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Labelled comma-delimited test file [env: VOLTCAST_DATA, default: test1_data.csv]
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Document store URL, or "none" [env: VOLTCAST_ARCHIVE_URL, default: http://localhost:9200]
        #[arg(long)]
        archive_url: Option<String>,

        /// Index for archived runs [env: VOLTCAST_ARCHIVE_INDEX, default: predictions]
        #[arg(long)]
        archive_index: Option<String>,

        /// Append logs to this file, or "none" [env: VOLTCAST_LOG_FILE, default: app.log]
        #[arg(long)]
        log_file: Option<String>,
    },
    /// Serve `POST /predict` for uploaded semicolon-delimited files
    Upload {
        /// Host to bind to [env: VOLTCAST_HOST, default: 0.0.0.0]
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on [env: VOLTCAST_PORT, default: 5001]
        #[arg(short, long)]
        port: Option<u16>,

        /// LightGBM text model [env: VOLTCAST_UPLOAD_MODEL, default: lgbm_upload_model.txt]
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Temporary upload directory [env: VOLTCAST_UPLOAD_DIR, default: uploads]
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        /// Comma-separated extension allow-list [env: VOLTCAST_ALLOWED_EXTENSIONS, default: csv,txt]
        #[arg(long)]
        extensions: Option<String>,

        /// Append logs to this file, or "none" [env: VOLTCAST_LOG_FILE]
        #[arg(long)]
        log_file: Option<String>,
    },
    /// Print a model summary
    Inspect {
        /// Path to a LightGBM text model
        #[arg(value_name = "MODEL")]
        model: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            host,
            port,
            model,
            data,
            archive_url,
            archive_index,
            log_file,
        } => {
            let mut config = EvaluateConfig::from_env()?.with_bind(host.as_deref(), port)?;
            if let Some(model) = model {
                config.model_path = model;
            }
            if let Some(data) = data {
                config.data_path = data;
            }
            if let Some(url) = archive_url {
                config = config.with_archive_url(&url);
            }
            if let Some(index) = archive_index {
                config.archive_index = index;
            }
            if let Some(log_file) = log_file {
                config.log_file = log_file_arg(&log_file);
            }
            logging::init(cli.verbose, config.log_file.as_deref())?;
            serve_evaluate(config).await
        },
        Commands::Upload {
            host,
            port,
            model,
            upload_dir,
            extensions,
            log_file,
        } => {
            let mut config = UploadConfig::from_env()?.with_bind(host.as_deref(), port)?;
            if let Some(model) = model {
                config.model_path = model;
            }
            if let Some(dir) = upload_dir {
                config.upload_dir = dir;
            }
            if let Some(list) = extensions {
                config = config.with_extensions(&list)?;
            }
            if let Some(log_file) = log_file {
                config.log_file = log_file_arg(&log_file);
            }
            logging::init(cli.verbose, config.log_file.as_deref())?;
            serve_upload(config).await
        },
        Commands::Inspect { model } => {
            logging::init(cli.verbose, None)?;
            inspect(&model)
        },
    }
}

fn log_file_arg(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

async fn serve_evaluate(config: EvaluateConfig) -> Result<()> {
    // A missing or corrupt model stops the evaluation service
    let model = match load_model(&config.model_path) {
        Ok(model) => model,
        Err(e) => {
            error!(error = %e, "cannot load model, shutting down");
            return Err(e);
        },
    };
    warn_on_feature_order(&model, Schema::EVALUATE.features());
    let model: SharedModel = Arc::new(model);

    let mut state = EvaluateState::new(model, config.data_path.clone());
    match &config.archive_url {
        Some(url) => match ElasticsearchArchiver::connect(url, &config.archive_index).await {
            Ok(archiver) => state = state.with_archiver(archiver),
            Err(e) => warn!(error = %e, "document store unavailable, archiving disabled"),
        },
        None => info!("archiving disabled"),
    }

    info!(
        data = %config.data_path.display(),
        archive = state.has_archiver(),
        "evaluation service ready"
    );
    serve(config.addr, create_evaluate_router(state)).await
}

async fn serve_upload(config: UploadConfig) -> Result<()> {
    let model = load_model(&config.model_path).map(|model| {
        warn_on_feature_order(&model, Schema::UPLOAD.features());
        Arc::new(model) as SharedModel
    });
    if let Err(e) = &model {
        error!(error = %e, "model not loaded, POST /predict will answer 500");
    }

    let policy = UploadPolicy::new(&config.upload_dir, config.allowed_extensions.as_slice());
    info!(
        upload_dir = %config.upload_dir.display(),
        extensions = ?config.allowed_extensions,
        "upload service ready"
    );
    serve(config.addr, create_upload_router(UploadState::new(model, policy))).await
}

async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VoltcastError::IoError {
            message: format!("failed to bind {addr}: {e}"),
        })?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| VoltcastError::IoError {
            message: format!("server error: {e}"),
        })?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn inspect(path: &Path) -> Result<()> {
    let model = load_model(path)?;

    println!("Model: {}", path.display());
    println!("  Format:         LightGBM text ({})", model.version().unwrap_or("unknown version"));
    println!("  Objective:      {}", model.objective());
    println!("  Trees:          {}", model.num_trees());
    println!("  Features:       {}", model.num_features());
    println!("  Average output: {}", model.average_output());

    let names = model.feature_names();
    if names.is_empty() {
        println!("  Feature names:  (not stored)");
        return Ok(());
    }
    println!("  Feature names:  {}", names.join(", "));
    for (service, schema) in [("evaluate", Schema::EVALUATE), ("upload", Schema::UPLOAD)] {
        let status = if feature_order_mismatch(&model, schema.features()).is_some() {
            "differs from"
        } else {
            "matches"
        };
        println!("  Column order {status} the {service} service input");
    }
    Ok(())
}
