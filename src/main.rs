//! Tomato leaf disease classifier
//!
//! Serves the exported model over HTTP, or runs one-off classification and
//! test-set evaluation from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tomato_lens_lib::config::{ServerConfig, ServingConfig};
use tomato_lens_lib::services::classifier::model_manager::{
    EngineOptions, ModelVariant, DEFAULT_MODEL_DIR, DEFAULT_MODEL_NAME,
};
use tomato_lens_lib::services::classifier::pipeline::{PipelineOptions, ServingContext};
use tomato_lens_lib::services::evaluation_service;
use tomato_lens_lib::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "tomato-lens")]
#[command(version)]
#[command(about = "Tomato leaf disease classification service")]
struct Cli {
    /// Directory holding the exported model files
    #[arg(
        long,
        env = "TOMATO_LENS_MODEL_DIR",
        default_value = DEFAULT_MODEL_DIR,
        global = true
    )]
    model_dir: PathBuf,

    /// Base name of the model files
    #[arg(
        long,
        env = "TOMATO_LENS_MODEL_NAME",
        default_value = DEFAULT_MODEL_NAME,
        global = true
    )]
    model_name: String,

    /// Which exported graph to run
    #[arg(
        long,
        env = "TOMATO_LENS_VARIANT",
        value_enum,
        default_value = "quantized",
        global = true
    )]
    variant: ModelVariant,

    /// Try GPU execution providers for the full variant
    #[arg(long, env = "TOMATO_LENS_GPU", global = true)]
    gpu: bool,

    /// Intra-op threads per session
    #[arg(long, env = "TOMATO_LENS_INTRA_THREADS", default_value_t = 4, global = true)]
    intra_threads: usize,

    /// Skip contrast enhancement
    #[arg(long, global = true)]
    no_enhance: bool,

    /// Report the descriptor's labels without shortening them
    #[arg(long, global = true)]
    raw_labels: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long, env = "TOMATO_LENS_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, env = "TOMATO_LENS_PORT", default_value_t = 5000)]
        port: u16,

        /// Request body limit in MiB
        #[arg(long, env = "TOMATO_LENS_MAX_UPLOAD_MB", default_value_t = 16)]
        max_upload_mb: usize,

        /// Staging directory for uploads (system temp dir by default)
        #[arg(long, env = "TOMATO_LENS_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,
    },
    /// Classify a single image and print the result as JSON
    Classify { image: PathBuf },
    /// Score the model against a labelled directory tree
    Evaluate {
        data_dir: PathBuf,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn serving_config(&self) -> ServingConfig {
        ServingConfig {
            model_dir: self.model_dir.clone(),
            model_name: self.model_name.clone(),
            variant: self.variant,
            engine: EngineOptions {
                use_gpu: self.gpu,
                intra_threads: self.intra_threads.max(1),
            },
            pipeline: PipelineOptions {
                enhance: !self.no_enhance,
                relabel: !self.raw_labels,
            },
        }
    }
}

fn load_context(config: &ServingConfig) -> tomato_lens_lib::error::Result<ServingContext> {
    ServingContext::load(
        &config.bundle(),
        config.variant,
        &config.engine,
        &config.pipeline,
    )
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let serving = cli.serving_config();
    info!(
        "model: {:?} ({:?}, gpu={})",
        serving.bundle().weights_path(serving.variant),
        serving.variant,
        serving.engine.use_gpu
    );

    match cli.command {
        Command::Serve {
            host,
            port,
            max_upload_mb,
            upload_dir,
        } => {
            let mut server = ServerConfig {
                host,
                port,
                max_upload_bytes: max_upload_mb.max(1) * 1024 * 1024,
                ..ServerConfig::default()
            };
            if let Some(dir) = upload_dir {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                server.upload_dir = dir;
            }

            let state = match tokio::task::spawn_blocking(move || load_context(&serving)).await? {
                Ok(ctx) => {
                    info!(
                        "model ready: {} classes, input {:?}",
                        ctx.metadata().num_classes,
                        ctx.metadata().input_shape
                    );
                    AppState::new(server, ctx)
                }
                Err(e) => {
                    warn!("model unavailable, serving health checks only: {}", e);
                    AppState::without_model(server, e.to_string())
                }
            };

            tomato_lens_lib::serve(Arc::new(state)).await?;
        }
        Command::Classify { image } => {
            let ctx = load_context(&serving).context("failed to load model")?;
            let result = ctx
                .classify_path(&image)
                .with_context(|| format!("failed to classify {}", image.display()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Evaluate { data_dir, output } => {
            let ctx = load_context(&serving).context("failed to load model")?;
            let report = evaluation_service::evaluate(&ctx, &data_dir)?;
            info!(
                "accuracy {:.4} over {} images ({} skipped)",
                report.accuracy,
                report.samples,
                report.skipped.len()
            );

            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("report written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}
