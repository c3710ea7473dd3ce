//! CLI entry point for the rider segmentation pipeline.
//!
//! Provides subcommands for each pipeline stage, a batch run over every
//! profile view, census formatting, and dashboard export (optionally to S3).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rider_segmentation::census::{Census, CensusType};
use rider_segmentation::config::PipelineConfig;
use rider_segmentation::export::Dashboard;
use rider_segmentation::export::s3::{object_key, write_dashboard_to_s3};
use rider_segmentation::params::{
    Algorithm, ClusterParams, MonthCode, MonthWindow, ProfileParams, View,
};
use rider_segmentation::pipeline::Pipeline;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "rider_segmentation")]
#[command(about = "Segment transit riders from fare transactions and profile the clusters", long_about = None)]
struct Cli {
    /// JSON pipeline configuration; defaults apply to every omitted key
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Copy)]
struct WindowArgs {
    /// First month of the window, as YYMM
    #[arg(short, long)]
    month: MonthCode,

    /// Number of months in the window
    #[arg(short, long, default_value_t = 1)]
    duration: u32,
}

impl WindowArgs {
    fn window(self) -> Result<MonthWindow> {
        Ok(MonthWindow::new(self.month, self.duration)?)
    }
}

#[derive(clap::Args, Clone, Copy)]
struct ClusterArgs {
    #[command(flatten)]
    window: WindowArgs,

    /// Pre-split frequency tiers on purchasing and weekday/weekend features
    #[arg(long, default_value_t = false)]
    hierarchical: bool,

    /// Percentage (1-100) of final-phase emphasis on temporal features
    #[arg(short = 'w', long)]
    time_weight: Option<u8>,
}

impl ClusterArgs {
    fn params(self) -> Result<ClusterParams> {
        Ok(ClusterParams::new(
            self.window.window()?,
            self.hierarchical,
            self.time_weight,
        )?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or load) the rider feature table
    Features {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Cluster riders with both final-phase algorithms
    Segment {
        #[command(flatten)]
        cluster: ClusterArgs,
    },
    /// Profile the clusters of one algorithm, or the whole population
    Profile {
        #[command(flatten)]
        cluster: ClusterArgs,

        /// kmeans or lda
        #[arg(short, long, default_value = "kmeans")]
        algorithm: Algorithm,

        /// Profile every rider as a single group
        #[arg(long, default_value_t = false)]
        overview: bool,
    },
    /// Compute every profile view for a window
    Run {
        #[command(flatten)]
        window: WindowArgs,

        /// Percentage (1-100) of final-phase emphasis on temporal features
        #[arg(short = 'w', long)]
        time_weight: Option<u8>,
    },
    /// Write the census table as counts, percents or proportions
    Census {
        /// counts, percents or proportions
        #[arg(short = 't', long = "type", default_value = "percents")]
        census_type: CensusType,

        /// CSV file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Write the dashboard document for one profile view
    Export {
        #[command(flatten)]
        window: WindowArgs,

        /// overview, hierarchical or non-hierarchical
        #[arg(long, default_value = "overview")]
        view: View,

        /// kmeans or lda (ignored for the overview)
        #[arg(short, long, default_value = "lda")]
        algorithm: Algorithm,

        /// Percentage (1-100) of final-phase emphasis on temporal features
        #[arg(short = 'w', long)]
        time_weight: Option<u8>,

        /// JSON file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Optional: S3 bucket to upload the document to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Key prefix inside the bucket
        #[arg(long, default_value = "dashboards")]
        s3_prefix: String,

        /// Gzip compress the document before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/rider_segmentation.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("rider_segmentation.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::new(config);

    match cli.command {
        Commands::Features { window } => {
            let table = pipeline.features(&window.window()?)?;
            info!(riders = table.len(), columns = table.schema().len(), "Features ready");
        }
        Commands::Segment { cluster } => {
            let (_, result) = pipeline.clusters(&cluster.params()?)?;
            for algorithm in Algorithm::ALL {
                info!(
                    algorithm = algorithm.as_str(),
                    clusters = result.table.cluster_ids(algorithm).len(),
                    score = result.scores.get(algorithm),
                    "Segmentation ready"
                );
            }
        }
        Commands::Profile {
            cluster,
            algorithm,
            overview,
        } => {
            let params = if overview {
                ProfileParams::overview(cluster.window.window()?)
            } else {
                ProfileParams::by_cluster(cluster.params()?, algorithm)
            };
            let table = pipeline.profile(&params)?;
            for row in table.rows() {
                info!(cluster = row.cluster, rider_type = row.rider_type, "{}", row.report);
            }
        }
        Commands::Run {
            window,
            time_weight,
        } => {
            let profiles = pipeline.run_all(&window.window()?, time_weight)?;
            for (params, table) in &profiles {
                info!(
                    view = params.view().as_str(),
                    algorithm = %params.algorithm,
                    clusters = table.len(),
                    path = %pipeline.cache().profile_path(params).display(),
                    "Profile ready"
                );
            }
        }
        Commands::Census {
            census_type,
            output,
        } => {
            let census = Census::load(&pipeline.inputs().census_file())?;
            census.to_csv(&output, census_type)?;
            info!(zipcodes = census.len(), census_type = %census_type, output = %output.display(), "Census written");
        }
        Commands::Export {
            window,
            view,
            algorithm,
            time_weight,
            output,
            s3_bucket,
            s3_prefix,
            gzip,
        } => {
            let window = window.window()?;
            let params = match view {
                View::Overview => ProfileParams::overview(window),
                View::Hierarchical | View::NonHierarchical => ProfileParams::by_cluster(
                    ClusterParams::new(window, view == View::Hierarchical, time_weight)?,
                    algorithm,
                ),
            };
            let dashboard = Dashboard::from_profile(&pipeline.profile(&params)?);
            dashboard.write_json(&output)?;
            info!(clusters = dashboard.clusters.len(), output = %output.display(), "Dashboard written");

            if let Some(bucket) = s3_bucket {
                let config = aws_config::load_from_env().await;
                let client = aws_sdk_s3::Client::new(&config);
                let file_name = output
                    .file_name()
                    .and_then(OsStr::to_str)
                    .context("output path has no file name")?;
                let key = object_key(&format!("{s3_prefix}/{}", window.label()), file_name, gzip);
                write_dashboard_to_s3(&client, &bucket, &key, &dashboard, gzip).await?;
                info!(bucket = %bucket, key = %key, "Dashboard published");
            }
        }
    }

    Ok(())
}
