use anyhow::{Context, Result};
use reviewpipe::{
    config::{PipelineConfig, ENV_CONFIG},
    history::{JobHistory, JobLifecycle, NoopLifecycle},
    pipeline::Pipeline,
    sink::LocalSink,
};
use std::{env, path::PathBuf, sync::Arc};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path: PathBuf = env::args()
        .nth(1)
        .or_else(|| env::var(ENV_CONFIG).ok())
        .map(PathBuf::from)
        .with_context(|| format!("usage: reviewpipe <config.yaml> (or set {})", ENV_CONFIG))?;
    let mut config = PipelineConfig::load(&config_path)?;
    config.apply_env_overrides();
    config.validate()?;
    info!(
        source = %config.source_path.display(),
        processed = %config.processed_path.display(),
        analytics = %config.analytics_path.display(),
        "config loaded"
    );

    // ─── 3) wire collaborators ───────────────────────────────────────
    let sink = Arc::new(LocalSink::new(config.output_format));
    let lifecycle: Arc<dyn JobLifecycle> = match &config.history_dir {
        Some(dir) => Arc::new(JobHistory::new(dir)?),
        None => Arc::new(NoopLifecycle),
    };

    // ─── 4) run ──────────────────────────────────────────────────────
    let mut pipeline = Pipeline::new(config, sink, lifecycle);
    match pipeline.run() {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            info!("all done");
            Ok(())
        }
        Err(e) => {
            error!(state = %pipeline.state(), "run failed");
            Err(e)
        }
    }
}
