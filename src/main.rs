use anyhow::{Context, Result};
use pv_yield::{config, pipeline, telemetry};
use config::Config;
use pipeline::Pipeline;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;
    let pipeline = Pipeline::from_config(&cfg).context("building pipeline")?;

    info!(
        site = %pipeline.site().name,
        arrays = pipeline.arrays().len(),
        sources = cfg.weather.len(),
        "starting PV yield simulation"
    );

    let reports = tokio::select! {
        reports = pipeline.run_all() => reports.context("simulation run failed")?,
        _ = telemetry::shutdown_signal() => {
            warn!("run interrupted");
            return Ok(());
        }
    };

    for source in &reports {
        for failure in &source.failures {
            warn!(source = source.report.source(), array = %failure.name, reason = %failure.reason, "array left out of report");
        }
        info!(
            source = source.report.source(),
            grand_total_kwh = source.report.grand_total_kwh(),
            artifacts = source.artifacts.len(),
            "source finished"
        );
    }

    Ok(())
}
