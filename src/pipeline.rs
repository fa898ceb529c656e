//! End-to-end run for one weather source: normalise, decompose, resample,
//! simulate every array, aggregate and hand the report to the sinks.

use chrono_tz::Tz;
use itertools::Itertools;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, WeatherSourceConfig};
use crate::devices::{DeviceModel, StandardDeviceModel};
use crate::domain::ArrayConfig;
use crate::error::PipelineError;
use crate::irradiance::{IrradianceDecomposer, TranspositionModel};
use crate::report::{
    Aggregator, CsvSink, IrradiationSummary, JsonSummarySink, ReportSink, SvgChartSink,
    YieldReport, MONTH_NAMES,
};
use crate::simulation::{run_arrays, ArrayFailure, FailurePolicy, SimulationInput};
use crate::solar::{SolarPosition, SpaSolarPosition};
use crate::weather::WeatherSeries;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Location shared by every array of the installation.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Zone for calendar months and naive timestamps
    pub tz: Tz,
}

/// How a normalised series is prepared before simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesOptions {
    /// Derive dni/dhi from GHI; off when the source already carries them
    pub decompose: bool,
    /// Keep only this local calendar year, after hourly resampling
    pub year: Option<i32>,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            decompose: true,
            year: None,
        }
    }
}

/// Everything one weather source produced.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub report: YieldReport,
    pub irradiation: IrradiationSummary,
    pub failures: Vec<ArrayFailure>,
    pub artifacts: Vec<PathBuf>,
}

pub struct Pipeline {
    site: Site,
    arrays: Vec<ArrayConfig>,
    sources: Vec<WeatherSourceConfig>,
    solar: Arc<dyn SolarPosition>,
    device: Arc<dyn DeviceModel>,
    transposition: TranspositionModel,
    policy: FailurePolicy,
    timeout: Duration,
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl Pipeline {
    pub fn builder(site: Site, arrays: Vec<ArrayConfig>) -> PipelineBuilder {
        PipelineBuilder::new(site, arrays)
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let site = Site {
            name: config.site.name.clone(),
            latitude: config.site.latitude,
            longitude: config.site.longitude,
            tz: config.site.tz()?,
        };

        let dir = &config.report.output_dir;
        let solar = SpaSolarPosition::new().with_elevation(config.site.elevation);
        let mut builder = Pipeline::builder(site, config.build_arrays()?)
            .sources(config.weather.clone())
            .solar(Arc::new(solar))
            .transposition(config.simulation.transposition)
            .failure_policy(config.simulation.failure_policy)
            .timeout(Duration::from_secs(config.simulation.run_timeout_seconds));
        if config.report.csv {
            builder = builder.sink(Arc::new(CsvSink::new(dir)));
        }
        if config.report.chart {
            builder = builder.sink(Arc::new(SvgChartSink::new(dir)));
        }
        if config.report.json {
            builder = builder.sink(Arc::new(JsonSummarySink::new(dir)));
        }
        Ok(builder.build())
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn arrays(&self) -> &[ArrayConfig] {
        &self.arrays
    }

    /// Run every configured source in order. The first failing source stops
    /// the remaining ones.
    pub async fn run_all(&self) -> Result<Vec<SourceReport>, PipelineError> {
        if self.sources.is_empty() {
            warn!("no weather sources configured");
        }
        let mut reports = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            reports.push(self.run_source(source).await?);
        }
        Ok(reports)
    }

    /// Read one configured source from disk and run it.
    pub async fn run_source(&self, source: &WeatherSourceConfig) -> Result<SourceReport, PipelineError> {
        let normalizer = source.normalizer(self.site.tz)?;
        let path = source.path.clone();
        let options = SeriesOptions {
            decompose: !source.columns.provides_components(),
            year: source.year,
        };
        let name = source.name.clone();

        self.with_timeout(async move {
            let series = tokio::task::spawn_blocking(move || normalizer.read_path(&path))
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))??;
            self.execute(&name, series, options).await
        })
        .await
    }

    /// Run an already normalised series.
    pub async fn run_series(
        &self,
        source: &str,
        series: WeatherSeries,
        options: SeriesOptions,
    ) -> Result<SourceReport, PipelineError> {
        self.with_timeout(self.execute(source, series, options)).await
    }

    /// Bound a run by the wall-clock limit. Blocking work already handed to
    /// the pool is abandoned, not interrupted.
    async fn with_timeout<F>(&self, run: F) -> Result<SourceReport, PipelineError>
    where
        F: Future<Output = Result<SourceReport, PipelineError>>,
    {
        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                let seconds = self.timeout.as_secs_f64();
                warn!(seconds, "run exceeded the wall-clock limit");
                Err(PipelineError::Timeout { seconds })
            }
        }
    }

    async fn execute(
        &self,
        source: &str,
        series: WeatherSeries,
        options: SeriesOptions,
    ) -> Result<SourceReport, PipelineError> {
        info!(source, samples = series.len(), decompose = options.decompose, "starting run");

        let input = self.prepare(source, series, options).await?;
        let irradiation = IrradiationSummary::from_hourly(source, input.weather(), self.site.tz);

        let outcome = run_arrays(
            &self.arrays,
            Arc::new(input),
            Arc::clone(&self.device),
            self.policy,
        )
        .await?;

        let report = Aggregator::new(self.site.tz).aggregate(source, &outcome.results);
        log_monthly_table(&report);

        let sinks = self.sinks.clone();
        let (report, irradiation, artifacts) = tokio::task::spawn_blocking(move || {
            let mut artifacts = Vec::with_capacity(sinks.len());
            for sink in &sinks {
                debug!(sink = sink.name(), source = report.source(), "writing report");
                artifacts.push(sink.write(&report, Some(&irradiation))?);
            }
            Ok::<_, PipelineError>((report, irradiation, artifacts))
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        Ok(SourceReport {
            report,
            irradiation,
            failures: outcome.failures,
            artifacts,
        })
    }

    /// Decompose at native resolution, then resample, filter and attach sun
    /// positions on the blocking pool.
    async fn prepare(
        &self,
        source: &str,
        series: WeatherSeries,
        options: SeriesOptions,
    ) -> Result<SimulationInput, PipelineError> {
        let solar = Arc::clone(&self.solar);
        let Site {
            latitude,
            longitude,
            tz,
            ..
        } = self.site.clone();
        let transposition = self.transposition;
        let source = source.to_string();

        tokio::task::spawn_blocking(move || {
            let series = if options.decompose {
                IrradianceDecomposer::new(solar.as_ref(), latitude, longitude)
                    .in_zone(tz)
                    .apply(&series)?
            } else {
                series
            };

            let mut hourly = series.resample_hourly();
            if let Some(year) = options.year {
                hourly = hourly.filter_year(year, tz);
            }
            if hourly.is_empty() {
                return Err(PipelineError::EmptySource(source));
            }

            SimulationInput::prepare(
                hourly,
                solar.as_ref(),
                latitude,
                longitude,
                transposition,
                tz,
            )
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
    }
}

fn log_monthly_table(report: &YieldReport) {
    for (index, month) in MONTH_NAMES.iter().enumerate() {
        let row = report
            .arrays()
            .iter()
            .map(|a| format!("{}={:.1}", a.name, a.monthly_kwh[index]))
            .join(" ");
        info!(source = report.source(), month, %row, "monthly yield [kWh]");
    }
}

pub struct PipelineBuilder {
    site: Site,
    arrays: Vec<ArrayConfig>,
    sources: Vec<WeatherSourceConfig>,
    solar: Option<Arc<dyn SolarPosition>>,
    device: Option<Arc<dyn DeviceModel>>,
    transposition: TranspositionModel,
    policy: FailurePolicy,
    timeout: Duration,
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl PipelineBuilder {
    pub fn new(site: Site, arrays: Vec<ArrayConfig>) -> Self {
        Self {
            site,
            arrays,
            sources: Vec::new(),
            solar: None,
            device: None,
            transposition: TranspositionModel::default(),
            policy: FailurePolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            sinks: Vec::new(),
        }
    }

    pub fn sources(mut self, sources: Vec<WeatherSourceConfig>) -> Self {
        self.sources = sources;
        self
    }

    pub fn solar(mut self, solar: Arc<dyn SolarPosition>) -> Self {
        self.solar = Some(solar);
        self
    }

    pub fn device(mut self, device: Arc<dyn DeviceModel>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn transposition(mut self, transposition: TranspositionModel) -> Self {
        self.transposition = transposition;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            site: self.site,
            arrays: self.arrays,
            sources: self.sources,
            solar: self.solar.unwrap_or_else(|| Arc::new(SpaSolarPosition::new())),
            device: self.device.unwrap_or_else(|| Arc::new(StandardDeviceModel)),
            transposition: self.transposition,
            policy: self.policy,
            timeout: self.timeout,
            sinks: self.sinks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::catalogue;
    use crate::solar::SunPosition;
    use crate::weather::WeatherSample;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    /// Sleeps before answering, to trip the wall-clock limit.
    struct SlowSun(Duration);

    impl SolarPosition for SlowSun {
        fn positions(
            &self,
            times: &[DateTime<Utc>],
            _lat: f64,
            _lon: f64,
        ) -> Result<Vec<SunPosition>, PipelineError> {
            std::thread::sleep(self.0);
            Ok(vec![SunPosition { zenith: 45.0, azimuth: 180.0 }; times.len()])
        }
    }

    fn site() -> Site {
        Site {
            name: "HTW Berlin".to_string(),
            latitude: 52.45544,
            longitude: 13.52481,
            tz: chrono_tz::Europe::Berlin,
        }
    }

    fn arrays() -> Vec<ArrayConfig> {
        let devices = catalogue();
        vec![ArrayConfig::builder("wr2")
            .orientation(14.57, 215.0)
            .module(devices.module("aleo_s19_285").unwrap())
            .inverter(devices.inverter("danfoss_dlx_2_9").unwrap())
            .strings(11, 1)
            .build()
            .unwrap()]
    }

    fn june_days(days: i64) -> WeatherSeries {
        let start = Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap();
        WeatherSeries::from_samples(
            (0..days * 24 * 4)
                .map(|q| {
                    let t = start + TimeDelta::minutes(15 * q);
                    let hour = (q / 4) % 24;
                    let ghi = if (4..18).contains(&hour) { 600.0 } else { 0.0 };
                    WeatherSample::measured(t, ghi, 2.0, 18.0)
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_run_series_produces_report() {
        let pipeline = Pipeline::builder(site(), arrays()).build();
        let out = pipeline
            .run_series("htw", june_days(3), SeriesOptions::default())
            .await
            .unwrap();

        assert_eq!(out.report.source(), "htw");
        assert!(out.failures.is_empty());
        assert!(out.artifacts.is_empty());
        let june = out.report.kwh("wr2", 6).unwrap();
        assert!(june > 5.0, "three sunny days should give several kWh, got {june}");
        assert_eq!(out.report.kwh("wr2", 7), Some(0.0));
        assert_eq!(out.irradiation.max_ghi, Some(600.0));
    }

    #[tokio::test]
    async fn test_year_filter_can_empty_the_series() {
        let pipeline = Pipeline::builder(site(), arrays()).build();
        let options = SeriesOptions {
            decompose: true,
            year: Some(2016),
        };
        let err = pipeline.run_series("htw", june_days(1), options).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptySource(name) if name == "htw"));
    }

    #[tokio::test]
    async fn test_hanging_solar_position_times_out() {
        let pipeline = Pipeline::builder(site(), arrays())
            .solar(Arc::new(SlowSun(Duration::from_millis(500))))
            .timeout(Duration::from_millis(50))
            .build();
        let err = pipeline
            .run_series("htw", june_days(1), SeriesOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { seconds } if (seconds - 0.05).abs() < 1e-9));
    }
}
