//! Report sinks: monthly CSV table, bar chart and annual JSON summary.

use serde::Serialize;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{IrradiationSummary, YieldReport, MONTH_NAMES};
use crate::error::PipelineError;

/// Destination for a finished report.
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write the report and return the path of the artifact.
    fn write(
        &self,
        report: &YieldReport,
        irradiation: Option<&IrradiationSummary>,
    ) -> Result<PathBuf, PipelineError>;
}

fn create(dir: &Path, file_name: String) -> Result<(PathBuf, BufWriter<File>), PipelineError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let file = File::create(&path)?;
    Ok((path, BufWriter::new(file)))
}

/// Month × array table in kWh, `;` separated, one decimal.
pub fn write_monthly_csv<W: Write>(report: &YieldReport, writer: W) -> Result<(), PipelineError> {
    let mut csv = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

    // index column stays unlabelled
    let mut header = vec![String::new()];
    header.extend(report.arrays().iter().map(|a| a.name.clone()));
    csv.write_record(&header)?;

    for (index, month) in MONTH_NAMES.iter().enumerate() {
        let mut row = vec![month.to_string()];
        row.extend(
            report
                .arrays()
                .iter()
                .map(|a| format!("{:.1}", a.monthly_kwh[index])),
        );
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(
        &self,
        report: &YieldReport,
        _irradiation: Option<&IrradiationSummary>,
    ) -> Result<PathBuf, PipelineError> {
        let (path, writer) = create(&self.dir, format!("results_monthly_{}.csv", report.source()))?;
        write_monthly_csv(report, writer)?;
        info!(path = %path.display(), "monthly table written");
        Ok(path)
    }
}

const CHART_WIDTH: f64 = 960.0;
const CHART_HEIGHT: f64 = 540.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 150.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 110.0;
const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Grouped monthly bar chart as a standalone SVG document.
pub fn render_bar_chart(report: &YieldReport) -> String {
    let arrays = report.arrays();
    let plot_w = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let max_value = arrays
        .iter()
        .flat_map(|a| a.monthly_kwh.iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let (axis_max, tick) = axis_scale(max_value);
    let y = |v: f64| MARGIN_TOP + plot_h * (1.0 - v / axis_max);

    let mut svg = String::new();
    // writing into a String cannot fail
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{CHART_WIDTH}" height="{CHART_HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" text-anchor="middle" font-size="16">Monthly yield ({})</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        escape(report.source())
    );

    // grid and y axis
    let ticks = (axis_max / tick).round() as usize;
    for k in 0..=ticks {
        let value = tick * k as f64;
        grid_line(&mut svg, y(value), plot_w, value);
    }
    let _ = writeln!(
        svg,
        r#"<text transform="translate(24,{}) rotate(-90)" text-anchor="middle">Energy in kWh</text>"#,
        MARGIN_TOP + plot_h / 2.0
    );

    // bars
    let group_w = plot_w / 12.0;
    let bar_w = if arrays.is_empty() {
        0.0
    } else {
        group_w * 0.8 / arrays.len() as f64
    };
    for (month, name) in MONTH_NAMES.iter().enumerate() {
        let group_x = MARGIN_LEFT + group_w * month as f64 + group_w * 0.1;
        for (i, array) in arrays.iter().enumerate() {
            let v = array.monthly_kwh[month];
            let v = if v.is_finite() { v.max(0.0) } else { 0.0 };
            let top = y(v);
            let _ = writeln!(
                svg,
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"><title>{} {}: {:.1} kWh</title></rect>"#,
                group_x + bar_w * i as f64,
                top,
                bar_w,
                MARGIN_TOP + plot_h - top,
                PALETTE[i % PALETTE.len()],
                escape(&array.name),
                name,
                array.monthly_kwh[month]
            );
        }
        let label_x = MARGIN_LEFT + group_w * (month as f64 + 0.5);
        let label_y = MARGIN_TOP + plot_h + 10.0;
        let _ = writeln!(
            svg,
            r#"<text transform="translate({label_x:.2},{label_y:.2}) rotate(-90)" text-anchor="end" dominant-baseline="middle">{name}</text>"#
        );
    }

    // legend
    for (i, array) in arrays.iter().enumerate() {
        let ly = MARGIN_TOP + 20.0 * i as f64;
        let lx = CHART_WIDTH - MARGIN_RIGHT + 20.0;
        let _ = writeln!(
            svg,
            r#"<rect x="{lx}" y="{ly}" width="12" height="12" fill="{}"/><text x="{}" y="{}">{}</text>"#,
            PALETTE[i % PALETTE.len()],
            lx + 18.0,
            ly + 11.0,
            escape(&array.name)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn grid_line(svg: &mut String, y: f64, plot_w: f64, value: f64) {
    let _ = writeln!(
        svg,
        r##"<line x1="{MARGIN_LEFT}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="#dddddd"/><text x="{}" y="{:.2}" text-anchor="end">{}</text>"##,
        MARGIN_LEFT + plot_w,
        MARGIN_LEFT - 6.0,
        y + 4.0,
        (value * 1e6).round() / 1e6
    );
}

/// Round the axis up to 1, 2 or 5 times a power of ten, with five ticks.
fn axis_scale(max_value: f64) -> (f64, f64) {
    if !(max_value > 0.0) {
        return (1.0, 0.2);
    }
    let raw_tick = max_value / 5.0;
    let magnitude = 10f64.powf(raw_tick.log10().floor());
    let tick = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|t| *t >= raw_tick)
        .unwrap_or(10.0 * magnitude);
    ((max_value / tick).ceil() * tick, tick)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub struct SvgChartSink {
    dir: PathBuf,
}

impl SvgChartSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for SvgChartSink {
    fn name(&self) -> &'static str {
        "chart"
    }

    fn write(
        &self,
        report: &YieldReport,
        _irradiation: Option<&IrradiationSummary>,
    ) -> Result<PathBuf, PipelineError> {
        let (path, mut writer) = create(&self.dir, format!("results_monthly_{}.svg", report.source()))?;
        writer.write_all(render_bar_chart(report).as_bytes())?;
        writer.flush()?;
        info!(path = %path.display(), "bar chart written");
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
struct AnnualEntry<'a> {
    name: &'a str,
    annual_kwh: f64,
}

#[derive(Debug, Serialize)]
struct AnnualSummary<'a> {
    source: &'a str,
    arrays: Vec<AnnualEntry<'a>>,
    grand_total_kwh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    irradiation: Option<&'a IrradiationSummary>,
}

/// Annual per-array totals, grand total and irradiation as JSON.
pub struct JsonSummarySink {
    dir: PathBuf,
}

impl JsonSummarySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for JsonSummarySink {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(
        &self,
        report: &YieldReport,
        irradiation: Option<&IrradiationSummary>,
    ) -> Result<PathBuf, PipelineError> {
        let summary = AnnualSummary {
            source: report.source(),
            arrays: report
                .arrays()
                .iter()
                .map(|a| AnnualEntry {
                    name: &a.name,
                    annual_kwh: a.annual_kwh,
                })
                .collect(),
            grand_total_kwh: report.grand_total_kwh(),
            irradiation,
        };

        let (path, mut writer) = create(&self.dir, format!("results_annual_{}.json", report.source()))?;
        serde_json::to_writer_pretty(&mut writer, &summary).map_err(std::io::Error::from)?;
        writer.flush()?;
        info!(path = %path.display(), "annual summary written");
        Ok(path)
    }
}
