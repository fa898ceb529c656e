//! Calendar aggregation of simulated AC power and measured irradiation.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::simulation::SimulationResult;
use crate::weather::WeatherSeries;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar month in the reporting time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl MonthKey {
    pub fn of(timestamp: DateTime<Utc>, tz: Tz) -> Self {
        let local = timestamp.with_timezone(&tz);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First instant of the month in `tz`.
    pub fn start(self, tz: Tz) -> Option<DateTime<Utc>> {
        tz.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Sum values per calendar month of `tz`.
///
/// Months between the first and the last sample that received no samples are
/// present with 0. A NaN value makes its month NaN.
pub fn resample_monthly<I>(points: I, tz: Tz) -> BTreeMap<MonthKey, f64>
where
    I: IntoIterator<Item = (DateTime<Utc>, f64)>,
{
    let mut sums: BTreeMap<MonthKey, f64> = BTreeMap::new();
    for (timestamp, value) in points {
        *sums.entry(MonthKey::of(timestamp, tz)).or_insert(0.0) += value;
    }

    let bounds = sums.keys().next().copied().zip(sums.keys().next_back().copied());
    if let Some((first, last)) = bounds {
        let mut month = first;
        while month < last {
            sums.entry(month).or_insert(0.0);
            month = month.next();
        }
    }
    sums
}

/// Fold month sums into calendar months 1..=12, across years.
fn by_calendar_month(sums: &BTreeMap<MonthKey, f64>) -> [f64; 12] {
    let mut months = [0.0; 12];
    for (key, value) in sums {
        months[key.month as usize - 1] += value;
    }
    months
}

/// Monthly and annual yield of one array in kWh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayYield {
    pub name: String,
    pub monthly_kwh: [f64; 12],
    pub annual_kwh: f64,
}

/// Month × array energy table. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldReport {
    source: String,
    arrays: Vec<ArrayYield>,
    grand_total_kwh: f64,
}

impl YieldReport {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Arrays in simulation order
    pub fn arrays(&self) -> &[ArrayYield] {
        &self.arrays
    }

    pub fn array(&self, name: &str) -> Option<&ArrayYield> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Energy of one array in calendar month `month` (1..=12)
    pub fn kwh(&self, name: &str, month: u32) -> Option<f64> {
        let index = (month as usize).checked_sub(1).filter(|i| *i < 12)?;
        self.array(name).map(|a| a.monthly_kwh[index])
    }

    pub fn grand_total_kwh(&self) -> f64 {
        self.grand_total_kwh
    }
}

/// Resamples per-array AC series into a [`YieldReport`].
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    tz: Tz,
}

impl Aggregator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn aggregate(&self, source: &str, results: &[SimulationResult]) -> YieldReport {
        let arrays: Vec<ArrayYield> = results
            .iter()
            .map(|result| {
                let monthly_wh = by_calendar_month(&resample_monthly(result.points(), self.tz));
                let monthly_kwh = monthly_wh.map(|wh| wh / 1000.0);
                ArrayYield {
                    name: result.array_name.clone(),
                    monthly_kwh,
                    annual_kwh: monthly_kwh.iter().sum(),
                }
            })
            .collect();

        let grand_total_kwh = arrays.iter().map(|a| a.annual_kwh).sum();
        for array in &arrays {
            info!(source, array = %array.name, annual_kwh = array.annual_kwh, "annual yield");
        }
        info!(source, grand_total_kwh, "total yield");

        YieldReport {
            source: source.to_string(),
            arrays,
            grand_total_kwh,
        }
    }
}

/// Horizontal irradiation of one weather source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrradiationSummary {
    pub source: String,
    /// Largest hourly GHI in W/m²
    pub max_ghi: Option<f64>,
    /// kWh/m² per calendar month
    pub monthly_kwh_m2: [f64; 12],
    pub annual_kwh_m2: f64,
}

impl IrradiationSummary {
    /// Summarise an hourly series. Missing GHI values are skipped.
    pub fn from_hourly(source: &str, series: &WeatherSeries, tz: Tz) -> Self {
        let points = series
            .iter()
            .filter(|s| s.ghi.is_finite())
            .map(|s| (s.timestamp, s.ghi));
        let monthly_kwh_m2 = by_calendar_month(&resample_monthly(points, tz)).map(|wh| wh / 1000.0);
        let summary = Self {
            source: source.to_string(),
            max_ghi: series.max_ghi(),
            monthly_kwh_m2,
            annual_kwh_m2: monthly_kwh_m2.iter().sum(),
        };
        info!(
            source,
            max_ghi = ?summary.max_ghi,
            annual_kwh_m2 = summary.annual_kwh_m2,
            "irradiation summary"
        );
        summary
    }
}
