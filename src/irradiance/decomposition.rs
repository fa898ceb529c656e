//! Erbs decomposition of global horizontal irradiance.
//!
//! The diffuse fraction is an empirical piecewise function of the clearness
//! index `kt`, the ratio of measured GHI to extraterrestrial irradiance on a
//! horizontal plane. DNI is then back-computed from the closure relation
//! `ghi = dni·cos(zenith) + dhi`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::PipelineError;
use crate::solar::{
    aligned_positions, extraterrestrial_irradiance, local_day_of_year, SolarPosition,
};
use crate::weather::WeatherSeries;

/// Smallest cosine of zenith used when normalising GHI, about 86.3°
pub const MIN_COS_ZENITH: f64 = 0.065;
pub const MAX_CLEARNESS_INDEX: f64 = 1.0;
/// Above this zenith all GHI is attributed to the diffuse component
pub const MAX_ZENITH: f64 = 87.0;

/// Direct and diffuse components for one GHI value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Components {
    pub dni: f64,
    pub dhi: f64,
    pub kt: f64,
}

/// Components tagged with their timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decomposition {
    pub timestamp: DateTime<Utc>,
    pub dni: f64,
    pub dhi: f64,
    pub kt: f64,
}

/// Clearness index, clipped to `0..=MAX_CLEARNESS_INDEX`.
pub fn clearness_index(ghi: f64, zenith: f64, dni_extra: f64) -> f64 {
    let cos_zenith = zenith.to_radians().cos().max(MIN_COS_ZENITH);
    let kt = ghi / (dni_extra * cos_zenith);
    kt.clamp(0.0, MAX_CLEARNESS_INDEX)
}

/// Erbs diffuse fraction `dhi / ghi` for a clearness index.
pub fn erbs_diffuse_fraction(kt: f64) -> f64 {
    if kt <= 0.22 {
        1.0 - 0.09 * kt
    } else if kt <= 0.8 {
        0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
    } else {
        0.165
    }
}

/// Decompose one GHI value.
///
/// With the sun at or below the horizon every component is exactly zero.
/// In the band just above the horizon DNI is zero and DHI carries all GHI.
/// Negative GHI reads as zero; NaN GHI yields NaN components.
pub fn erbs(ghi: f64, zenith: f64, day_of_year: u32) -> Components {
    if ghi.is_nan() || zenith.is_nan() {
        return Components {
            dni: f64::NAN,
            dhi: f64::NAN,
            kt: f64::NAN,
        };
    }
    if zenith >= 90.0 {
        return Components::default();
    }

    let ghi = ghi.max(0.0);
    let kt = clearness_index(ghi, zenith, extraterrestrial_irradiance(day_of_year));

    if zenith > MAX_ZENITH {
        return Components { dni: 0.0, dhi: ghi, kt };
    }

    let dhi = erbs_diffuse_fraction(kt) * ghi;
    let dni = ((ghi - dhi) / zenith.to_radians().cos()).max(0.0);
    Components { dni, dhi, kt }
}

/// Derives DNI, DHI and `kt` for a GHI series at one site.
///
/// The day of year for the extraterrestrial irradiance is taken on the
/// site's calendar, UTC unless [`in_zone`](Self::in_zone) says otherwise.
pub struct IrradianceDecomposer<'a> {
    solar: &'a dyn SolarPosition,
    latitude: f64,
    longitude: f64,
    tz: Tz,
}

impl<'a> IrradianceDecomposer<'a> {
    pub fn new(solar: &'a dyn SolarPosition, latitude: f64, longitude: f64) -> Self {
        Self {
            solar,
            latitude,
            longitude,
            tz: Tz::UTC,
        }
    }

    pub fn in_zone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    /// One decomposition per input sample, in input order.
    pub fn decompose(&self, series: &WeatherSeries) -> Result<Vec<Decomposition>, PipelineError> {
        let times = series.timestamps();
        let positions = aligned_positions(self.solar, &times, self.latitude, self.longitude)?;

        Ok(series
            .iter()
            .zip(positions)
            .map(|(sample, sun)| {
                let day = local_day_of_year(sample.timestamp, self.tz);
                let c = erbs(sample.ghi, sun.zenith, day);
                Decomposition {
                    timestamp: sample.timestamp,
                    dni: c.dni,
                    dhi: c.dhi,
                    kt: c.kt,
                }
            })
            .collect())
    }

    /// Decompose and merge the result onto `series`.
    pub fn apply(&self, series: &WeatherSeries) -> Result<WeatherSeries, PipelineError> {
        let decomposition = self.decompose(series)?;
        Ok(merge_components(series, &decomposition))
    }
}

/// Inner join of `series` with `components` on timestamp equality.
///
/// Samples without a matching decomposition are dropped.
pub fn merge_components(series: &WeatherSeries, components: &[Decomposition]) -> WeatherSeries {
    let by_time: HashMap<DateTime<Utc>, &Decomposition> =
        components.iter().map(|d| (d.timestamp, d)).collect();

    let merged: Vec<_> = series
        .iter()
        .filter_map(|s| {
            by_time
                .get(&s.timestamp)
                .map(|d| s.with_components(d.dni, d.dhi))
        })
        .collect();

    let dropped = series.len() - merged.len();
    if dropped > 0 {
        debug!(dropped, "samples without decomposition dropped");
    }
    WeatherSeries::from_samples(merged)
}
