//! # Solar Position
//!
//! Sun zenith and azimuth for a site, and the extraterrestrial irradiance the
//! decomposition models normalise against.
//!
//! [`SpaSolarPosition`] runs the NREL solar position algorithm through the
//! `solar-positioning` crate. Zenith is apparent: topocentric and corrected
//! for atmospheric refraction, so the horizon rules downstream see the sun
//! where it is observed.

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use solar_positioning::{spa, time::DeltaT, RefractionCorrection};
use std::f64::consts::PI;

use crate::error::PipelineError;

/// Solar constant in W/m²
pub const SOLAR_CONSTANT: f64 = 1367.0;

/// Sun position at one instant, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunPosition {
    /// Angle between the sun and the local vertical
    pub zenith: f64,
    /// Degrees clockwise from north
    pub azimuth: f64,
}

impl SunPosition {
    pub fn elevation(&self) -> f64 {
        90.0 - self.zenith
    }

    pub fn is_above_horizon(&self) -> bool {
        self.zenith < 90.0
    }
}

/// Sun position provider, treated as a black box by the pipeline.
///
/// Implementations must return exactly one position per timestamp, in the
/// same order.
#[cfg_attr(test, mockall::automock)]
pub trait SolarPosition: Send + Sync {
    fn positions(
        &self,
        times: &[DateTime<Utc>],
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<SunPosition>, PipelineError>;
}

/// Ask `provider` for positions and verify that they line up with `times`.
pub fn aligned_positions(
    provider: &dyn SolarPosition,
    times: &[DateTime<Utc>],
    latitude: f64,
    longitude: f64,
) -> Result<Vec<SunPosition>, PipelineError> {
    let positions = provider.positions(times, latitude, longitude)?;
    if positions.len() != times.len() {
        return Err(PipelineError::SolarPosition {
            expected: times.len(),
            actual: positions.len(),
        });
    }
    Ok(positions)
}

/// Standard sea-level pressure in hPa
pub const STANDARD_PRESSURE: f64 = 1013.25;
/// Annual mean air temperature assumed for refraction, in °C
pub const STANDARD_TEMPERATURE: f64 = 12.0;

/// Air state used for the refraction correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atmosphere {
    /// hPa
    pub pressure: f64,
    /// °C
    pub temperature: f64,
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self {
            pressure: STANDARD_PRESSURE,
            temperature: STANDARD_TEMPERATURE,
        }
    }
}

/// NREL SPA sun position with ΔT estimated per timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaSolarPosition {
    /// Site elevation above sea level in metres
    elevation: f64,
    /// `None` gives the geometric (unrefracted) zenith
    atmosphere: Option<Atmosphere>,
}

impl Default for SpaSolarPosition {
    fn default() -> Self {
        Self {
            elevation: 0.0,
            atmosphere: Some(Atmosphere::default()),
        }
    }
}

impl SpaSolarPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_atmosphere(mut self, atmosphere: Atmosphere) -> Self {
        self.atmosphere = Some(atmosphere);
        self
    }

    /// Skip the refraction correction.
    pub fn geometric(mut self) -> Self {
        self.atmosphere = None;
        self
    }

    fn refraction(&self, time: DateTime<Utc>) -> Result<Option<RefractionCorrection>, PipelineError> {
        self.atmosphere
            .map(|a| RefractionCorrection::new(a.pressure, a.temperature))
            .transpose()
            .map_err(|e| PipelineError::SunPosition {
                time,
                reason: e.to_string(),
            })
    }

    /// Position of the sun at a single instant
    pub fn position_at(
        &self,
        time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<SunPosition, PipelineError> {
        let refraction = self.refraction(time)?;
        self.compute(time, latitude, longitude, refraction)
    }

    fn compute(
        &self,
        time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        refraction: Option<RefractionCorrection>,
    ) -> Result<SunPosition, PipelineError> {
        let failed = |reason: String| PipelineError::SunPosition { time, reason };

        let delta_t = DeltaT::estimate_from_date(time.year(), time.month())
            .map_err(|e| failed(e.to_string()))?;
        let position =
            spa::solar_position(time, latitude, longitude, self.elevation, delta_t, refraction)
                .map_err(|e| failed(e.to_string()))?;

        Ok(SunPosition {
            zenith: position.zenith_angle(),
            azimuth: position.azimuth(),
        })
    }
}

impl SolarPosition for SpaSolarPosition {
    fn positions(
        &self,
        times: &[DateTime<Utc>],
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<SunPosition>, PipelineError> {
        let Some(first) = times.first() else {
            return Ok(Vec::new());
        };
        let refraction = self.refraction(*first)?;
        times
            .iter()
            .map(|t| self.compute(*t, latitude, longitude, refraction))
            .collect()
    }
}

/// Day of year of `time` on the calendar of `tz`.
pub fn local_day_of_year(time: DateTime<Utc>, tz: Tz) -> u32 {
    time.with_timezone(&tz).ordinal()
}

/// Extraterrestrial normal irradiance in W/m² for a day of year (Spencer 1971).
pub fn extraterrestrial_irradiance(day_of_year: u32) -> f64 {
    let b = 2.0 * PI * (day_of_year as f64 - 1.0) / 365.0;
    SOLAR_CONSTANT
        * (1.00011 + 0.034221 * b.cos() + 0.00128 * b.sin() + 0.000719 * (2.0 * b).cos()
            + 0.000077 * (2.0 * b).sin())
}
