//! # Yield Simulation
//!
//! Runs one array over a prepared weather series. The simulator is a small
//! state machine that walks the whole series through one stage at a time:
//!
//! ```text
//! Init -> PlaneOfArray -> Temperature -> Dc -> Ac -> Losses -> Done
//! ```
//!
//! A timestamp with a missing weather value yields NaN in every later stage
//! without affecting its neighbours.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use strum::Display;
use tracing::{debug, info};

use crate::devices::{DcOutput, DeviceModel};
use crate::domain::ArrayConfig;
use crate::error::{DeviceError, PipelineError};
use crate::irradiance::{
    aoi, incidence_angle_modifier, plane_of_array, PoaComponents, Surface, TranspositionModel,
};
use crate::solar::{
    aligned_positions, extraterrestrial_irradiance, local_day_of_year, SolarPosition, SunPosition,
};
use crate::weather::{WeatherSample, WeatherSeries};

/// Stage of a [`YieldSimulator`], in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    PlaneOfArray,
    Temperature,
    Dc,
    Ac,
    Losses,
    Done,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::Init => Stage::PlaneOfArray,
            Stage::PlaneOfArray => Stage::Temperature,
            Stage::Temperature => Stage::Dc,
            Stage::Dc => Stage::Ac,
            Stage::Ac => Stage::Losses,
            Stage::Losses | Stage::Done => Stage::Done,
        }
    }
}

/// Weather and sun positions shared read-only by every array of a run.
#[derive(Debug, Clone)]
pub struct SimulationInput {
    weather: WeatherSeries,
    sun: Vec<SunPosition>,
    dni_extra: Vec<f64>,
    transposition: TranspositionModel,
}

impl SimulationInput {
    /// Pair an hourly series with externally computed sun positions.
    pub fn new(
        weather: WeatherSeries,
        sun: Vec<SunPosition>,
        transposition: TranspositionModel,
    ) -> Result<Self, PipelineError> {
        Self::with_calendar(weather, sun, transposition, Tz::UTC)
    }

    /// Like [`new`](Self::new), with days of year counted in `tz`.
    pub fn with_calendar(
        weather: WeatherSeries,
        sun: Vec<SunPosition>,
        transposition: TranspositionModel,
        tz: Tz,
    ) -> Result<Self, PipelineError> {
        if sun.len() != weather.len() {
            return Err(PipelineError::SolarPosition {
                expected: weather.len(),
                actual: sun.len(),
            });
        }
        let dni_extra = weather
            .iter()
            .map(|s| extraterrestrial_irradiance(local_day_of_year(s.timestamp, tz)))
            .collect();
        Ok(Self {
            weather,
            sun,
            dni_extra,
            transposition,
        })
    }

    /// Sun positions for an hourly series, taken at the middle of each hour.
    pub fn prepare(
        weather: WeatherSeries,
        solar: &dyn SolarPosition,
        latitude: f64,
        longitude: f64,
        transposition: TranspositionModel,
        tz: Tz,
    ) -> Result<Self, PipelineError> {
        let midpoints: Vec<DateTime<Utc>> = weather
            .iter()
            .map(|s| s.timestamp + TimeDelta::minutes(30))
            .collect();
        let sun = aligned_positions(solar, &midpoints, latitude, longitude)?;
        Self::with_calendar(weather, sun, transposition, tz)
    }

    pub fn weather(&self) -> &WeatherSeries {
        &self.weather
    }

    pub fn sun(&self) -> &[SunPosition] {
        &self.sun
    }

    pub fn transposition(&self) -> TranspositionModel {
        self.transposition
    }

    pub fn len(&self) -> usize {
        self.weather.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weather.is_empty()
    }

    /// Apply `f` to every timestamp with its sample, sun position and
    /// extraterrestrial irradiance.
    pub fn map_aligned<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&WeatherSample, SunPosition, f64) -> T,
    {
        self.weather
            .iter()
            .zip(&self.sun)
            .zip(&self.dni_extra)
            .map(|((sample, sun), dni_extra)| f(sample, *sun, *dni_extra))
            .collect()
    }
}

/// AC output of one array, aligned with the input timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub array_name: String,
    pub timestamps: Vec<DateTime<Utc>>,
    /// AC power in W after losses
    pub ac_power: Vec<f64>,
}

impl SimulationResult {
    pub fn len(&self) -> usize {
        self.ac_power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ac_power.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.ac_power.iter().copied())
    }

    /// Sum of hourly AC power in kWh; NaN when any hour is NaN.
    pub fn energy_kwh(&self) -> f64 {
        self.ac_power.iter().sum::<f64>() / 1000.0
    }
}

/// Array-level DC operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ArrayDc {
    voltage: f64,
    power: f64,
}

impl ArrayDc {
    const MISSING: ArrayDc = ArrayDc {
        voltage: f64::NAN,
        power: f64::NAN,
    };
}

/// Per-array simulation state machine.
pub struct YieldSimulator<'a> {
    array: &'a ArrayConfig,
    device: &'a dyn DeviceModel,
    input: &'a SimulationInput,
    stage: Stage,
    poa: Vec<PoaComponents>,
    effective_irradiance: Vec<f64>,
    temp_cell: Vec<f64>,
    dc: Vec<ArrayDc>,
    ac: Vec<f64>,
}

impl<'a> YieldSimulator<'a> {
    pub fn new(array: &'a ArrayConfig, device: &'a dyn DeviceModel, input: &'a SimulationInput) -> Self {
        Self {
            array,
            device,
            input,
            stage: Stage::Init,
            poa: Vec::new(),
            effective_irradiance: Vec::new(),
            temp_cell: Vec::new(),
            dc: Vec::new(),
            ac: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Execute the current stage and move to the next one.
    pub fn step(&mut self) -> Result<Stage, DeviceError> {
        match self.stage {
            Stage::Init => {
                debug!(array = %self.array.name(), samples = self.input.len(), "simulation started");
            }
            Stage::PlaneOfArray => self.plane_of_array(),
            Stage::Temperature => self.temperature(),
            Stage::Dc => self.dc_power()?,
            Stage::Ac => self.ac_power()?,
            Stage::Losses => self.losses(),
            Stage::Done => return Ok(Stage::Done),
        }
        self.stage = self.stage.next();
        Ok(self.stage)
    }

    /// Run every remaining stage.
    pub fn run(mut self) -> Result<SimulationResult, DeviceError> {
        while self.stage != Stage::Done {
            self.step()?;
        }
        let result = SimulationResult {
            array_name: self.array.name().to_string(),
            timestamps: self.input.weather().timestamps(),
            ac_power: self.ac,
        };
        info!(
            array = %result.array_name,
            samples = result.len(),
            energy_kwh = result.energy_kwh(),
            "array simulated"
        );
        Ok(result)
    }

    fn plane_of_array(&mut self) {
        let surface = Surface {
            tilt: self.array.surface_tilt(),
            azimuth: self.array.surface_azimuth(),
            albedo: self.array.albedo(),
        };
        let transposition = self.input.transposition();
        let aoi_model = self.array.aoi_model();

        let (poa, effective): (Vec<_>, Vec<_>) = self
            .input
            .map_aligned(|sample, sun, dni_extra| {
                let inputs = [sample.ghi, sample.dni, sample.dhi];
                if inputs.iter().any(|v| !v.is_finite()) {
                    let missing = PoaComponents {
                        direct: f64::NAN,
                        sky_diffuse: f64::NAN,
                        ground_diffuse: f64::NAN,
                    };
                    return (missing, f64::NAN);
                }
                let poa = plane_of_array(
                    transposition,
                    surface,
                    sun,
                    sample.ghi,
                    sample.dni,
                    sample.dhi,
                    dni_extra,
                );
                let iam = incidence_angle_modifier(aoi_model, aoi(surface.tilt, surface.azimuth, sun));
                (poa, poa.direct * iam + poa.diffuse())
            })
            .into_iter()
            .unzip();

        self.poa = poa;
        self.effective_irradiance = effective;
    }

    fn temperature(&mut self) {
        let mounting = self.array.mounting();
        self.temp_cell = self
            .poa
            .iter()
            .zip(self.input.weather().iter())
            .map(|(poa, sample)| {
                let global = poa.global();
                if [global, sample.wind_speed, sample.temp_air]
                    .iter()
                    .all(|v| v.is_finite())
                {
                    self.device
                        .cell_temperature(global, sample.wind_speed, sample.temp_air, mounting)
                } else {
                    f64::NAN
                }
            })
            .collect();
    }

    fn dc_power(&mut self) -> Result<(), DeviceError> {
        let module = self.array.module();
        let series = self.array.modules_per_string() as f64;
        let parallel = self.array.strings_per_inverter() as f64;

        let mut dc = Vec::with_capacity(self.temp_cell.len());
        for (&effective, &temp_cell) in self.effective_irradiance.iter().zip(&self.temp_cell) {
            if !effective.is_finite() || !temp_cell.is_finite() {
                dc.push(ArrayDc::MISSING);
                continue;
            }
            let DcOutput { v_mp, i_mp, .. } = self.device.dc_power(effective, temp_cell, module)?;
            let voltage = v_mp * series;
            dc.push(ArrayDc {
                voltage,
                power: voltage * i_mp * parallel,
            });
        }
        self.dc = dc;
        Ok(())
    }

    fn ac_power(&mut self) -> Result<(), DeviceError> {
        let inverter = self.array.inverter();
        let mut ac = Vec::with_capacity(self.dc.len());
        for dc in &self.dc {
            if !dc.power.is_finite() {
                ac.push(f64::NAN);
                continue;
            }
            ac.push(self.device.ac_power(dc.power, dc.voltage, inverter)?);
        }
        self.ac = ac;
        Ok(())
    }

    fn losses(&mut self) {
        let derate = self.array.losses().combined_derate();
        for p in &mut self.ac {
            *p *= derate;
        }
    }
}
