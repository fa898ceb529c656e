use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};

use super::LossFactors;
use crate::devices::{InverterParameters, ModuleParameters};
use crate::error::ConfigError;

/// How the modules are mounted; selects the cell temperature coefficients.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MountingType {
    /// Free-standing rack, glass/polymer backsheet
    #[default]
    OpenRack,
    /// Mounted close to a roof, glass/glass
    CloseMount,
}

/// Angle-of-incidence modifier applied to the beam component.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AoiModel {
    /// Fresnel/Snell glass cover model
    #[default]
    Physical,
    /// No incidence-angle losses
    None,
}

/// One physical sub-array feeding one inverter.
///
/// Values are validated once by [`ArrayConfigBuilder::build`] and cannot be
/// changed afterwards. Device parameters are shared by reference: two arrays
/// using the same inverter type hold the same `Arc`.
#[derive(Debug, Clone)]
pub struct ArrayConfig {
    name: String,
    surface_tilt: f64,
    surface_azimuth: f64,
    albedo: f64,
    module: Arc<ModuleParameters>,
    inverter: Arc<InverterParameters>,
    modules_per_string: u32,
    strings_per_inverter: u32,
    mounting: MountingType,
    aoi_model: AoiModel,
    losses: LossFactors,
}

impl ArrayConfig {
    pub fn builder(name: impl Into<String>) -> ArrayConfigBuilder {
        ArrayConfigBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Degrees from horizontal (0 = facing up, 90 = facing the horizon)
    pub fn surface_tilt(&self) -> f64 {
        self.surface_tilt
    }

    /// Degrees clockwise from north (180 = south)
    pub fn surface_azimuth(&self) -> f64 {
        self.surface_azimuth
    }

    pub fn albedo(&self) -> f64 {
        self.albedo
    }

    pub fn module(&self) -> &Arc<ModuleParameters> {
        &self.module
    }

    pub fn inverter(&self) -> &Arc<InverterParameters> {
        &self.inverter
    }

    pub fn modules_per_string(&self) -> u32 {
        self.modules_per_string
    }

    pub fn strings_per_inverter(&self) -> u32 {
        self.strings_per_inverter
    }

    pub fn mounting(&self) -> MountingType {
        self.mounting
    }

    pub fn aoi_model(&self) -> AoiModel {
        self.aoi_model
    }

    pub fn losses(&self) -> &LossFactors {
        &self.losses
    }

    /// Total number of modules on this inverter
    pub fn module_count(&self) -> u32 {
        self.modules_per_string * self.strings_per_inverter
    }

    /// DC nameplate rating in W at standard test conditions
    pub fn nameplate_dc_w(&self) -> f64 {
        self.module.stc_w * self.module_count() as f64
    }
}

/// Validating builder for [`ArrayConfig`].
#[derive(Debug, Clone)]
pub struct ArrayConfigBuilder {
    name: String,
    surface_tilt: f64,
    surface_azimuth: f64,
    albedo: f64,
    module: Option<Arc<ModuleParameters>>,
    inverter: Option<Arc<InverterParameters>>,
    modules_per_string: u32,
    strings_per_inverter: u32,
    mounting: MountingType,
    aoi_model: AoiModel,
    losses: LossFactors,
}

impl ArrayConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surface_tilt: 0.0,
            surface_azimuth: 180.0,
            albedo: 0.25,
            module: None,
            inverter: None,
            modules_per_string: 1,
            strings_per_inverter: 1,
            mounting: MountingType::default(),
            aoi_model: AoiModel::default(),
            losses: LossFactors::none(),
        }
    }

    pub fn orientation(mut self, tilt_deg: f64, azimuth_deg: f64) -> Self {
        self.surface_tilt = tilt_deg;
        self.surface_azimuth = azimuth_deg;
        self
    }

    pub fn albedo(mut self, albedo: f64) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn module(mut self, module: Arc<ModuleParameters>) -> Self {
        self.module = Some(module);
        self
    }

    pub fn inverter(mut self, inverter: Arc<InverterParameters>) -> Self {
        self.inverter = Some(inverter);
        self
    }

    pub fn strings(mut self, modules_per_string: u32, strings_per_inverter: u32) -> Self {
        self.modules_per_string = modules_per_string;
        self.strings_per_inverter = strings_per_inverter;
        self
    }

    pub fn mounting(mut self, mounting: MountingType) -> Self {
        self.mounting = mounting;
        self
    }

    pub fn aoi_model(mut self, aoi_model: AoiModel) -> Self {
        self.aoi_model = aoi_model;
        self
    }

    pub fn losses(mut self, losses: LossFactors) -> Self {
        self.losses = losses;
        self
    }

    pub fn build(self) -> Result<ArrayConfig, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        check_range(&name, "surface_tilt", self.surface_tilt, 0.0, 180.0)?;
        check_range(&name, "surface_azimuth", self.surface_azimuth, 0.0, 360.0)?;
        check_range(&name, "albedo", self.albedo, 0.0, 1.0)?;

        if self.modules_per_string == 0 {
            return Err(ConfigError::NotPositive {
                array: name,
                field: "modules_per_string",
            });
        }
        if self.strings_per_inverter == 0 {
            return Err(ConfigError::NotPositive {
                array: name,
                field: "strings_per_inverter",
            });
        }

        let module = self.module.ok_or_else(|| ConfigError::Missing {
            array: name.clone(),
            field: "module parameters",
        })?;
        let inverter = self.inverter.ok_or_else(|| ConfigError::Missing {
            array: name.clone(),
            field: "inverter parameters",
        })?;

        Ok(ArrayConfig {
            name,
            surface_tilt: self.surface_tilt,
            surface_azimuth: self.surface_azimuth,
            albedo: self.albedo,
            module,
            inverter,
            modules_per_string: self.modules_per_string,
            strings_per_inverter: self.strings_per_inverter,
            mounting: self.mounting,
            aoi_model: self.aoi_model,
            losses: self.losses,
        })
    }
}

fn check_range(
    array: &str,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            array: array.to_string(),
            field,
            value,
            min,
            max,
        })
    }
}
