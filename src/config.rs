use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use validator::Validate;

use crate::devices::catalogue;
use crate::domain::{AoiModel, ArrayConfig, LossCategory, LossFactors, MountingType};
use crate::error::{ConfigError, PipelineError};
use crate::irradiance::TranspositionModel;
use crate::simulation::FailurePolicy;
use crate::weather::{ColumnMapping, WeatherNormalizer};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "PVY_CONFIG";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub site: SiteConfig,
    #[serde(default)]
    #[validate(nested)]
    pub simulation: SimulationConfig,
    pub weather: Vec<WeatherSourceConfig>,
    #[serde(default)]
    pub report: ReportConfig,
    pub arrays: Vec<ArraySettings>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SiteConfig {
    pub name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Metres above sea level, for the sun position parallax
    #[serde(default)]
    #[validate(range(min = -500.0, max = 9000.0))]
    pub elevation: f64,
    /// IANA zone for naive timestamps and calendar months
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl SiteConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        parse_tz(&self.timezone)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SimulationConfig {
    #[validate(range(min = 1, max = 86400))]
    pub run_timeout_seconds: u64,
    pub failure_policy: FailurePolicy,
    pub transposition: TranspositionModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            run_timeout_seconds: 300,
            failure_policy: FailurePolicy::default(),
            transposition: TranspositionModel::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherSourceConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Overrides the site zone for this file's naive timestamps
    #[serde(default)]
    pub timezone: Option<String>,
    /// Keep only this local calendar year
    #[serde(default)]
    pub year: Option<i32>,
    pub columns: ColumnMapping,
}

impl WeatherSourceConfig {
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ConfigError::Delimiter(self.delimiter))
    }

    pub fn normalizer(&self, site_tz: Tz) -> Result<WeatherNormalizer, ConfigError> {
        let tz = match &self.timezone {
            Some(name) => parse_tz(name)?,
            None => site_tz,
        };
        Ok(WeatherNormalizer::new(
            self.name.clone(),
            self.delimiter_byte()?,
            self.columns.clone(),
            tz,
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub csv: bool,
    pub chart: bool,
    pub json: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            csv: true,
            chart: true,
            json: true,
        }
    }
}

/// One `[[arrays]]` entry; devices are referenced by catalogue key.
#[derive(Debug, Clone, Deserialize)]
pub struct ArraySettings {
    pub name: String,
    pub surface_tilt: f64,
    pub surface_azimuth: f64,
    #[serde(default = "default_albedo")]
    pub albedo: f64,
    pub module: String,
    pub inverter: String,
    pub modules_per_string: u32,
    pub strings_per_inverter: u32,
    #[serde(default)]
    pub mounting: MountingType,
    #[serde(default)]
    pub aoi_model: AoiModel,
    #[serde(default)]
    pub losses: BTreeMap<LossCategory, f64>,
}

impl ArraySettings {
    pub fn build(&self) -> Result<ArrayConfig, PipelineError> {
        let devices = catalogue();
        let array = ArrayConfig::builder(self.name.clone())
            .orientation(self.surface_tilt, self.surface_azimuth)
            .albedo(self.albedo)
            .module(devices.module(&self.module)?)
            .inverter(devices.inverter(&self.inverter)?)
            .strings(self.modules_per_string, self.strings_per_inverter)
            .mounting(self.mounting)
            .aoi_model(self.aoi_model)
            .losses(LossFactors::new(self.losses.clone())?)
            .build()?;
        Ok(array)
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_albedo() -> f64 {
    0.25
}

fn parse_tz(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::TimeZone(name.to_string()))
}

impl Config {
    /// Load from `PVY_CONFIG` (or `config/default.toml`) merged with
    /// `PVY__`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let figment = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PVY__").split("__"));
        let config: Config = figment
            .extract()
            .with_context(|| format!("loading configuration from {path}"))?;
        config.validate_all()?;
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = Figment::from(Toml::string(toml)).extract()?;
        config.validate_all()?;
        Ok(config)
    }

    /// Field ranges plus the checks that need the device catalogue.
    pub fn validate_all(&self) -> Result<(), PipelineError> {
        if self.weather.is_empty() {
            return Err(ConfigError::Empty("weather source").into());
        }
        if self.arrays.is_empty() {
            return Err(ConfigError::Empty("array").into());
        }
        self.validate().map_err(ConfigError::from)?;
        self.site.tz()?;
        for source in &self.weather {
            source.delimiter_byte()?;
        }
        self.build_arrays()?;
        Ok(())
    }

    pub fn build_arrays(&self) -> Result<Vec<ArrayConfig>, PipelineError> {
        let mut seen = HashSet::new();
        let mut arrays = Vec::with_capacity(self.arrays.len());
        for settings in &self.arrays {
            let array = settings.build()?;
            if !seen.insert(array.name().to_string()) {
                return Err(ConfigError::DuplicateName(array.name().to_string()).into());
            }
            arrays.push(array);
        }
        Ok(arrays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [site]
        name = "HTW Berlin"
        latitude = 52.45544
        longitude = 13.52481
        timezone = "Europe/Berlin"

        [[weather]]
        name = "htw"
        path = "data/weather_htw.csv"
        delimiter = ";"
        [weather.columns]
        time = "timestamp"
        ghi = "g_hor_si"
        wind_speed = "v_wind"
        temp_air = "t_luft"

        [[arrays]]
        name = "wr1"
        surface_tilt = 14.57
        surface_azimuth = 215.0
        module = "schott_asi_105"
        inverter = "danfoss_dlx_2_9"
        modules_per_string = 10
        strings_per_inverter = 3
        mounting = "close_mount"
        losses = { soiling = 2.0, lid = 1.5 }
    "#;

    #[test]
    fn test_minimal_config_with_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.simulation.run_timeout_seconds, 300);
        assert_eq!(config.simulation.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.simulation.transposition, TranspositionModel::Isotropic);
        assert!(config.report.csv && config.report.chart && config.report.json);
        assert_eq!(config.site.tz().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(config.site.elevation, 0.0);

        let arrays = config.build_arrays().unwrap();
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].module_count(), 30);
        assert_eq!(arrays[0].mounting(), MountingType::CloseMount);
        assert_eq!(arrays[0].losses().get(LossCategory::Lid), Some(1.5));
        assert_eq!(arrays[0].albedo(), 0.25);

        assert_eq!(config.weather[0].delimiter_byte().unwrap(), b';');
        assert!(!config.weather[0].columns.provides_components());
    }

    #[test]
    fn test_empty_sections_rejected() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.arrays.clear();
        let err = config.validate_all().unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: At least one array is required");

        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.weather.clear();
        let err = config.validate_all().unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::Empty("weather source"))));
    }

    #[test]
    fn test_bundled_installation() {
        let toml = include_str!("../config/default.toml");
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.site.elevation, 80.0);
        assert_eq!(config.weather.len(), 2);

        let arrays = config.build_arrays().unwrap();
        assert_eq!(arrays.len(), 5);
        for array in &arrays {
            assert_eq!(array.mounting(), MountingType::OpenRack, "{}", array.name());
            assert_eq!(array.albedo(), 0.2);
        }
    }

    #[test]
    fn test_latitude_out_of_range() {
        let toml = MINIMAL.replace("latitude = 52.45544", "latitude = 152.0");
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_unknown_device() {
        let toml = MINIMAL.replace("schott_asi_105", "mystery_panel");
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("mystery_panel"));
    }

    #[test]
    fn test_bad_timezone() {
        let toml = MINIMAL.replace("Europe/Berlin", "Mars/Olympus");
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn test_duplicate_array_names() {
        let second = MINIMAL
            .split("[[arrays]]")
            .nth(1)
            .map(|a| format!("[[arrays]]{a}"))
            .unwrap();
        let toml = format!("{MINIMAL}\n{second}");
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("Duplicate array name `wr1`"));
    }

    #[test]
    fn test_loss_out_of_range() {
        let toml = MINIMAL.replace("soiling = 2.0", "soiling = 200.0");
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_policy_and_transposition_parse() {
        let toml = format!(
            "{MINIMAL}\n[simulation]\nrun_timeout_seconds = 60\nfailure_policy = \"isolate\"\ntransposition = \"hay_davies\"\n"
        );
        let config = Config::from_toml_str(&toml).unwrap();
        assert_eq!(config.simulation.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.simulation.transposition, TranspositionModel::HayDavies);
    }

    #[test]
    fn test_multibyte_delimiter_rejected() {
        let toml = MINIMAL.replace(r#"delimiter = ";""#, r#"delimiter = "§""#);
        assert!(Config::from_toml_str(&toml).is_err());
    }
}
