use super::{
    cec_max_power_point, sandia_ac_power, sapm_cell_temperature, DcOutput, InverterParameters,
    ModuleParameters, SapmCoefficients,
};
use crate::domain::MountingType;
use crate::error::DeviceError;

/// Electrical models of one module and one inverter.
///
/// Every call is stateless and evaluated for a single timestamp. Zero or
/// negative irradiance is not a failure: it yields zero DC power, and the
/// inverter then reports its night tare.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceModel: Send + Sync {
    /// Cell temperature in °C.
    fn cell_temperature(
        &self,
        poa_global: f64,
        wind_speed: f64,
        temp_air: f64,
        mounting: MountingType,
    ) -> f64;

    /// Maximum power point of a single module.
    fn dc_power(
        &self,
        effective_irradiance: f64,
        temp_cell: f64,
        module: &ModuleParameters,
    ) -> Result<DcOutput, DeviceError>;

    /// AC output in W, never below `-pnt`.
    fn ac_power(
        &self,
        p_dc: f64,
        v_dc: f64,
        inverter: &InverterParameters,
    ) -> Result<f64, DeviceError>;
}

/// SAPM cell temperature, CEC single diode and Sandia inverter.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDeviceModel;

impl DeviceModel for StandardDeviceModel {
    fn cell_temperature(
        &self,
        poa_global: f64,
        wind_speed: f64,
        temp_air: f64,
        mounting: MountingType,
    ) -> f64 {
        sapm_cell_temperature(
            poa_global,
            wind_speed,
            temp_air,
            SapmCoefficients::for_mounting(mounting),
        )
    }

    fn dc_power(
        &self,
        effective_irradiance: f64,
        temp_cell: f64,
        module: &ModuleParameters,
    ) -> Result<DcOutput, DeviceError> {
        cec_max_power_point(module, effective_irradiance, temp_cell)
    }

    fn ac_power(
        &self,
        p_dc: f64,
        v_dc: f64,
        inverter: &InverterParameters,
    ) -> Result<f64, DeviceError> {
        sandia_ac_power(p_dc, v_dc, inverter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::catalogue;

    #[test]
    fn test_chain_through_trait_object() {
        let model: Box<dyn DeviceModel> = Box::new(StandardDeviceModel);
        let module = catalogue().module("aleo_s19_285").unwrap();
        let inverter = catalogue().inverter("danfoss_dlx_2_9").unwrap();

        let temp = model.cell_temperature(900.0, 1.5, 18.0, MountingType::CloseMount);
        let dc = model.dc_power(900.0, temp, &module).unwrap();
        // 11 modules in series on one string
        let ac = model
            .ac_power(dc.p_mp * 11.0, dc.v_mp * 11.0, &inverter)
            .unwrap();

        assert!(temp > 18.0);
        assert!(dc.p_mp > 180.0 && dc.p_mp < 285.0);
        assert!(ac > 0.9 * dc.p_mp * 11.0 && ac < dc.p_mp * 11.0);
    }

    #[test]
    fn test_darkness_is_not_a_failure() {
        let model = StandardDeviceModel;
        let module = catalogue().module("schott_asi_105").unwrap();
        let inverter = catalogue().inverter("sma_sb_3000hf_30").unwrap();

        let dc = model.dc_power(0.0, 5.0, &module).unwrap();
        assert_eq!(dc.p_mp, 0.0);
        let ac = model.ac_power(dc.p_mp, dc.v_mp, &inverter).unwrap();
        assert_eq!(ac, -inverter.pnt);
    }
}
