//! Static table of the installation's fitted device parameters.
//!
//! The records are data, not logic: they are built once on first access and
//! shared read-only for the rest of the process.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{InverterParameters, ModuleParameters};
use crate::error::PipelineError;

static CATALOGUE: Lazy<DeviceCatalogue> = Lazy::new(DeviceCatalogue::builtin);

/// Process-wide device catalogue.
pub fn catalogue() -> &'static DeviceCatalogue {
    &CATALOGUE
}

/// Module and inverter records keyed by a short identifier.
#[derive(Debug)]
pub struct DeviceCatalogue {
    modules: BTreeMap<&'static str, Arc<ModuleParameters>>,
    inverters: BTreeMap<&'static str, Arc<InverterParameters>>,
}

impl DeviceCatalogue {
    fn builtin() -> Self {
        let modules = [
            (
                "schott_asi_105",
                ModuleParameters {
                    name: "Schott ASI 105",
                    technology: "Thin Film a-Si",
                    stc_w: 105.0,
                    cells_in_series: 72,
                    i_sc_ref: 4.05,
                    v_oc_ref: 41.1,
                    i_mp_ref: 3.44,
                    v_mp_ref: 30.5,
                    alpha_sc: 0.00324,
                    beta_oc: -0.136,
                    a_ref: 3.32981,
                    i_l_ref: 4.07725,
                    i_o_ref: 1.6343e-05,
                    r_s: 0.84,
                    r_sh_ref: 125.0,
                    adjust: 9.0,
                    gamma_r: -0.2,
                },
            ),
            (
                "aleo_s19_285",
                ModuleParameters {
                    name: "Aleo Solar S19 285",
                    technology: "Mono-c-Si",
                    stc_w: 285.0,
                    cells_in_series: 60,
                    i_sc_ref: 9.51,
                    v_oc_ref: 39.4,
                    i_mp_ref: 9.02,
                    v_mp_ref: 31.6,
                    alpha_sc: 0.0038,
                    beta_oc: -0.114,
                    a_ref: 1.69574,
                    i_l_ref: 9.51747,
                    i_o_ref: 7.6321e-10,
                    r_s: 0.275,
                    r_sh_ref: 350.0,
                    adjust: 5.0,
                    gamma_r: -0.41,
                },
            ),
            (
                "aleo_s18_240",
                ModuleParameters {
                    name: "Aleo Solar S18 240",
                    technology: "Multi-c-Si",
                    stc_w: 240.0,
                    cells_in_series: 60,
                    i_sc_ref: 8.65,
                    v_oc_ref: 37.0,
                    i_mp_ref: 8.13,
                    v_mp_ref: 29.5,
                    alpha_sc: 0.00346,
                    beta_oc: -0.126,
                    a_ref: 1.69574,
                    i_l_ref: 8.65865,
                    i_o_ref: 2.8521e-09,
                    r_s: 0.3,
                    r_sh_ref: 300.0,
                    adjust: 5.0,
                    gamma_r: -0.46,
                },
            ),
            (
                "aleo_s19_245",
                ModuleParameters {
                    name: "Aleo Solar S19 245",
                    technology: "Mono-c-Si",
                    stc_w: 245.0,
                    cells_in_series: 60,
                    i_sc_ref: 8.48,
                    v_oc_ref: 37.1,
                    i_mp_ref: 7.84,
                    v_mp_ref: 31.3,
                    alpha_sc: 0.00254,
                    beta_oc: -0.126,
                    a_ref: 1.69574,
                    i_l_ref: 8.48387,
                    i_o_ref: 2.6382e-09,
                    r_s: 0.155,
                    r_sh_ref: 340.0,
                    adjust: 12.272744,
                    gamma_r: -0.48,
                },
            ),
        ];

        // Sandia coefficients fitted to the manufacturers' efficiency curves
        // at minimum, nominal and maximum MPP voltage.
        let inverters = [
            (
                "danfoss_dlx_2_9",
                InverterParameters {
                    name: "Danfoss DLX 2.9",
                    paco: 2900.0,
                    pdco: 3012.8947,
                    vdco: 350.0,
                    pso: 3.4289,
                    c0: -1.340043e-06,
                    c1: 5.395287e-06,
                    c2: -1.056775e-04,
                    c3: -1.145701e-04,
                    pnt: 1.0,
                    vdc_max: 480.0,
                },
            ),
            (
                "sma_sb_3000hf_30",
                InverterParameters {
                    name: "SMA Sunny Boy 3000HF-30",
                    paco: 3000.0,
                    pdco: 3143.9091,
                    vdco: 530.0,
                    pso: 3.7817,
                    c0: -4.319860e-06,
                    c1: -7.553794e-05,
                    c2: -2.233039e-04,
                    c3: -4.304191e-03,
                    pnt: 1.0,
                    vdc_max: 560.0,
                },
            ),
        ];

        Self {
            modules: modules.into_iter().map(|(k, m)| (k, Arc::new(m))).collect(),
            inverters: inverters.into_iter().map(|(k, i)| (k, Arc::new(i))).collect(),
        }
    }

    /// Shared handle to a module record.
    pub fn module(&self, key: &str) -> Result<Arc<ModuleParameters>, PipelineError> {
        self.modules
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownDevice(key.to_string()))
    }

    /// Shared handle to an inverter record.
    pub fn inverter(&self, key: &str) -> Result<Arc<InverterParameters>, PipelineError> {
        self.inverters
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownDevice(key.to_string()))
    }

    pub fn module_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modules.keys().copied()
    }

    pub fn inverter_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inverters.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_shared_record() {
        let a = catalogue().inverter("danfoss_dlx_2_9").unwrap();
        let b = catalogue().inverter("danfoss_dlx_2_9").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.paco, 2900.0);
    }

    #[test]
    fn test_unknown_device() {
        let err = catalogue().module("no_such_module").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownDevice(key) if key == "no_such_module"));
    }

    #[test]
    fn test_catalogue_contents() {
        assert_eq!(catalogue().module_keys().count(), 4);
        assert_eq!(catalogue().inverter_keys().count(), 2);
        for key in catalogue().module_keys() {
            let module = catalogue().module(key).unwrap();
            assert!(module.i_o_ref > 0.0, "{key} needs a positive saturation current");
            assert!(module.i_mp_ref * module.v_mp_ref <= module.i_sc_ref * module.v_oc_ref);
        }
    }
}
