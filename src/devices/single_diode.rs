//! CEC single-diode module model.
//!
//! The five diode parameters are translated from reference conditions to the
//! operating point, then the maximum power point is located on the IV curve.
//! The curve is walked in terms of the diode voltage `Vd = V + I·Rs`, which
//! turns the implicit diode equation into an explicit one:
//!
//! ```text
//! I(Vd) = IL - I0·(exp(Vd / nNsVth) - 1) - Vd / Rsh
//! V(Vd) = Vd - I(Vd)·Rs
//! ```

use super::ModuleParameters;
use crate::error::DeviceError;

/// Band gap of silicon at reference conditions in eV
const EG_REF: f64 = 1.121;
/// Temperature dependence of the band gap in 1/K
const D_EG_DT: f64 = -0.0002677;
/// Boltzmann constant in eV/K
const BOLTZMANN_EV: f64 = 8.617332478e-05;
const T_REF_K: f64 = 298.15;
const IRRAD_REF: f64 = 1000.0;

const BISECTION_ITERS: usize = 100;
const GOLDEN_ITERS: usize = 80;
const TOLERANCE_V: f64 = 1e-9;

/// Maximum power point of one module.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DcOutput {
    pub v_mp: f64,
    pub i_mp: f64,
    pub p_mp: f64,
}

/// Diode parameters translated to one operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeParameters {
    pub photocurrent: f64,
    pub saturation_current: f64,
    pub resistance_series: f64,
    pub resistance_shunt: f64,
    pub n_ns_vth: f64,
}

impl DiodeParameters {
    /// Translate reference parameters to `effective_irradiance` (W/m²) and
    /// `temp_cell` (°C). Returns `None` when there is no light.
    pub fn at_conditions(
        module: &ModuleParameters,
        effective_irradiance: f64,
        temp_cell: f64,
    ) -> Result<Option<Self>, DeviceError> {
        validate(module)?;
        if !(effective_irradiance > 0.0) {
            return Ok(None);
        }

        let tcell_k = temp_cell + 273.15;
        let dt = tcell_k - T_REF_K;
        let alpha_sc = module.alpha_sc * (1.0 - module.adjust / 100.0);

        let photocurrent =
            effective_irradiance / IRRAD_REF * (module.i_l_ref + alpha_sc * dt);
        let band_gap = EG_REF * (1.0 + D_EG_DT * dt);
        let saturation_current = module.i_o_ref
            * (tcell_k / T_REF_K).powi(3)
            * (EG_REF / (BOLTZMANN_EV * T_REF_K) - band_gap / (BOLTZMANN_EV * tcell_k)).exp();

        Ok(Some(Self {
            photocurrent,
            saturation_current,
            resistance_series: module.r_s,
            resistance_shunt: module.r_sh_ref * IRRAD_REF / effective_irradiance,
            n_ns_vth: module.a_ref * tcell_k / T_REF_K,
        }))
    }

    fn current(&self, v_diode: f64) -> f64 {
        self.photocurrent
            - self.saturation_current * (v_diode / self.n_ns_vth).exp_m1()
            - v_diode / self.resistance_shunt
    }

    fn point(&self, v_diode: f64) -> DcOutput {
        let i = self.current(v_diode);
        let v = v_diode - i * self.resistance_series;
        DcOutput {
            v_mp: v,
            i_mp: i,
            p_mp: v * i,
        }
    }

    /// Diode voltage at open circuit, where the terminal current is zero.
    fn open_circuit_diode_voltage(&self) -> f64 {
        let mut lo = 0.0;
        let mut hi = self.n_ns_vth * (self.photocurrent / self.saturation_current).ln_1p();
        for _ in 0..BISECTION_ITERS {
            let mid = 0.5 * (lo + hi);
            if self.current(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < TOLERANCE_V {
                break;
            }
        }
        0.5 * (lo + hi)
    }

    /// Maximum power point by golden-section search between short and open
    /// circuit.
    pub fn max_power_point(&self) -> DcOutput {
        if !(self.photocurrent > 0.0) {
            return DcOutput::default();
        }

        let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
        let mut a = 0.0;
        let mut b = self.open_circuit_diode_voltage();
        let mut c = b - inv_phi * (b - a);
        let mut d = a + inv_phi * (b - a);
        let mut fc = self.point(c).p_mp;
        let mut fd = self.point(d).p_mp;

        for _ in 0..GOLDEN_ITERS {
            if (b - a).abs() < TOLERANCE_V {
                break;
            }
            if fc > fd {
                b = d;
                d = c;
                fd = fc;
                c = b - inv_phi * (b - a);
                fc = self.point(c).p_mp;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + inv_phi * (b - a);
                fd = self.point(d).p_mp;
            }
        }

        let mpp = self.point(0.5 * (a + b));
        if mpp.p_mp > 0.0 {
            mpp
        } else {
            DcOutput::default()
        }
    }
}

fn validate(module: &ModuleParameters) -> Result<(), DeviceError> {
    let reason = if !(module.a_ref > 0.0) {
        Some("a_ref must be positive")
    } else if !(module.i_o_ref > 0.0) {
        Some("saturation current must be positive")
    } else if !(module.r_sh_ref > 0.0) {
        Some("shunt resistance must be positive")
    } else if !(module.r_s >= 0.0) {
        Some("series resistance must not be negative")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DeviceError::InvalidModule {
            name: module.name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Maximum power point of one module at the given operating conditions.
pub fn cec_max_power_point(
    module: &ModuleParameters,
    effective_irradiance: f64,
    temp_cell: f64,
) -> Result<DcOutput, DeviceError> {
    let output = match DiodeParameters::at_conditions(module, effective_irradiance, temp_cell)? {
        Some(params) => params.max_power_point(),
        None => DcOutput::default(),
    };
    if !output.p_mp.is_finite() {
        return Err(DeviceError::NonFinite { quantity: "dc power" });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::catalogue;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case("schott_asi_105")]
    #[case("aleo_s19_285")]
    #[case("aleo_s18_240")]
    #[case("aleo_s19_245")]
    fn test_stc_power_matches_datasheet(#[case] key: &str) {
        let module = catalogue().module(key).unwrap();
        let mpp = cec_max_power_point(&module, 1000.0, 25.0).unwrap();

        assert_relative_eq!(mpp.p_mp, module.stc_w, max_relative = 0.01);
        assert_relative_eq!(mpp.v_mp, module.v_mp_ref, max_relative = 0.03);
        assert_relative_eq!(mpp.p_mp, mpp.v_mp * mpp.i_mp, epsilon = 1e-9);
    }

    #[test]
    fn test_hot_cells_lose_power() {
        let module = catalogue().module("aleo_s19_285").unwrap();
        let cool = cec_max_power_point(&module, 1000.0, 25.0).unwrap();
        let hot = cec_max_power_point(&module, 1000.0, 60.0).unwrap();
        assert!(hot.p_mp < cool.p_mp);
        assert!(hot.v_mp < cool.v_mp);
    }

    #[test]
    fn test_power_scales_with_irradiance() {
        let module = catalogue().module("aleo_s18_240").unwrap();
        let low = cec_max_power_point(&module, 200.0, 25.0).unwrap();
        let high = cec_max_power_point(&module, 800.0, 25.0).unwrap();
        assert!(low.p_mp > 0.0);
        assert!(high.p_mp > 3.0 * low.p_mp);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-15.0)]
    fn test_no_light_gives_zero(#[case] irradiance: f64) {
        let module = catalogue().module("schott_asi_105").unwrap();
        let mpp = cec_max_power_point(&module, irradiance, 10.0).unwrap();
        assert_eq!(mpp, DcOutput::default());
    }

    #[test]
    fn test_degenerate_parameters_rejected() {
        let mut module = (*catalogue().module("aleo_s19_285").unwrap()).clone();
        module.i_o_ref = 0.0;
        let err = cec_max_power_point(&module, 1000.0, 25.0).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidModule { .. }));
    }
}
