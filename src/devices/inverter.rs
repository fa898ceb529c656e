use super::InverterParameters;
use crate::error::DeviceError;

/// AC output of a Sandia grid-connected inverter in W.
///
/// Below the self-consumption threshold `pso` the inverter is not inverting
/// and draws the night tare, reported as `-pnt`. Output is clipped to the AC
/// rating `paco`.
pub fn sandia_ac_power(
    p_dc: f64,
    v_dc: f64,
    inverter: &InverterParameters,
) -> Result<f64, DeviceError> {
    if !(inverter.paco > 0.0) || !(inverter.pdco > inverter.pso) {
        return Err(DeviceError::InvalidInverter {
            name: inverter.name.to_string(),
            reason: "paco must be positive and pdco must exceed pso".to_string(),
        });
    }

    let night_tare = -inverter.pnt.abs();
    if !(p_dc >= inverter.pso) {
        return Ok(night_tare);
    }

    let dv = v_dc - inverter.vdco;
    let a = inverter.pdco * (1.0 + inverter.c1 * dv);
    let b = inverter.pso * (1.0 + inverter.c2 * dv);
    let c = inverter.c0 * (1.0 + inverter.c3 * dv);

    let p_ac = (inverter.paco / (a - b) - c * (a - b)) * (p_dc - b) + c * (p_dc - b).powi(2);
    if !p_ac.is_finite() {
        return Err(DeviceError::NonFinite { quantity: "ac power" });
    }

    Ok(p_ac.clamp(night_tare, inverter.paco))
}
