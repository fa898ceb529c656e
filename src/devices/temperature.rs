use crate::domain::MountingType;

/// Sandia Array Performance Model temperature coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SapmCoefficients {
    /// Upper limit of module temperature at low wind and high irradiance
    pub a: f64,
    /// Rate at which module temperature drops as wind speed increases
    pub b: f64,
    /// Difference between cell and module back surface at 1000 W/m² in K
    pub delta_t: f64,
}

impl SapmCoefficients {
    pub fn for_mounting(mounting: MountingType) -> Self {
        match mounting {
            // glass/polymer, open rack
            MountingType::OpenRack => Self {
                a: -3.56,
                b: -0.075,
                delta_t: 3.0,
            },
            // glass/glass, close roof mount
            MountingType::CloseMount => Self {
                a: -2.98,
                b: -0.0471,
                delta_t: 1.0,
            },
        }
    }
}

/// Cell temperature in °C.
///
/// Negative irradiance is read as zero and a negative wind speed as calm air,
/// so the result never drops below `temp_air`.
pub fn sapm_cell_temperature(
    poa_global: f64,
    wind_speed: f64,
    temp_air: f64,
    coefficients: SapmCoefficients,
) -> f64 {
    let irradiance = poa_global.max(0.0);
    let wind = wind_speed.max(0.0);
    let module = irradiance * (coefficients.a + coefficients.b * wind).exp() + temp_air;
    module + irradiance / 1000.0 * coefficients.delta_t
}
