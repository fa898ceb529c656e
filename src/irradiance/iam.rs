use crate::domain::AoiModel;

/// Effective refractive index of the module cover
pub const GLASS_REFRACTIVE_INDEX: f64 = 1.526;
/// Glazing extinction coefficient in 1/m
pub const GLASS_EXTINCTION: f64 = 4.0;
/// Glazing thickness in m
pub const GLASS_THICKNESS: f64 = 0.002;

/// Incidence angle modifier for the beam component.
pub fn incidence_angle_modifier(model: AoiModel, aoi_deg: f64) -> f64 {
    match model {
        AoiModel::Physical => physical_iam(aoi_deg),
        AoiModel::None => 1.0,
    }
}

/// Transmission through a flat glass cover relative to normal incidence,
/// from Snell's and Bouguer's laws and the Fresnel equations.
///
/// Zero at and beyond grazing incidence.
pub fn physical_iam(aoi_deg: f64) -> f64 {
    if !aoi_deg.is_finite() || aoi_deg.abs() >= 90.0 {
        return 0.0;
    }

    let n = GLASS_REFRACTIVE_INDEX;
    let kl = GLASS_EXTINCTION * GLASS_THICKNESS;

    // the Fresnel terms are 0/0 at normal incidence
    let aoi_deg = if aoi_deg == 0.0 { 1e-6 } else { aoi_deg };
    let theta = aoi_deg.to_radians();
    let theta_r = (theta.sin() / n).asin();

    let reflection = 0.5
        * ((theta_r - theta).sin().powi(2) / (theta_r + theta).sin().powi(2)
            + (theta_r - theta).tan().powi(2) / (theta_r + theta).tan().powi(2));
    let tau = (-kl / theta_r.cos()).exp() * (1.0 - reflection);
    let tau_0 = (-kl).exp() * (1.0 - ((1.0 - n) / (1.0 + n)).powi(2));

    (tau / tau_0).max(0.0)
}
