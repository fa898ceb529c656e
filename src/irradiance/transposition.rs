use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::solar::SunPosition;

/// Sky diffuse model used to transpose DHI onto a tilted plane.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TranspositionModel {
    /// Uniform sky dome
    #[default]
    Isotropic,
    /// Circumsolar share weighted by the anisotropy index `dni / dni_extra`
    HayDavies,
}

/// Plane-of-array irradiance in W/m², split by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PoaComponents {
    pub direct: f64,
    pub sky_diffuse: f64,
    pub ground_diffuse: f64,
}

impl PoaComponents {
    pub fn diffuse(&self) -> f64 {
        self.sky_diffuse + self.ground_diffuse
    }

    pub fn global(&self) -> f64 {
        self.direct + self.diffuse()
    }
}

/// Plane orientation and the surroundings it sees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub tilt: f64,
    pub azimuth: f64,
    pub albedo: f64,
}

/// Cosine of the angle of incidence, clipped to `-1..=1`.
pub fn aoi_projection(surface_tilt: f64, surface_azimuth: f64, sun: SunPosition) -> f64 {
    let tilt = surface_tilt.to_radians();
    let zenith = sun.zenith.to_radians();
    let projection = tilt.cos() * zenith.cos()
        + tilt.sin() * zenith.sin() * (sun.azimuth - surface_azimuth).to_radians().cos();
    projection.clamp(-1.0, 1.0)
}

/// Angle of incidence in degrees.
pub fn aoi(surface_tilt: f64, surface_azimuth: f64, sun: SunPosition) -> f64 {
    aoi_projection(surface_tilt, surface_azimuth, sun).acos().to_degrees()
}

/// Ground-reflected irradiance on the plane, for an isotropically reflecting
/// foreground.
pub fn ground_diffuse(ghi: f64, albedo: f64, surface_tilt: f64) -> f64 {
    ghi * albedo * (1.0 - surface_tilt.to_radians().cos()) / 2.0
}

pub fn isotropic_sky_diffuse(dhi: f64, surface_tilt: f64) -> f64 {
    dhi * (1.0 + surface_tilt.to_radians().cos()) / 2.0
}

/// Hay–Davies sky diffuse: a circumsolar part projected like beam light and
/// an isotropic remainder.
pub fn hay_davies_sky_diffuse(
    dhi: f64,
    dni: f64,
    dni_extra: f64,
    surface_tilt: f64,
    projection: f64,
    zenith: f64,
) -> f64 {
    let anisotropy = if dni_extra > 0.0 { dni / dni_extra } else { 0.0 };
    let cos_zenith = zenith.to_radians().cos().max(89.0_f64.to_radians().cos());
    let rb = projection.max(0.0) / cos_zenith;

    let isotropic = (dhi * (1.0 - anisotropy) * (1.0 + surface_tilt.to_radians().cos()) / 2.0).max(0.0);
    let circumsolar = (dhi * anisotropy * rb).max(0.0);
    isotropic + circumsolar
}

/// POA components on `surface` for one timestamp, before incidence angle
/// losses.
pub fn plane_of_array(
    model: TranspositionModel,
    surface: Surface,
    sun: SunPosition,
    ghi: f64,
    dni: f64,
    dhi: f64,
    dni_extra: f64,
) -> PoaComponents {
    let projection = aoi_projection(surface.tilt, surface.azimuth, sun);
    let sky_diffuse = match model {
        TranspositionModel::Isotropic => isotropic_sky_diffuse(dhi, surface.tilt),
        TranspositionModel::HayDavies => {
            hay_davies_sky_diffuse(dhi, dni, dni_extra, surface.tilt, projection, sun.zenith)
        }
    };

    PoaComponents {
        direct: (dni * projection).max(0.0),
        sky_diffuse,
        ground_diffuse: ground_diffuse(ghi, surface.albedo, surface.tilt),
    }
}
