use serde::Serialize;

/// Fitted CEC single-diode parameters of one PV module type.
///
/// Values follow the California Energy Commission module database layout.
/// Records are created once by the device catalogue and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleParameters {
    pub name: &'static str,
    pub technology: &'static str,
    /// Rated power at STC in W
    pub stc_w: f64,
    /// Number of cells in series
    pub cells_in_series: u32,
    /// Short-circuit current at reference conditions in A
    pub i_sc_ref: f64,
    /// Open-circuit voltage at reference conditions in V
    pub v_oc_ref: f64,
    /// Current at the maximum power point in A
    pub i_mp_ref: f64,
    /// Voltage at the maximum power point in V
    pub v_mp_ref: f64,
    /// Temperature coefficient of short-circuit current in A/K
    pub alpha_sc: f64,
    /// Temperature coefficient of open-circuit voltage in V/K
    pub beta_oc: f64,
    /// Modified ideality factor `n · Ns · Vth` at reference conditions in V
    pub a_ref: f64,
    /// Light-generated current at reference conditions in A
    pub i_l_ref: f64,
    /// Diode saturation current at reference conditions in A
    pub i_o_ref: f64,
    /// Series resistance in Ω
    pub r_s: f64,
    /// Shunt resistance at reference conditions in Ω
    pub r_sh_ref: f64,
    /// Adjustment to `alpha_sc` in percent
    pub adjust: f64,
    /// Temperature coefficient of maximum power in %/K
    pub gamma_r: f64,
}

/// Sandia grid-connected inverter model coefficients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InverterParameters {
    pub name: &'static str,
    /// AC power rating in W
    pub paco: f64,
    /// DC power at which `paco` is reached, at `vdco`, in W
    pub pdco: f64,
    /// Nominal DC voltage in V
    pub vdco: f64,
    /// DC power needed to start the inversion process in W
    pub pso: f64,
    /// Curvature of the AC/DC power relation at `vdco` in 1/W
    pub c0: f64,
    /// Variation of `pdco` with DC voltage in 1/V
    pub c1: f64,
    /// Variation of `pso` with DC voltage in 1/V
    pub c2: f64,
    /// Variation of `c0` with DC voltage in 1/V
    pub c3: f64,
    /// Night tare: AC power drawn while not inverting, in W
    pub pnt: f64,
    /// Maximum DC voltage in V
    pub vdc_max: f64,
}
