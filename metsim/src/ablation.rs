//! Simulator contract and a reference single-body ablation model
//!
//! Anything that maps [`SimulationConstants`] to a [`SimulationRun`] can back
//! the batch pipeline through [`AblationModel`]. [`SingleBodyModel`] is the
//! reference implementation used by the binaries: classical drag and
//! ablation of one body, plus a mass-loss term for erosion below the onset
//! height, integrated with fourth order Runge-Kutta.

use serde::{Deserialize, Serialize};

use crate::atmosphere::AtmosphereDensity;
use crate::sims::run::SimulationRun;

/// Step size, start and stop conditions of the integrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Time step (s)
    pub dt: f64,
    /// Hard limit on simulated time (s)
    pub total_time: f64,
    /// Starting height (m)
    pub h_init: f64,
    /// Stop once the mass drops to this (kg)
    pub m_kill: f64,
    /// Stop once the velocity drops to this (m/s)
    pub v_kill: f64,
    /// Stop once the height drops to this (m)
    pub h_kill: f64,
    /// Luminous efficiency (fraction of kinetic energy loss radiated)
    pub lum_eff: f64,
    /// Shape factor A
    pub shape_factor: f64,
    /// Drag coefficient Gamma
    pub gamma: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            dt: 0.005,
            total_time: 100.0,
            h_init: 180_000.0,
            m_kill: 1e-14,
            v_kill: 3000.0,
            h_kill: 60_000.0,
            lum_eff: 0.007,
            shape_factor: 1.21,
            gamma: 1.0,
        }
    }
}

/// Full configuration of one simulator invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConstants {
    pub m_init: f64,
    pub v_init: f64,
    pub zenith_angle: f64,
    pub rho: f64,
    pub sigma: f64,

    pub erosion_on: bool,
    pub erosion_height_start: f64,
    pub erosion_coeff: f64,
    /// Height below which `erosion_coeff_change` replaces `erosion_coeff` (0 = never)
    pub erosion_height_change: f64,
    pub erosion_coeff_change: f64,
    pub erosion_mass_index: f64,
    pub erosion_mass_min: f64,
    pub erosion_mass_max: f64,

    pub atmosphere: AtmosphereDensity,
    /// Power of a zero magnitude meteor (W)
    pub p_0m: f64,
    pub integration: IntegrationSettings,
}

impl SimulationConstants {
    /// Turn erosion off entirely
    pub fn disable_erosion(&mut self) {
        self.erosion_on = false;
        self.erosion_coeff = 0.0;
        self.erosion_height_start = 0.0;
        self.erosion_height_change = 0.0;
        self.erosion_coeff_change = 0.0;
    }

    /// Erosion coefficient in effect at `height`
    pub fn erosion_coeff_at(&self, height: f64) -> f64 {
        if !self.erosion_on || height > self.erosion_height_start {
            0.0
        } else if self.erosion_height_change > 0.0 && height < self.erosion_height_change {
            self.erosion_coeff_change
        } else {
            self.erosion_coeff
        }
    }
}

/// Simulator contract: one configuration in, one time series out
///
/// Implementations must be pure functions of the constants so that runs can
/// be spread over worker threads.
pub trait AblationModel: Send + Sync {
    fn simulate(&self, constants: &SimulationConstants) -> SimulationRun;
}

#[derive(Debug, Clone, Copy)]
struct BodyState {
    v: f64,
    m: f64,
    h: f64,
    l: f64,
}

#[derive(Debug, Clone, Copy)]
struct Rates {
    dv: f64,
    dm_ablation: f64,
    dm_erosion: f64,
    dh: f64,
    dl: f64,
}

impl BodyState {
    fn advanced(&self, rates: &Rates, dt: f64) -> Self {
        Self {
            v: self.v + rates.dv * dt,
            m: self.m + (rates.dm_ablation + rates.dm_erosion) * dt,
            h: self.h + rates.dh * dt,
            l: self.l + rates.dl * dt,
        }
    }
}

/// Single-body ablation with an erosion mass-loss term
///
/// Eroded grains are assumed to ablate on the spot, so their mass loss
/// contributes to the luminosity in the same step. The grain mass
/// distribution is therefore not resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleBodyModel;

impl SingleBodyModel {
    fn rates(constants: &SimulationConstants, state: &BodyState) -> Rates {
        let settings = &constants.integration;
        let rho_atm = constants.atmosphere.density(state.h);
        let m = state.m.max(f64::MIN_POSITIVE);
        let v = state.v.max(0.0);

        let k = settings.gamma * settings.shape_factor * constants.rho.powf(-2.0 / 3.0);
        let mass_flux = k * rho_atm * v.powi(3) * m.powf(2.0 / 3.0);

        Rates {
            dv: -k * rho_atm * v * v * m.powf(-1.0 / 3.0),
            dm_ablation: -constants.sigma * mass_flux,
            dm_erosion: -constants.erosion_coeff_at(state.h) * mass_flux,
            dh: -v * constants.zenith_angle.cos(),
            dl: v,
        }
    }

    fn rk4_step(constants: &SimulationConstants, state: &BodyState, dt: f64) -> BodyState {
        let k1 = Self::rates(constants, state);
        let k2 = Self::rates(constants, &state.advanced(&k1, dt / 2.0));
        let k3 = Self::rates(constants, &state.advanced(&k2, dt / 2.0));
        let k4 = Self::rates(constants, &state.advanced(&k3, dt));

        let combine = |f: fn(&Rates) -> f64| (f(&k1) + 2.0 * f(&k2) + 2.0 * f(&k3) + f(&k4)) / 6.0;

        BodyState {
            v: state.v + dt * combine(|r| r.dv),
            m: (state.m + dt * combine(|r| r.dm_ablation + r.dm_erosion)).max(0.0),
            h: state.h + dt * combine(|r| r.dh),
            l: state.l + dt * combine(|r| r.dl),
        }
    }

    /// Absolute magnitude radiated while losing mass at `dm_dt`
    fn magnitude(constants: &SimulationConstants, v: f64, dm_dt: f64) -> f64 {
        let luminosity = -constants.integration.lum_eff * v * v / 2.0 * dm_dt;
        -2.5 * (luminosity / constants.p_0m).log10()
    }
}

impl AblationModel for SingleBodyModel {
    fn simulate(&self, constants: &SimulationConstants) -> SimulationRun {
        let settings = &constants.integration;
        let max_steps = (settings.total_time / settings.dt).ceil() as usize + 1;

        let mut run = SimulationRun::with_capacity(max_steps.min(1 << 16));
        let mut state = BodyState {
            v: constants.v_init,
            m: constants.m_init,
            h: settings.h_init,
            l: 0.0,
        };
        let mut t = 0.0;

        for step in 0..max_steps {
            let rates = Self::rates(constants, &state);
            let mag = Self::magnitude(constants, state.v, rates.dm_ablation + rates.dm_erosion);
            run.push(t, mag, state.h, state.l);

            let finished = state.m <= settings.m_kill
                || state.v <= settings.v_kill
                || state.h <= settings.h_kill
                || !(state.v.is_finite() && state.m.is_finite() && state.h.is_finite());
            if finished {
                break;
            }

            state = Self::rk4_step(constants, &state, settings.dt);
            t = (step + 1) as f64 * settings.dt;
        }

        run
    }
}
