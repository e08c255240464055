//! The ordered set of physical parameters that defines one simulation

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sampler::{ParameterSampler, Relation};
use super::ParamError;
use crate::ablation::{IntegrationSettings, SimulationConstants};
use crate::atmosphere::AtmosphereDensity;

/// Photometric zero point of the absolute magnitude scale (W)
pub const P_0M: f64 = 840.0;

/// Physical inputs of the ablation model, in draw order
///
/// Linked parameters always come after the parameter they reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalParam {
    /// Initial mass (kg)
    InitialMass,
    /// Initial velocity (m/s)
    InitialVelocity,
    /// Zenith angle (rad)
    ZenithAngle,
    /// Bulk density (kg/m^3)
    BulkDensity,
    /// Ablation coefficient (s^2/m^2)
    AblationCoeff,
    /// Height at which erosion starts (m)
    ErosionHeightStart,
    /// Erosion coefficient (s^2/m^2)
    ErosionCoeff,
    /// Power-law index of the eroded grain masses
    ErosionMassIndex,
    /// Smallest eroded grain mass (kg)
    ErosionMassMin,
    /// Largest eroded grain mass (kg)
    ErosionMassMax,
}

impl PhysicalParam {
    pub const COUNT: usize = 10;

    pub const ALL: [PhysicalParam; Self::COUNT] = [
        PhysicalParam::InitialMass,
        PhysicalParam::InitialVelocity,
        PhysicalParam::ZenithAngle,
        PhysicalParam::BulkDensity,
        PhysicalParam::AblationCoeff,
        PhysicalParam::ErosionHeightStart,
        PhysicalParam::ErosionCoeff,
        PhysicalParam::ErosionMassIndex,
        PhysicalParam::ErosionMassMin,
        PhysicalParam::ErosionMassMax,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PhysicalParam::InitialMass => "m_init",
            PhysicalParam::InitialVelocity => "v_init",
            PhysicalParam::ZenithAngle => "zenith_angle",
            PhysicalParam::BulkDensity => "rho",
            PhysicalParam::AblationCoeff => "sigma",
            PhysicalParam::ErosionHeightStart => "erosion_height_start",
            PhysicalParam::ErosionCoeff => "erosion_coeff",
            PhysicalParam::ErosionMassIndex => "erosion_mass_index",
            PhysicalParam::ErosionMassMin => "erosion_mass_min",
            PhysicalParam::ErosionMassMax => "erosion_mass_max",
        }
    }

    /// Range, distribution, default and link of the parameter
    fn default_sampler(self) -> ParameterSampler {
        match self {
            PhysicalParam::InitialMass => {
                ParameterSampler::log_uniform(5e-7, 1e-3).with_default(2.4671e-6)
            }
            PhysicalParam::InitialVelocity => {
                ParameterSampler::uniform(11_000.0, 72_000.0).with_default(30_520.0)
            }
            PhysicalParam::ZenithAngle => {
                ParameterSampler::uniform(20f64.to_radians(), 80f64.to_radians())
                    .with_default(39.2f64.to_radians())
            }
            PhysicalParam::BulkDensity => {
                ParameterSampler::uniform(100.0, 3500.0).with_default(2000.0)
            }
            PhysicalParam::AblationCoeff => {
                ParameterSampler::uniform(0.005e-6, 0.3e-6).with_default(0.05e-6)
            }
            PhysicalParam::ErosionHeightStart => {
                ParameterSampler::uniform(70_000.0, 130_000.0).with_default(70_000.0)
            }
            PhysicalParam::ErosionCoeff => ParameterSampler::uniform(0.0, 1e-6).with_default(0.0),
            PhysicalParam::ErosionMassIndex => {
                ParameterSampler::uniform(1.5, 3.0).with_default(2.0)
            }
            PhysicalParam::ErosionMassMin => {
                ParameterSampler::log_uniform(1e-12, 1e-9).with_default(1e-12)
            }
            PhysicalParam::ErosionMassMax => ParameterSampler::log_uniform(1e-11, 1e-7)
                .with_default(1e-10)
                .linked(Relation::Greater, PhysicalParam::ErosionMassMin),
        }
    }
}

/// Per-parameter "fixed at default" flags in declaration order
pub type FixedMask = [bool; PhysicalParam::COUNT];

/// One value per parameter in declaration order
pub type ParamVector = [f64; PhysicalParam::COUNT];

/// Parse a fixed mask from ten 0/1 flags
pub fn fixed_mask_from_flags(flags: &[u8]) -> Result<FixedMask, ParamError> {
    if flags.len() != PhysicalParam::COUNT {
        return Err(ParamError::FixedFlagCount {
            expected: PhysicalParam::COUNT,
            actual: flags.len(),
        });
    }

    let mut mask = [false; PhysicalParam::COUNT];
    for (slot, &flag) in mask.iter_mut().zip(flags) {
        *slot = match flag {
            0 => false,
            1 => true,
            other => return Err(ParamError::InvalidFixedFlag(other)),
        };
    }
    Ok(mask)
}

/// Samplers for every [`PhysicalParam`] plus the constants shared by all runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameterSet {
    samplers: [ParameterSampler; PhysicalParam::COUNT],
    atmosphere: AtmosphereDensity,
    p_0m: f64,
}

impl PhysicalParameterSet {
    /// Default ranges and values with the reference atmosphere fitted
    pub fn new() -> Result<Self, ParamError> {
        Ok(Self {
            samplers: PhysicalParam::ALL.map(PhysicalParam::default_sampler),
            atmosphere: AtmosphereDensity::reference()?,
            p_0m: P_0M,
        })
    }

    pub fn sampler(&self, param: PhysicalParam) -> &ParameterSampler {
        &self.samplers[param.index()]
    }

    pub fn sampler_mut(&mut self, param: PhysicalParam) -> &mut ParameterSampler {
        &mut self.samplers[param.index()]
    }

    pub fn atmosphere(&self) -> &AtmosphereDensity {
        &self.atmosphere
    }

    pub fn p_0m(&self) -> f64 {
        self.p_0m
    }

    /// Current value of one parameter
    pub fn value(&self, param: PhysicalParam) -> Result<f64, ParamError> {
        self.sampler(param)
            .value()
            .ok_or(ParamError::Unset(param.name()))
    }

    /// Current values of all parameters
    pub fn values(&self) -> Result<ParamVector, ParamError> {
        let mut out = [0.0; PhysicalParam::COUNT];
        for param in PhysicalParam::ALL {
            out[param.index()] = self.value(param)?;
        }
        Ok(out)
    }

    /// Assign all values directly
    pub fn set_values(&mut self, values: &ParamVector) {
        for (sampler, &value) in self.samplers.iter_mut().zip(values) {
            sampler.set_value(value);
        }
    }

    /// Fix the flagged parameters at their defaults
    pub fn apply_fixed_mask(&mut self, mask: &FixedMask) -> Result<(), ParamError> {
        for param in PhysicalParam::ALL {
            if mask[param.index()] {
                self.sampler_mut(param)
                    .set_fixed(true)
                    .map_err(|_| ParamError::FixedParamWithoutDefault(param.name()))?;
            }
        }
        Ok(())
    }

    /// Check that every fixed parameter carries a value
    pub fn validate(&self) -> Result<(), ParamError> {
        for param in PhysicalParam::ALL {
            let sampler = self.sampler(param);
            if sampler.is_fixed() && sampler.value().is_none() {
                return Err(ParamError::FixedParamWithoutDefault(param.name()));
            }
        }
        Ok(())
    }

    fn linked_value(&self, param: PhysicalParam) -> Option<f64> {
        self.sampler(param)
            .link()
            .and_then(|link| self.sampler(link.target).value())
    }

    /// Draw values in declaration order
    ///
    /// A parameter is redrawn when it has no value, when `override_values` is
    /// set, or when its value lies outside its range. Fixed parameters keep
    /// their value in every case.
    pub fn draw_all<R: Rng + ?Sized>(&mut self, rng: &mut R, override_values: bool) {
        for param in PhysicalParam::ALL {
            let linked = self.linked_value(param);
            let sampler = self.sampler_mut(param);
            if sampler.needs_redraw(override_values) {
                sampler.generate_val(rng, linked);
            }
        }
    }

    /// Simulator configuration for the current values
    pub fn to_constants(&self) -> Result<SimulationConstants, ParamError> {
        Ok(SimulationConstants {
            m_init: self.value(PhysicalParam::InitialMass)?,
            v_init: self.value(PhysicalParam::InitialVelocity)?,
            zenith_angle: self.value(PhysicalParam::ZenithAngle)?,
            rho: self.value(PhysicalParam::BulkDensity)?,
            sigma: self.value(PhysicalParam::AblationCoeff)?,
            erosion_on: true,
            erosion_height_start: self.value(PhysicalParam::ErosionHeightStart)?,
            erosion_coeff: self.value(PhysicalParam::ErosionCoeff)?,
            erosion_height_change: 0.0,
            erosion_coeff_change: 0.0,
            erosion_mass_index: self.value(PhysicalParam::ErosionMassIndex)?,
            erosion_mass_min: self.value(PhysicalParam::ErosionMassMin)?,
            erosion_mass_max: self.value(PhysicalParam::ErosionMassMax)?,
            atmosphere: self.atmosphere.clone(),
            p_0m: self.p_0m,
            integration: IntegrationSettings::default(),
        })
    }

    /// Current values mapped onto `[0, 1]`
    pub fn normalized_vector(&self) -> Result<ParamVector, ParamError> {
        let mut out = self.values()?;
        for (value, sampler) in out.iter_mut().zip(&self.samplers) {
            *value = sampler.normalize(*value);
        }
        Ok(out)
    }

    /// Physical values for a normalized vector, without touching the set
    pub fn denormalized_values(&self, normalized: &ParamVector) -> ParamVector {
        let mut out = *normalized;
        for (value, sampler) in out.iter_mut().zip(&self.samplers) {
            *value = sampler.denormalize(*value);
        }
        out
    }

    /// Assign values from a normalized vector
    pub fn apply_normalized_vector(&mut self, normalized: &ParamVector) {
        let values = self.denormalized_values(normalized);
        self.set_values(&values);
    }

    /// Human readable listing of the current values
    pub fn summary(&self) -> String {
        PhysicalParam::ALL
            .iter()
            .map(|&param| match self.sampler(param).value() {
                Some(v) if param == PhysicalParam::ZenithAngle => {
                    format!("{}={:.2}deg", param.name(), v.to_degrees())
                }
                Some(v) => format!("{}={:.4e}", param.name(), v),
                None => format!("{}=unset", param.name()),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults_are_in_range() {
        let params = PhysicalParameterSet::new().unwrap();
        for param in PhysicalParam::ALL {
            let sampler = params.sampler(param);
            let value = sampler.value().unwrap();
            assert!(sampler.contains(value), "{} default out of range", param.name());
        }
    }

    #[test]
    fn test_index_matches_declaration_order() {
        for (i, param) in PhysicalParam::ALL.iter().enumerate() {
            assert_eq!(param.index(), i);
        }
    }

    #[test]
    fn test_linked_relation_holds_after_draws() {
        let mut params = PhysicalParameterSet::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..500 {
            params.draw_all(&mut rng, true);
            let min = params.value(PhysicalParam::ErosionMassMin).unwrap();
            let max = params.value(PhysicalParam::ErosionMassMax).unwrap();
            assert!(max >= min, "erosion max mass {max} below min {min}");
        }
    }

    #[test]
    fn test_fixed_values_survive_override() {
        let mut params = PhysicalParameterSet::new().unwrap();
        let mut mask = [false; PhysicalParam::COUNT];
        mask[PhysicalParam::InitialVelocity.index()] = true;
        mask[PhysicalParam::BulkDensity.index()] = true;
        params.apply_fixed_mask(&mask).unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        for override_values in [true, false, true] {
            params.draw_all(&mut rng, override_values);
            assert_eq!(params.value(PhysicalParam::InitialVelocity).unwrap(), 30_520.0);
            assert_eq!(params.value(PhysicalParam::BulkDensity).unwrap(), 2000.0);
        }
    }

    #[test]
    fn test_draw_without_override_keeps_in_range_values() {
        let mut params = PhysicalParameterSet::new().unwrap();
        let before = params.values().unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        params.draw_all(&mut rng, false);
        assert_eq!(params.values().unwrap(), before);

        params
            .sampler_mut(PhysicalParam::BulkDensity)
            .set_value(10_000.0);
        params.draw_all(&mut rng, false);
        let rho = params.value(PhysicalParam::BulkDensity).unwrap();
        assert!((100.0..=3500.0).contains(&rho));
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = PhysicalParameterSet::new().unwrap();
        let mut b = PhysicalParameterSet::new().unwrap();
        a.draw_all(&mut StdRng::seed_from_u64(77), true);
        b.draw_all(&mut StdRng::seed_from_u64(77), true);
        assert_eq!(a.values().unwrap(), b.values().unwrap());
    }

    #[test]
    fn test_normalized_vector_round_trip() {
        let mut params = PhysicalParameterSet::new().unwrap();
        params.draw_all(&mut StdRng::seed_from_u64(5), true);
        let values = params.values().unwrap();

        let normalized = params.normalized_vector().unwrap();
        assert!(normalized.iter().all(|v| (-1e-12..=1.0 + 1e-12).contains(v)));

        let restored = params.denormalized_values(&normalized);
        for (a, b) in restored.iter().zip(&values) {
            assert_relative_eq!(*a, *b, max_relative = 1e-10);
        }

        let mut other = PhysicalParameterSet::new().unwrap();
        other.apply_normalized_vector(&normalized);
        for (a, b) in other.values().unwrap().iter().zip(&values) {
            assert_relative_eq!(*a, *b, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_fixed_mask_from_flags() {
        let mask = fixed_mask_from_flags(&[1, 0, 0, 0, 0, 0, 0, 0, 0, 1]).unwrap();
        assert!(mask[0] && mask[9]);
        assert_eq!(mask.iter().filter(|&&f| f).count(), 2);

        assert_eq!(
            fixed_mask_from_flags(&[1, 0]),
            Err(ParamError::FixedFlagCount {
                expected: 10,
                actual: 2
            })
        );
        assert_eq!(
            fixed_mask_from_flags(&[0, 0, 0, 2, 0, 0, 0, 0, 0, 0]),
            Err(ParamError::InvalidFixedFlag(2))
        );
    }

    #[test]
    fn test_to_constants_copies_values() {
        let params = PhysicalParameterSet::new().unwrap();
        let constants = params.to_constants().unwrap();

        assert_eq!(constants.m_init, 2.4671e-6);
        assert_eq!(constants.v_init, 30_520.0);
        assert_eq!(constants.erosion_mass_max, 1e-10);
        assert_eq!(constants.p_0m, P_0M);
        assert!(constants.erosion_on);
    }
}
