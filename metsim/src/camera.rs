//! Camera systems the simulated meteors are "observed" with
//!
//! A [`CameraProfile`] carries everything the sample extractor needs to know
//! about an instrument: frame rate, the ranges its limiting magnitudes and
//! tracking delay are drawn from, quality cut thresholds, noise levels and
//! the normalization ranges of the output channels.

use std::fmt;

use clap::ValueEnum;
use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::ParameterSampler;

/// Number of samples per channel in a training sample
pub const DATA_LENGTH: usize = 256;

/// Named camera profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum CameraKind {
    /// Generic 100 fps system
    Base,
    /// CAMO narrow-field mirror tracking system
    Camo,
    /// CAMO wide-field guide camera (no tracking delay)
    CamoWide,
}

impl CameraKind {
    pub const ALL: [CameraKind; 3] = [CameraKind::Base, CameraKind::Camo, CameraKind::CamoWide];

    pub fn profile(self) -> &'static CameraProfile {
        match self {
            CameraKind::Base => &models::BASE,
            CameraKind::Camo => &models::CAMO,
            CameraKind::CamoWide => &models::CAMO_WIDE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CameraKind::Base => "base",
            CameraKind::Camo => "camo",
            CameraKind::CamoWide => "camo-wide",
        }
    }
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Instrument parameters drawn per observed meteor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentParams {
    /// Magnitude at which tracking starts
    pub starting_lim_mag: f64,
    /// Magnitude below which tracking is lost
    pub ending_lim_mag: f64,
    /// Delay before length measurements start (s)
    pub len_delay: f64,
}

/// Constants of one camera system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraProfile {
    pub kind: CameraKind,
    /// Frames per second
    pub fps: f64,
    pub starting_lim_mag: ParameterSampler,
    pub ending_lim_mag: ParameterSampler,
    /// Length measurement delay (s)
    pub len_delay: ParameterSampler,
    /// Runs whose peak is not brighter than this are rejected
    pub peak_mag_faintest: f64,
    /// Minimum visible duration (s)
    pub visibility_time_min: f64,
    /// Standard deviation of magnitude noise
    pub mag_noise: f64,
    /// Standard deviation of length noise (m)
    pub len_noise: f64,
    /// Samples per output channel
    pub data_length: usize,
    /// Height normalization range (m)
    pub ht_min: f64,
    pub ht_max: f64,
    /// Time normalization scale (s)
    pub max_duration: f64,
    /// Magnitude normalization range
    pub mag_faintest: f64,
    pub mag_brightest: f64,
}

impl CameraProfile {
    /// Frame interval (s)
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps
    }

    /// Draw limiting magnitudes and tracking delay for one observation
    pub fn draw_instrument<R: Rng + ?Sized>(&self, rng: &mut R) -> InstrumentParams {
        InstrumentParams {
            starting_lim_mag: self.starting_lim_mag.sample(rng, None),
            ending_lim_mag: self.ending_lim_mag.sample(rng, None),
            len_delay: self.len_delay.sample(rng, None),
        }
    }

    /// Instrument parameters at their default values
    pub fn default_instrument(&self) -> InstrumentParams {
        let default = |p: &ParameterSampler| p.value().unwrap_or(p.min());
        InstrumentParams {
            starting_lim_mag: default(&self.starting_lim_mag),
            ending_lim_mag: default(&self.ending_lim_mag),
            len_delay: default(&self.len_delay),
        }
    }

    /// Midpoint of the starting limiting magnitude range
    pub fn mean_lim_mag(&self) -> f64 {
        (self.starting_lim_mag.min() + self.starting_lim_mag.max()) / 2.0
    }

    /// Shortest track (s) that can pass the quality cuts at the mean delay
    pub fn min_track_time(&self) -> f64 {
        self.visibility_time_min + (self.len_delay.min() + self.len_delay.max()) / 2.0
    }

    /// Length normalization scale (m) for a given maximum initial velocity
    pub fn len_scale(&self, v_init_max: f64) -> f64 {
        v_init_max * self.data_length as f64 / self.fps
    }
}

/// Standard camera profiles
pub mod models {
    use super::*;

    fn lim_mag_range() -> ParameterSampler {
        ParameterSampler::uniform(5.0, 10.0).with_default(8.0)
    }

    /// Tracking delay of 8 to 15 frames
    fn tracking_delay(fps: f64) -> ParameterSampler {
        ParameterSampler::uniform(8.0 / fps, 15.0 / fps).with_default(15.0 / fps)
    }

    /// Generic 100 fps system
    pub static BASE: Lazy<CameraProfile> = Lazy::new(|| CameraProfile {
        kind: CameraKind::Base,
        fps: 100.0,
        starting_lim_mag: lim_mag_range(),
        ending_lim_mag: lim_mag_range(),
        len_delay: tracking_delay(100.0),
        peak_mag_faintest: 6.0,
        visibility_time_min: 0.2,
        mag_noise: 0.1,
        len_noise: 1.0,
        data_length: DATA_LENGTH,
        ht_min: 70_000.0,
        ht_max: 130_000.0,
        max_duration: 10.0,
        mag_faintest: 8.0,
        mag_brightest: -2.0,
    });

    /// CAMO narrow-field tracking camera
    pub static CAMO: Lazy<CameraProfile> = Lazy::new(|| CameraProfile {
        kind: CameraKind::Camo,
        fps: 80.0,
        len_delay: tracking_delay(80.0),
        mag_faintest: 10.0,
        ..(*BASE).clone()
    });

    /// CAMO wide-field camera
    pub static CAMO_WIDE: Lazy<CameraProfile> = Lazy::new(|| CameraProfile {
        kind: CameraKind::CamoWide,
        fps: 80.0,
        len_delay: ParameterSampler::uniform(0.0, 0.0).with_default(0.0),
        len_noise: 20.0,
        mag_faintest: 10.0,
        ..(*BASE).clone()
    });
}
