//! Turn a raw simulation run into a fixed-length normalized training sample
//!
//! The extractor "observes" a simulated meteor with a camera profile: it
//! draws (or reuses) limiting magnitudes and a tracking delay, cuts the run
//! down to what the camera would have tracked, resamples it at the camera
//! frame rate, simulates the delayed start of length measurements and
//! normalizes the result into a `data_length x 4` table.
//!
//! Runs that fail a quality cut come back as [`Extraction::Rejected`]; this
//! is the normal outcome for most random parameter draws and is only logged
//! at debug level.

use std::fmt;

use log::{debug, warn};
use ndarray::Array2;
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use shared::algo::{CubicSpline, MinMaxScan};

use crate::camera::{CameraKind, CameraProfile, InstrumentParams};
use crate::params::{ParamVector, PhysicalParam, PhysicalParameterSet};
use crate::sims::run::SimulationRun;

/// Columns of the training table, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Time,
    Height,
    Length,
    Magnitude,
}

impl Channel {
    pub const COUNT: usize = 4;
    pub const ALL: [Channel; Self::COUNT] = [
        Channel::Time,
        Channel::Height,
        Channel::Length,
        Channel::Magnitude,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Where the instrument parameters come from
pub enum NoiseDraw<'a> {
    /// Draw fresh instrument parameters from this generator
    Fresh(&'a mut dyn RngCore),
    /// Reuse previously drawn instrument parameters
    Reuse(InstrumentParams),
}

/// Why a run did not produce a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Peak magnitude not brighter than the profile threshold
    NeverBright,
    /// No sample passes the visibility mask
    NotVisible,
    /// Visible for less than the minimum time
    TooShort,
    /// The visible track could not be interpolated
    InvalidTrack,
    /// No length measurement after the tracking delay
    NoLength,
    /// The parameter set has unset values
    MissingParameters,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::NeverBright => "peak magnitude too faint",
            Rejection::NotVisible => "not visible",
            Rejection::TooShort => "minimum visible time not satisfied",
            Rejection::InvalidTrack => "visible track cannot be resampled",
            Rejection::NoLength => "no length measurements",
            Rejection::MissingParameters => "physical parameters not drawn",
        };
        f.write_str(reason)
    }
}

/// Everything that went into producing a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBundle {
    pub camera: CameraKind,
    pub instrument: InstrumentParams,
    pub physical: PhysicalParameterSet,
}

/// A normalized training sample
#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub params: ParameterBundle,
    /// `data_length x 4` table of normalized time, height, length, magnitude
    pub data: Array2<f64>,
    /// Normalized physical parameters in declaration order
    pub inputs: ParamVector,
}

/// Outcome of running the extractor on one run
#[derive(Debug, Clone)]
pub enum Extraction {
    Rejected(Rejection),
    /// The run passes all cuts (check-only mode)
    Feasible(ParameterBundle),
    Sample(TrainingSample),
}

impl Extraction {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Extraction::Rejected(_))
    }

    /// Parameter bundle of an accepted run
    pub fn bundle(&self) -> Option<&ParameterBundle> {
        match self {
            Extraction::Rejected(_) => None,
            Extraction::Feasible(bundle) => Some(bundle),
            Extraction::Sample(sample) => Some(&sample.params),
        }
    }

    pub fn into_sample(self) -> Option<TrainingSample> {
        match self {
            Extraction::Sample(sample) => Some(sample),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Stop after the quality cuts and return only the parameter bundle
    pub check_only: bool,
    /// Add Gaussian magnitude and length noise (fresh draws only)
    pub measurement_noise: bool,
}

impl ExtractOptions {
    pub fn check_only() -> Self {
        Self {
            check_only: true,
            ..Self::default()
        }
    }
}

/// One track on a uniform frame grid
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub time: Vec<f64>,
    pub height: Vec<f64>,
    pub length: Vec<f64>,
    pub magnitude: Vec<f64>,
}

impl Track {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    fn channel(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Time => &self.time,
            Channel::Height => &self.height,
            Channel::Length => &self.length,
            Channel::Magnitude => &self.magnitude,
        }
    }
}

/// Extracts training samples for one camera profile
#[derive(Debug, Clone)]
pub struct SampleExtractor {
    profile: CameraProfile,
}

impl SampleExtractor {
    pub fn new(kind: CameraKind) -> Self {
        Self::with_profile(kind.profile().clone())
    }

    pub fn with_profile(profile: CameraProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &CameraProfile {
        &self.profile
    }

    /// Run the full pipeline on one simulation run
    pub fn extract(
        &self,
        run: &SimulationRun,
        physical: &PhysicalParameterSet,
        noise: NoiseDraw<'_>,
        options: ExtractOptions,
    ) -> Extraction {
        let (instrument, noise_rng) = match noise {
            NoiseDraw::Fresh(rng) => (self.profile.draw_instrument(&mut *rng), Some(rng)),
            NoiseDraw::Reuse(instrument) => (instrument, None),
        };

        match self.process(run, physical, instrument, options, noise_rng) {
            Ok(extraction) => extraction,
            Err(reason) => {
                debug!(
                    "Rejected run ({} samples, {:?}): {}",
                    run.len(),
                    instrument,
                    reason
                );
                Extraction::Rejected(reason)
            }
        }
    }

    /// Quality cuts only
    pub fn check(
        &self,
        run: &SimulationRun,
        physical: &PhysicalParameterSet,
        noise: NoiseDraw<'_>,
    ) -> Extraction {
        self.extract(run, physical, noise, ExtractOptions::check_only())
    }

    fn process(
        &self,
        run: &SimulationRun,
        physical: &PhysicalParameterSet,
        instrument: InstrumentParams,
        options: ExtractOptions,
        noise_rng: Option<&mut dyn RngCore>,
    ) -> Result<Extraction, Rejection> {
        let profile = &self.profile;

        let magnitude = fill_non_finite(run.abs_magnitude()).ok_or(Rejection::NeverBright)?;

        let brightest = magnitude.iter().copied().fold(f64::INFINITY, f64::min);
        if brightest >= profile.peak_mag_faintest {
            return Err(Rejection::NeverBright);
        }

        let visible = self.visibility_mask(&magnitude, run.brightest_height(), &instrument);
        let visible_idx: Vec<usize> = (0..visible.len()).filter(|&i| visible[i]).collect();
        let (first, last) = match (visible_idx.first(), visible_idx.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(Rejection::NotVisible),
        };

        let time = run.time();
        if time[last] - time[first] < profile.visibility_time_min {
            return Err(Rejection::TooShort);
        }

        let pick = |column: &[f64]| visible_idx.iter().map(|&i| column[i]).collect::<Vec<_>>();
        let mut track = self.resample(
            &pick(time),
            &pick(&magnitude),
            &pick(run.brightest_height()),
            &pick(run.brightest_length()),
        )?;

        let first_length_index = apply_tracking_delay(&mut track, instrument.len_delay)?;

        if !track.length.iter().any(|&l| l > 0.0) {
            return Err(Rejection::NoLength);
        }

        let bundle = ParameterBundle {
            camera: profile.kind,
            instrument,
            physical: physical.clone(),
        };

        if options.check_only {
            return Ok(Extraction::Feasible(bundle));
        }

        if options.measurement_noise {
            match noise_rng {
                Some(rng) => self.add_measurement_noise(&mut track, &instrument, first_length_index, rng),
                None => debug!("Measurement noise requested with reused instrument parameters, skipped"),
            }
        }

        let inputs = physical
            .normalized_vector()
            .map_err(|_| Rejection::MissingParameters)?;
        let v_init_max = physical.sampler(PhysicalParam::InitialVelocity).max();
        let normalized = normalize_track(profile, v_init_max, &track);

        let columns: Vec<Vec<f64>> = Channel::ALL
            .iter()
            .map(|&c| pad_or_truncate_start(normalized.channel(c), profile.data_length))
            .collect();
        let data = Array2::from_shape_fn((profile.data_length, Channel::COUNT), |(i, c)| {
            columns[c][i]
        });

        Ok(Extraction::Sample(TrainingSample {
            params: bundle,
            data,
            inputs,
        }))
    }

    /// Samples the camera would have tracked
    ///
    /// Tracking starts at the first sample at or brighter than the starting
    /// limiting magnitude. If the run ends fainter than the ending limiting
    /// magnitude, tracking stops after the last sample at or brighter than
    /// it. Samples at or fainter than the looser of the two limits, and
    /// samples outside the profile height range, are never visible.
    pub fn visibility_mask(
        &self,
        magnitude: &[f64],
        height: &[f64],
        instrument: &InstrumentParams,
    ) -> Vec<bool> {
        let mut visible = vec![true; magnitude.len()];

        if let Some(start) = magnitude
            .iter()
            .position(|&m| m <= instrument.starting_lim_mag)
        {
            visible[..start].fill(false);
        }

        if magnitude.last().is_some_and(|&m| m > instrument.ending_lim_mag) {
            let end = magnitude
                .iter()
                .rposition(|&m| m <= instrument.ending_lim_mag)
                .map_or(0, |i| i + 1);
            visible[end..].fill(false);
        }

        let faint_limit = instrument.starting_lim_mag.max(instrument.ending_lim_mag);
        for ((v, &m), &h) in visible.iter_mut().zip(magnitude).zip(height) {
            if m >= faint_limit || h < self.profile.ht_min || h > self.profile.ht_max {
                *v = false;
            }
        }

        visible
    }

    /// Resample a visible track onto the frame grid, time re-zeroed
    pub fn resample(
        &self,
        time: &[f64],
        magnitude: &[f64],
        height: &[f64],
        length: &[f64],
    ) -> Result<Track, Rejection> {
        let spline = |values: &[f64]| {
            CubicSpline::new(time, values).map_err(|e| {
                debug!("Cannot interpolate visible track: {e}");
                Rejection::InvalidTrack
            })
        };
        let mag_spline = spline(magnitude)?;
        let ht_spline = spline(height)?;
        let len_spline = spline(length)?;

        let (mut frame_time, magnitude) = mag_spline.resample_step(self.profile.frame_interval());
        let height = ht_spline.evaluate_all(&frame_time);
        let length = len_spline.evaluate_all(&frame_time);

        let t0 = frame_time[0];
        frame_time.iter_mut().for_each(|t| *t -= t0);

        Ok(Track {
            time: frame_time,
            height,
            length,
            magnitude,
        })
    }

    fn add_measurement_noise(
        &self,
        track: &mut Track,
        instrument: &InstrumentParams,
        first_length_index: usize,
        rng: &mut dyn RngCore,
    ) {
        let (mag_noise, len_noise) = match (
            Normal::new(0.0, self.profile.mag_noise),
            Normal::new(0.0, self.profile.len_noise),
        ) {
            (Ok(mag), Ok(len)) => (mag, len),
            _ => {
                warn!(
                    "Invalid noise levels (mag {}, len {}), no noise added",
                    self.profile.mag_noise, self.profile.len_noise
                );
                return;
            }
        };

        for m in track
            .magnitude
            .iter_mut()
            .filter(|m| **m <= instrument.starting_lim_mag)
        {
            *m += mag_noise.sample(&mut *rng);
        }
        for l in &mut track.length[first_length_index..] {
            *l += len_noise.sample(&mut *rng);
        }
    }
}

/// Replace non-finite values with the largest finite one; `None` if there is none
fn fill_non_finite(values: &[f64]) -> Option<Vec<f64>> {
    let faintest = MinMaxScan::new(values).max().ok()?;
    Some(
        values
            .iter()
            .map(|&v| if v.is_finite() { v } else { faintest })
            .collect(),
    )
}

/// Simulate the delayed start of length measurements
///
/// Lengths before `delay` are zeroed and the rest rebased so the first
/// measured length is zero. Returns the index of that first measurement.
pub fn apply_tracking_delay(track: &mut Track, delay: f64) -> Result<usize, Rejection> {
    let first = track
        .time
        .iter()
        .position(|&t| t >= delay)
        .ok_or(Rejection::NoLength)?;

    track.length[..first].fill(0.0);
    let base = track.length[first];
    track.length[first..].iter_mut().for_each(|l| *l -= base);

    Ok(first)
}

/// Map a track onto the unit ranges of the profile
pub fn normalize_track(profile: &CameraProfile, v_init_max: f64, track: &Track) -> Track {
    let len_scale = profile.len_scale(v_init_max);
    let ht_span = profile.ht_max - profile.ht_min;
    let mag_span = profile.mag_faintest - profile.mag_brightest;

    Track {
        time: track.time.iter().map(|t| t / profile.max_duration).collect(),
        height: track
            .height
            .iter()
            .map(|h| (h - profile.ht_min) / ht_span)
            .collect(),
        length: track.length.iter().map(|l| l / len_scale).collect(),
        magnitude: track
            .magnitude
            .iter()
            .map(|m| (profile.mag_faintest - m) / mag_span)
            .collect(),
    }
}

/// Inverse of [`normalize_track`]
pub fn denormalize_track(profile: &CameraProfile, v_init_max: f64, normalized: &Track) -> Track {
    let len_scale = profile.len_scale(v_init_max);
    let ht_span = profile.ht_max - profile.ht_min;
    let mag_span = profile.mag_faintest - profile.mag_brightest;

    Track {
        time: normalized
            .time
            .iter()
            .map(|t| t * profile.max_duration)
            .collect(),
        height: normalized
            .height
            .iter()
            .map(|h| h * ht_span + profile.ht_min)
            .collect(),
        length: normalized.length.iter().map(|l| l * len_scale).collect(),
        magnitude: normalized
            .magnitude
            .iter()
            .map(|m| profile.mag_faintest - m * mag_span)
            .collect(),
    }
}

/// Fit `values` into `size` samples keeping the end aligned
///
/// Short inputs are zero padded at the start; long inputs lose their
/// earliest samples.
pub fn pad_or_truncate_start(values: &[f64], size: usize) -> Vec<f64> {
    if values.len() >= size {
        values[values.len() - size..].to_vec()
    } else {
        let mut out = vec![0.0; size - values.len()];
        out.extend_from_slice(values);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn extractor() -> SampleExtractor {
        SampleExtractor::new(CameraKind::Base)
    }

    fn instrument(start: f64, end: f64) -> InstrumentParams {
        InstrumentParams {
            starting_lim_mag: start,
            ending_lim_mag: end,
            len_delay: 0.0,
        }
    }

    #[test]
    fn test_pad_or_truncate_start() {
        assert_eq!(pad_or_truncate_start(&[1.0, 2.0], 4), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(pad_or_truncate_start(&[1.0, 2.0, 3.0, 4.0], 2), vec![3.0, 4.0]);
        assert_eq!(pad_or_truncate_start(&[1.0, 2.0], 2), vec![1.0, 2.0]);
        assert_eq!(pad_or_truncate_start(&[], 2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_fill_non_finite() {
        let filled = fill_non_finite(&[f64::INFINITY, 3.0, f64::NAN, 5.0]).unwrap();
        assert_eq!(filled, vec![5.0, 3.0, 5.0, 5.0]);
        assert!(fill_non_finite(&[f64::NAN, f64::INFINITY]).is_none());
    }

    #[test]
    fn test_mask_starts_at_starting_limit() {
        let mag = [9.0, 8.5, 7.9, 6.0, 7.0];
        let ht = [100_000.0; 5];
        let mask = extractor().visibility_mask(&mag, &ht, &instrument(8.0, 8.0));
        assert_eq!(mask, vec![false, false, true, true, true]);
    }

    #[test]
    fn test_mask_ending_trim_only_when_run_ends_faint() {
        let ht = [100_000.0; 6];
        let inst = instrument(9.0, 6.5);

        // Ends fainter than the ending limit: cut after the last sample <= 6.5
        let mag = [8.0, 6.0, 5.0, 6.2, 7.0, 8.5];
        let mask = extractor().visibility_mask(&mag, &ht, &inst);
        assert_eq!(mask, vec![true, true, true, true, false, false]);

        // Ends brighter: no ending trim, only the looser threshold applies
        let mag = [8.0, 6.0, 5.0, 6.2, 7.0, 6.0];
        let mask = extractor().visibility_mask(&mag, &ht, &inst);
        assert_eq!(mask, vec![true, true, true, true, true, true]);
    }

    #[test]
    fn test_mask_all_false_when_never_at_ending_limit() {
        let ht = [100_000.0; 3];
        let mask = extractor().visibility_mask(&[7.0, 6.5, 7.5], &ht, &instrument(8.0, 6.0));
        assert_eq!(mask, vec![false, false, false]);
    }

    #[test]
    fn test_mask_height_range() {
        let mag = [5.0; 4];
        let ht = [135_000.0, 129_000.0, 71_000.0, 69_000.0];
        let mask = extractor().visibility_mask(&mag, &ht, &instrument(8.0, 8.0));
        assert_eq!(mask, vec![false, true, true, false]);
    }

    #[test]
    fn test_tracking_delay() {
        let mut track = Track {
            time: vec![0.0, 0.05, 0.1, 0.15, 0.2],
            height: vec![0.0; 5],
            length: vec![10.0, 20.0, 30.0, 40.0, 50.0],
            magnitude: vec![0.0; 5],
        };

        let first = apply_tracking_delay(&mut track, 0.1).unwrap();
        assert_eq!(first, 2);
        assert_eq!(track.length, vec![0.0, 0.0, 0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_tracking_delay_past_end() {
        let mut track = Track {
            time: vec![0.0, 0.05],
            height: vec![0.0; 2],
            length: vec![1.0, 2.0],
            magnitude: vec![0.0; 2],
        };
        assert_eq!(apply_tracking_delay(&mut track, 0.5), Err(Rejection::NoLength));
    }

    #[test]
    fn test_normalize_round_trip() {
        let profile = CameraKind::Camo.profile();
        let track = Track {
            time: vec![0.0, 0.0125, 0.025],
            height: vec![110_000.0, 109_500.0, 109_000.0],
            length: vec![0.0, 400.0, 800.0],
            magnitude: vec![7.5, 3.2, -1.0],
        };

        let normalized = normalize_track(profile, 72_000.0, &track);
        assert_relative_eq!(normalized.magnitude[0], (10.0 - 7.5) / 12.0);
        assert_relative_eq!(normalized.height[0], 40.0 / 60.0, epsilon = 1e-12);

        let back = denormalize_track(profile, 72_000.0, &normalized);
        for (a, b) in back.length.iter().zip(&track.length) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
        for (a, b) in back.magnitude.iter().zip(&track.magnitude) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        for (a, b) in back.height.iter().zip(&track.height) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_extraction_accessors() {
        let rejected = Extraction::Rejected(Rejection::TooShort);
        assert!(!rejected.is_accepted());
        assert!(rejected.bundle().is_none());
        assert!(rejected.into_sample().is_none());
    }
}
