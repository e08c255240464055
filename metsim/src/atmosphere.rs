//! Reference atmosphere mass density as a polynomial in height
//!
//! log10 of the density is fitted with a degree-6 polynomial to the US
//! Standard Atmosphere 1976 over the meteor height range. Evaluation outside
//! the fitted range clamps the height to the range edges.

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Julian date of the J2000 epoch
pub const J2000_JD: f64 = 2_451_545.0;

/// Elginfield observatory latitude (deg)
pub const ELGINFIELD_LAT_DEG: f64 = 43.19301;

/// Elginfield observatory longitude (deg, east positive)
pub const ELGINFIELD_LON_DEG: f64 = -81.315555;

/// Lower edge of the reference height range (m)
pub const REFERENCE_HT_MIN: f64 = 60_000.0;

/// Upper edge of the reference height range (m)
pub const REFERENCE_HT_MAX: f64 = 180_000.0;

/// US Standard Atmosphere 1976 mass density (height m, density kg/m^3)
const USSA76_DENSITY: [(f64, f64); 13] = [
    (60_000.0, 3.097e-4),
    (70_000.0, 8.283e-5),
    (80_000.0, 1.846e-5),
    (90_000.0, 3.416e-6),
    (100_000.0, 5.604e-7),
    (110_000.0, 9.708e-8),
    (120_000.0, 2.222e-8),
    (130_000.0, 8.152e-9),
    (140_000.0, 3.831e-9),
    (150_000.0, 2.076e-9),
    (160_000.0, 1.233e-9),
    (170_000.0, 7.815e-10),
    (180_000.0, 5.194e-10),
];

/// Spacing of the interpolated points the polynomial is fitted to (m)
const FIT_STEP: f64 = 1000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AtmosphereError {
    #[error("Invalid height range {0} - {1} m")]
    InvalidRange(f64, f64),
    #[error("Least squares fit failed: {0}")]
    Fit(String),
}

/// Fitted atmosphere density model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereDensity {
    /// Polynomial coefficients in ascending order, on the scaled height
    coeffs: Vec<f64>,
    ht_min: f64,
    ht_max: f64,
    /// Epoch and site the model stands for (radians for the site)
    jd: f64,
    lat: f64,
    lon: f64,
}

impl AtmosphereDensity {
    pub const POLY_DEGREE: usize = 6;

    /// Model for J2000 at Elginfield over 60 - 180 km
    pub fn reference() -> Result<Self, AtmosphereError> {
        Self::fit(
            ELGINFIELD_LAT_DEG.to_radians(),
            ELGINFIELD_LON_DEG.to_radians(),
            REFERENCE_HT_MIN,
            REFERENCE_HT_MAX,
            J2000_JD,
        )
    }

    /// Fit the polynomial over `[ht_min, ht_max]`
    ///
    /// The tabulated standard atmosphere is a global average, so site and
    /// epoch are recorded with the model but do not change the densities.
    pub fn fit(
        lat: f64,
        lon: f64,
        ht_min: f64,
        ht_max: f64,
        jd: f64,
    ) -> Result<Self, AtmosphereError> {
        if !(ht_min < ht_max) || ht_min < REFERENCE_HT_MIN || ht_max > REFERENCE_HT_MAX {
            return Err(AtmosphereError::InvalidRange(ht_min, ht_max));
        }

        let n_points = ((ht_max - ht_min) / FIT_STEP).floor() as usize + 1;
        if n_points <= Self::POLY_DEGREE {
            return Err(AtmosphereError::InvalidRange(ht_min, ht_max));
        }

        let (mid, half) = ((ht_min + ht_max) / 2.0, (ht_max - ht_min) / 2.0);
        let heights: Vec<f64> = (0..n_points)
            .map(|i| (ht_min + i as f64 * FIT_STEP).min(ht_max))
            .collect();

        let design = DMatrix::from_fn(n_points, Self::POLY_DEGREE + 1, |row, col| {
            ((heights[row] - mid) / half).powi(col as i32)
        });
        let target = DVector::from_iterator(n_points, heights.iter().map(|&h| table_log_density(h)));

        let svd = design.svd(true, true);
        let solution = svd
            .solve(&target, 1e-12)
            .map_err(|e| AtmosphereError::Fit(e.to_string()))?;

        let model = Self {
            coeffs: solution.iter().copied().collect(),
            ht_min,
            ht_max,
            jd,
            lat,
            lon,
        };

        debug!(
            "Atmosphere fitted over {:.0}-{:.0} km (JD {:.1}, lat {:.4}, lon {:.4}): {:?}",
            ht_min / 1000.0,
            ht_max / 1000.0,
            jd,
            lat.to_degrees(),
            lon.to_degrees(),
            model.coeffs
        );

        Ok(model)
    }

    /// log10 of the density (kg/m^3) at `height` (m)
    pub fn log_density(&self, height: f64) -> f64 {
        let mid = (self.ht_min + self.ht_max) / 2.0;
        let half = (self.ht_max - self.ht_min) / 2.0;
        let x = (height.clamp(self.ht_min, self.ht_max) - mid) / half;

        // Horner
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    /// Density (kg/m^3) at `height` (m)
    pub fn density(&self, height: f64) -> f64 {
        10f64.powf(self.log_density(height))
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn height_range(&self) -> (f64, f64) {
        (self.ht_min, self.ht_max)
    }

    /// Julian date the model was built for
    pub fn epoch(&self) -> f64 {
        self.jd
    }

    /// Site (lat, lon) in radians the model was built for
    pub fn site(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Log-linear interpolation of the tabulated densities
fn table_log_density(height: f64) -> f64 {
    let upper = USSA76_DENSITY
        .partition_point(|&(h, _)| h <= height)
        .clamp(1, USSA76_DENSITY.len() - 1);
    let (h0, d0) = USSA76_DENSITY[upper - 1];
    let (h1, d1) = USSA76_DENSITY[upper];
    let frac = ((height - h0) / (h1 - h0)).clamp(0.0, 1.0);

    d0.log10() + frac * (d1.log10() - d0.log10())
}
