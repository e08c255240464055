use thiserror::Error;

/// Errors raised while building a spline from sampled data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("X and Y vectors must have same length ({0} vs {1})")]
    MismatchedLengths(usize, usize),
    #[error("Need at least 2 points for interpolation, got {0}")]
    InsufficientData(usize),
    #[error("X values must be strictly ascending (index {0})")]
    UnsortedData(usize),
    #[error("Non-finite sample at index {0}")]
    NonFinite(usize),
}

/// Cubic spline interpolation for resampling irregular time series
///
/// Implements natural cubic spline interpolation (second derivatives are zero
/// at the endpoints). Simulated light curves and trajectories come out of the
/// integrator on the integrator's own time grid; the spline lets them be
/// resampled onto a camera's frame grid.
///
/// Each segment has the form:
///
/// S(x) = a + b(x-xi) + c(x-xi)² + d(x-xi)³
///
/// # Examples
///
/// ```rust
/// use shared::algo::spline::CubicSpline;
///
/// let x = vec![0.0, 1.0, 2.0, 3.0];
/// let y = vec![0.0, 1.0, 4.0, 9.0];
/// let spline = CubicSpline::new(&x, &y).unwrap();
///
/// let interpolated = spline.evaluate(1.5);
/// assert!(interpolated > 1.0 && interpolated < 4.0);
///
/// // Sample every 0.5 on [0, 3)
/// let (t, _) = spline.resample_step(0.5);
/// assert_eq!(t.len(), 6);
/// ```
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    coeffs: Vec<[f64; 4]>, // a, b, c, d coefficients for each segment
    y_last: f64,
}

impl CubicSpline {
    /// Create a new cubic spline through the given points
    ///
    /// # Arguments
    /// * `x` - X coordinates (strictly ascending, finite)
    /// * `y` - Y coordinates corresponding to x values (finite)
    ///
    /// # Errors
    /// Returns a [`SplineError`] on mismatched lengths, fewer than two points,
    /// non-ascending x or non-finite values.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        if x.len() != y.len() {
            return Err(SplineError::MismatchedLengths(x.len(), y.len()));
        }
        if x.len() < 2 {
            return Err(SplineError::InsufficientData(x.len()));
        }
        if let Some(i) = x
            .iter()
            .zip(y.iter())
            .position(|(a, b)| !a.is_finite() || !b.is_finite())
        {
            return Err(SplineError::NonFinite(i));
        }
        if let Some(i) = (1..x.len()).find(|&i| x[i] <= x[i - 1]) {
            return Err(SplineError::UnsortedData(i));
        }

        Ok(Self {
            x: x.to_vec(),
            coeffs: Self::compute_coefficients(x, y),
            y_last: y[y.len() - 1],
        })
    }

    /// Solve the tridiagonal system for natural boundary conditions (Thomas algorithm)
    fn compute_coefficients(x: &[f64], y: &[f64]) -> Vec<[f64; 4]> {
        let n = x.len();
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

        let mut alpha = vec![0.0; n - 1];
        for i in 1..n - 1 {
            alpha[i] = (3.0 / h[i]) * (y[i + 1] - y[i]) - (3.0 / h[i - 1]) * (y[i] - y[i - 1]);
        }

        let mut l = vec![1.0; n];
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n];

        for i in 1..n - 1 {
            l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }

        let mut c = vec![0.0; n];
        let mut coeffs = vec![[0.0; 4]; n - 1];

        // Back substitution
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            let b = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            let d = (c[j + 1] - c[j]) / (3.0 * h[j]);
            coeffs[j] = [y[j], b, c[j], d];
        }

        coeffs
    }

    /// Evaluate the spline at a given x value
    ///
    /// Outside the knot range the boundary value is returned (no extrapolation).
    pub fn evaluate(&self, x: f64) -> f64 {
        if x <= self.x[0] {
            return self.coeffs[0][0];
        }
        if x >= self.x[self.x.len() - 1] {
            return self.y_last;
        }

        let segment = self.find_segment(x);
        let dx = x - self.x[segment];
        let [a, b, c, d] = self.coeffs[segment];

        a + b * dx + c * dx * dx + d * dx * dx * dx
    }

    /// Index of the left knot of the segment containing x
    fn find_segment(&self, x: f64) -> usize {
        // partition_point gives the first knot > x; x is strictly inside the range here
        self.x.partition_point(|&knot| knot <= x) - 1
    }

    /// First and last knot
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Sample the spline on a uniform grid `x0, x0 + step, ...` strictly below the last knot
    ///
    /// The grid mirrors a half-open `arange(x0, x_last, step)`: every point is
    /// strictly below the last knot, so the last knot is never included.
    /// A non-positive step yields the first knot only.
    pub fn resample_step(&self, step: f64) -> (Vec<f64>, Vec<f64>) {
        let (x_min, x_max) = self.domain();
        if step <= 0.0 || !step.is_finite() {
            return (vec![x_min], vec![self.evaluate(x_min)]);
        }

        let n_points = ((x_max - x_min) / step).ceil() as usize;
        let mut x_out = Vec::with_capacity(n_points);
        let mut y_out = Vec::with_capacity(n_points);

        for i in 0..n_points {
            let x = x_min + i as f64 * step;
            if x >= x_max {
                break;
            }
            x_out.push(x);
            y_out.push(self.evaluate(x));
        }

        (x_out, y_out)
    }

    /// Evaluate the spline at every point of `xs`
    pub fn evaluate_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}
