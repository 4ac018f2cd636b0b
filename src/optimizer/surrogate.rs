//! Gaussian-process surrogate over the unit hypercube
//!
//! Squared-exponential kernel with a single length scale. Observations are
//! standardized before fitting; predictions are returned in the original
//! objective units.

/// Signal variance of the standardized objective
const SIGNAL_VARIANCE: f64 = 1.0;
/// Jitter added to the diagonal when the kernel matrix is not positive definite
const JITTER_STEPS: [f64; 5] = [0.0, 1e-8, 1e-6, 1e-4, 1e-2];

pub struct GaussianProcess {
    length_scale: f64,
    xs: Vec<Vec<f64>>,
    /// Lower Cholesky factor of K + noise * I
    chol: Vec<Vec<f64>>,
    /// (K + noise * I)^-1 * y, in standardized units
    alpha: Vec<f64>,
    y_mean: f64,
    y_std: f64,
}

impl GaussianProcess {
    /// Fit to `(xs, ys)`; `None` if there is no data or the kernel cannot be factored
    pub fn fit(xs: &[Vec<f64>], ys: &[f64], length_scale: f64, noise: f64) -> Option<Self> {
        if xs.is_empty() || xs.len() != ys.len() {
            return None;
        }
        let n = ys.len() as f64;
        let y_mean = ys.iter().sum::<f64>() / n;
        let var = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n;
        let y_std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        let standardized: Vec<f64> = ys.iter().map(|y| (y - y_mean) / y_std).collect();

        let mut kernel: Vec<Vec<f64>> = xs
            .iter()
            .map(|a| xs.iter().map(|b| rbf(a, b, length_scale)).collect())
            .collect();
        for (i, row) in kernel.iter_mut().enumerate() {
            row[i] += noise;
        }

        let chol = JITTER_STEPS.iter().find_map(|jitter| cholesky(&kernel, *jitter))?;
        let alpha = solve_upper_t(&chol, &solve_lower(&chol, &standardized));

        Some(Self {
            length_scale,
            xs: xs.to_vec(),
            chol,
            alpha,
            y_mean,
            y_std,
        })
    }

    /// Posterior mean and standard deviation at `x`
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star: Vec<f64> = self.xs.iter().map(|xi| rbf(x, xi, self.length_scale)).collect();
        let mean: f64 = k_star.iter().zip(&self.alpha).map(|(k, a)| k * a).sum();
        let v = solve_lower(&self.chol, &k_star);
        let var = (SIGNAL_VARIANCE - v.iter().map(|x| x * x).sum::<f64>()).max(1e-12);
        (self.y_mean + mean * self.y_std, var.sqrt() * self.y_std)
    }
}

fn rbf(a: &[f64], b: &[f64], length_scale: f64) -> f64 {
    let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    SIGNAL_VARIANCE * (-sq / (2.0 * length_scale * length_scale)).exp()
}

fn cholesky(matrix: &[Vec<f64>], jitter: f64) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[i][j];
            if i == j {
                sum += jitter;
            }
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

/// Solve L x = b
fn solve_lower(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[i][k] * x[k]).sum();
        x[i] = (b[i] - sum) / l[i][i];
    }
    x
}

/// Solve L^T x = b
fn solve_upper_t(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (b[i] - sum) / l[i][i];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_observations() {
        let xs = vec![vec![0.1], vec![0.5], vec![0.9]];
        let ys = vec![3.0, 1.0, 2.0];
        let gp = GaussianProcess::fit(&xs, &ys, 0.25, 1e-6).unwrap();

        for (x, y) in xs.iter().zip(&ys) {
            let (mean, std) = gp.predict(x);
            assert!((mean - y).abs() < 1e-2, "mean {} vs {}", mean, y);
            assert!(std < 0.05);
        }
    }

    #[test]
    fn test_uncertainty_grows_away_from_data() {
        let xs = vec![vec![0.2, 0.2], vec![0.3, 0.25]];
        let ys = vec![1.0, 1.5];
        let gp = GaussianProcess::fit(&xs, &ys, 0.25, 1e-4).unwrap();

        let (_, near) = gp.predict(&[0.25, 0.22]);
        let (_, far) = gp.predict(&[0.95, 0.95]);
        assert!(far > near);
    }

    #[test]
    fn test_duplicate_points_still_factor() {
        let xs = vec![vec![0.5], vec![0.5], vec![0.5]];
        let ys = vec![1.0, 1.1, 0.9];
        assert!(GaussianProcess::fit(&xs, &ys, 0.25, 0.0).is_some());
    }

    #[test]
    fn test_constant_objective() {
        let xs = vec![vec![0.1], vec![0.6]];
        let ys = vec![2.0, 2.0];
        let gp = GaussianProcess::fit(&xs, &ys, 0.25, 1e-4).unwrap();
        let (mean, _) = gp.predict(&[0.35]);
        assert!((mean - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_data() {
        assert!(GaussianProcess::fit(&[], &[], 0.25, 1e-4).is_none());
    }
}
