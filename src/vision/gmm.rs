//! Gaussian mixture colour models

/// RGB sample as floating point
pub type Color = [f64; 3];

const COVARIANCE_EPSILON: f64 = 0.01;
const KMEANS_ROUNDS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
struct Gaussian {
    weight: f64,
    mean: Color,
    inverse: [[f64; 3]; 3],
    determinant: f64,
}

impl Gaussian {
    fn density(&self, color: &Color) -> f64 {
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let mut mahalanobis = 0.0;
        for (i, row) in self.inverse.iter().enumerate() {
            mahalanobis += d[i] * (row[0] * d[0] + row[1] * d[1] + row[2] * d[2]);
        }
        (-0.5 * mahalanobis).exp() / self.determinant.sqrt()
    }
}

/// Mixture of full-covariance Gaussians over RGB
#[derive(Debug, Clone, PartialEq)]
pub struct Gmm {
    components: Vec<Gaussian>,
}

impl Gmm {
    /// Fit one Gaussian per component from hard assignments
    ///
    /// Components without samples are dropped. Returns `None` if there are
    /// no samples or no components.
    #[must_use]
    pub fn fit(samples: &[Color], assignments: &[usize], components: usize) -> Option<Self> {
        if samples.is_empty() || components == 0 {
            return None;
        }

        let mut counts = vec![0usize; components];
        let mut sums = vec![[0.0f64; 3]; components];
        let mut products = vec![[[0.0f64; 3]; 3]; components];

        for (color, &component) in samples.iter().zip(assignments) {
            let component = component.min(components - 1);
            counts[component] += 1;
            for i in 0..3 {
                sums[component][i] += color[i];
                for j in 0..3 {
                    products[component][i][j] += color[i] * color[j];
                }
            }
        }

        let total = samples.len() as f64;
        let fitted: Vec<Gaussian> = (0..components)
            .filter(|&c| counts[c] > 0)
            .map(|c| {
                let n = counts[c] as f64;
                let mean = [sums[c][0] / n, sums[c][1] / n, sums[c][2] / n];
                let mut covariance = [[0.0; 3]; 3];
                for i in 0..3 {
                    for j in 0..3 {
                        covariance[i][j] = products[c][i][j] / n - mean[i] * mean[j];
                    }
                }
                let (inverse, determinant) = regularized_inverse(covariance);
                Gaussian {
                    weight: n / total,
                    mean,
                    inverse,
                    determinant,
                }
            })
            .collect();

        Some(Self { components: fitted })
    }

    /// Initialise with k-means clustering of the samples
    #[must_use]
    pub fn from_kmeans(samples: &[Color], components: usize) -> Option<Self> {
        let assignments = kmeans(samples, components);
        Self::fit(samples, &assignments, components)
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Mixture likelihood of a colour
    #[must_use]
    pub fn probability(&self, color: &Color) -> f64 {
        self.components
            .iter()
            .map(|g| g.weight * g.density(color))
            .sum()
    }

    /// Index of the component most likely to have produced the colour
    #[must_use]
    pub fn most_likely_component(&self, color: &Color) -> usize {
        let mut best = 0;
        let mut best_density = f64::NEG_INFINITY;
        for (index, gaussian) in self.components.iter().enumerate() {
            let density = gaussian.weight * gaussian.density(color);
            if density > best_density {
                best_density = density;
                best = index;
            }
        }
        best
    }

    /// Negative log-likelihood, bounded for zero-probability colours
    #[must_use]
    pub fn cost(&self, color: &Color) -> f64 {
        -self.probability(color).max(f64::MIN_POSITIVE).ln()
    }
}

/// Deterministic k-means: seeds are evenly spaced samples
#[must_use]
pub fn kmeans(samples: &[Color], k: usize) -> Vec<usize> {
    if samples.is_empty() || k == 0 {
        return vec![0; samples.len()];
    }
    let k = k.min(samples.len());
    let step = samples.len() / k;
    let mut centers: Vec<Color> = (0..k).map(|i| samples[i * step]).collect();
    let mut assignments = vec![0usize; samples.len()];

    for _ in 0..KMEANS_ROUNDS {
        let mut changed = false;
        for (sample, assignment) in samples.iter().zip(assignments.iter_mut()) {
            let nearest = nearest_center(&centers, sample);
            if nearest != *assignment {
                *assignment = nearest;
                changed = true;
            }
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (sample, &assignment) in samples.iter().zip(&assignments) {
            counts[assignment] += 1;
            for i in 0..3 {
                sums[assignment][i] += sample[i];
            }
        }
        for (center, (sum, &count)) in centers.iter_mut().zip(sums.iter().zip(&counts)) {
            if count > 0 {
                let n = count as f64;
                *center = [sum[0] / n, sum[1] / n, sum[2] / n];
            }
        }

        if !changed {
            break;
        }
    }
    assignments
}

fn nearest_center(centers: &[Color], sample: &Color) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, center) in centers.iter().enumerate() {
        let distance = squared_distance(center, sample);
        if distance < best_distance {
            best_distance = distance;
            best = index;
        }
    }
    best
}

#[must_use]
pub fn squared_distance(a: &Color, b: &Color) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

/// Inverse and determinant of a covariance matrix, nudged away from singular
fn regularized_inverse(mut m: [[f64; 3]; 3]) -> ([[f64; 3]; 3], f64) {
    let mut det = determinant(&m);
    while det <= f64::EPSILON {
        for (i, row) in m.iter_mut().enumerate() {
            row[i] += COVARIANCE_EPSILON;
        }
        det = determinant(&m);
    }

    let inv_det = 1.0 / det;
    let inverse = [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ];
    (inverse, det)
}

fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}
