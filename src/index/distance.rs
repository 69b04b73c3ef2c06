//! Distance metrics for vector similarity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Distance metric used by the vector index.
///
/// Both variants are true metrics: cosine is measured as the angle between
/// the vectors (normalized to `[0, 1]`), not as `1 - cos`, which violates
/// the triangle inequality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Angular distance `acos(cos(a, b)) / π`. Score is the cosine similarity.
    #[default]
    Cosine,

    /// Euclidean (L2) distance. Score is `1 / (1 + d)`.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length; lower is closer.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b).acos() / std::f32::consts::PI,
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        }
    }

    /// Turn a distance from [`Self::distance`] into a relevance score;
    /// higher is more relevant.
    #[inline]
    pub fn score(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => (distance * std::f32::consts::PI).cos(),
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
        }
    }

    /// Whether vectors must have non-zero magnitude under this metric.
    pub fn requires_nonzero(&self) -> bool {
        matches!(self, DistanceMetric::Cosine)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" | "cos" | "angular" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" | "euclid" => Ok(DistanceMetric::Euclidean),
            _ => Err(format!("Unknown distance metric: {s}")),
        }
    }
}

/// Cosine similarity clamped to `[-1, 1]`; 0 when either vector is zero.
///
/// Sums run in `f64` so large finite components cannot overflow.
#[inline]
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0) as f32
}

#[inline]
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_cosine_identical_is_zero() {
        let v = [0.3, 0.4, 0.5];
        assert!(DistanceMetric::Cosine.distance(&v, &v) < 1e-3);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let c = [-1.0, 0.0];
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 0.5).abs() < EPS);
        assert!((DistanceMetric::Cosine.distance(&a, &c) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_large_components_do_not_overflow() {
        let big = [1e30, 0.0];
        let unit = [1.0, 0.0];
        assert!(DistanceMetric::Cosine.distance(&big, &unit) < 1e-3);
        assert!((DistanceMetric::Cosine.score(DistanceMetric::Cosine.distance(&big, &unit)) - 1.0).abs() < EPS);

        let far = [3e30, 0.0];
        let origin = [-1e30, 0.0];
        let d = DistanceMetric::Euclidean.distance(&far, &origin);
        assert!(d.is_finite());
        assert!((d / 4e30 - 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!(DistanceMetric::Cosine.distance(&a, &b) < 1e-3);
    }

    #[test]
    fn test_cosine_score_roundtrip() {
        let a = [1.0, 0.0];
        let b = [1.0, 1.0];
        let d = DistanceMetric::Cosine.distance(&a, &b);
        let score = DistanceMetric::Cosine.score(d);
        assert!((score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn test_euclidean() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 5.0).abs() < EPS);
        assert!((DistanceMetric::Euclidean.score(5.0) - 1.0 / 6.0).abs() < EPS);
    }

    #[test]
    fn test_triangle_inequality_angular() {
        let a = [1.0, 0.0];
        let b = [0.8, 0.6];
        let c = [0.0, 1.0];
        let m = DistanceMetric::Cosine;
        assert!(m.distance(&a, &c) <= m.distance(&a, &b) + m.distance(&b, &c) + EPS);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("COSINE".parse::<DistanceMetric>(), Ok(DistanceMetric::Cosine));
        assert_eq!("l2".parse::<DistanceMetric>(), Ok(DistanceMetric::Euclidean));
        assert!("manhattan".parse::<DistanceMetric>().is_err());
        assert_eq!(DistanceMetric::Euclidean.to_string(), "euclidean");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&DistanceMetric::Euclidean).unwrap();
        assert_eq!(json, "\"euclidean\"");
        let parsed: DistanceMetric = serde_json::from_str("\"cosine\"").unwrap();
        assert_eq!(parsed, DistanceMetric::Cosine);
    }
}
