//! Distance metrics selectable by name for KMeans clustering.

use crate::error::AggrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    SquaredEuclidean,
    Manhattan,
    Chebyshev,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 4] = [
        DistanceMetric::Euclidean,
        DistanceMetric::SquaredEuclidean,
        DistanceMetric::Manhattan,
        DistanceMetric::Chebyshev,
    ];

    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        let diffs = a.iter().zip(b).map(|(x, y)| x - y);
        match self {
            Self::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            Self::SquaredEuclidean => diffs.map(|d| d * d).sum(),
            Self::Manhattan => diffs.map(f64::abs).sum(),
            Self::Chebyshev => diffs.map(f64::abs).fold(0.0, f64::max),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::SquaredEuclidean => "squared_euclidean",
            Self::Manhattan => "manhattan",
            Self::Chebyshev => "chebyshev",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = AggrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(DistanceMetric::name).collect();
                AggrError::config(
                    "kmeans.metric",
                    format!("unknown metric `{s}`, expected one of {}", known.join(", ")),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_on_a_3_4_triangle() {
        let (a, b) = ([0.0, 0.0], [3.0, 4.0]);
        assert_eq!(DistanceMetric::Euclidean.distance(&a, &b), 5.0);
        assert_eq!(DistanceMetric::SquaredEuclidean.distance(&a, &b), 25.0);
        assert_eq!(DistanceMetric::Manhattan.distance(&a, &b), 7.0);
        assert_eq!(DistanceMetric::Chebyshev.distance(&a, &b), 4.0);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("MANHATTAN".parse::<DistanceMetric>().unwrap(), DistanceMetric::Manhattan);
        assert_eq!(
            "squared-euclidean".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::SquaredEuclidean
        );
        assert!("cosine".parse::<DistanceMetric>().is_err());
    }
}
