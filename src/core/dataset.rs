//! Small in-memory datasets for the lessons.
//!
//! Generators are pure construction: they never fail and their counts are
//! bounded by the parameter layer, so the only thing that varies between
//! calls is the random draw.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prng::Prng;

/// Largest class count a lesson control may produce.
pub const MAX_PER_CLASS: usize = 100;

/// Largest number of classes a lesson control may produce.
pub const MAX_CLASSES: usize = 5;

/// A 2-D sample. 1-D datasets keep the target (or `0.0`) in `y`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub label: Option<usize>,
    pub weight: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            label: None,
            weight: None,
        }
    }

    pub fn labeled(x: f64, y: f64, label: usize) -> Self {
        Self {
            label: Some(label),
            ..Self::new(x, y)
        }
    }

    #[inline]
    pub fn dist2(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn dist(&self, other: &Point) -> f64 {
        self.dist2(other).sqrt()
    }
}

/// A classifier score with its ground-truth class.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scored {
    pub score: f64,
    pub positive: bool,
}

/// Isotropic Gaussian clusters, labeled by the index of their center.
pub fn gaussian_blobs(
    rng: &mut Prng,
    centers: &[(f64, f64)],
    per_cluster: usize,
    spread: f64,
) -> Vec<Point> {
    let per_cluster = per_cluster.min(MAX_PER_CLASS);
    let mut out = Vec::with_capacity(centers.len() * per_cluster);
    for (label, &(cx, cy)) in centers.iter().take(MAX_CLASSES).enumerate() {
        for _ in 0..per_cluster {
            out.push(Point::labeled(
                rng.gen_normal(cx, spread),
                rng.gen_normal(cy, spread),
                label,
            ));
        }
    }
    out
}

/// `y = slope * x + intercept + noise`, with `x` uniform in `x_range`.
pub fn noisy_line(
    rng: &mut Prng,
    n: usize,
    slope: f64,
    intercept: f64,
    noise: f64,
    x_range: (f64, f64),
) -> Vec<Point> {
    (0..n)
        .map(|_| {
            let x = rng.gen_range_f64(x_range.0, x_range.1);
            Point::new(x, slope * x + intercept + rng.gen_normal(0.0, noise))
        })
        .collect()
}

/// Two overlapping score populations squashed into `[0, 1]`.
///
/// Positives are centred at `+separation / 2`, negatives at `-separation / 2`
/// (in logit space) so `separation = 0` gives indistinguishable classes.
pub fn two_class_scores(
    rng: &mut Prng,
    n_pos: usize,
    n_neg: usize,
    separation: f64,
    spread: f64,
) -> Vec<Scored> {
    let squash = |z: f64| 1.0 / (1.0 + (-z).exp());
    let mut out = Vec::with_capacity(n_pos + n_neg);
    for _ in 0..n_pos {
        out.push(Scored {
            score: squash(rng.gen_normal(separation / 2.0, spread)),
            positive: true,
        });
    }
    for _ in 0..n_neg {
        out.push(Scored {
            score: squash(rng.gen_normal(-separation / 2.0, spread)),
            positive: false,
        });
    }
    out
}

/// Keep only the first `labeled_per_class` labels of every class.
///
/// Returns the points (labels hidden where dropped) together with the
/// ground-truth labels for scoring.
pub fn partially_labeled(
    points: &[Point],
    labeled_per_class: usize,
) -> (Vec<Point>, Vec<Option<usize>>) {
    let mut seen = [0usize; MAX_CLASSES];
    let truth = points.iter().map(|p| p.label).collect();
    let hidden = points
        .iter()
        .map(|p| {
            let mut q = *p;
            if let Some(c) = p.label {
                if c < MAX_CLASSES && seen[c] < labeled_per_class {
                    seen[c] += 1;
                } else {
                    q.label = None;
                }
            }
            q
        })
        .collect();
    (hidden, truth)
}

/// Axis-aligned bounds of a point set, `None` when empty.
pub fn bounds(points: &[Point]) -> Option<(Point, Point)> {
    let first = points.first()?;
    let mut lo = Point::new(first.x, first.y);
    let mut hi = lo;
    for p in &points[1..] {
        lo.x = lo.x.min(p.x);
        lo.y = lo.y.min(p.y);
        hi.x = hi.x.max(p.x);
        hi.y = hi.y.max(p.y);
    }
    Some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blobs_are_labeled_by_center() {
        let mut rng = Prng::new(5);
        let pts = gaussian_blobs(&mut rng, &[(-3.0, 0.0), (3.0, 0.0)], 40, 0.3);
        assert_eq!(pts.len(), 80);
        for p in &pts {
            let c = p.label.unwrap();
            let expected_x = if c == 0 { -3.0 } else { 3.0 };
            assert!((p.x - expected_x).abs() < 2.0);
        }
    }

    #[test]
    fn blob_counts_are_capped() {
        let mut rng = Prng::new(5);
        let centers = [(0.0, 0.0); 7];
        let pts = gaussian_blobs(&mut rng, &centers, 500, 1.0);
        assert_eq!(pts.len(), MAX_CLASSES * MAX_PER_CLASS);
    }

    #[test]
    fn scores_are_probabilities() {
        let mut rng = Prng::new(8);
        let s = two_class_scores(&mut rng, 50, 70, 2.0, 1.0);
        assert_eq!(s.iter().filter(|s| s.positive).count(), 50);
        assert!(s.iter().all(|s| (0.0..=1.0).contains(&s.score)));
    }

    #[test]
    fn partially_labeled_keeps_quota_per_class() {
        let mut rng = Prng::new(11);
        let pts = gaussian_blobs(&mut rng, &[(0.0, 0.0), (5.0, 5.0)], 20, 0.5);
        let (hidden, truth) = partially_labeled(&pts, 3);
        assert_eq!(hidden.iter().filter(|p| p.label.is_some()).count(), 6);
        assert!(truth.iter().all(Option::is_some));
    }

    #[test]
    fn bounds_of_empty_is_none() {
        assert!(bounds(&[]).is_none());
        let (lo, hi) = bounds(&[Point::new(1.0, -2.0), Point::new(-1.0, 4.0)]).unwrap();
        assert_eq!((lo.x, lo.y, hi.x, hi.y), (-1.0, -2.0, 1.0, 4.0));
    }
}
