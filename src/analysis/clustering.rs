//! analysis::clustering — collapse duplicate minima into representatives.
//!
//! Purpose
//! -------
//! A dense candidate search typically lands many points on the same true
//! minimum. [`DistinctMinimaClusterer`] groups points whose Euclidean
//! distance is within a threshold, transitively, and reports one
//! representative per group.
//!
//! Key behaviors
//! -------------
//! - Clusters are the connected components of the threshold graph
//!   (`‖p_i − p_j‖ ≤ threshold`), computed with a union-find. The result
//!   does not depend on input order beyond cluster numbering.
//! - Candidate pairs are generated by sorting on the first coordinate and
//!   sweeping a window of width `threshold`, so far-apart points are never
//!   compared.
//! - Cluster ids follow the first appearance of a member in input order.
//! - The representative is the member nearest the cluster centroid; ties go
//!   to the lower objective value, then to the lower input index.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every input index belongs to exactly one cluster; the number of
//!   clusters never exceeds the number of inputs.
//! - All points share one dimension and have finite coordinates.
use crate::{
    analysis::{
        errors::{AnalysisError, AnalysisResult},
        hessian::HessianKind,
    },
    refinement::local_optimizer::types::Point,
};
use ndarray::Array1;
use petgraph::unionfind::UnionFind;
use std::cmp::Ordering;

/// A point paired with its objective value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredPoint {
    pub point: Point,
    pub value: f64,
}

impl ScoredPoint {
    pub fn new(point: Point, value: f64) -> Self {
        Self { point, value }
    }
}

/// One group of mutually reachable minima.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cluster {
    pub id: usize,
    /// Input indices, ascending.
    pub members: Vec<usize>,
    pub centroid: Point,
    /// Input index of the representative member.
    pub representative: usize,
}

/// Mapping from input indices to clusters.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterAssignment {
    /// `labels[i]` is the cluster id of input `i`.
    pub labels: Vec<usize>,
    pub clusters: Vec<Cluster>,
}

impl ClusterAssignment {
    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Input indices of the representatives, in cluster-id order.
    pub fn representatives(&self) -> Vec<usize> {
        self.clusters.iter().map(|c| c.representative).collect()
    }

    pub fn cluster_of(&self, index: usize) -> Option<&Cluster> {
        self.labels.get(index).and_then(|&id| self.clusters.get(id))
    }
}

/// Threshold-graph clusterer for minima.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistinctMinimaClusterer {
    distance_threshold: f64,
}

impl DistinctMinimaClusterer {
    /// # Errors
    /// [`AnalysisError::InvalidThreshold`] unless finite and > 0.
    pub fn new(distance_threshold: f64) -> AnalysisResult<Self> {
        if !distance_threshold.is_finite() || distance_threshold <= 0.0 {
            return Err(AnalysisError::InvalidThreshold {
                value: distance_threshold,
                reason: "Distance threshold must be finite and positive.",
            });
        }
        Ok(Self { distance_threshold })
    }

    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    /// cluster — group minima and pick representatives.
    ///
    /// Parameters
    /// ----------
    /// - `minima`: points with their objective values. May be empty.
    ///
    /// Returns
    /// -------
    /// A [`ClusterAssignment`] covering every input index.
    ///
    /// Errors
    /// ------
    /// - [`AnalysisError::DimensionMismatch`] if points differ in length.
    /// - [`AnalysisError::NonFiniteCoordinate`] for NaN/∞ coordinates.
    pub fn cluster(&self, minima: &[ScoredPoint]) -> AnalysisResult<ClusterAssignment> {
        let n = minima.len();
        if n == 0 {
            return Ok(ClusterAssignment::default());
        }
        validate_points(minima)?;

        let mut union_find = UnionFind::<usize>::new(n);
        let mut order: Vec<usize> = (0..n).collect();
        let key = |i: usize| minima[i].point.get(0).copied().unwrap_or(0.0);
        order.sort_by(|&a, &b| key(a).total_cmp(&key(b)));
        for (pos, &i) in order.iter().enumerate() {
            for &j in &order[pos + 1..] {
                if key(j) - key(i) > self.distance_threshold {
                    break;
                }
                if distance(&minima[i].point, &minima[j].point) <= self.distance_threshold {
                    union_find.union(i, j);
                }
            }
        }

        let mut root_to_id: Vec<Option<usize>> = vec![None; n];
        let mut labels = Vec::with_capacity(n);
        let mut members: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            let root = union_find.find_mut(i);
            let id = match root_to_id[root] {
                Some(id) => id,
                None => {
                    let id = members.len();
                    root_to_id[root] = Some(id);
                    members.push(Vec::new());
                    id
                }
            };
            labels.push(id);
            members[id].push(i);
        }

        let clusters = members
            .into_iter()
            .enumerate()
            .map(|(id, members)| {
                let centroid = centroid(minima, &members);
                let representative = pick_representative(minima, &members, &centroid);
                Cluster { id, members, centroid, representative }
            })
            .collect();
        Ok(ClusterAssignment { labels, clusters })
    }

    /// The representative minima themselves, in cluster-id order.
    ///
    /// # Errors
    /// Same as [`DistinctMinimaClusterer::cluster`].
    pub fn representatives(&self, minima: &[ScoredPoint]) -> AnalysisResult<Vec<ScoredPoint>> {
        let assignment = self.cluster(minima)?;
        Ok(assignment.representatives().into_iter().map(|i| minima[i].clone()).collect())
    }

    /// cluster_minima — keep only points labelled `Minimum`, then cluster.
    ///
    /// Returns the input indices of the kept points alongside the
    /// assignment, whose member indices refer to the kept subset.
    ///
    /// # Errors
    /// - [`AnalysisError::LengthMismatch`] if `kinds.len() != points.len()`.
    /// - Errors of [`DistinctMinimaClusterer::cluster`].
    pub fn cluster_minima(
        &self, points: &[ScoredPoint], kinds: &[HessianKind],
    ) -> AnalysisResult<(Vec<usize>, ClusterAssignment)> {
        if kinds.len() != points.len() {
            return Err(AnalysisError::LengthMismatch {
                what: "point kinds",
                expected: points.len(),
                found: kinds.len(),
            });
        }
        let kept: Vec<usize> =
            (0..points.len()).filter(|&i| kinds[i] == HessianKind::Minimum).collect();
        let minima: Vec<ScoredPoint> = kept.iter().map(|&i| points[i].clone()).collect();
        let assignment = self.cluster(&minima)?;
        Ok((kept, assignment))
    }
}

// ---- Helper methods ----

fn validate_points(minima: &[ScoredPoint]) -> AnalysisResult<()> {
    let dim = minima[0].point.len();
    for (p, sp) in minima.iter().enumerate() {
        if sp.point.len() != dim {
            return Err(AnalysisError::DimensionMismatch {
                what: "minima coordinates",
                expected: dim,
                found: sp.point.len(),
            });
        }
        if let Some((index, &value)) = sp.point.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::NonFiniteCoordinate { point: p, index, value });
        }
    }
    Ok(())
}

fn distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

fn centroid(minima: &[ScoredPoint], members: &[usize]) -> Point {
    let dim = minima[members[0]].point.len();
    let mut sum = Array1::<f64>::zeros(dim);
    for &i in members {
        sum += &minima[i].point;
    }
    sum / members.len() as f64
}

fn pick_representative(minima: &[ScoredPoint], members: &[usize], centroid: &Point) -> usize {
    let rank = |&a: &usize, &b: &usize| -> Ordering {
        let da = distance(&minima[a].point, centroid);
        let db = distance(&minima[b].point, centroid);
        da.total_cmp(&db)
            .then_with(|| minima[a].value.total_cmp(&minima[b].value))
            .then_with(|| a.cmp(&b))
    };
    members.iter().copied().min_by(|a, b| rank(a, b)).unwrap_or(members[0])
}
