//! Clustering decomposition (component C7, `spec.md` §4.7): when inputs
//! decompose along structural boundaries (one sub-topology per cluster),
//! solve each cluster's bilevel instance independently, then fold the
//! per-cluster gaps into a reduced cross-cluster summary. Documented, per
//! `spec.md`, as a *heuristic* lower bound on the true gap — never used
//! when a caller requires a certified gap, since decomposition drops
//! cross-cluster interactions the combined model would otherwise capture.
//!
//! `spec.md` §4.7 step 2 additionally runs "one more bilevel solve" over
//! the reduced aggregate; this crate narrows that to the plain-arithmetic
//! [`aggregate_clusters`] below, since no cross-cluster encoder pair is
//! named anywhere in `spec.md`'s C5 list to build a second bilevel solve
//! from (see DESIGN.md §7). Step 3 ("recompose") is left to the caller.

use crate::callback::Callback;
use crate::driver::{maximize_optimality_gap, DriverOptions, DriverState, InnerRewrite};
use crate::encoder::{Encoder, Solution};
use crate::error::MetaOptResult;
use crate::solver::SolverBackend;

/// One cluster's inputs and encoders, each cluster getting its own solver
/// session (`spec.md` §5: "each cluster's bilevel is a separate solver
/// session, executed sequentially").
pub struct ClusterSpec {
    pub optimal: Box<dyn Encoder>,
    pub heuristic: Box<dyn Encoder>,
    pub num_inputs: usize,
    pub dims: usize,
    pub input_ub: f64,
}

pub struct ClusterResult {
    pub optimal: Solution,
    pub heuristic: Solution,
    pub state: DriverState,
    pub gap: f64,
}

/// The reduced cross-cluster summary (step 2 of `spec.md` §4.7): exposes
/// only aggregate statistics the inter-cluster level is allowed to reason
/// about, never raw per-cluster decision variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterAggregate {
    /// Fraction of clusters with a strictly positive gap.
    pub density: f64,
    /// Number of clusters whose gap is at least `large_gap_threshold`.
    pub large_gap_count: usize,
    /// Sum of per-cluster gaps — the decomposition's heuristic lower bound
    /// on the true (non-decomposed) optimality gap.
    pub aggregate_gap: f64,
}

/// Runs `MaximizeOptimalityGap` per cluster with `per_cluster_timeout_secs`,
/// using a fresh solver session per cluster from `backend_factory` (step 1),
/// then folds the per-cluster gaps into a [`ClusterAggregate`] (step 2).
///
/// Recomposition (step 3: "per-cluster solution used as a warm start or as
/// an equality on non-cross-cluster inputs") is left to the caller: each
/// [`ClusterResult::optimal`]/`heuristic` already carries the pinned input
/// vector an outer combined model (or a later warm-started re-solve) can
/// reuse as `inputEqualities`.
pub fn solve_clusters(
    clusters: Vec<ClusterSpec>,
    backend_factory: &mut dyn FnMut() -> Box<dyn SolverBackend>,
    per_cluster_timeout_secs: u64,
    rewrite: InnerRewrite,
    large_gap_threshold: f64,
    callback: &mut dyn Callback,
) -> MetaOptResult<(Vec<ClusterResult>, ClusterAggregate)> {
    let mut results = Vec::with_capacity(clusters.len());

    for mut cluster in clusters {
        let mut backend = backend_factory();
        let options = DriverOptions {
            timeout_secs: per_cluster_timeout_secs,
            ..DriverOptions::default()
        };

        let (optimal, heuristic, state) = maximize_optimality_gap(
            backend.as_mut(),
            cluster.optimal.as_mut(),
            cluster.heuristic.as_mut(),
            cluster.num_inputs,
            cluster.dims,
            cluster.input_ub,
            rewrite,
            None,
            &options,
            callback,
        )?;

        let gap = optimal.global_objective - heuristic.global_objective;
        results.push(ClusterResult {
            optimal,
            heuristic,
            state,
            gap,
        });
    }

    let aggregate = aggregate_clusters(&results, large_gap_threshold);
    Ok((results, aggregate))
}

fn aggregate_clusters(results: &[ClusterResult], large_gap_threshold: f64) -> ClusterAggregate {
    if results.is_empty() {
        return ClusterAggregate::default();
    }
    let active = results.iter().filter(|r| r.gap > 1e-9).count();
    let large_gap_count = results.iter().filter(|r| r.gap >= large_gap_threshold).count();
    let aggregate_gap = results.iter().map(|r| r.gap).sum();
    ClusterAggregate {
        density: active as f64 / results.len() as f64,
        large_gap_count,
        aggregate_gap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::encoder::demand_pinning::{DemandPinningEncoder, ThresholdTest};
    use crate::encoder::traffic::{Commodity, TrafficEncoder};
    use crate::external::Topology;
    use crate::solver::milp::ReferenceMilpBackend;

    fn diamond() -> Topology {
        let mut topology = Topology::new(4);
        topology.add_edge(0, 1, 10.0);
        topology.add_edge(0, 2, 10.0);
        topology.add_edge(1, 3, 10.0);
        topology.add_edge(2, 3, 10.0);
        topology
    }

    #[test]
    fn two_identical_diamond_clusters_aggregate_nonnegative_gap() {
        let mut clusters = Vec::new();
        for _ in 0..2 {
            let topology = diamond();
            let paths = topology.k_shortest_paths(0, 3, 2);
            let commodity = Commodity::new(0, 3, paths);
            clusters.push(ClusterSpec {
                optimal: Box::new(TrafficEncoder::new(topology.clone(), vec![commodity.clone()], 40.0)),
                heuristic: Box::new(DemandPinningEncoder::new(topology, vec![commodity], 40.0, 5.0, ThresholdTest::Direct, None)),
                num_inputs: 1,
                dims: 1,
                input_ub: 40.0,
            });
        }

        let mut callback = NoOpCallback;
        let (results, aggregate) = solve_clusters(
            clusters,
            &mut || Box::new(ReferenceMilpBackend::new(true)),
            5,
            InnerRewrite::Kkt,
            5.0,
            &mut callback,
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        assert!(aggregate.aggregate_gap >= -1e-6);
        assert!(aggregate.density >= 0.0 && aggregate.density <= 1.0);
    }
}
