//! Minimal in-crate stand-ins for the external collaborators `spec.md` §6
//! treats as inputs the core only *consumes*: `Topology`, `Bins`,
//! `Partitions`, `LevelSet`. These are deliberately thin test fixtures, not
//! general graph/partitioning libraries — just enough to run the literal
//! end-to-end scenarios in `spec.md` §8 (diamond topology, the VBP paper
//! gadget, the PIFO toy) without a separate crate.

use std::collections::HashMap;

/// A directed capacitated graph with precomputed k-shortest paths per
/// (src, dst) commodity. Real topology/path-finding logic (k-shortest
/// paths, random partitioning, small-world construction) belongs to an
/// external collaborator; this fixture accepts precomputed paths instead
/// of computing them.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    edges: Vec<(usize, usize, f64)>,
    node_count: usize,
}

impl Topology {
    pub fn new(node_count: usize) -> Self {
        Self {
            edges: Vec::new(),
            node_count,
        }
    }

    pub fn add_edge(&mut self, from: usize, to: usize, capacity: f64) {
        self.edges.push((from, to, capacity));
        self.node_count = self.node_count.max(from + 1).max(to + 1);
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edges(&self) -> &[(usize, usize, f64)] {
        &self.edges
    }

    pub fn edge_capacity(&self, from: usize, to: usize) -> Option<f64> {
        self.edges
            .iter()
            .find(|(f, t, _)| *f == from && *t == to)
            .map(|(_, _, cap)| *cap)
    }

    pub fn average_capacity(&self) -> f64 {
        if self.edges.is_empty() {
            0.0
        } else {
            self.edges.iter().map(|(_, _, c)| c).sum::<f64>() / self.edges.len() as f64
        }
    }

    pub fn min_capacity(&self) -> f64 {
        self.edges.iter().map(|(_, _, c)| *c).fold(f64::INFINITY, f64::min)
    }

    /// A simple unweighted breadth-first enumeration of up to `k` distinct
    /// simple paths from `src` to `dst`, ordered shortest-first. Enough for
    /// the diamond and similar small test topologies; not a general
    /// k-shortest-paths implementation.
    pub fn k_shortest_paths(&self, src: usize, dst: usize, k: usize) -> Vec<Vec<(usize, usize)>> {
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for (from, to, _) in &self.edges {
            adjacency.entry(*from).or_default().push(*to);
        }

        let mut paths = Vec::new();
        let mut stack = vec![(vec![src], vec![])];
        while let Some((visited, edges)) = stack.pop() {
            let last = *visited.last().unwrap();
            if last == dst && !edges.is_empty() {
                paths.push(edges);
                continue;
            }
            if let Some(neighbors) = adjacency.get(&last) {
                for &next in neighbors {
                    if visited.contains(&next) {
                        continue;
                    }
                    let mut visited2 = visited.clone();
                    visited2.push(next);
                    let mut edges2 = edges.clone();
                    edges2.push((last, next));
                    stack.push((visited2, edges2));
                }
            }
        }
        paths.sort_by_key(|p| p.len());
        paths.truncate(k);
        paths
    }

    /// Assigns each commodity index (`0..num_commodities`) to one of `m`
    /// partitions by index modulo `m` with a fixed seed-derived rotation —
    /// deterministic so `spec.md` §8 scenario 3 ("two partitions chosen
    /// uniformly at random with seed fixing") is reproducible without
    /// pulling in a full RNG stack for one call site.
    pub fn random_partition(&self, num_commodities: usize, m: usize, seed: u64) -> Partitions {
        let mut assignment = Vec::with_capacity(num_commodities);
        let mut state = seed.wrapping_add(1);
        for _ in 0..num_commodities {
            // xorshift64, deterministic and dependency-free
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            assignment.push((state as usize) % m.max(1));
        }
        Partitions { assignment }
    }
}

/// A total commodity -> partition-index map.
#[derive(Debug, Clone)]
pub struct Partitions {
    assignment: Vec<usize>,
}

impl Partitions {
    pub fn new(assignment: Vec<usize>) -> Self {
        Self { assignment }
    }

    pub fn partition_of(&self, commodity: usize) -> usize {
        self.assignment[commodity]
    }

    pub fn num_commodities(&self) -> usize {
        self.assignment.len()
    }

    pub fn num_partitions(&self) -> usize {
        self.assignment.iter().copied().max().map_or(0, |m| m + 1)
    }
}

/// An ordered sequence of bin-capacity vectors (one vector per dimension).
#[derive(Debug, Clone)]
pub struct Bins {
    capacities: Vec<Vec<f64>>,
}

impl Bins {
    pub fn uniform(count: usize, capacity: Vec<f64>) -> Self {
        Self {
            capacities: (0..count).map(|_| capacity.clone()).collect(),
        }
    }

    pub fn count(&self) -> usize {
        self.capacities.len()
    }

    pub fn dimensions(&self) -> usize {
        self.capacities.first().map_or(0, Vec::len)
    }

    pub fn capacity(&self, bin: usize, dimension: usize) -> f64 {
        self.capacities[bin][dimension]
    }
}

/// A closed, finite set of quantization levels per input dimension. Must
/// contain `0.0` and every threshold the heuristic under test reads, per
/// `spec.md` §4.4.2's required-closure rule; [`LevelSet::check_closure`]
/// verifies that contractually.
#[derive(Debug, Clone)]
pub struct LevelSet {
    levels: Vec<f64>,
}

impl LevelSet {
    pub fn new(mut levels: Vec<f64>) -> Self {
        levels.sort_by(|a, b| a.partial_cmp(b).unwrap());
        levels.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        Self { levels }
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Returns the names of any required values missing from this set
    /// (empty if closure holds).
    pub fn missing(&self, required: &[f64]) -> Vec<f64> {
        required
            .iter()
            .copied()
            .filter(|r| !self.levels.iter().any(|l| (l - r).abs() < 1e-9))
            .collect()
    }
}
