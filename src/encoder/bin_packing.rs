//! Vector-bin-packing encoders (`spec.md` §4.5): optimal placement and the
//! FFD family (FF, FFDSum, FFDProd, FFDDiv). FFD's ordering is imposed as a
//! feasibility program (`InnerProblem::feasibility`) per `spec.md` §4.4.3:
//! it is a deterministic algorithm, not an inner optimization, so only a
//! feasibility rewrite applies.

use std::collections::HashMap;

use crate::algebra::Polynomial;
use crate::encoder::{resolve_input_variables, Encoder, Encoding, InnerProblem, Solution};
use crate::error::MetaOptResult;
use crate::external::Bins;
use crate::solver::{SolverBackend, SolverValues, VarKind, Variable};

/// Vector-bin-packing optimal: items with per-dimension sizes placed into
/// bins; capacity is a linear constraint per bin per dimension; objective
/// is bins used (maximized as its negation, so a smaller bin count is a
/// larger gap target when compared against a heuristic that uses more).
/// Symmetry breaker: item `i` may only be placed in a bin `<= i`.
pub struct VbpOptimalEncoder {
    bins: Bins,
    num_items: usize,
    size_ub: f64,
    problem: InnerProblem,
    placed: Vec<Vec<Variable>>,
    bin_used: Vec<Variable>,
    input_variables: HashMap<usize, Vec<Variable>>,
    global_objective: Option<Variable>,
}

impl VbpOptimalEncoder {
    pub fn new(bins: Bins, num_items: usize, size_ub: f64) -> Self {
        Self {
            bins,
            num_items,
            size_ub,
            problem: InnerProblem::default(),
            placed: Vec::new(),
            bin_used: Vec::new(),
            input_variables: HashMap::new(),
            global_objective: None,
        }
    }

    pub fn placed(&self) -> &[Vec<Variable>] {
        &self.placed
    }
}

impl Encoder for VbpOptimalEncoder {
    fn encode(
        &mut self,
        backend: &mut dyn SolverBackend,
        pre_input_variables: Option<&HashMap<usize, Vec<Variable>>>,
        input_equalities: Option<&HashMap<usize, Vec<f64>>>,
    ) -> MetaOptResult<Encoding> {
        let dims = self.bins.dimensions().max(1);
        let inputs = resolve_input_variables(
            backend,
            self.num_items,
            dims,
            "vbp_size",
            0.0,
            self.size_ub,
            pre_input_variables,
            input_equalities,
        )?;

        let num_bins = self.bins.count();
        let mut placed = vec![Vec::with_capacity(num_bins); self.num_items];
        let mut bin_used = Vec::with_capacity(num_bins);
        let mut primal_variables = Vec::new();

        for b in 0..num_bins {
            let used = backend.create_variable(&format!("vbp_used[{b}]"), VarKind::Binary, 0.0, 1.0);
            bin_used.push(used);
            primal_variables.push(used);
        }

        for i in 0..self.num_items {
            // Symmetry breaker: item i only to bin <= i.
            let reachable_bins = (0..num_bins).filter(|&b| b <= i);
            for b in reachable_bins {
                let place = backend.create_variable(&format!("vbp_place[{i}][{b}]"), VarKind::Binary, 0.0, 1.0);
                placed[i].push(place);
                primal_variables.push(place);
            }
        }

        let mut equalities = Vec::new();
        let mut inequalities = Vec::new();

        for i in 0..self.num_items {
            let mut placement_sum = Polynomial::zero();
            for &place in &placed[i] {
                placement_sum = placement_sum.add(&Polynomial::from_variable(1.0, place));
            }
            let exactly_one = placement_sum.add(&Polynomial::constant(-1.0));
            backend.add_eq_zero(exactly_one.copy());
            equalities.push(exactly_one);
        }

        for b in 0..num_bins {
            for d in 0..dims {
                let mut usage = Polynomial::zero();
                for i in 0..self.num_items {
                    if b >= placed[i].len() {
                        continue;
                    }
                    let size = inputs[&i][d];
                    let product = backend.linearize_binary_times_continuous(placed[i][b], size, self.size_ub);
                    usage = usage.add(&Polynomial::from_variable(1.0, product));
                }
                let capacity = self.bins.capacity(b, d);
                let inequality = usage.sub(&Polynomial::from_variable(capacity, bin_used[b]));
                backend.add_leq_zero(inequality.copy());
                inequalities.push(inequality);
            }
            // A bin is "used" if any item is placed in it.
            for i in 0..self.num_items {
                if b >= placed[i].len() {
                    continue;
                }
                let inequality = Polynomial::from_variable(1.0, placed[i][b]).sub(&Polynomial::from_variable(1.0, bin_used[b]));
                backend.add_leq_zero(inequality.copy());
                inequalities.push(inequality);
            }
        }

        let mut bins_used_count = Polynomial::zero();
        for &used in &bin_used {
            bins_used_count = bins_used_count.add(&Polynomial::from_variable(1.0, used));
        }
        // The driver maximizes; fewer bins used is "better" for the
        // optimal encoder, so its inner objective is the negated count.
        let objective = bins_used_count.negate();

        let global = backend.create_variable("vbp_global", VarKind::Continuous, f64::NEG_INFINITY, f64::INFINITY);
        backend.add_eq_zero(Polynomial::from_variable(1.0, global).sub(&objective));

        self.placed = placed;
        self.bin_used = bin_used;
        self.input_variables = inputs.clone();
        self.global_objective = Some(global);
        self.problem = InnerProblem::optimization(primal_variables, equalities, inequalities, objective.clone());

        Ok(Encoding {
            inner_max_objective: objective,
            global_objective: global,
            input_variables: inputs,
        })
    }

    fn inner_problem(&self) -> &InnerProblem {
        &self.problem
    }

    fn extract_solution(&self, values: &SolverValues) -> Solution {
        let input_values = self
            .input_variables
            .iter()
            .map(|(i, vars)| (*i, vars.iter().map(|&v| values.get(v)).collect()))
            .collect();
        let mut variable_values = HashMap::new();
        for vars in &self.placed {
            for &p in vars {
                variable_values.insert(p, values.get(p));
            }
        }
        for &used in &self.bin_used {
            variable_values.insert(used, values.get(used));
        }
        let global_objective = self.global_objective.map(|g| values.get(g)).unwrap_or(0.0);
        Solution {
            input_values,
            variable_values,
            global_objective,
        }
    }
}

/// The weight function used to order items before FFD places them.
/// `spec.md` §4.5: "FFD (none), FFDSum, FFDProd (requires binary x
/// continuous linearization), FFDDiv (two-dimension only)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfdWeight {
    FirstFit,
    Sum,
    Product,
    Ratio,
}

/// First-fit-decreasing: items are placed one at a time, in the order
/// `weight` prescribes, into the first bin with room. Expressed as a
/// feasibility program: `fit[i][b]` is forced to 1 exactly when bin b has
/// room for item i given everything already placed ahead of it in the
/// ordering, and item i is placed in the first bin with `fit[i][b] = 1`.
pub struct FfdEncoder {
    bins: Bins,
    num_items: usize,
    size_ub: f64,
    weight: FfdWeight,
    order: Vec<usize>,
    problem: InnerProblem,
    placed: Vec<Vec<Variable>>,
    bin_used: Vec<Variable>,
    input_variables: HashMap<usize, Vec<Variable>>,
    global_objective: Option<Variable>,
}

impl FfdEncoder {
    /// `order` is the item processing order (already sorted by `weight`
    /// against concrete item sizes known ahead of the solve — the weight
    /// function itself is a pure function of fixed item sizes the caller
    /// supplies up front, matching `spec.md`'s "sorting is imposed by a
    /// monotonicity constraint" framing via a fixed order plus an explicit
    /// monotonicity check the caller can run as invariant I6).
    pub fn new(bins: Bins, num_items: usize, size_ub: f64, weight: FfdWeight, order: Vec<usize>) -> Self {
        Self {
            bins,
            num_items,
            size_ub,
            weight,
            order,
            problem: InnerProblem::default(),
            placed: Vec::new(),
            bin_used: Vec::new(),
            input_variables: HashMap::new(),
            global_objective: None,
        }
    }

    pub fn weight(&self) -> FfdWeight {
        self.weight
    }
}

impl Encoder for FfdEncoder {
    fn encode(
        &mut self,
        backend: &mut dyn SolverBackend,
        pre_input_variables: Option<&HashMap<usize, Vec<Variable>>>,
        input_equalities: Option<&HashMap<usize, Vec<f64>>>,
    ) -> MetaOptResult<Encoding> {
        let dims = self.bins.dimensions().max(1);
        let inputs = resolve_input_variables(
            backend,
            self.num_items,
            dims,
            "ffd_size",
            0.0,
            self.size_ub,
            pre_input_variables,
            input_equalities,
        )?;

        let num_bins = self.bins.count();
        let mut placed = vec![Vec::with_capacity(num_bins); self.num_items];
        let mut primal_variables = Vec::new();
        for i in 0..self.num_items {
            for b in 0..num_bins {
                let place = backend.create_variable(&format!("ffd_place[{i}][{b}]"), VarKind::Binary, 0.0, 1.0);
                placed[i].push(place);
                primal_variables.push(place);
            }
        }

        let mut equalities = Vec::new();
        let mut inequalities = Vec::new();

        for &i in &self.order {
            let mut placement_sum = Polynomial::zero();
            for &place in &placed[i] {
                placement_sum = placement_sum.add(&Polynomial::from_variable(1.0, place));
            }
            let exactly_one = placement_sum.add(&Polynomial::constant(-1.0));
            backend.add_eq_zero(exactly_one.copy());
            equalities.push(exactly_one);

            // Place item i into the first bin with room, considering only
            // items that precede it in the processing order. A bin must
            // fit the item in every dimension, and - to pin down "first",
            // not merely "some" - item i may only land in bin b if every
            // earlier bin b' < b lacks room in at least one dimension.
            let predecessors: Vec<usize> = self.order.iter().copied().take_while(|&j| j != i).collect();
            let mut full_room = Vec::with_capacity(num_bins);
            for b in 0..num_bins {
                let mut room_per_dim = Vec::with_capacity(dims);
                for d in 0..dims {
                    let mut usage = Polynomial::zero();
                    for &j in &predecessors {
                        let size = inputs[&j][d];
                        let product = backend.linearize_binary_times_continuous(placed[j][b], size, self.size_ub);
                        usage = usage.add(&Polynomial::from_variable(1.0, product));
                    }
                    let room_for_item = Polynomial::from_variable(self.item_weight_scale(), inputs[&i][d]);
                    let capacity = self.bins.capacity(b, d);
                    let has_room = usage.add(&room_for_item).add(&Polynomial::constant(-capacity));
                    let big_m = (capacity.abs().max(self.size_ub) + 1.0) * 2.0;

                    // Forbid placement outright whenever this dimension alone lacks room.
                    let forbids_placement = has_room.clone().sub(&Polynomial::from_variable(big_m, placed[i][b]));
                    backend.add_leq_zero(forbids_placement.copy());
                    inequalities.push(forbids_placement);

                    // room = 1 iff this dimension has room (has_room <= 0).
                    let room = backend.create_variable(&format!("ffd_room[{i}][{b}][{d}]"), VarKind::Binary, 0.0, 1.0);
                    let upper = has_room
                        .clone()
                        .add(&Polynomial::constant(-big_m))
                        .add(&Polynomial::from_variable(big_m, room));
                    let lower = Polynomial::constant(1e-6).sub(&has_room).sub(&Polynomial::from_variable(big_m, room));
                    backend.add_leq_zero(upper.copy());
                    backend.add_leq_zero(lower.copy());
                    inequalities.push(upper);
                    inequalities.push(lower);
                    room_per_dim.push(room);
                }
                let mut room_all_dims = room_per_dim[0];
                for &r in &room_per_dim[1..] {
                    room_all_dims = backend.linearize_binary_times_binary(room_all_dims, r);
                }
                full_room.push(room_all_dims);
            }

            for b in 0..num_bins {
                for &earlier_full_room in &full_room[..b] {
                    // If an earlier bin still has room in every dimension, item i
                    // cannot skip it to land in b.
                    let skip = Polynomial::from_variable(1.0, placed[i][b])
                        .add(&Polynomial::from_variable(1.0, earlier_full_room))
                        .add(&Polynomial::constant(-1.0));
                    backend.add_leq_zero(skip.copy());
                    inequalities.push(skip);
                }
            }
        }

        // A bin is "used" if any item is placed in it (mirrors
        // `VbpOptimalEncoder`'s bin_used indicator): summing raw placement
        // bits would double-count bins holding more than one item.
        let mut bin_used = Vec::with_capacity(num_bins);
        for b in 0..num_bins {
            let used = backend.create_variable(&format!("ffd_used[{b}]"), VarKind::Binary, 0.0, 1.0);
            for i in 0..self.num_items {
                let inequality = Polynomial::from_variable(1.0, placed[i][b]).sub(&Polynomial::from_variable(1.0, used));
                backend.add_leq_zero(inequality.copy());
                inequalities.push(inequality);
            }
            primal_variables.push(used);
            bin_used.push(used);
        }
        let mut bins_used = Polynomial::zero();
        for &used in &bin_used {
            bins_used = bins_used.add(&Polynomial::from_variable(1.0, used));
        }

        // The feasibility program has no objective; the rewriter emits only
        // the feasibility rewrite (spec.md §4.4.3).
        let global = backend.create_variable("ffd_global", VarKind::Continuous, f64::NEG_INFINITY, f64::INFINITY);
        backend.add_eq_zero(Polynomial::from_variable(1.0, global).add(&bins_used.scale(-1.0)));

        self.placed = placed;
        self.bin_used = bin_used;
        self.input_variables = inputs.clone();
        self.global_objective = Some(global);
        self.problem = InnerProblem::feasibility(primal_variables, equalities, inequalities);

        Ok(Encoding {
            inner_max_objective: bins_used.negate(),
            global_objective: global,
            input_variables: inputs,
        })
    }

    fn inner_problem(&self) -> &InnerProblem {
        &self.problem
    }

    fn extract_solution(&self, values: &SolverValues) -> Solution {
        let input_values = self
            .input_variables
            .iter()
            .map(|(i, vars)| (*i, vars.iter().map(|&v| values.get(v)).collect()))
            .collect();
        let mut variable_values = HashMap::new();
        for vars in &self.placed {
            for &p in vars {
                variable_values.insert(p, values.get(p));
            }
        }
        for &used in &self.bin_used {
            variable_values.insert(used, values.get(used));
        }
        let global_objective = self.global_objective.map(|g| values.get(g)).unwrap_or(0.0);
        Solution {
            input_values,
            variable_values,
            global_objective,
        }
    }
}

impl FfdEncoder {
    fn item_weight_scale(&self) -> f64 {
        match self.weight {
            FfdWeight::FirstFit | FfdWeight::Sum | FfdWeight::Product | FfdWeight::Ratio => 1.0,
        }
    }
}

/// Checks invariant I6 (FFD monotonicity) for `FfdWeight::Sum`: the order
/// must be non-increasing in the summed item size.
pub fn check_ffd_sum_monotonic(sizes: &[Vec<f64>], order: &[usize]) -> bool {
    order.windows(2).all(|pair| {
        let a: f64 = sizes[pair[0]].iter().sum();
        let b: f64 = sizes[pair[1]].iter().sum();
        a >= b - 1e-9
    })
}

/// Checks invariant I6 for `FfdWeight::Ratio` (two-dimensional only):
/// non-increasing in `size[0] / size[1]`.
pub fn check_ffd_ratio_monotonic(sizes: &[Vec<f64>], order: &[usize]) -> bool {
    order.windows(2).all(|pair| {
        let a = sizes[pair[0]][0] / sizes[pair[0]][1];
        let b = sizes[pair[1]][0] / sizes[pair[1]][1];
        a >= b - 1e-9
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::solver::milp::ReferenceMilpBackend;
    use crate::solver::Status;
    use crate::terminators::TimeOutTerminator;

    /// `spec.md` §8 scenario 4 cites a VBP paper gadget (two-dimensional
    /// bins of size 1.0001, "4m+6n" bins, a demand list "tabulated in
    /// §4.5") whose exact table isn't present in this distillation and
    /// isn't recoverable from `original_source/` either (confirmed
    /// empty). This reproduces the scenario's literal shape - a vector bin
    /// packing instance where the optimal packer needs strictly fewer bins
    /// than first-fit-decreasing-by-sum - with an independently
    /// constructed, hand-verified gadget instead: six items sized
    /// [6,5,4,4,3,2] (equal in both of 2 dimensions) into bins of capacity
    /// 12. A 2-bin partition exists ({6,4,2} and {5,4,3}, both summing to
    /// 12), so `opt = 2`. Decreasing-sum order forces FFDSum's first-fit
    /// placement (bin0={6,5}=11, bin1={4,4,3}=11, bin2={2}) to open a
    /// third bin even though the first is never full enough for the last
    /// item to join it, so `FFDSum = 3`.
    #[test]
    fn vbp_ffd_gap_scenario() {
        let sizes: HashMap<usize, Vec<f64>> = [
            (0, vec![6.0, 6.0]),
            (1, vec![5.0, 5.0]),
            (2, vec![4.0, 4.0]),
            (3, vec![4.0, 4.0]),
            (4, vec![3.0, 3.0]),
            (5, vec![2.0, 2.0]),
        ]
        .into_iter()
        .collect();
        let order = vec![0, 1, 2, 3, 4, 5];
        assert!(check_ffd_sum_monotonic(
            &(0..6).map(|i| sizes[&i].clone()).collect::<Vec<_>>(),
            &order
        ));

        let mut backend = ReferenceMilpBackend::new(true);

        let bins = Bins::uniform(4, vec![12.0, 12.0]);
        let mut optimal = VbpOptimalEncoder::new(bins.clone(), 6, 6.0);
        let opt_encoding = optimal.encode(&mut backend, None, Some(&sizes)).unwrap();

        let mut callback = NoOpCallback;
        let mut opt_terminator = TimeOutTerminator::new(5);
        let (opt_status, opt_values) = backend
            .maximize(&opt_encoding.inner_max_objective, true, &mut callback, &mut opt_terminator)
            .unwrap();
        assert_eq!(opt_status, Status::Optimal);
        let opt_solution = optimal.extract_solution(&opt_values);
        assert!((opt_solution.global_objective - (-2.0)).abs() < 1e-6);

        let mut heuristic = FfdEncoder::new(bins, 6, 6.0, FfdWeight::Sum, order);
        let heu_encoding = heuristic.encode(&mut backend, None, Some(&sizes)).unwrap();
        let mut heu_terminator = TimeOutTerminator::new(5);
        let (heu_status, heu_values) = backend
            .maximize(&heu_encoding.inner_max_objective, true, &mut callback, &mut heu_terminator)
            .unwrap();
        assert!(heu_status.has_usable_incumbent());
        let heu_solution = heuristic.extract_solution(&heu_values);
        assert!((heu_solution.global_objective - (-3.0)).abs() < 1e-6);

        assert!(opt_solution.global_objective + 1e-6 >= heu_solution.global_objective);
    }

    #[test]
    fn ffd_sum_monotonicity_holds_for_sorted_order() {
        let sizes = vec![vec![3.0, 3.0], vec![2.0, 2.0], vec![1.0, 1.0]];
        assert!(check_ffd_sum_monotonic(&sizes, &[0, 1, 2]));
        assert!(!check_ffd_sum_monotonic(&sizes, &[2, 1, 0]));
    }
}
