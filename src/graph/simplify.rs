//! Iterative graph cleaning: tip clipping, erroneous connection removal and
//! compression, driven by a small state machine.

use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// `e` hangs off a branch point and ends in a dead end.
pub fn is_tip(graph: &AssemblyGraph, e: EdgeId, max_length: usize) -> bool {
    let end = graph.end(e);
    graph.length(e) <= max_length
        && graph.out_degree(end) == 0
        && graph.in_degree(end) == 1
        && graph.out_degree(graph.start(e)) >= 2
}

/// Removes tips of at most `max_length` k-mers, shortest first, compressing
/// after every round until no tip is left. Returns the number of tips
/// removed (conjugate pairs counted once).
pub fn clip_tips(graph: &mut AssemblyGraph, max_length: usize) -> usize {
    let mut removed = 0;
    loop {
        let mut candidates: Vec<(usize, EdgeId)> = graph
            .edges()
            .filter(|&e| is_tip(graph, e, max_length))
            .map(|e| (graph.length(e), e))
            .collect();
        candidates.sort_unstable();

        let mut removed_this_round = 0;
        for (_, e) in candidates {
            if graph.contains_edge(e) && is_tip(graph, e, max_length) {
                graph.delete_edge(e);
                removed_this_round += 1;
            }
        }
        if removed_this_round == 0 {
            break;
        }
        removed += removed_this_round;
        graph.compress_all();
    }
    debug!("Clipped {} tips (max length {})", removed, max_length);
    removed
}

/// Decides whether an edge bridging two branch points is an artifact.
pub trait ErroneousEdgePolicy: Sync {
    fn is_erroneous(&self, graph: &AssemblyGraph, e: EdgeId) -> bool;
}

impl<F> ErroneousEdgePolicy for F
where
    F: Fn(&AssemblyGraph, EdgeId) -> bool + Sync,
{
    fn is_erroneous(&self, graph: &AssemblyGraph, e: EdgeId) -> bool {
        self(graph, e)
    }
}

/// Short edges whose mean coverage is below an absolute threshold.
#[derive(Clone, Debug)]
pub struct CoverageThreshold {
    pub max_length: usize,
    pub min_coverage: f64,
}

pub fn coverage_threshold(max_length: usize, min_coverage: f64) -> CoverageThreshold {
    CoverageThreshold {
        max_length,
        min_coverage,
    }
}

impl ErroneousEdgePolicy for CoverageThreshold {
    fn is_erroneous(&self, graph: &AssemblyGraph, e: EdgeId) -> bool {
        graph.length(e) <= self.max_length && graph.coverage(e) < self.min_coverage
    }
}

/// Short edges covered `ratio` times less than the best alternative on both
/// sides.
#[derive(Clone, Debug)]
pub struct RelativeCoverage {
    pub max_length: usize,
    pub ratio: f64,
}

pub fn relative_coverage(max_length: usize, ratio: f64) -> RelativeCoverage {
    RelativeCoverage { max_length, ratio }
}

impl ErroneousEdgePolicy for RelativeCoverage {
    fn is_erroneous(&self, graph: &AssemblyGraph, e: EdgeId) -> bool {
        if graph.length(e) > self.max_length {
            return false;
        }
        let best = |edges: &[EdgeId]| {
            edges
                .iter()
                .filter(|&&x| x != e)
                .map(|&x| graph.coverage(x))
                .fold(0.0f64, f64::max)
        };
        let alternative = best(graph.outgoing(graph.start(e))).min(best(graph.incoming(graph.end(e))));
        graph.coverage(e) * self.ratio < alternative
    }
}

fn is_connection(graph: &AssemblyGraph, e: EdgeId) -> bool {
    graph.out_degree(graph.start(e)) >= 2 && graph.in_degree(graph.end(e)) >= 2
}

/// Removes edges that connect two branch points and that `policy` flags,
/// lowest coverage first, then compresses. Returns the number removed
/// (conjugate pairs counted once).
pub fn remove_erroneous_connections<P: ErroneousEdgePolicy + ?Sized>(
    graph: &mut AssemblyGraph,
    policy: &P,
) -> usize {
    let mut candidates: Vec<(f64, EdgeId)> = graph
        .edge_pairs()
        .filter(|&e| is_connection(graph, e) && policy.is_erroneous(graph, e))
        .map(|e| (graph.coverage(e), e))
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut removed = 0;
    for (_, e) in candidates {
        if graph.contains_edge(e) && is_connection(graph, e) && policy.is_erroneous(graph, e) {
            graph.delete_edge(e);
            removed += 1;
        }
    }
    if removed > 0 {
        graph.compress_all();
    }
    debug!("Removed {} erroneous connections", removed);
    removed
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimplificationState {
    Unsimplified,
    TipsClipped,
    LowCoverageEdgesRemoved,
    Condensed,
    Simplified,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplificationReport {
    pub cycles: usize,
    pub tips_removed: usize,
    pub erroneous_edges_removed: usize,
    pub paths_merged: usize,
}

impl fmt::Display for SimplificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycle(s): {} tips clipped, {} erroneous connections removed, {} paths merged",
            self.cycles, self.tips_removed, self.erroneous_edges_removed, self.paths_merged
        )
    }
}

/// Runs cleaning cycles until one of them changes nothing or the cycle
/// budget is spent.
pub struct Simplifier<'a> {
    tip_length: usize,
    max_cycles: usize,
    policy: &'a dyn ErroneousEdgePolicy,
    state: SimplificationState,
    report: SimplificationReport,
    changed_this_cycle: bool,
}

impl<'a> Simplifier<'a> {
    pub fn new(tip_length: usize, max_cycles: usize, policy: &'a dyn ErroneousEdgePolicy) -> Self {
        Self {
            tip_length,
            max_cycles,
            policy,
            state: SimplificationState::Unsimplified,
            report: SimplificationReport::default(),
            changed_this_cycle: false,
        }
    }

    pub fn state(&self) -> SimplificationState {
        self.state
    }

    /// Performs one transition and returns the new state.
    pub fn step(&mut self, graph: &mut AssemblyGraph) -> SimplificationState {
        use SimplificationState::*;
        self.state = match self.state {
            Unsimplified if self.report.cycles >= self.max_cycles => Simplified,
            Unsimplified => {
                self.report.cycles += 1;
                let tips = clip_tips(graph, self.tip_length);
                self.report.tips_removed += tips;
                self.changed_this_cycle = tips > 0;
                TipsClipped
            }
            TipsClipped => {
                let removed = remove_erroneous_connections(graph, self.policy);
                self.report.erroneous_edges_removed += removed;
                self.changed_this_cycle |= removed > 0;
                LowCoverageEdgesRemoved
            }
            LowCoverageEdgesRemoved => {
                let merged = graph.compress_all();
                self.report.paths_merged += merged;
                self.changed_this_cycle |= merged > 0;
                Condensed
            }
            Condensed if self.changed_this_cycle && self.report.cycles < self.max_cycles => Unsimplified,
            Condensed => Simplified,
            Simplified => Simplified,
        };
        debug!("Simplification state: {:?}", self.state);
        self.state
    }

    pub fn run(mut self, graph: &mut AssemblyGraph) -> SimplificationReport {
        while self.step(graph) != SimplificationState::Simplified {}
        info!("Simplification finished after {}", self.report);
        self.report
    }
}
