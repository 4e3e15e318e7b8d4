use std::collections::BTreeSet;
use std::iter::once;
use crate::algorithms::{count_parts, Error};
use crate::circuit::CircuitGraph;
use crate::imbalance::{compute_parts_io, compute_parts_members, partition_io, PartitionIo};
use crate::Partition;

// Objective changes smaller than this are treated as no improvement.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    // Partition the vertex would move to.
    target: usize,

    // Change of `cut + io_factor * io_score` caused by the move. Negative is better.
    delta: f64,

    // I/O counts of the source and target partitions after the move.
    source_io: PartitionIo,
    target_io: PartitionIo,
}

/// Statistics of one I/O balancing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoBalanceMetadata {
    /// Number of passes over the boundary nodes.
    pub passes: usize,
    /// Number of node moves applied.
    pub moves: usize,
    /// Whether the last pass made no move.
    pub converged: bool,
}

fn io_balancer(partition: &mut [usize], circuit: &CircuitGraph, io_factor: f64, max_passes: usize) -> IoBalanceMetadata {

    debug_assert_eq!(partition.len(), circuit.len());

    let num_of_partitions = count_parts(partition);
    let mut members = compute_parts_members(partition, num_of_partitions);
    let mut parts_io = compute_parts_io(circuit, partition, num_of_partitions);
    let mut metadata = IoBalanceMetadata::default();

    while metadata.passes < max_passes {
        metadata.passes += 1;
        let mut moves_in_pass = 0;

        for vertex in circuit.boundary_nodes(partition) {
            // An earlier move of this pass may have pulled the vertex off the boundary.
            if !circuit.is_boundary(vertex, partition) {
                continue;
            }

            let Some(candidate) = best_move(circuit, partition, &members, &parts_io, vertex, io_factor) else {
                continue;
            };

            if candidate.delta < -IMPROVEMENT_EPSILON {
                apply_move(partition, &mut members, &mut parts_io, vertex, &candidate);
                moves_in_pass += 1;
            }
        }

        clilog::debug!("io balancing: pass {} moved {} nodes", metadata.passes, moves_in_pass);
        metadata.moves += moves_in_pass;

        if moves_in_pass == 0 {
            metadata.converged = true;
            break;
        }
    }

    metadata
}

fn best_move(circuit: &CircuitGraph,
             partition: &[usize],
             members: &[Vec<usize>],
             parts_io: &[PartitionIo],
             vertex: usize,
             io_factor: f64) -> Option<Candidate> {

    let source = partition[vertex];
    // Moving the last member out would leave an empty partition.
    if members[source].len() <= 1 {
        return None;
    }

    let targets: BTreeSet<usize> = circuit
        .all_neighbors(vertex)
        .map(|neighbor| partition[neighbor])
        .filter(|&part| part != source)
        .collect();

    let mut best: Option<Candidate> = None;
    for target in targets {
        let candidate = evaluate_move(circuit, partition, members, parts_io, vertex, target, io_factor);
        if best.map_or(true, |current| candidate.delta < current.delta) {
            best = Some(candidate);
        }
    }

    best
}

fn evaluate_move(circuit: &CircuitGraph,
                 partition: &[usize],
                 members: &[Vec<usize>],
                 parts_io: &[PartitionIo],
                 vertex: usize,
                 target: usize,
                 io_factor: f64) -> Candidate {

    let source = partition[vertex];

    // Edges to the source partition become cut, edges to the target become internal.
    let cut_delta: i64 = circuit
        .all_neighbors(vertex)
        .map(|neighbor| {
            if partition[neighbor] == source {
                1
            } else if partition[neighbor] == target {
                -1
            } else {
                0
            }
        })
        .sum();

    // Only the source and target partitions see their I/O change.
    let part_of = |node: usize| if node == vertex { target } else { partition[node] };
    let source_io = partition_io(circuit,
                                 members[source].iter().copied().filter(|&member| member != vertex),
                                 source,
                                 part_of);
    let target_io = partition_io(circuit,
                                 members[target].iter().copied().chain(once(vertex)),
                                 target,
                                 part_of);

    let io_before = parts_io[source].imbalance() + parts_io[target].imbalance();
    let io_after = source_io.imbalance() + target_io.imbalance();
    let io_delta = io_after as f64 - io_before as f64;

    Candidate {
        target,
        delta: cut_delta as f64 + io_factor * io_delta,
        source_io,
        target_io,
    }
}

fn apply_move(partition: &mut [usize],
              members: &mut [Vec<usize>],
              parts_io: &mut [PartitionIo],
              vertex: usize,
              candidate: &Candidate) {

    let source = partition[vertex];
    let target = candidate.target;

    members[source].retain(|&member| member != vertex);
    let position = members[target].binary_search(&vertex).unwrap_or_else(|position| position);
    members[target].insert(position, vertex);

    parts_io[source] = candidate.source_io;
    parts_io[target] = candidate.target_io;
    partition[vertex] = target;
}

/// Greedy I/O balancer
///
/// Repeatedly sweeps the boundary nodes and moves a node to a neighbouring partition whenever the
/// move strictly lowers `cut + io_factor * io_balance_score`. Stops after a pass without moves or
/// after `max_passes` passes.
#[derive(Debug, Clone, Copy)]
pub struct IoBalancer {
    /// Weight of the I/O balance score relative to the cut size, in [0, 1]
    pub io_factor: f64,

    /// Cap on the number of passes, defaults to the number of nodes
    pub max_passes: Option<usize>,
}

impl Default for IoBalancer {
    fn default() -> Self {
        IoBalancer {
            io_factor: 0.1,
            max_passes: None,
        }
    }
}

impl<'a> Partition<&'a CircuitGraph> for IoBalancer {
    type Metadata = IoBalanceMetadata;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        circuit: &'a CircuitGraph,
    ) -> Result<Self::Metadata, Self::Error> {

        if part_ids.len() != circuit.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: circuit.len(),
            });
        }
        if !(0.0..=1.0).contains(&self.io_factor) {
            return Err(Error::InvalidConfiguration("the I/O factor must lie in [0, 1]"));
        }

        let max_passes = self.max_passes.unwrap_or(circuit.len());
        Ok(io_balancer(part_ids, circuit, self.io_factor, max_passes))
    }
}
