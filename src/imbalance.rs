// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
use num_traits::ToPrimitive;
use rustc_hash::FxHashSet;
use crate::circuit::CircuitGraph;

/// External signal counts of one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionIo {
    /// Distinct nodes outside the partition that drive one of its members.
    pub inputs: usize,
    /// Distinct nodes outside the partition driven by one of its members.
    pub outputs: usize,
}

impl PartitionIo {
    /// Distance from input/output parity.
    pub fn imbalance(&self) -> usize {
        self.inputs.abs_diff(self.outputs)
    }
}

/// Count the inputs and outputs of partition `part` made of `members`.
///
/// `part_of` gives the partition of any node, which lets callers evaluate a hypothetical move without
/// touching the real assignment.
pub fn partition_io<I, F>(circuit: &CircuitGraph, members: I, part: usize, part_of: F) -> PartitionIo
where
    I: IntoIterator<Item = usize>,
    F: Fn(usize) -> usize,
{
    let mut inputs = FxHashSet::default();
    let mut outputs = FxHashSet::default();

    for member in members {
        for &driver in circuit.fanin(member) {
            if part_of(driver) != part {
                inputs.insert(driver);
            }
        }
        for &load in circuit.fanout(member) {
            if part_of(load) != part {
                outputs.insert(load);
            }
        }
    }

    PartitionIo { inputs: inputs.len(), outputs: outputs.len() }
}

/// Group node indices by partition. Indices inside each group are ascending.
pub fn compute_parts_members(partition: &[usize], num_parts: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); num_parts];

    for (vertex, &part) in partition.iter().enumerate() {
        if part < num_parts {
            members[part].push(vertex);
        }
    }

    members
}

/// Compute the I/O counts of every part of a given partition.
pub fn compute_parts_io(circuit: &CircuitGraph, partition: &[usize], num_parts: usize) -> Vec<PartitionIo> {
    debug_assert_eq!(circuit.len(), partition.len());

    compute_parts_members(partition, num_parts)
        .into_iter()
        .enumerate()
        .map(|(part, members)| partition_io(circuit, members, part, |vertex| partition[vertex]))
        .collect()
}

/// Aggregate I/O balance score: the sum of every part's imbalance.
pub fn io_balance_score(parts_io: &[PartitionIo]) -> f64 {
    parts_io
        .iter()
        .map(|io| io.imbalance().to_f64().unwrap_or(0.0))
        .sum()
}

/// The quantity minimised by the I/O balancing stage: `cut + io_factor * score`.
pub fn combined_objective(cut_size: usize, io_score: f64, io_factor: f64) -> f64 {
    cut_size.to_f64().unwrap_or(0.0) + io_factor * io_score
}
