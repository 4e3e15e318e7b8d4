use crate::algorithms::count_parts;
use crate::circuit::CircuitGraph;
use crate::imbalance::{compute_parts_io, compute_parts_members, io_balance_score, PartitionIo};

/// Contents and external signal counts of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    pub index: usize,
    /// Node names in node-index order.
    pub nodes: Vec<String>,
    pub io: PartitionIo,
}

/// Final result of a partitioning run, derived from the circuit and the assignment alone.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionReport {
    pub partitions: Vec<PartitionSummary>,
    pub cut_size: usize,
    pub io_balance_score: f64,
    assignments: Vec<(String, usize)>,
}

impl PartitionReport {
    pub fn new(circuit: &CircuitGraph, partition: &[usize]) -> Self {
        debug_assert_eq!(circuit.len(), partition.len());

        let num_parts = count_parts(partition);
        let parts_io = compute_parts_io(circuit, partition, num_parts);

        let partitions = compute_parts_members(partition, num_parts)
            .into_iter()
            .zip(parts_io.iter())
            .enumerate()
            .map(|(index, (members, io))| PartitionSummary {
                index,
                nodes: members.into_iter().map(|member| circuit.node(member).name.clone()).collect(),
                io: *io,
            })
            .collect();

        let assignments = circuit
            .nodes()
            .iter()
            .zip(partition)
            .map(|(node, &part)| (node.name.clone(), part))
            .collect();

        PartitionReport {
            partitions,
            cut_size: circuit.cut_size(partition),
            io_balance_score: io_balance_score(&parts_io),
            assignments,
        }
    }

    pub fn num_of_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Node name to partition mapping, in node-index order.
    pub fn assignments(&self) -> &[(String, usize)] {
        &self.assignments
    }

    pub fn partition_of(&self, name: &str) -> Option<usize> {
        self.assignments
            .iter()
            .find(|(node, _)| node == name)
            .map(|&(_, part)| part)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;
    use itertools::assert_equal;
    use crate::netlist::parse_netlist;
    use super::*;

    #[test]
    fn test_report_for_three_gate_circuit() {
        // Arrange
        let circuit = parse_netlist(include_str!("../testdata/three_gate.v")).unwrap();
        // a b c y w1 w2 U1 U2 U3
        let partition = [0, 0, 1, 1, 0, 1, 0, 1, 1];

        // Act
        let report = PartitionReport::new(&circuit, &partition);

        // Assert
        assert_eq!(report.num_of_partitions(), 2);
        assert_equal(report.partitions[0].nodes.iter().map(String::as_str), ["a", "b", "w1", "U1"]);
        assert_equal(report.partitions[1].nodes.iter().map(String::as_str), ["c", "y", "w2", "U2", "U3"]);
        // Only w1 -> U3 crosses.
        assert_eq!(report.cut_size, 1);
        assert_eq!(report.partitions[0].io, PartitionIo { inputs: 0, outputs: 1 });
        assert_eq!(report.partitions[1].io, PartitionIo { inputs: 1, outputs: 0 });
        assert_ulps_eq!(report.io_balance_score, 2.0);
    }

    #[test]
    fn test_report_assignments_follow_node_order() {
        // Arrange
        let circuit = parse_netlist(include_str!("../testdata/three_gate.v")).unwrap();
        let partition = [1, 1, 0, 0, 1, 0, 1, 0, 0];

        // Act
        let report = PartitionReport::new(&circuit, &partition);

        // Assert
        assert_eq!(report.assignments().len(), circuit.len());
        assert_eq!(report.assignments()[0], ("a".to_string(), 1));
        assert_eq!(report.partition_of("U3"), Some(0));
        assert_eq!(report.partition_of("missing"), None);
    }

    #[test]
    fn test_report_single_partition_has_no_io() {
        // Arrange
        let circuit = parse_netlist(include_str!("../testdata/c17.v")).unwrap();
        let partition = vec![0; circuit.len()];

        // Act
        let report = PartitionReport::new(&circuit, &partition);

        // Assert
        assert_eq!(report.num_of_partitions(), 1);
        assert_eq!(report.partitions[0].nodes.len(), 17);
        assert_eq!(report.cut_size, 0);
        assert_ulps_eq!(report.io_balance_score, 0.0);
    }
}
