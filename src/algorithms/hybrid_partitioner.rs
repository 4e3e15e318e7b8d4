use crate::algorithms::{Error, IoBalancer, KernighanLinRefiner, SpectralPartitioner};
use crate::circuit::CircuitGraph;
use crate::graph::Graph;
use crate::Partition;

/// Number of partitions for a graph of `num_of_nodes` nodes and a target partition size.
///
/// `max(1, round(num_of_nodes / target_size))`, clamped to the node count.
pub fn num_of_partitions(num_of_nodes: usize, target_size: usize) -> usize {
    if num_of_nodes == 0 || target_size == 0 {
        return 1;
    }
    let rounded = (num_of_nodes as f64 / target_size as f64).round() as usize;
    rounded.max(1).min(num_of_nodes)
}

/// Summary of a hybrid partitioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridMetadata {
    /// The K used by every stage.
    pub num_of_partitions: usize,
    /// Cut size after spectral clustering.
    pub spectral_edge_cut: usize,
    /// Cut size after Kernighan-Lin refinement.
    pub kl_edge_cut: usize,
    /// Cut size after I/O balancing.
    pub final_edge_cut: usize,
    /// Number of passes of the I/O balancing stage.
    pub io_passes: usize,
    /// Number of nodes moved by the I/O balancing stage.
    pub io_moves: usize,
}

fn hybrid_partitioner(
    partition: &mut [usize],
    circuit: &CircuitGraph,
    target_size: usize,
    kl_iterations: u32,
    io_factor: f64,
    seed: u64,
    io_max_passes: Option<usize>,
) -> Result<HybridMetadata, Error> {

    let num_of_partitions = num_of_partitions(circuit.len(), target_size);
    clilog::info!("partitioning {} nodes / {} edges into {} partitions (target size {})",
                  circuit.len(), circuit.num_of_edges(), num_of_partitions, target_size);

    let adjacency = Graph::from_circuit(circuit);

    // 1. Coarse partitioning with spectral clustering.
    let timer_spectral = clilog::stimer!("spectral clustering");
    SpectralPartitioner { num_of_partitions, seed, ..Default::default() }
        .partition(partition, &adjacency)?;
    clilog::finish!(timer_spectral);
    check_assignment(partition, num_of_partitions, "spectral")?;
    let spectral_edge_cut = circuit.cut_size(partition);
    clilog::info!("initial cut size: {}", spectral_edge_cut);

    // 2. Boundary refinement with Kernighan-Lin.
    let timer_kl = clilog::stimer!("kernighan-lin refinement");
    KernighanLinRefiner { iterations: kl_iterations }
        .partition(partition, &adjacency)?;
    clilog::finish!(timer_kl);
    check_assignment(partition, num_of_partitions, "kernighan-lin")?;
    let kl_edge_cut = circuit.cut_size(partition);
    clilog::info!("cut size after kernighan-lin refinement: {}", kl_edge_cut);

    // 3. Greedy I/O balancing.
    let timer_io = clilog::stimer!("i/o balancing");
    let io_metadata = IoBalancer { io_factor, max_passes: io_max_passes }
        .partition(partition, circuit)?;
    clilog::finish!(timer_io);
    check_assignment(partition, num_of_partitions, "i/o balancing")?;
    if !io_metadata.converged {
        clilog::warn!("i/o balancing stopped after {} passes without converging", io_metadata.passes);
    }
    let final_edge_cut = circuit.cut_size(partition);
    clilog::info!("final cut size after i/o balancing: {} ({} moves)", final_edge_cut, io_metadata.moves);

    Ok(HybridMetadata {
        num_of_partitions,
        spectral_edge_cut,
        kl_edge_cut,
        final_edge_cut,
        io_passes: io_metadata.passes,
        io_moves: io_metadata.moves,
    })
}

// Every node must hold a part id below K and every part must keep at least one node.
fn check_assignment(partition: &[usize], num_of_partitions: usize, stage: &'static str) -> Result<(), Error> {
    let mut sizes = vec![0usize; num_of_partitions];

    for &part in partition {
        if part >= num_of_partitions {
            return Err(Error::InvariantViolation { stage });
        }
        sizes[part] += 1;
    }

    if sizes.contains(&0) {
        return Err(Error::InvariantViolation { stage });
    }

    Ok(())
}

/// Hybrid circuit partitioner
///
/// Three stages run in sequence on the same assignment: spectral clustering for a coarse K-way
/// split, Kernighan-Lin swaps between adjacent partitions to reduce the cut, and a greedy pass that
/// trades cut size against per-partition I/O balance.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use CircuitCut::algorithms::HybridPartitioner;
/// use CircuitCut::circuit::Collapse;
/// use CircuitCut::io::read_netlist_as_graph;
/// use CircuitCut::report::PartitionReport;
/// use CircuitCut::Partition;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
///
///     let circuit = read_netlist_as_graph(Path::new("./testdata/c17.v"), Some(Collapse::Wires))?;
///     let mut partition = vec![0; circuit.len()];
///
///     HybridPartitioner { target_size: 4, ..Default::default() }.partition(&mut partition, &circuit)?;
///
///     let report = PartitionReport::new(&circuit, &partition);
///     println!("cut size {}", report.cut_size);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HybridPartitioner {
    /// Desired number of nodes per partition
    pub target_size: usize,

    /// Maximum number of Kernighan-Lin swaps per pair of adjacent partitions
    pub kl_iterations: u32,

    /// Weight of the I/O balance score against the cut size, in [0, 1]
    pub io_factor: f64,

    /// Seed for the k-means++ initialisation of the spectral stage
    pub seed: u64,

    /// Cap on I/O balancing passes; `None` uses the node count
    pub io_max_passes: Option<usize>,
}

impl Default for HybridPartitioner {
    fn default() -> Self {
        HybridPartitioner {
            target_size: 150,
            kl_iterations: 10,
            io_factor: 0.1,
            seed: 42,
            io_max_passes: None,
        }
    }
}

impl HybridPartitioner {
    /// Check the configuration against a graph before any stage runs.
    pub fn validate(&self, circuit: &CircuitGraph) -> Result<(), Error> {
        if self.target_size == 0 {
            return Err(Error::InvalidConfiguration("the target partition size must be positive"));
        }
        if self.kl_iterations == 0 {
            return Err(Error::InvalidConfiguration("the Kernighan-Lin iteration budget must be positive"));
        }
        if !(0.0..=1.0).contains(&self.io_factor) {
            return Err(Error::InvalidConfiguration("the I/O factor must lie in [0, 1]"));
        }
        if circuit.is_empty() {
            return Err(Error::InvalidConfiguration("the graph has no nodes"));
        }
        Ok(())
    }
}

impl<'a> Partition<&'a CircuitGraph> for HybridPartitioner {
    type Metadata = HybridMetadata;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        circuit: &'a CircuitGraph,
    ) -> Result<Self::Metadata, Self::Error> {

        self.validate(circuit)?;
        if part_ids.len() != circuit.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: circuit.len(),
            });
        }

        hybrid_partitioner(
            part_ids,
            circuit,
            self.target_size,
            self.kl_iterations,
            self.io_factor,
            self.seed,
            self.io_max_passes,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::Path;
    use crate::circuit::{Collapse, NodeKind};
    use crate::io::read_netlist_as_graph;
    use super::*;

    fn ring_of_clusters(num_of_clusters: usize, cluster_size: usize) -> CircuitGraph {
        let mut circuit = CircuitGraph::new();
        for gate in 0..num_of_clusters * cluster_size {
            circuit.add_gate(&format!("U{gate}"), "nand").unwrap();
        }
        for cluster in 0..num_of_clusters {
            let base = cluster * cluster_size;
            for first in 0..cluster_size {
                for second in first + 1..cluster_size {
                    circuit.add_edge_by_index(base + first, base + second).unwrap();
                }
            }
            let next = ((cluster + 1) % num_of_clusters) * cluster_size;
            circuit.add_edge_by_index(base + cluster_size - 1, next).unwrap();
        }
        circuit
    }

    fn non_empty_parts(partition: &[usize]) -> usize {
        partition.iter().collect::<BTreeSet<_>>().len()
    }

    #[test]
    fn test_num_of_partitions() {
        assert_eq!(num_of_partitions(13, 4), 3);
        assert_eq!(num_of_partitions(3, 2), 2);
        assert_eq!(num_of_partitions(7, 2), 4);
        assert_eq!(num_of_partitions(5, 100), 1);
        assert_eq!(num_of_partitions(5, 1), 5);
    }

    #[test]
    fn test_three_gate_circuit_gives_two_partitions() {
        // Arrange
        let circuit = read_netlist_as_graph(Path::new("./testdata/three_gate.v"), Some(Collapse::Signals)).unwrap();
        let mut partition = vec![0; circuit.len()];

        // Act
        let metadata = HybridPartitioner { target_size: 2, ..Default::default() }
            .partition(&mut partition, &circuit)
            .unwrap();

        // Assert
        assert_eq!(circuit.len(), 3);
        assert_eq!(metadata.num_of_partitions, 2);
        assert_eq!(non_empty_parts(&partition), 2);
        for part in 0..2 {
            assert!((0..circuit.len()).any(|node| partition[node] == part
                && circuit.node(node).kind == NodeKind::Gate));
        }
        assert!(metadata.final_edge_cut <= 2);
    }

    #[test]
    fn test_c17_gives_three_partitions() {
        // Arrange
        let circuit = read_netlist_as_graph(Path::new("./testdata/c17.v"), Some(Collapse::Wires)).unwrap();
        let mut partition = vec![usize::MAX; circuit.len()];

        // Act
        let metadata = HybridPartitioner { target_size: 4, ..Default::default() }
            .partition(&mut partition, &circuit)
            .unwrap();

        // Assert
        assert_eq!(circuit.len(), 13);
        assert_eq!(metadata.num_of_partitions, 3);
        assert_eq!(non_empty_parts(&partition), 3);
        assert!(partition.iter().all(|&part| part < 3));
        assert_eq!(metadata.final_edge_cut, circuit.cut_size(&partition));
    }

    #[test]
    fn test_kernighan_lin_never_worsens_spectral_cut() {
        // Arrange
        let circuit = ring_of_clusters(4, 5);
        let mut partition = vec![0; circuit.len()];

        // Act
        let metadata = HybridPartitioner { target_size: 5, io_factor: 0.0, ..Default::default() }
            .partition(&mut partition, &circuit)
            .unwrap();

        // Assert
        assert_eq!(metadata.num_of_partitions, 4);
        assert!(metadata.kl_edge_cut <= metadata.spectral_edge_cut);
        assert!(metadata.final_edge_cut <= metadata.kl_edge_cut);
        assert_eq!(metadata.final_edge_cut, 4);
    }

    #[test]
    fn test_runs_are_deterministic() {
        // Arrange
        let circuit = ring_of_clusters(3, 6);
        let mut first = vec![0; circuit.len()];
        let mut second = vec![0; circuit.len()];

        // Act
        let first_metadata = HybridPartitioner { target_size: 6, ..Default::default() }
            .partition(&mut first, &circuit)
            .unwrap();
        let second_metadata = HybridPartitioner { target_size: 6, ..Default::default() }
            .partition(&mut second, &circuit)
            .unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(first_metadata, second_metadata);
    }

    #[test]
    fn test_target_size_one_isolates_every_node() {
        // Arrange
        let circuit = read_netlist_as_graph(Path::new("./testdata/c17.v"), Some(Collapse::Wires)).unwrap();
        let mut partition = vec![0; circuit.len()];

        // Act
        let metadata = HybridPartitioner { target_size: 1, ..Default::default() }
            .partition(&mut partition, &circuit)
            .unwrap();

        // Assert
        assert_eq!(metadata.num_of_partitions, circuit.len());
        assert_eq!(non_empty_parts(&partition), circuit.len());
        assert_eq!(metadata.final_edge_cut, circuit.num_of_edges());
    }

    #[test]
    fn test_large_target_size_gives_single_partition() {
        // Arrange
        let circuit = ring_of_clusters(2, 3);
        let mut partition = vec![0; circuit.len()];

        // Act
        let metadata = HybridPartitioner { target_size: 100, ..Default::default() }
            .partition(&mut partition, &circuit)
            .unwrap();

        // Assert
        assert_eq!(metadata.num_of_partitions, 1);
        assert!(partition.iter().all(|&part| part == 0));
        assert_eq!(metadata.final_edge_cut, 0);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        // Arrange
        let circuit = ring_of_clusters(2, 3);
        let empty = CircuitGraph::new();
        let mut partition = vec![0; circuit.len()];

        // Act and Assert
        for mut partitioner in [
            HybridPartitioner { target_size: 0, ..Default::default() },
            HybridPartitioner { kl_iterations: 0, ..Default::default() },
            HybridPartitioner { io_factor: 1.1, ..Default::default() },
        ] {
            assert!(matches!(partitioner.partition(&mut partition, &circuit),
                             Err(Error::InvalidConfiguration(_))));
        }
        assert!(matches!(HybridPartitioner::default().partition(&mut [], &empty),
                         Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_check_assignment_detects_invariant_violations() {
        assert_eq!(check_assignment(&[0, 1, 1], 2, "test"), Ok(()));
        assert_eq!(check_assignment(&[0, 2, 1], 2, "test"), Err(Error::InvariantViolation { stage: "test" }));
        assert_eq!(check_assignment(&[0, 0, 0], 2, "test"), Err(Error::InvariantViolation { stage: "test" }));
    }
}
