// This file contains the spectral clustering used to produce the initial K-way partition.
// # Reference
//
// von Luxburg, Ulrike. "A tutorial on spectral clustering."
// Statistics and Computing 17.4 (2007): 395-416.

use nalgebra::{DMatrix, SymmetricEigen};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use crate::algorithms::Error;
use crate::graph::Graph;
use crate::Partition;

// The QR sweeps of the symmetric eigensolver are capped at this many per vertex.
const EIGEN_SWEEPS_PER_VERTEX: usize = 1_000;

fn spectral_partitioner(
    partition: &mut [usize],
    adjacency: &Graph,
    num_of_partitions: usize,
    seed: u64,
    kmeans_iterations: u32,
) -> Result<(), Error> {

    let num_of_vertices = adjacency.len();
    // Fewer vertices than parts: every vertex gets a part of its own.
    let num_of_partitions = num_of_partitions.min(num_of_vertices);

    if num_of_partitions <= 1 {
        partition.fill(0);
        return Ok(());
    }

    if num_of_partitions == num_of_vertices {
        partition.iter_mut().enumerate().for_each(|(vertex, part)| *part = vertex);
        return Ok(());
    }

    let embedding = spectral_embedding(adjacency, num_of_partitions)?;
    let labels = k_means(&embedding, num_of_partitions, seed, kmeans_iterations);
    partition.copy_from_slice(&labels);

    Ok(())
}

// Rows of the returned matrix are the coordinates of the vertices in the space spanned by the
// eigenvectors of the `num_of_eigenvectors` smallest Laplacian eigenvalues.
fn spectral_embedding(adjacency: &Graph, num_of_eigenvectors: usize) -> Result<DMatrix<f64>, Error> {
    let num_of_vertices = adjacency.len();
    let laplacian = adjacency.laplacian();

    let eigen = SymmetricEigen::try_new(laplacian,
                                        f64::EPSILON,
                                        num_of_vertices * EIGEN_SWEEPS_PER_VERTEX)
        .ok_or(Error::NumericalFailure)?;

    let mut order: Vec<usize> = (0..num_of_vertices).collect();
    order.sort_by(|&first, &second| {
        eigen.eigenvalues[first]
            .total_cmp(&eigen.eigenvalues[second])
            .then(first.cmp(&second))
    });
    let selected = &order[..num_of_eigenvectors];

    if selected.iter().any(|&column| !eigen.eigenvalues[column].is_finite()) {
        return Err(Error::NumericalFailure);
    }

    let embedding = DMatrix::from_fn(num_of_vertices, num_of_eigenvectors, |row, column| {
        eigen.eigenvectors[(row, selected[column])]
    });

    if embedding.iter().any(|value| !value.is_finite()) {
        return Err(Error::NumericalFailure);
    }

    Ok(embedding)
}

fn k_means(points: &DMatrix<f64>, num_of_clusters: usize, seed: u64, max_iterations: u32) -> Vec<usize> {
    debug_assert!(num_of_clusters < points.nrows());

    let num_of_points = points.nrows();
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut centroids = init_centroids(points, num_of_clusters, &mut rng);
    let mut labels = vec![usize::MAX; num_of_points];

    for _ in 0..max_iterations.max(1) {
        let mut new_labels: Vec<usize> = (0..num_of_points)
            .into_par_iter()
            .map(|point| nearest_centroid(points, point, &centroids))
            .collect();

        fill_empty_clusters(points, &mut new_labels, &centroids, num_of_clusters);

        let converged = new_labels == labels;
        labels = new_labels;
        centroids = compute_centroids(points, &labels, num_of_clusters);

        if converged {
            break;
        }
    }

    labels
}

// k-means++ seeding: each new centroid is drawn with probability proportional to its squared
// distance from the closest centroid picked so far.
fn init_centroids(points: &DMatrix<f64>, num_of_clusters: usize, rng: &mut SmallRng) -> Vec<Vec<f64>> {
    let num_of_points = points.nrows();
    let mut centroids = Vec::with_capacity(num_of_clusters);
    let mut chosen = vec![false; num_of_points];

    let first = rng.gen_range(0..num_of_points);
    chosen[first] = true;
    centroids.push(point_coordinates(points, first));

    let mut closest: Vec<f64> = (0..num_of_points)
        .map(|point| squared_distance(points, point, &centroids[0]))
        .collect();

    while centroids.len() < num_of_clusters {
        let total: f64 = closest.iter().sum();
        let mut next = None;

        if total > f64::EPSILON {
            let mut target = rng.gen::<f64>() * total;
            for point in 0..num_of_points {
                if chosen[point] || closest[point] <= 0.0 {
                    continue;
                }
                target -= closest[point];
                next = Some(point);
                if target <= 0.0 {
                    break;
                }
            }
        }

        // All remaining points coincide with a centroid.
        let Some(next) = next.or_else(|| (0..num_of_points).find(|&point| !chosen[point])) else {
            break;
        };

        chosen[next] = true;
        let centroid = point_coordinates(points, next);
        for point in 0..num_of_points {
            closest[point] = closest[point].min(squared_distance(points, point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn nearest_centroid(points: &DMatrix<f64>, point: usize, centroids: &[Vec<f64>]) -> usize {
    let mut best_distance = f64::INFINITY;
    let mut best_cluster = 0;

    for (cluster, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(points, point, centroid);
        // Strict comparison keeps the lowest cluster index on ties.
        if distance < best_distance {
            best_distance = distance;
            best_cluster = cluster;
        }
    }

    best_cluster
}

// An empty cluster takes the point farthest from its own centroid, among clusters that can spare one.
fn fill_empty_clusters(points: &DMatrix<f64>, labels: &mut [usize], centroids: &[Vec<f64>], num_of_clusters: usize) {
    let mut sizes = vec![0usize; num_of_clusters];
    for &label in labels.iter() {
        sizes[label] += 1;
    }

    for cluster in 0..num_of_clusters {
        if sizes[cluster] > 0 {
            continue;
        }

        let mut farthest = None;
        let mut farthest_distance = f64::NEG_INFINITY;
        for (point, &label) in labels.iter().enumerate() {
            if sizes[label] <= 1 {
                continue;
            }
            let distance = centroids
                .get(label)
                .map_or(0.0, |centroid| squared_distance(points, point, centroid));
            if distance > farthest_distance {
                farthest_distance = distance;
                farthest = Some(point);
            }
        }

        if let Some(point) = farthest {
            sizes[labels[point]] -= 1;
            labels[point] = cluster;
            sizes[cluster] = 1;
        }
    }
}

fn compute_centroids(points: &DMatrix<f64>, labels: &[usize], num_of_clusters: usize) -> Vec<Vec<f64>> {
    let dimensions = points.ncols();
    let mut centroids = vec![vec![0.0; dimensions]; num_of_clusters];
    let mut counts = vec![0usize; num_of_clusters];

    for (point, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        for dimension in 0..dimensions {
            centroids[label][dimension] += points[(point, dimension)];
        }
    }

    for (centroid, &count) in centroids.iter_mut().zip(&counts) {
        if count > 0 {
            centroid.iter_mut().for_each(|coordinate| *coordinate /= count as f64);
        }
    }

    centroids
}

fn point_coordinates(points: &DMatrix<f64>, point: usize) -> Vec<f64> {
    points.row(point).iter().copied().collect()
}

fn squared_distance(points: &DMatrix<f64>, point: usize, centroid: &[f64]) -> f64 {
    centroid
        .iter()
        .enumerate()
        .map(|(dimension, coordinate)| {
            let delta = points[(point, dimension)] - coordinate;
            delta * delta
        })
        .sum()
}

/// Spectral coarse partitioner
///
/// Embeds the vertices of the similarity graph using the eigenvectors of the smallest Laplacian
/// eigenvalues and groups them with k-means. Produces exactly `min(num_of_partitions, |V|)`
/// non-empty parts.
#[derive(Debug, Clone, Copy)]
pub struct SpectralPartitioner {
    /// Number of partitions (K)
    pub num_of_partitions: usize,

    /// Seed for the k-means++ initialisation
    pub seed: u64,

    /// Upper bound on Lloyd iterations
    pub kmeans_iterations: u32,
}

impl Default for SpectralPartitioner {
    fn default() -> Self {
        SpectralPartitioner {
            num_of_partitions: 2,
            seed: 42,
            kmeans_iterations: 300,
        }
    }
}

impl<'a> Partition<&'a Graph> for SpectralPartitioner {
    type Metadata = ();
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        adjacency: &'a Graph,
    ) -> Result<Self::Metadata, Self::Error> {

        if part_ids.len() != adjacency.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: adjacency.len(),
            });
        }
        if adjacency.is_empty() {
            return Err(Error::InvalidConfiguration("the graph has no nodes"));
        }
        if self.num_of_partitions == 0 {
            return Err(Error::InvalidConfiguration("the number of partitions must be at least 1"));
        }

        spectral_partitioner(
            part_ids,
            adjacency,
            self.num_of_partitions,
            self.seed,
            self.kmeans_iterations,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use crate::circuit::CircuitGraph;
    use super::*;

    fn gate_graph(num_of_gates: usize, edges: &[(usize, usize)]) -> Graph {
        let mut circuit = CircuitGraph::new();
        for gate in 0..num_of_gates {
            circuit.add_gate(&format!("U{gate}"), "nand").unwrap();
        }
        for &(driver, load) in edges {
            circuit.add_edge_by_index(driver, load).unwrap();
        }
        Graph::from_circuit(&circuit)
    }

    fn two_triangles() -> Graph {
        gate_graph(6, &[(0, 1), (1, 2), (0, 2), (2, 3), (3, 4), (4, 5), (3, 5)])
    }

    #[test]
    fn test_spectral_splits_two_triangles() {
        // Arrange
        let graph = two_triangles();
        let mut partition = vec![0; graph.len()];

        // Act
        SpectralPartitioner { num_of_partitions: 2, ..Default::default() }
            .partition(&mut partition, &graph)
            .unwrap();

        // Assert
        assert_eq!(partition[0], partition[1]);
        assert_eq!(partition[0], partition[2]);
        assert_eq!(partition[3], partition[4]);
        assert_eq!(partition[3], partition[5]);
        assert_ne!(partition[0], partition[3]);
        assert_eq!(graph.edge_cut(&partition), 1);
    }

    #[test]
    fn test_spectral_separates_connected_components() {
        // Arrange
        let graph = gate_graph(6, &[(0, 1), (2, 3), (4, 5)]);
        let mut partition = vec![0; graph.len()];

        // Act
        SpectralPartitioner { num_of_partitions: 3, ..Default::default() }
            .partition(&mut partition, &graph)
            .unwrap();

        // Assert
        let parts: BTreeSet<usize> = partition.iter().copied().collect();
        assert_eq!(parts, BTreeSet::from([0, 1, 2]));
        assert_eq!(partition[0], partition[1]);
        assert_eq!(partition[2], partition[3]);
        assert_eq!(partition[4], partition[5]);
    }

    #[test]
    fn test_spectral_clamps_to_vertex_count() {
        // Arrange
        let graph = gate_graph(3, &[(0, 1), (1, 2)]);
        let mut partition = vec![0; graph.len()];

        // Act
        SpectralPartitioner { num_of_partitions: 8, ..Default::default() }
            .partition(&mut partition, &graph)
            .unwrap();

        // Assert
        assert_eq!(partition, vec![0, 1, 2]);
    }

    #[test]
    fn test_spectral_single_partition() {
        // Arrange
        let graph = two_triangles();
        let mut partition = vec![7; graph.len()];

        // Act
        SpectralPartitioner { num_of_partitions: 1, ..Default::default() }
            .partition(&mut partition, &graph)
            .unwrap();

        // Assert
        assert!(partition.iter().all(|&part| part == 0));
    }

    #[test]
    fn test_spectral_is_deterministic() {
        // Arrange
        let graph = gate_graph(8, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 7), (0, 4)]);
        let mut first = vec![0; graph.len()];
        let mut second = vec![0; graph.len()];

        // Act
        SpectralPartitioner { num_of_partitions: 3, ..Default::default() }.partition(&mut first, &graph).unwrap();
        SpectralPartitioner { num_of_partitions: 3, ..Default::default() }.partition(&mut second, &graph).unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(first.iter().copied().collect::<BTreeSet<_>>().len(), 3);
    }

    #[test]
    fn test_spectral_rejects_invalid_input() {
        // Arrange
        let empty = Graph::new();
        let graph = two_triangles();
        let mut partition = vec![0; graph.len()];

        // Act
        let on_empty = SpectralPartitioner::default().partition(&mut [], &empty);
        let zero_parts = SpectralPartitioner { num_of_partitions: 0, ..Default::default() }
            .partition(&mut partition, &graph);
        let mismatch = SpectralPartitioner::default().partition(&mut [0; 2], &graph);

        // Assert
        assert!(matches!(on_empty, Err(Error::InvalidConfiguration(_))));
        assert!(matches!(zero_parts, Err(Error::InvalidConfiguration(_))));
        assert_eq!(mismatch, Err(Error::InputLenMismatch { expected: 2, actual: 6 }));
    }

    #[test]
    fn test_fill_empty_clusters_moves_farthest_point() {
        // Arrange
        let points = DMatrix::from_row_slice(4, 1, &[0.0, 0.1, 0.2, 5.0]);
        let centroids = vec![vec![0.0], vec![100.0]];
        let mut labels = vec![0, 0, 0, 0];

        // Act
        fill_empty_clusters(&points, &mut labels, &centroids, 2);

        // Assert
        assert_eq!(labels, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_nearest_centroid_prefers_lowest_index_on_ties() {
        // Arrange
        let points = DMatrix::from_row_slice(1, 1, &[1.0]);
        let centroids = vec![vec![0.0], vec![2.0]];

        // Act
        let cluster = nearest_centroid(&points, 0, &centroids);

        // Assert
        assert_eq!(cluster, 0);
    }
}
