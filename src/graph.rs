// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator};
use rayon::iter::ParallelIterator as _;
use std::iter::{Cloned, Zip};
use std::slice::Iter;
use ::sprs::{CsMat, TriMat};
use nalgebra::DMatrix;
use crate::circuit::CircuitGraph;

/// Undirected weighted similarity graph derived from a circuit.
pub struct Graph{
    /// The CsMat (from sprs) is used to store the graph as a symmetric sparse matrix in CSR format
    pub graph_csr: CsMat<i64>
}

impl Graph {

    /// Create a new graph
    pub fn new() -> Self {
        Self {
            graph_csr: CsMat::empty(sprs::CSR, 0)
        }
    }

    /// Build the similarity graph of a circuit.
    ///
    /// Every directed edge adds a weight of 1 to the undirected edge between its endpoints, so
    /// parallel and anti-parallel edges are merged by summing their weights.
    pub fn from_circuit(circuit: &CircuitGraph) -> Self {
        let num_of_vertices = circuit.len();
        let mut triplet_matrix = TriMat::with_capacity((num_of_vertices, num_of_vertices),
                                                       2 * circuit.num_of_edges());

        for (driver, load) in circuit.edges() {
            triplet_matrix.add_triplet(driver, load, 1i64);
            triplet_matrix.add_triplet(load, driver, 1i64);
        }

        // Duplicate triplets are summed by the conversion.
        Self {
            graph_csr: triplet_matrix.to_csr()
        }
    }

    /// The number of vertices in the graph.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.graph_csr.rows(), self.graph_csr.cols());
        self.graph_csr.rows()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An iterator over the neighbors of the given vertex.
    pub fn neighbors(&self, vertex: usize) -> Zip<Cloned<Iter<'_, usize>>, Cloned<Iter<'_, i64>>> {
        let (indices, data) = self.graph_csr
            .outer_view(vertex)
            .map(|view| view.into_raw_storage())
            .unwrap_or((&[][..], &[][..]));
        indices.iter().cloned().zip(data.iter().cloned())
    }

    /// Sum of the edge weights incident to the vertex.
    pub fn degree(&self, vertex: usize) -> i64 {
        self.neighbors(vertex).map(|(_neighbor, edge_weight)| edge_weight).sum()
    }

    /// Insert an edge with two vertices on either ends.
    pub fn insert(&mut self, vertex1: usize, vertex2: usize, edge_weight: i64) {
        self.graph_csr.insert(vertex1, vertex2, edge_weight);
    }

    /// Get edge weight for a pair of vertices.
    pub fn get_edge_weight(&self, vertex1: usize, vertex2: usize) -> Option<i64> {
        self.graph_csr.get(vertex1, vertex2).cloned()
    }

    /// The combinatorial Laplacian `L = D - A` as a dense matrix.
    pub fn laplacian(&self) -> DMatrix<f64> {
        let num_of_vertices = self.len();
        let mut laplacian = DMatrix::zeros(num_of_vertices, num_of_vertices);

        for vertex in 0..num_of_vertices {
            for (neighbor, edge_weight) in self.neighbors(vertex) {
                if neighbor == vertex {
                    continue;
                }
                laplacian[(vertex, neighbor)] -= edge_weight as f64;
                laplacian[(vertex, vertex)] += edge_weight as f64;
            }
        }

        laplacian
    }

    /// The edge cut of a partition.
    ///
    /// Given a partition and a weighted graph, the edge cut of a partition is defined as the total
    /// weight of the edges that link graph nodes of different parts. For a graph built with
    /// [`Graph::from_circuit`] this equals the number of cut directed edges of the circuit.
    ///
    /// # Example
    ///
    /// A partition with two parts (0 and 1)
    /// ```text,ignore
    ///          0
    ///    1*──┆─*────* 0
    ///    ╱ ╲ ┆╱    ╱
    ///  1*  1*┆ <┈┈╱┈┈┈ Dotted line passes through edged that contribute to edge cut.
    ///    ╲ ╱ ┆   ╱     If all edges have a weight of 1 then edge_cut = 3
    ///    1*  ┆╲ ╱
    ///          * 0
    /// ```
    pub fn edge_cut(&self, partition: &[usize]) -> i64
    {
        debug_assert_eq!(self.len(), partition.len());

        let indptr = self.graph_csr.indptr().into_raw_storage();
        let indices = self.graph_csr.indices();
        let data = self.graph_csr.data();
        indptr
            .par_iter()
            .zip(&indptr[1..])
            .enumerate()
            .map(|(vertex, (start, end))| {
                let neighbors = &indices[*start..*end];
                let edge_weights = &data[*start..*end];
                let vertex_part = partition[vertex];
                neighbors
                    .iter()
                    .zip(edge_weights)
                    .take_while(|(neighbor, _edge_weight)| **neighbor < vertex)
                    .filter(|(neighbor, _edge_weight)| vertex_part != partition[**neighbor])
                    .map(|(_neighbor, edge_weight)| *edge_weight)
                    .sum::<i64>()
            })
            .sum()
    }
}

impl Clone for Graph {
    fn clone(&self) -> Self {
        Self {
            graph_csr: self.graph_csr.clone()
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
