// This file contains the Kernighan-Lin refinement applied to pairs of adjacent partitions.
// # Reference
//
// Kernighan, B. W., and S. Lin. "An efficient heuristic procedure for partitioning graphs."
// The Bell System Technical Journal 49.2 (1970): 291-307.

use std::collections::BTreeSet;
use rayon::prelude::*;
use crate::algorithms::{count_parts, Error};
use crate::graph::Graph;

#[derive(Debug)]
struct Move {
    // The index of the vertex.
    vertex: usize,

    // The partition ID of the partition where the vertex should move to.
    partition_id: usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Swap {
    // Decrease in edge cut obtained by exchanging the two vertices.
    gain: i64,

    // Vertex currently in the lower-numbered partition of the pair.
    vertex_p: usize,

    // Vertex currently in the higher-numbered partition of the pair.
    vertex_q: usize,
}

fn kernighan_lin(partition: &mut [usize], adjacency: &Graph, iterations: u32) -> i64 {

    debug_assert_eq!(partition.len(), adjacency.len());

    let num_of_partitions = count_parts(partition);
    let mut vertex_connectivity_data_structure = init_vertex_connectivity_data_structure(adjacency,
                                                                                         partition,
                                                                                         num_of_partitions);
    let mut locked_vertices = vec![false; adjacency.len()];
    let mut edge_cut = adjacency.edge_cut(partition);

    let adjacent_partitions = find_adjacent_partitions(adjacency, partition);
    clilog::debug!("kernighan-lin: {} adjacent partition pairs", adjacent_partitions.len());

    for (part_p, part_q) in adjacent_partitions {
        let mut current_iteration = 0;

        while current_iteration < iterations {
            let best = best_swap(adjacency,
                                 partition,
                                 &vertex_connectivity_data_structure,
                                 &locked_vertices,
                                 part_p,
                                 part_q);

            let Some(swap) = best.filter(|swap| swap.gain > 0) else {
                break;
            };

            update_parts_and_vertex_connectivity(adjacency,
                                                 partition,
                                                 &mut vertex_connectivity_data_structure,
                                                 &[Move { vertex: swap.vertex_p, partition_id: part_q },
                                                   Move { vertex: swap.vertex_q, partition_id: part_p }]);

            // Swapped vertices stay put for the rest of this pair to prevent oscillation.
            locked_vertices[swap.vertex_p] = true;
            locked_vertices[swap.vertex_q] = true;

            edge_cut -= swap.gain;
            current_iteration += 1;
        }

        clilog::debug!("kernighan-lin: pair ({}, {}) done after {} swaps, edge cut {}",
                       part_p, part_q, current_iteration, edge_cut);
        locked_vertices.fill(false);
    }

    debug_assert_eq!(edge_cut, adjacency.edge_cut(partition));
    edge_cut
}

fn best_swap(graph: &Graph,
             partition: &[usize],
             vertex_connectivity_data_structure: &Vec<Vec<i64>>,
             locked_vertices: &[bool],
             part_p: usize,
             part_q: usize) -> Option<Swap> {

    let free_vertices_of = |part: usize| -> Vec<usize> {
        (0..partition.len())
            .filter(|&vertex| partition[vertex] == part && !locked_vertices[vertex])
            .collect()
    };
    let side_p = free_vertices_of(part_p);
    let side_q = free_vertices_of(part_q);

    side_p.par_iter().filter_map(|&vertex_p| {
        let external_p = conn(vertex_p, part_q, vertex_connectivity_data_structure)
            - conn(vertex_p, part_p, vertex_connectivity_data_structure);

        side_q.iter().map(|&vertex_q| {
            let external_q = conn(vertex_q, part_p, vertex_connectivity_data_structure)
                - conn(vertex_q, part_q, vertex_connectivity_data_structure);
            // The edge between the pair stays cut after the exchange.
            let shared_weight = graph.get_edge_weight(vertex_p, vertex_q).unwrap_or(0);

            Swap { gain: external_p + external_q - 2 * shared_weight, vertex_p, vertex_q }
        }).reduce(preferred_swap)
    }).reduce_with(preferred_swap)
}

fn preferred_swap(first: Swap, second: Swap) -> Swap {
    // Highest gain wins; equal gains go to the lowest (vertex_p, vertex_q) pair.
    if first.gain != second.gain {
        if first.gain > second.gain { first } else { second }
    } else if (first.vertex_p, first.vertex_q) <= (second.vertex_p, second.vertex_q) {
        first
    } else {
        second
    }
}

fn find_adjacent_partitions(graph: &Graph, partition: &[usize]) -> Vec<(usize, usize)> {
    // Pairs of partitions joined by at least one edge, in ascending order.
    let mut adjacent_partitions = BTreeSet::new();

    for vertex in 0..graph.len() {
        for (neighbor_vertex, _edge_weight) in graph.neighbors(vertex) {
            let (part_u, part_v) = (partition[vertex], partition[neighbor_vertex]);
            if part_u != part_v {
                adjacent_partitions.insert((part_u.min(part_v), part_u.max(part_v)));
            }
        }
    }

    adjacent_partitions.into_iter().collect()
}

fn conn(vertex_id: usize,
        partition_id: usize,
        vertex_connectivity_data_structure: &Vec<Vec<i64>>) -> i64 {
    // Gets how well a vertex is connected to a partition (adds all the edge weights connected to the partition).

    vertex_connectivity_data_structure[vertex_id][partition_id]
}

fn init_vertex_connectivity_data_structure(graph: &Graph,
                                           partition: &[usize],
                                           num_partitions: usize) -> Vec<Vec<i64>> {

    let mut vertex_connectivity_data_structure = vec![vec![0; num_partitions]; partition.len()];

    for vertex in 0..graph.len() {
        for (neighbour_vertex, edge_weight) in graph.neighbors(vertex) {
            vertex_connectivity_data_structure[vertex][partition[neighbour_vertex]] += edge_weight;
        }
    }

    vertex_connectivity_data_structure
}

fn update_parts_and_vertex_connectivity(
    graph: &Graph,
    partition: &mut [usize],
    vertex_connectivity_data_structure: &mut Vec<Vec<i64>>,
    moves: &[Move]) {
    // All moves are withdrawn from their source partitions before any is added to its destination,
    // so moves between neighbours are accounted for correctly.

    for single_move in moves {
        let vertex = single_move.vertex;
        let partition_source = partition[vertex];

        for (neighbour_vertex, edge_weight) in graph.neighbors(vertex) {
            vertex_connectivity_data_structure[neighbour_vertex][partition_source] -= edge_weight;
        }

        partition[vertex] = single_move.partition_id;
    }

    for single_move in moves {
        let vertex = single_move.vertex;
        let partition_dest = single_move.partition_id;

        for (neighbour_vertex, edge_weight) in graph.neighbors(vertex) {
            vertex_connectivity_data_structure[neighbour_vertex][partition_dest] += edge_weight;
        }
    }
}

/// Kernighan-Lin boundary refiner
///
/// Improves an existing partition by exchanging vertex pairs between adjacent partitions while the
/// exchange strictly decreases the edge cut. Partition sizes are preserved. The metadata is the
/// final edge cut.
#[derive(Debug, Clone, Copy)]
pub struct KernighanLinRefiner {
    /// Maximum number of swaps applied to each pair of adjacent partitions
    pub iterations: u32,
}

impl Default for KernighanLinRefiner {
    fn default() -> Self {
        KernighanLinRefiner { iterations: 10 }
    }
}

impl<'a> crate::Partition<&'a Graph> for KernighanLinRefiner {
    type Metadata = i64;
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
        if self.iterations == 0 {
            return Err(Error::InvalidConfiguration("the Kernighan-Lin iteration budget must be positive"));
        }

        Ok(kernighan_lin(part_ids, adjacency, self.iterations))
    }
}
