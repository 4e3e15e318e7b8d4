// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
use std::fmt;

mod spectral_partitioner;
mod kernighan_lin;
mod io_balancer;
mod hybrid_partitioner;

pub use spectral_partitioner::SpectralPartitioner;
pub use kernighan_lin::KernighanLinRefiner;
pub use io_balancer::{IoBalanceMetadata, IoBalancer};
pub use hybrid_partitioner::{num_of_partitions, HybridMetadata, HybridPartitioner};


/// Common errors thrown by algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A parameter is out of range or the input graph is empty.
    InvalidConfiguration(&'static str),

    /// The eigen-decomposition of the Laplacian did not converge.
    NumericalFailure,

    /// A stage left a node without a valid partition.
    InvariantViolation { stage: &'static str },

    /// Input sets don't have matching lengths.
    InputLenMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(reason) => write!(f, "invalid configuration: {reason}"),
            Error::NumericalFailure => write!(f, "eigen-decomposition of the graph Laplacian did not converge"),
            Error::InvariantViolation { stage } => {
                write!(f, "partition invariant violated after the {stage} stage")
            }
            Error::InputLenMismatch { expected, actual } => write!(
                f,
                "input sets don't have the same length (expected {expected} items, got {actual})",
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Number of parts of an assignment: one plus the highest part id.
pub(crate) fn count_parts(partition: &[usize]) -> usize {
    partition.iter().max().map_or(0, |&max_part| max_part + 1)
}
