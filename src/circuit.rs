use std::collections::BTreeSet;
use std::fmt;
use rustc_hash::FxHashMap;

/// The role a node plays in the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    PrimaryInput,
    PrimaryOutput,
    Gate,
    Wire,
}

impl NodeKind {
    /// Whether the node carries a signal rather than a logic function.
    pub fn is_signal(&self) -> bool {
        !matches!(self, NodeKind::Gate)
    }
}

/// A node of the circuit graph. Immutable once added to a `CircuitGraph`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Logic function of a gate (e.g. `nand`), `None` for signals.
    pub function: Option<String>,
}

/// Errors raised while building a circuit graph.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A node with this name already exists.
    DuplicateNode(String),

    /// An edge refers to a node that was never added.
    UnknownNode(String),

    /// An edge would connect a node to itself.
    SelfLoop(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateNode(name) => write!(f, "node '{name}' is declared twice"),
            Error::UnknownNode(name) => write!(f, "edge refers to unknown node '{name}'"),
            Error::SelfLoop(name) => write!(f, "node '{name}' cannot drive itself"),
        }
    }
}

impl std::error::Error for Error {}

/// Which signal nodes to fold into direct driver-to-load edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapse {
    /// Drop internal wires, keep primary inputs and outputs.
    Wires,
    /// Drop every signal node, leaving a gate-only graph.
    Signals,
}

impl Collapse {
    fn keeps(&self, kind: NodeKind) -> bool {
        match self {
            Collapse::Wires => kind != NodeKind::Wire,
            Collapse::Signals => kind == NodeKind::Gate,
        }
    }
}

/// Directed circuit graph.
///
/// Nodes live in an arena and are addressed by their insertion index; edges go from driver to load
/// and are stored twice, as fan-out of the driver and fan-in of the load. Parallel edges are kept.
#[derive(Debug, Clone, Default)]
pub struct CircuitGraph {
    nodes: Vec<Node>,
    name_to_index: FxHashMap<String, usize>,
    fanout: Vec<Vec<usize>>,
    fanin: Vec<Vec<usize>>,
    num_of_edges: usize,
}

impl CircuitGraph {

    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The number of directed edges, parallel edges included.
    pub fn num_of_edges(&self) -> usize {
        self.num_of_edges
    }

    /// Add a node and return its index.
    pub fn add_node(&mut self, name: &str, kind: NodeKind) -> Result<usize, Error> {
        self.push_node(Node { name: name.to_string(), kind, function: None })
    }

    /// Add a gate node labelled with its logic function and return its index.
    pub fn add_gate(&mut self, name: &str, function: &str) -> Result<usize, Error> {
        self.push_node(Node {
            name: name.to_string(),
            kind: NodeKind::Gate,
            function: Some(function.to_string()),
        })
    }

    fn push_node(&mut self, node: Node) -> Result<usize, Error> {
        if self.name_to_index.contains_key(&node.name) {
            return Err(Error::DuplicateNode(node.name));
        }
        let index = self.nodes.len();
        self.name_to_index.insert(node.name.clone(), index);
        self.nodes.push(node);
        self.fanout.push(Vec::new());
        self.fanin.push(Vec::new());
        Ok(index)
    }

    /// Add a directed edge between two existing nodes, addressed by name.
    pub fn add_edge(&mut self, driver: &str, load: &str) -> Result<(), Error> {
        let driver_index = self.index_of(driver).ok_or_else(|| Error::UnknownNode(driver.to_string()))?;
        let load_index = self.index_of(load).ok_or_else(|| Error::UnknownNode(load.to_string()))?;
        self.add_edge_by_index(driver_index, load_index)
    }

    /// Add a directed edge between two existing nodes, addressed by index.
    pub fn add_edge_by_index(&mut self, driver: usize, load: usize) -> Result<(), Error> {
        if driver >= self.len() {
            return Err(Error::UnknownNode(format!("#{driver}")));
        }
        if load >= self.len() {
            return Err(Error::UnknownNode(format!("#{load}")));
        }
        if driver == load {
            return Err(Error::SelfLoop(self.nodes[driver].name.clone()));
        }
        self.fanout[driver].push(load);
        self.fanin[load].push(driver);
        self.num_of_edges += 1;
        Ok(())
    }

    /// Look up the index of a node by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Loads driven by the given node.
    pub fn fanout(&self, index: usize) -> &[usize] {
        &self.fanout[index]
    }

    /// Drivers of the given node.
    pub fn fanin(&self, index: usize) -> &[usize] {
        &self.fanin[index]
    }

    /// Both directions of adjacency: fan-in followed by fan-out.
    pub fn all_neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.fanin[index].iter().chain(self.fanout[index].iter()).copied()
    }

    /// Every directed edge as a `(driver, load)` pair, ordered by driver index.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.fanout
            .iter()
            .enumerate()
            .flat_map(|(driver, loads)| loads.iter().map(move |&load| (driver, load)))
    }

    /// Number of directed edges whose endpoints lie in different parts.
    pub fn cut_size(&self, partition: &[usize]) -> usize {
        debug_assert_eq!(self.len(), partition.len());

        self.edges()
            .filter(|&(driver, load)| partition[driver] != partition[load])
            .count()
    }

    /// Whether the node is incident to at least one cut edge.
    pub fn is_boundary(&self, index: usize, partition: &[usize]) -> bool {
        self.all_neighbors(index)
            .any(|neighbor| partition[neighbor] != partition[index])
    }

    /// Indices of all boundary nodes, in ascending order.
    pub fn boundary_nodes(&self, partition: &[usize]) -> Vec<usize> {
        (0..self.len())
            .filter(|&index| self.is_boundary(index, partition))
            .collect()
    }

    /// Build a new graph without the signal nodes selected by `mode`.
    ///
    /// Every kept driver is connected to every kept load it reaches through dropped nodes. Paths that
    /// lead back to the driver itself are skipped.
    pub fn collapse(&self, mode: Collapse) -> CircuitGraph {
        let mut collapsed = CircuitGraph::new();
        let mut old_to_new = vec![None; self.len()];

        for (index, node) in self.nodes.iter().enumerate() {
            if mode.keeps(node.kind) {
                collapsed.nodes.push(node.clone());
                collapsed.name_to_index.insert(node.name.clone(), collapsed.fanout.len());
                old_to_new[index] = Some(collapsed.fanout.len());
                collapsed.fanout.push(Vec::new());
                collapsed.fanin.push(Vec::new());
            }
        }

        for driver in 0..self.len() {
            let Some(new_driver) = old_to_new[driver] else {
                continue;
            };

            // Depth-first walk through dropped nodes; each dropped node is expanded once per driver.
            let mut visited = BTreeSet::new();
            let mut stack: Vec<usize> = self.fanout[driver].iter().rev().copied().collect();
            while let Some(next) = stack.pop() {
                match old_to_new[next] {
                    Some(new_load) => {
                        if new_load != new_driver {
                            collapsed.fanout[new_driver].push(new_load);
                            collapsed.fanin[new_load].push(new_driver);
                            collapsed.num_of_edges += 1;
                        }
                    }
                    None => {
                        if visited.insert(next) {
                            stack.extend(self.fanout[next].iter().rev().copied());
                        }
                    }
                }
            }
        }

        collapsed
    }
}
