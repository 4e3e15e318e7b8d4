use std::fmt;
use regex::Regex;
use rustc_hash::FxHashMap;
use crate::circuit::{self, CircuitGraph, NodeKind};

/// Errors raised while reading a structural netlist.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The netlist file could not be read.
    Io(std::io::Error),

    /// A gate instance does not name an output and at least one input.
    MalformedInstance { instance: String, connections: usize },

    /// The netlist describes an invalid graph (e.g. a gate reusing a signal name).
    Graph(circuit::Error),

    /// An internal pattern failed to compile.
    Pattern(regex::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "failed to read netlist: {err}"),
            Error::MalformedInstance { instance, connections } => write!(
                f,
                "gate instance '{instance}' has {connections} connection(s), expected an output and at least one input"
            ),
            Error::Graph(err) => write!(f, "invalid netlist: {err}"),
            Error::Pattern(err) => write!(f, "invalid netlist pattern: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Graph(err) => Some(err),
            Error::Pattern(err) => Some(err),
            Error::MalformedInstance { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<circuit::Error> for Error {
    fn from(err: circuit::Error) -> Self {
        Error::Graph(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Pattern(err)
    }
}

struct Patterns {
    block_comment: Regex,
    line_comment: Regex,
    declaration: Regex,
    gate_instance: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Patterns {
            block_comment: Regex::new(r"(?s)/\*.*?\*/")?,
            line_comment: Regex::new(r"//[^\n]*")?,
            declaration: Regex::new(r"\b(input|output|wire)\b\s*(?:\[[^\]]*\])?\s*([^;]*);")?,
            gate_instance: Regex::new(r"\b(and|or|not|nand|nor|xor|xnor|buf)\s+([^\s(;]+)\s*\(([^;]*)\)\s*;")?,
        })
    }
}

fn split_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|name| !name.is_empty())
}

/// Parse a single structural Verilog module into a circuit graph.
///
/// Signals come first, in declaration order (inputs, outputs, wires), then one gate node per
/// instance with an edge gate -> output and an edge from each input to the gate. Signals used by an
/// instance without a declaration become wires.
pub fn parse_netlist(source: &str) -> Result<CircuitGraph, Error> {
    let patterns = Patterns::new()?;

    let source = source.replace('\\', "");
    let source = patterns.block_comment.replace_all(&source, " ");
    let source = patterns.line_comment.replace_all(&source, "");

    // Outputs override inputs of the same name; the first declaration fixes the position.
    let mut signals: Vec<(String, NodeKind)> = Vec::new();
    let mut signal_index: FxHashMap<String, usize> = FxHashMap::default();
    for captures in patterns.declaration.captures_iter(&source) {
        let kind = match &captures[1] {
            "input" => NodeKind::PrimaryInput,
            "output" => NodeKind::PrimaryOutput,
            _ => NodeKind::Wire,
        };
        for name in split_names(&captures[2]) {
            match signal_index.get(name) {
                Some(&index) => {
                    if kind == NodeKind::PrimaryOutput {
                        signals[index].1 = NodeKind::PrimaryOutput;
                    }
                }
                None => {
                    signal_index.insert(name.to_string(), signals.len());
                    signals.push((name.to_string(), kind));
                }
            }
        }
    }

    let mut circuit = CircuitGraph::new();
    for (name, kind) in &signals {
        circuit.add_node(name, *kind)?;
    }

    for captures in patterns.gate_instance.captures_iter(&source) {
        let function = &captures[1];
        let instance = &captures[2];
        let connections: Vec<&str> = split_names(&captures[3]).collect();
        if connections.len() < 2 {
            return Err(Error::MalformedInstance {
                instance: instance.to_string(),
                connections: connections.len(),
            });
        }

        let gate = circuit.add_gate(instance, function)?;
        for (position, &signal) in connections.iter().enumerate() {
            let signal_node = match circuit.index_of(signal) {
                Some(index) => index,
                None => circuit.add_node(signal, NodeKind::Wire)?,
            };
            if position == 0 {
                circuit.add_edge_by_index(gate, signal_node)?;
            } else {
                circuit.add_edge_by_index(signal_node, gate)?;
            }
        }
    }

    clilog::debug!("parsed netlist: {} nodes, {} edges", circuit.len(), circuit.num_of_edges());
    Ok(circuit)
}
