use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::circuit::{CircuitGraph, Collapse, NodeKind};
use crate::netlist::{parse_netlist, Error};
use crate::report::PartitionReport;

/// Read a structural Verilog netlist and output a CircuitGraph, optionally collapsing signal nodes.
pub fn read_netlist_as_graph(file_path: &Path, collapse: Option<Collapse>) -> Result<CircuitGraph, Error> {
    let source = fs::read_to_string(file_path)?;
    let circuit = parse_netlist(&source)?;

    match collapse {
        Some(mode) => {
            let collapsed = circuit.collapse(mode);
            clilog::info!("collapsed {} nodes into {} ({:?})", circuit.len(), collapsed.len(), mode);
            Ok(collapsed)
        },
        None => Ok(circuit),
    }
}

/// Write the partition report to a file.
pub fn write_report_to_file(report: &PartitionReport, file_path: &Path) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(file_path)?);
    write_report(report, &mut file)?;
    file.flush()
}

/// Write the line-oriented partition report to any writer.
pub fn write_report<W: Write>(report: &PartitionReport, out: &mut W) -> std::io::Result<()> {
    for summary in &report.partitions {
        let mut names: Vec<&str> = summary.nodes.iter().map(String::as_str).collect();
        names.sort_unstable();

        writeln!(out, "--- Partition {} ---", summary.index)?;
        writeln!(out, "  - Size: {} nodes", summary.nodes.len())?;
        writeln!(out, "  - I/O: {} inputs, {} outputs", summary.io.inputs, summary.io.outputs)?;
        writeln!(out, "  - Nodes: [{}]", names.join(", "))?;
    }
    writeln!(out, "Cut size: {}", report.cut_size)?;
    writeln!(out, "I/O balance score: {}", report.io_balance_score)?;
    Ok(())
}

fn dot_attributes(kind: NodeKind) -> (&'static str, &'static str) {
    match kind {
        NodeKind::PrimaryInput => ("invtriangle", "palegreen"),
        NodeKind::PrimaryOutput => ("triangle", "lightpink"),
        NodeKind::Gate => ("box", "lightblue"),
        NodeKind::Wire => ("ellipse", "lightgrey"),
    }
}

/// Write the circuit as a Graphviz DOT file, grouping nodes into one cluster per partition when given.
pub fn write_graph_as_dot(circuit: &CircuitGraph, partition: Option<&[usize]>, file_path: &Path) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(file_path)?);
    write_dot(circuit, partition, &mut file)?;
    file.flush()
}

fn write_dot<W: Write>(circuit: &CircuitGraph, partition: Option<&[usize]>, out: &mut W) -> std::io::Result<()> {
    let write_node = |out: &mut W, index: usize, indent: &str| -> std::io::Result<()> {
        let node = circuit.node(index);
        let (shape, color) = dot_attributes(node.kind);
        let label = match &node.function {
            Some(function) => format!("{}\\n{}", node.name, function),
            None => node.name.clone(),
        };
        writeln!(out, "{indent}n{index} [label=\"{label}\", shape={shape}, style=filled, fillcolor={color}];")
    };

    writeln!(out, "digraph circuit {{")?;
    writeln!(out, "  rankdir=LR;")?;

    match partition {
        Some(partition) => {
            let num_parts = partition.iter().max().map_or(0, |&max_part| max_part + 1);
            for part in 0..num_parts {
                writeln!(out, "  subgraph cluster_{part} {{")?;
                writeln!(out, "    label=\"Partition {part}\";")?;
                for index in (0..circuit.len()).filter(|&index| partition[index] == part) {
                    write_node(out, index, "    ")?;
                }
                writeln!(out, "  }}")?;
            }
        },
        None => {
            for index in 0..circuit.len() {
                write_node(out, index, "  ")?;
            }
        },
    }

    for (driver, load) in circuit.edges() {
        writeln!(out, "  n{driver} -> n{load};")?;
    }
    writeln!(out, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;
    use crate::circuit::Collapse;
    use crate::io::{read_netlist_as_graph, write_graph_as_dot, write_report_to_file};
    use crate::netlist::Error;
    use crate::report::PartitionReport;

    fn create_mock_file(dir: &Path, filename: &str, content: &str) -> String {
        let file_path = dir.join(filename);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_read_netlist_with_collapse() -> Result<(), std::io::Error> {
        // Arrange
        let temp_dir = tempdir()?;
        let content = "input a, b;\noutput y;\nwire w;\nand U1 (w, a, b);\nnot U2 (y, w);\n";
        let netlist_path = create_mock_file(temp_dir.path(), "small.v", content);

        // Act
        let full = read_netlist_as_graph(Path::new(&netlist_path), None).unwrap();
        let wires = read_netlist_as_graph(Path::new(&netlist_path), Some(Collapse::Wires)).unwrap();
        let signals = read_netlist_as_graph(Path::new(&netlist_path), Some(Collapse::Signals)).unwrap();

        // Assert
        assert_eq!(full.len(), 6);
        assert_eq!(wires.len(), 5);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals.num_of_edges(), 1);

        Ok(())
    }

    #[test]
    fn test_read_missing_netlist() {
        let result = read_netlist_as_graph(Path::new("./testdata/does_not_exist.v"), None);

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_write_report_to_file() -> Result<(), std::io::Error> {
        // Arrange
        let temp_dir = tempdir()?;
        let report_path = temp_dir.path().join("report.txt");
        let circuit = read_netlist_as_graph(Path::new("./testdata/three_gate.v"), Some(Collapse::Signals)).unwrap();
        let report = PartitionReport::new(&circuit, &[0, 1, 1]);

        // Act
        write_report_to_file(&report, &report_path)?;

        // Assert
        let expected = "\
--- Partition 0 ---
  - Size: 1 nodes
  - I/O: 0 inputs, 1 outputs
  - Nodes: [U1]
--- Partition 1 ---
  - Size: 2 nodes
  - I/O: 1 inputs, 0 outputs
  - Nodes: [U2, U3]
Cut size: 1
I/O balance score: 2
";
        assert_eq!(fs::read_to_string(&report_path)?, expected);

        Ok(())
    }

    #[test]
    fn test_write_graph_as_dot_with_clusters() -> Result<(), std::io::Error> {
        // Arrange
        let temp_dir = tempdir()?;
        let dot_path = temp_dir.path().join("circuit.dot");
        let circuit = read_netlist_as_graph(Path::new("./testdata/three_gate.v"), None).unwrap();
        let partition = [0, 0, 1, 1, 0, 1, 0, 1, 1];

        // Act
        write_graph_as_dot(&circuit, Some(&partition), &dot_path)?;

        // Assert
        let dot = fs::read_to_string(&dot_path)?;
        assert!(dot.starts_with("digraph circuit {"));
        assert!(dot.contains("subgraph cluster_0 {"));
        assert!(dot.contains("subgraph cluster_1 {"));
        assert!(dot.contains("n6 [label=\"U1\\nand\", shape=box, style=filled, fillcolor=lightblue];"));
        assert!(dot.contains("n0 [label=\"a\", shape=invtriangle, style=filled, fillcolor=palegreen];"));
        assert_eq!(dot.matches(" -> ").count(), circuit.num_of_edges());

        Ok(())
    }
}
