use std::path::PathBuf;
use std::time::Instant;
use CircuitCut::algorithms::HybridPartitioner;
use CircuitCut::circuit::Collapse;
use CircuitCut::io::{read_netlist_as_graph, write_graph_as_dot, write_report, write_report_to_file};
use CircuitCut::report::PartitionReport;
use CircuitCut::Partition;
use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CollapseArg {
    /// Keep every node of the netlist
    #[value(name = "none")]
    Keep,
    /// Fold internal wires into direct edges
    Wires,
    /// Fold every signal node, leaving only gates
    Signals,
}

impl CollapseArg {
    fn mode(self) -> Option<Collapse> {
        match self {
            CollapseArg::Keep => None,
            CollapseArg::Wires => Some(Collapse::Wires),
            CollapseArg::Signals => Some(Collapse::Signals),
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Hybrid spectral / Kernighan-Lin / I/O-balancing circuit partitioner", long_about = None)]
struct Args {
    /// Path of the structural Verilog netlist
    netlist: PathBuf,

    /// Desired number of nodes per partition
    #[arg(long)]
    target_size: usize,

    /// Kernighan-Lin swap budget per pair of adjacent partitions
    #[arg(long = "kl-iter", default_value_t = 10)]
    kl_iterations: u32,

    /// Weight of the I/O balance score against the cut size
    #[arg(long, default_value_t = 0.1)]
    io_factor: f64,

    /// Seed for spectral clustering
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Maximum number of I/O balancing passes (defaults to the node count)
    #[arg(long = "io-passes")]
    io_max_passes: Option<usize>,

    /// Signal nodes to collapse before partitioning
    #[arg(long, value_enum, default_value_t = CollapseArg::Wires)]
    collapse: CollapseArg,

    /// File where the partition report is written
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// File where a Graphviz rendering of the partitioned circuit is written
    #[arg(long)]
    dot_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    clilog::init_stderr_color_debug();
    let args = Args::parse();

    let circuit = read_netlist_as_graph(&args.netlist, args.collapse.mode())?;
    clilog::info!("loaded {:?}: {} nodes, {} edges", args.netlist, circuit.len(), circuit.num_of_edges());

    let mut partition = vec![0; circuit.len()];
    let start = Instant::now();
    let metadata = HybridPartitioner { target_size: args.target_size,
                                       kl_iterations: args.kl_iterations,
                                       io_factor: args.io_factor,
                                       seed: args.seed,
                                       io_max_passes: args.io_max_passes }.partition(&mut partition, &circuit)?;
    let elapsed_time = start.elapsed();

    let report = PartitionReport::new(&circuit, &partition);
    match &args.output_file {
        Some(output_file) => {
            write_report_to_file(&report, output_file)?;
            clilog::info!("report written to {:?}", output_file);
        },
        None => write_report(&report, &mut std::io::stdout().lock())?,
    }
    if let Some(dot_file) = &args.dot_file {
        write_graph_as_dot(&circuit, Some(&partition), dot_file)?;
        clilog::info!("graph written to {:?}", dot_file);
    }

    println!("Partitions {}", metadata.num_of_partitions);
    println!("Cut size after spectral clustering {}", metadata.spectral_edge_cut);
    println!("Cut size after Kernighan-Lin {}", metadata.kl_edge_cut);
    println!("Final cut size {}", report.cut_size);
    println!("I/O balance score {}", report.io_balance_score);
    println!("Execution time {:?}", elapsed_time);
    Ok(())
}
