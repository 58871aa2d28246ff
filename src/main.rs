use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use greedy_community::distance::{epsilon_graph, knn_graph};
use greedy_community::logger::init_logger;
use greedy_community::{modularity, AdjacencyMatrix, AppConfig, GraphSnapshot, GreedyModularity, Metric};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// `.graph` file with `v` and `e` lines.
    Graph,
    /// Plain `src dst` edge list.
    Edges,
    /// One point per line, coordinates separated by whitespace or commas.
    Points,
}

/// Greedy modularity community detection.
#[derive(Debug, Parser)]
#[command(name = "greedy-community", version, about)]
struct Cli {
    /// Input file.
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = InputFormat::Graph)]
    format: InputFormat,

    /// Stop merging once this many communities remain.
    #[arg(long)]
    target: Option<usize>,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Neighbors per point when building a graph from points.
    #[arg(long, default_value_t = 5)]
    knn: usize,

    /// Link points closer than this instead of using nearest neighbors.
    #[arg(long)]
    epsilon: Option<f64>,

    #[arg(long, value_enum, default_value_t = Metric::Euclidean)]
    metric: Metric,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Print every step of the merge history.
    #[arg(long)]
    trajectory: bool,
}

fn read_points(path: &Path) -> Result<Vec<Vec<f64>>> {
    let file = File::open(path).with_context(|| format!("failed to open points {}", path.display()))?;
    let mut points = Vec::new();
    for (line_index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let point = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<f64>()
                    .with_context(|| format!("line {}: `{}` is not a number", line_index + 1, token))
            })
            .collect::<Result<Vec<f64>>>()?;
        points.push(point);
    }
    Ok(points)
}

fn load_input(cli: &Cli) -> Result<(AdjacencyMatrix, Option<Vec<Vec<u32>>>)> {
    match cli.format {
        InputFormat::Graph => {
            let (graph, communities) = GraphSnapshot::from_graph_file(&cli.input)?;
            Ok((graph.to_adjacency_matrix(), communities))
        }
        InputFormat::Edges => {
            let graph = GraphSnapshot::from_edge_list_file(&cli.input)?;
            Ok((graph.to_adjacency_matrix(), None))
        }
        InputFormat::Points => {
            let points = read_points(&cli.input)?;
            let matrix = match cli.epsilon {
                Some(epsilon) => epsilon_graph(&points, epsilon, cli.metric)?,
                None => knn_graph(&points, cli.knn, cli.metric)?,
            };
            info!("Built graph over {} points", points.len());
            Ok((matrix, None))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(target) = cli.target {
        config.detection.target_communities = target;
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    init_logger(config.log_file.as_deref())?;

    let (matrix, ground_truth) = load_input(&cli)?;
    if matrix.is_empty() {
        bail!("{} contains no vertices", cli.input.display());
    }
    let result = GreedyModularity::from_config(&config.detection).detect(&matrix)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("vertices: {}", matrix.len());
    println!("merges: {}", result.merge_count());
    if cli.trajectory {
        for (index, step) in result.trajectory.iter().enumerate() {
            match &step.merge {
                Some(merge) => println!(
                    "step {}: {} + {} -> {}, gain {:.6}, modularity {:.6}",
                    index, merge.left, merge.right, merge.merged, merge.gain, step.score
                ),
                None => println!("step {}: singletons, modularity {:.6}", index, step.score),
            }
        }
    }
    println!("best step: {}", result.best_step);
    println!("best modularity: {:.6}", result.best_score);
    println!("communities: {}", result.best_partition.len());
    for (index, members) in result.best_partition.iter().enumerate() {
        let members: Vec<String> = members.iter().map(u32::to_string).collect();
        println!("community {}: {}", index, members.join(" "));
    }
    if let Some(ground_truth) = ground_truth {
        println!(
            "ground truth modularity: {:.6} ({} communities)",
            modularity(&matrix, &ground_truth),
            ground_truth.len()
        );
    }
    Ok(())
}
