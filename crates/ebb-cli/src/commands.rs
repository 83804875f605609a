//! CLI command implementations.

use crate::QueryArgs;
use colored::Colorize;
use ebb_core::CacheConfig;
use ebb_graph::{Graph, GraphCache};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const CONFIG_DIR: &str = ".ebb";
const CONFIG_FILE: &str = "config.json";

/// Write a default config under `<path>/.ebb`.
pub fn init(path: &Path) -> Result<()> {
    let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    CacheConfig::default().save(&config_path)?;

    println!("{} Initialized Ebb in {}", "✓".green(), path.display());
    println!(
        "  Edit {} to tune TTL and sweep interval",
        config_path.display().to_string().cyan()
    );

    Ok(())
}

/// Fill a cache with random unit edges and query the seed's neighborhood.
pub async fn demo(
    config: Option<&Path>,
    vertices: u32,
    edges: usize,
    seed: u32,
    query: &QueryArgs,
) -> Result<()> {
    if vertices == 0 {
        return Err("--vertices must be greater than zero".into());
    }
    let config = resolve_config(config)?;

    let cache: GraphCache<u32, u32> = GraphCache::from_config(&config);
    let sweeper = cache.spawn_watch(config.sweep_interval());

    for id in 0..vertices {
        cache.add_vertex(id, id);
    }

    let progress = ProgressBar::new(edges as u64);
    progress.set_style(
        ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos}/{len} edges {msg}")?,
    );

    let mut rng = rand::thread_rng();
    for _ in 0..edges {
        let tail = rng.gen_range(0..vertices);
        let head = rng.gen_range(0..vertices);
        cache.add_edge(tail, head, 1.0);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let stats = cache.stats();
    eprintln!(
        "{} Loaded {} vertices, {} edges from {} tails",
        "✓".green(),
        stats.vertices.to_string().cyan(),
        stats.edges.to_string().cyan(),
        stats.tails
    );

    if seed >= vertices {
        warn!("Seed {} is outside 0..{}; the result will be empty", seed, vertices);
    }

    let start = Instant::now();
    let graph = cache.neighbor(&seed, query.steps, query.top_k, query.idf);
    let elapsed = start.elapsed();

    let json = to_json(&graph, query, |key| u64::from(*key), |value| value.to_string())?;
    emit(&json, query.output.as_deref())?;

    eprintln!(
        "{} Neighborhood of {}: {} vertices, {} edges in {:?}",
        "✓".green(),
        seed.to_string().cyan(),
        graph.vertex_count(),
        graph.edge_count(),
        elapsed
    );

    sweeper.stop().await;
    Ok(())
}

/// Load an edge list file and query the seed's neighborhood.
pub fn walk(config: Option<&Path>, file: &Path, seed: String, query: &QueryArgs) -> Result<()> {
    let config = resolve_config(config)?;
    let text = fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    let edges = parse_edges(&text)?;
    info!("Loaded {} edges from {}", edges.len(), file.display());

    let cache: GraphCache<String, String> = GraphCache::from_config(&config);
    for (tail, head, weight) in edges {
        cache.add_vertex(tail.clone(), tail.clone());
        cache.add_vertex(head.clone(), head.clone());
        cache.add_edge(tail, head, weight);
    }

    let start = Instant::now();
    let graph = cache.neighbor(&seed, query.steps, query.top_k, query.idf);
    let elapsed = start.elapsed();

    if graph.is_empty() {
        warn!("Seed {:?} does not appear in {}", seed, file.display());
    }

    let ids = ordinal_ids(&graph);
    let json = to_json(
        &graph,
        query,
        |key| ids.get(key).copied().unwrap_or_default(),
        String::clone,
    )?;
    emit(&json, query.output.as_deref())?;

    eprintln!(
        "{} Neighborhood of {}: {} vertices, {} edges in {:?}",
        "✓".green(),
        seed.cyan(),
        graph.vertex_count(),
        graph.edge_count(),
        elapsed
    );

    Ok(())
}

/// Picks the config from `--config`, the working directory, the user
/// config dir, or falls back to defaults, in that order.
fn resolve_config(explicit: Option<&Path>) -> Result<CacheConfig> {
    if let Some(path) = explicit {
        return Ok(CacheConfig::load(path)?);
    }

    let candidates: Vec<PathBuf> = [
        Some(PathBuf::from(CONFIG_DIR).join(CONFIG_FILE)),
        dirs::config_dir().map(|dir| dir.join("ebb").join(CONFIG_FILE)),
    ]
    .into_iter()
    .flatten()
    .collect();

    for path in candidates {
        if path.is_file() {
            debug!("Using config {}", path.display());
            return Ok(CacheConfig::load(&path)?);
        }
    }

    debug!("No config file found, using defaults");
    Ok(CacheConfig::default())
}

/// Parses `tail head [weight]` lines. Blank lines and `#` comments are
/// skipped; the weight defaults to 1.
fn parse_edges(text: &str) -> Result<Vec<(String, String, f64)>> {
    let mut edges = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let weight = match fields.as_slice() {
            [_, _] => 1.0,
            [_, _, weight] => weight
                .parse::<f64>()
                .map_err(|e| format!("line {}: bad weight {:?}: {}", number + 1, weight, e))?,
            _ => {
                return Err(format!(
                    "line {}: expected `tail head [weight]`, got {:?}",
                    number + 1,
                    line
                )
                .into())
            }
        };

        edges.push((fields[0].to_string(), fields[1].to_string(), weight));
    }

    Ok(edges)
}

/// Assigns stable numeric ids to every key in the graph, in sorted order.
fn ordinal_ids<K, V>(graph: &Graph<K, V>) -> HashMap<K, u64>
where
    K: Eq + Hash + Ord + Clone,
{
    let mut keys: Vec<&K> = graph
        .vertices
        .keys()
        .chain(
            graph
                .edges
                .iter()
                .flat_map(|(tail, heads)| std::iter::once(tail).chain(heads.keys())),
        )
        .collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .zip(0u64..)
        .map(|(key, id)| (key.clone(), id))
        .collect()
}

fn to_json<K, V, F, L>(
    graph: &Graph<K, V>,
    query: &QueryArgs,
    key_to_id: F,
    label: L,
) -> Result<String>
where
    K: Eq + Hash + Serialize,
    V: Serialize,
    F: Fn(&K) -> u64,
    L: Fn(&V) -> String,
{
    let json = if query.view {
        serde_json::to_string_pretty(&graph.render(key_to_id, label))?
    } else {
        serde_json::to_string_pretty(graph)?
    };
    Ok(json)
}

fn emit(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
