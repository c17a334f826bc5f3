use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tagraph::{DirectoryFileStore, EngineConfig, GraphEngine, QueryResult};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

const DEMO_BATCH: &str = "
upsert node key=alice set role=admin, name=Alice;
upsert node key=bob set role=user, name=Bob, profile { 'eyJhZ2UiOjMwfQ==' };
upsert edge from=alice, to=bob, type=knows set since=2020;
select (key=alice) -> [type=knows] -> (*) friends return profile;
";

#[derive(Parser, Debug)]
#[command(name = "tagraph", version, about = "Run a statement batch against a tagraph store")]
struct Args {
    /// Store directory
    #[arg(long, default_value = "./tagraph_data")]
    data: String,

    /// Engine config file (YAML)
    #[arg(long)]
    config: Option<String>,

    /// Run the built-in demo batch instead of reading statements
    #[arg(long)]
    demo: bool,

    /// Statement file; `-` or nothing reads stdin
    input: Option<String>,
}

async fn read_statements(input: Option<&str>) -> Result<String> {
    match input {
        Some("-") | None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path)),
    }
}

fn print_result(index: usize, result: &QueryResult) {
    let label = result.alias.as_deref().unwrap_or("-");
    println!(
        "[{}] {} alias={} nodes={} edges={} data={}",
        index,
        result.status.code,
        label,
        result.nodes.len(),
        result.edges.len(),
        result.data.len()
    );
    if let Some(error) = &result.status.error {
        println!("    error: {}", error);
    }
    for node in &result.nodes {
        println!("    node {} [{}]", node.key, node.tags);
    }
    for edge in &result.edges {
        println!("    edge {} [{}]", edge.key(), edge.tags);
    }
    for link in &result.data {
        println!(
            "    data {}/{}: {}",
            link.node_key,
            link.name,
            String::from_utf8_lossy(&link.data)
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path).await?,
        None => EngineConfig::default(),
    };

    println!("Tagraph v{}", tagraph::version());
    println!("Data directory: {}", args.data);

    tokio::fs::create_dir_all(&args.data).await?;
    let store = Arc::new(DirectoryFileStore::new(&args.data));
    let engine = GraphEngine::open(config, store).await?;

    let statements = if args.demo {
        DEMO_BATCH.to_string()
    } else {
        read_statements(args.input.as_deref()).await?
    };
    let batch = engine.execute_batch(&statements).await;

    for (index, result) in batch.items.iter().enumerate() {
        print_result(index, result);
    }

    let map = engine.map_snapshot().await;
    println!(
        "Batch {}: {} nodes, {} edges",
        batch.status.code,
        map.node_count(),
        map.edge_count()
    );

    if !batch.is_ok() {
        anyhow::bail!(batch.status.error.unwrap_or_else(|| batch.status.code.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["tagraph"]).unwrap();
        assert_eq!(args.data, "./tagraph_data");
        assert!(args.config.is_none());
        assert!(!args.demo);
        assert!(args.input.is_none());
    }

    #[test]
    fn test_args_flags_and_input() {
        let args = Args::try_parse_from([
            "tagraph",
            "--data",
            "/tmp/graph",
            "--config",
            "engine.yaml",
            "--demo",
            "batch.txt",
        ])
        .unwrap();
        assert_eq!(args.data, "/tmp/graph");
        assert_eq!(args.config.as_deref(), Some("engine.yaml"));
        assert!(args.demo);
        assert_eq!(args.input.as_deref(), Some("batch.txt"));
    }

    #[test]
    fn test_args_reject_missing_value() {
        assert!(Args::try_parse_from(["tagraph", "--data"]).is_err());
        assert!(Args::try_parse_from(["tagraph", "--bogus"]).is_err());
    }
}
