//! # partial-state-transfer
//!
//! Two in-process nodes replicating bicycles. The first node loads a set of
//! fully-equipped bicycles, which travel as full snapshots; every later
//! update changes only the frame and fork, and only those two components
//! cross the wire.
//!
//! ```text
//! node-1 ──(type 22: full bicycle)──▶ node-2      initial load
//! node-1 ──(type 23: frame + fork)──▶ node-2      each update
//! ```

use std::io::{self, Write};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::*;
use pst_node::{BicycleCluster, CommitSummary, Node, NodeConfig, NodeConfigBuilder};
use pst_core::Bicycle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "partial-state-transfer")]
#[command(about = "Replicate only the changed components of an entity")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    node: NodeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Scripted run: form the cluster, load bicycles, update a few, compare replicas
    Demo {
        /// Number of updates to perform
        #[arg(long, default_value_t = 3)]
        updates: usize,
    },
    /// Interactive loop: [u]pdate a bicycle, [p]rint the replica, [q]uit
    Interactive,
}

#[derive(Args)]
struct NodeArgs {
    /// Entries each node keeps in memory (0 disables eviction)
    #[arg(long, global = true, default_value_t = 1)]
    max_entries: usize,

    /// Seconds to wait for the cluster to form
    #[arg(long, global = true, default_value_t = 60)]
    join_timeout: u64,

    /// Membership poll interval in milliseconds
    #[arg(long, global = true, default_value_t = 500)]
    poll_ms: u64,
}

impl NodeArgs {
    fn config(&self, node_id: u32) -> NodeConfig {
        let max_entries = match self.max_entries {
            0 => None,
            n => Some(n),
        };
        NodeConfigBuilder::new()
            .node_id(node_id)
            .max_entries(max_entries)
            .join_timeout(Duration::from_secs(self.join_timeout))
            .poll_interval(Duration::from_millis(self.poll_ms))
            .build()
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn show_commit(summary: &CommitSummary) {
    println!(
        "  {} {} entries, {} full / {} delta payloads, {} bytes to {} peer(s)",
        "⇢".bright_magenta(),
        summary.keys,
        summary.full_payloads.to_string().bright_white(),
        summary.delta_payloads.to_string().bright_white(),
        summary.bytes_shipped.to_string().bright_yellow(),
        summary.peers
    );
}

fn show_replica(node: &Node<Bicycle>) {
    let stats = node.inbox_stats();
    println!(
        "  {} {}: {} full, {} delta payloads received ({} bytes)",
        "◆".bright_cyan(),
        node.id().to_string().bold(),
        stats.full_payloads,
        stats.delta_payloads,
        stats.bytes_received
    );
    let store = node.store_stats();
    println!(
        "  {} {} loaded, {} evicted",
        "◆".bright_cyan(),
        store.loaded,
        store.spilled
    );
    for line in node.render_contents().lines() {
        println!("    {}", line);
    }
}

fn convergence_result(node1: &Node<Bicycle>, node2: &Node<Bicycle>) {
    if node1.entries() == node2.entries() {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "Replicas converged".bright_green().bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "Replicas diverged".bright_red().bold()
        );
    }
}

// ─── Scenarios ─────────────────────────────────────────────────────────────

async fn start_pair(args: &NodeArgs) -> pst_node::Result<(Node<Bicycle>, Node<Bicycle>)> {
    let cluster = BicycleCluster::new();

    section("Forming the cluster");
    let node1 = Node::start_bicycles(args.config(1), &cluster)?;
    let node2 = Node::start_bicycles(args.config(2), &cluster)?;
    let outcome = node1.wait_for_cluster_to_form().await?;
    step(&format!(
        "{} members after {} poll(s) in {:?}",
        outcome.observed_size, outcome.polls, outcome.elapsed
    ));
    Ok((node1, node2))
}

async fn run_demo(args: &NodeArgs, updates: usize) -> pst_node::Result<()> {
    header("PARTIAL STATE TRANSFER DEMO");

    let (node1, node2) = start_pair(args).await?;

    section("Loading initial data on node-1");
    let summary = node1.load_initial_data()?;
    show_commit(&summary);

    for round in 1..=updates {
        section(&format!("Update {} of {}", round, updates));
        let loaded: Vec<String> = node1.loaded_keys().into_iter().collect();
        step(&format!("In memory on node-1: {}", loaded.join(", ")));
        let report = node1.update_bicycle_not_in_cache()?;
        step(&format!("Updated {}", report.bike_id.bold()));
        step(&format!("frame = {}", report.frame));
        step(&format!("fork  = {}", report.fork));
        show_commit(&report.summary);
    }

    section("Replica state");
    show_replica(&node2);
    convergence_result(&node1, &node2);
    Ok(())
}

async fn run_interactive(args: &NodeArgs) -> pst_node::Result<()> {
    header("INTERACTIVE - partial state transfer");

    let (node1, node2) = start_pair(args).await?;
    let summary = node1.load_initial_data()?;
    step("Loaded initial data on node-1");
    show_commit(&summary);

    println!();
    println!("  {}", "Commands:".bold().underline());
    println!(
        "    {}   Update frame and fork of a bicycle not in memory",
        "u".bright_cyan()
    );
    println!("    {}   Print the bicycles on node-2", "p".bright_cyan());
    println!("    {}   Quit", "q".bright_cyan());
    println!();

    loop {
        print!("{}", "pst> ".bright_cyan().bold());
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        match input.trim() {
            "" => continue,
            "u" => match node1.update_bicycle_not_in_cache() {
                Ok(report) => {
                    step(&format!("Updated {}", report.bike_id.bold()));
                    show_commit(&report.summary);
                }
                Err(e) => println!("  {} {}", "!".bright_red(), e),
            },
            "p" => show_replica(&node2),
            "q" => break,
            other => println!(
                "  {} Unknown command '{}'. Use u, p or q.",
                "!".bright_yellow(),
                other
            ),
        }
    }

    convergence_result(&node1, &node2);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Demo { updates } => run_demo(&cli.node, updates).await,
        Commands::Interactive => run_interactive(&cli.node).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}
