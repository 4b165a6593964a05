//! Citation Graph binary (spec section 3 "Derived entity").

use anyhow::Result;
use clap::Parser;
use fppc_citegraph::write_known_gaps_report;
use fppc_core::PipelineConfig;

#[derive(Parser)]
#[command(name = "citegraph")]
#[command(about = "Resolve prior-opinion citations across the corpus and report dangling targets")]
struct Cli {
    /// Preview the graph without writing `cited_by` back into any record or
    /// writing `known_gaps.json`.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    fppc_core::logging::init();

    let cli = Cli::parse();
    let config = PipelineConfig::load()?;

    println!("Loading documents...");
    let (summary, gaps) = fppc_citegraph::build_graph(&config.data_root.join("extracted"), cli.dry_run)?;

    println!("  Loaded {} documents", summary.documents);
    println!(
        "  Total citation edges: {} (resolved {}, dangling {})",
        summary.total_edges, summary.resolved_edges, summary.dangling_edges
    );
    println!(
        "{}Writing cited_by to JSON files...",
        if cli.dry_run { "[DRY RUN] " } else { "" }
    );
    println!("  Updated: {} docs", summary.documents_updated);
    println!("  Unchanged: {} docs", summary.documents_unchanged);

    write_known_gaps_report(&config.data_root, &gaps, cli.dry_run)?;

    println!("\n{}", "=".repeat(60));
    println!("{}CITATION GRAPH SUMMARY", if cli.dry_run { "DRY RUN " } else { "" });
    println!("{}", "=".repeat(60));
    println!("  Corpus documents: {}", summary.documents);
    match &summary.most_cited {
        Some((id, count)) => println!("  Most-cited document: {id} ({count} citations)"),
        None => println!("  Most-cited document: (none)"),
    }
    println!("  Known gaps: {} unique IDs", gaps.total_gaps);
    if !gaps.gaps.is_empty() {
        println!("  Top 5 gaps:");
        for gap in gaps.gaps.iter().take(5) {
            println!("    {}: cited by {} docs", gap.id, gap.cited_by_count);
        }
    }

    Ok(())
}
