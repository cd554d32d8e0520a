//! Thin CLI over the research engine: run one search, print the
//! result envelope as JSON or a table.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use litscout::models::{ProgressStatus, SearchOptions};
use litscout::{ResearchEngine, ResearchResult, Settings};

#[derive(Debug, Parser)]
#[command(name = "litscout", version, about = "Federated academic literature search")]
struct Cli {
    /// Research query.
    query: String,

    /// Cap on records requested from each source.
    #[arg(long)]
    max_per_source: Option<usize>,

    /// Earliest publication year.
    #[arg(long)]
    year_start: Option<i32>,

    /// Latest publication year.
    #[arg(long)]
    year_end: Option<i32>,

    /// Comma-separated subset of source ids to query.
    #[arg(long, value_delimiter = ',')]
    sources: Option<Vec<String>>,

    /// Skip citation-network expansion.
    #[arg(long)]
    no_citations: bool,

    /// Skip preprint servers.
    #[arg(long)]
    no_preprints: bool,

    /// Drop records below this reliability score.
    #[arg(long, default_value_t = 0.0)]
    min_reliability: f64,

    /// Print the full JSON envelope instead of a table.
    #[arg(long)]
    json: bool,

    /// Rows shown in table output.
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("litscout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load();
    let include_scihub = settings.enable_scihub;
    let engine = ResearchEngine::new(settings)?;

    let options = SearchOptions {
        max_per_source: cli.max_per_source.unwrap_or(100),
        expand_citations: !cli.no_citations,
        include_preprints: !cli.no_preprints,
        min_reliability: cli.min_reliability,
        year_start: cli.year_start,
        year_end: cli.year_end,
        sources: cli.sources.clone(),
    };

    let show_progress = std::io::stderr().is_terminal();
    let progress = show_progress.then(|| {
        Arc::new(|event: litscout::ProgressEvent| {
            let marker = match event.status {
                ProgressStatus::Running => "…",
                ProgressStatus::Complete => "✓",
                ProgressStatus::Error => "✗",
            };
            if event.source.is_empty() {
                eprintln!("{marker} [{}] {}", event.phase, event.message);
            } else {
                eprintln!("{marker} [{}] {}: {}", event.phase, event.source, event.message);
            }
        }) as litscout::models::ProgressSink
    });

    let result = engine.search(&cli.query, options, progress).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result.envelope(include_scihub))?);
    } else {
        print_summary(&result, cli.limit);
    }

    Ok(())
}

fn print_summary(result: &ResearchResult, limit: usize) {
    let stats = &result.statistics;
    println!(
        "{} {} unique records from {} sources in {:.1}s ({} duplicates removed){}",
        "»".bold(),
        result.records.len(),
        stats.sources_searched.len(),
        stats.search_time_seconds(),
        stats.duplicates_removed,
        if stats.truncated { " [partial]" } else { "" },
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["#", "Title", "Year", "Cites", "Rel", "Trust", "Source"]);

    for (i, record) in result.records.iter().take(limit).enumerate() {
        let trust = record
            .reliability
            .map(|s| format!("{:.2}", s.score))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(truncate(&record.title, 60)),
            Cell::new(record.year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(record.citations.map(|c| c.to_string()).unwrap_or_default()),
            Cell::new(format!("{:.2}", record.relevance)),
            Cell::new(trust),
            Cell::new(&record.primary_source),
        ]);
    }
    println!("{table}");

    if !result.reasoning.key_insights.is_empty() {
        println!("\n{}", "Insights".bold());
        for insight in &result.reasoning.key_insights {
            println!("  - {insight}");
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
