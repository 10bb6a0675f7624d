//! CLI binary for oidm.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use oidm::{AppConfig, Services};
use oidm_search::{FusedRow, Ontology, SearchRequest};
use tracing_subscriber::EnvFilter;

/// oidm: hybrid lexical and vector search over medical ontologies.
#[derive(Parser)]
#[command(name = "oidm", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present).
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search one ontology or all of them and print one JSON result per line.
    Search {
        /// Ontology id (snomedct, radlex, anatomic_locations) or "all".
        ontology: String,
        /// Search mode: text, vector, or all.
        mode: String,
        /// Result cap per ontology and method.
        count: usize,
        /// Query text.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Keep raw repository scores.
        #[arg(long)]
        raw: bool,
        /// Classify results with the relevance filter.
        #[arg(long)]
        filter: bool,
    },

    /// Fused text + vector table across ontologies.
    Fuse {
        /// Ontology to include (repeatable; defaults to all).
        #[arg(long = "ontology", value_name = "ID")]
        ontologies: Vec<String>,
        /// Result cap per ontology and method (defaults to search.default_count).
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Query text.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The .env file may carry RUST_LOG, so load it before tracing.
    let dotenv = AppConfig::load_dotenv(cli.env_file.as_deref())?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("oidm=info,oidm_search=info")),
        )
        .init();

    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Search {
            ontology,
            mode,
            count,
            query,
            raw,
            filter,
        } => {
            // Reject bad arguments before touching any backend.
            let request = SearchRequest::parse(&ontology, &mode, &query.join(" "))?.with_count(count)?;
            let request = if raw { request.with_normalize(false) } else { request };
            let services = Services::from_config(&config).await?;
            run_search(&services, &request, filter).await
        }
        Command::Fuse {
            ontologies,
            count,
            query,
        } => {
            let selected = parse_ontologies(&ontologies)?;
            let count = count.unwrap_or(config.search.default_count);
            let services = Services::from_config(&config).await?;
            run_fuse(&services, &selected, count, &query.join(" ")).await
        }
    }
}

async fn run_search(
    services: &Services,
    request: &SearchRequest,
    filter: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    if filter {
        let relevance = services.filter()?;
        let (results, filtered) = services
            .orchestrator
            .search_and_filter(request, relevance)
            .await?;
        for result in &results {
            println!("{}", serde_json::to_string(result)?);
        }
        println!("{}", serde_json::to_string_pretty(&filtered)?);
    } else {
        for result in services.orchestrator.search(request).await? {
            println!("{}", serde_json::to_string(&result)?);
        }
    }
    eprintln!("elapsed: {:.3}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn parse_ontologies(ids: &[String]) -> anyhow::Result<Vec<Ontology>> {
    if ids.is_empty() {
        return Ok(Ontology::all().to_vec());
    }
    let parsed = ids
        .iter()
        .map(|id| id.parse::<Ontology>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parsed)
}

async fn run_fuse(
    services: &Services,
    ontologies: &[Ontology],
    count: usize,
    query: &str,
) -> anyhow::Result<()> {
    let names: Vec<&str> = ontologies.iter().map(Ontology::name).collect();
    eprintln!("searching {} (top {count} per method)", names.join(", "));

    let started = Instant::now();
    let rows = services
        .orchestrator
        .search_fused(ontologies, query, count)
        .await?;
    print_table(&rows);
    eprintln!("elapsed: {:.3}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn print_table(rows: &[FusedRow]) {
    println!(
        "{:<18} {:<20} {:<48} {:>8} {:>8} {:>9}",
        "system", "code", "display", "text", "vector", "combined"
    );
    for row in rows {
        println!(
            "{:<18} {:<20} {:<48} {:>8.3} {:>8.3} {:>9.3}",
            row.system,
            row.code,
            truncate(&row.display, 48),
            row.text_score,
            row.vector_score,
            row.combined_score
        );
    }
}

/// Shorten `s` to at most `max` characters, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
