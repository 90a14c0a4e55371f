use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use babel_library::{
    AssemblyMethod, DiscoveryConfig, DiscoveryEngine, ExportFormat, SearchStrategy, SeedWindow,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use shared_logging::{JsonLogger, LogLevel, LogRecord};

#[derive(Parser, Debug)]
#[command(name = "babel", version, about = "Deterministic combinatorial library explorer")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON-lines log file; overrides the configured one.
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prints the page at a hex address.
    Page {
        address: String,
        /// Emits content, scores, and hash as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Searches for pages resembling a query.
    Search(SearchArgs),
    /// Scores text for coherence.
    Score {
        /// Text to score; read from --file when absent.
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Phrase the text is expected to contain; repeatable.
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// Lists coherent sentence passages of a page.
    Passages {
        address: String,
        #[arg(long, default_value_t = 50)]
        min_length: usize,
        #[arg(long, default_value_t = 60.0)]
        min_coherence: f64,
    },
    /// Searches and assembles a book.
    Assemble(AssembleArgs),
}

#[derive(Parser, Debug)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value = "fragments")]
    strategy: SearchStrategy,
    #[arg(long, default_value_t = 10)]
    max_results: usize,
    /// Defaults to the configured minimum.
    #[arg(long)]
    min_coherence: Option<f64>,
    /// First seed of the scan window (exact and inversion).
    #[arg(long, requires = "window_end")]
    window_start: Option<u64>,
    /// End of the scan window, exclusive.
    #[arg(long, requires = "window_start")]
    window_end: Option<u64>,
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct AssembleArgs {
    query: String,
    /// Defaults to the configured book size.
    #[arg(long)]
    book_size: Option<usize>,
    #[arg(long, default_value_t = 50.0)]
    threshold: f64,
    #[arg(long, default_value = "phrase_relevance")]
    method: AssemblyMethod,
    #[arg(long, default_value = "text")]
    format: ExportFormat,
    /// Writes the book here instead of printing it.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Page { .. } => "page",
            Self::Search(_) => "search",
            Self::Score { .. } => "score",
            Self::Passages { .. } => "passages",
            Self::Assemble(_) => "assemble",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.log)?;
    let engine = DiscoveryEngine::from_config(&config)?;
    let command = cli.command.name();

    let outcome = run(&engine, cli.command);
    if let Some(path) = &config.log_path {
        let (level, message) = match &outcome {
            Ok(_) => (LogLevel::Info, "cli.command.complete"),
            Err(_) => (LogLevel::Error, "cli.command.failed"),
        };
        let error = outcome.as_ref().err().map(ToString::to_string);
        log_cli_event(path, level, message, json!({ "command": command, "error": error }))?;
    }
    println!("{}", outcome?);
    Ok(())
}

fn load_config(path: Option<&Path>, log: Option<PathBuf>) -> Result<DiscoveryConfig> {
    let mut config = match path {
        Some(path) => DiscoveryConfig::load(path)?,
        None => DiscoveryConfig::default(),
    };
    if log.is_some() {
        config.log_path = log;
    }
    Ok(config)
}

fn run(engine: &DiscoveryEngine, command: Commands) -> Result<String> {
    match command {
        Commands::Page { address, json } => {
            let page = engine.get_page(&address)?;
            if json {
                Ok(serde_json::to_string_pretty(&json!({
                    "address": page.address,
                    "coherence_score": page.coherence_score,
                    "scores": page.scores,
                    "page_hash": page.page_hash(),
                    "content": page.content,
                }))?)
            } else {
                Ok(page.content)
            }
        }
        Commands::Search(args) => handle_search(engine, args),
        Commands::Score {
            text,
            file,
            targets,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?,
                (None, None) => bail!("provide text or --file"),
            };
            let scores = engine.score_text(&text, &targets);
            Ok(serde_json::to_string_pretty(&scores)?)
        }
        Commands::Passages {
            address,
            min_length,
            min_coherence,
        } => {
            let passages = engine.extract_passages(&address, min_length, min_coherence)?;
            if passages.is_empty() {
                return Ok(format!("no passages of {min_length}+ chars reach {min_coherence}"));
            }
            Ok(passages
                .iter()
                .map(|passage| {
                    format!("[{}] ({:.1}) {}", passage.index, passage.coherence, passage.text)
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Commands::Assemble(args) => handle_assemble(engine, args),
    }
}

fn handle_search(engine: &DiscoveryEngine, args: SearchArgs) -> Result<String> {
    let window = seed_window(args.window_start, args.window_end)?;
    let result = engine.search_with_window(
        &args.query,
        args.strategy,
        args.max_results,
        args.min_coherence.unwrap_or_else(|| engine.min_coherence()),
        window,
    );
    let summary = result.to_summary();
    if args.json {
        return Ok(serde_json::to_string_pretty(&summary)?);
    }
    let mut lines = vec![format!(
        "{} candidates, {} coherent, mean {:.2} ({:.3}s)",
        summary.total_candidates,
        summary.coherent_pages,
        summary.average_coherence,
        summary.execution_time
    )];
    lines.extend(summary.pages.iter().map(|page| {
        format!("{}\t{:.2}\t{}", page.address, page.coherence_score, page.snippet)
    }));
    Ok(lines.join("\n"))
}

fn handle_assemble(engine: &DiscoveryEngine, args: AssembleArgs) -> Result<String> {
    let book_size = args.book_size.unwrap_or_else(|| engine.default_book_size());
    let Some(book) = engine.assemble_book(&args.query, book_size, args.threshold, args.method)?
    else {
        bail!("no coherent pages found for {:?}", args.query);
    };
    match args.output {
        Some(path) => {
            engine.export_book(&book, &path, args.format)?;
            Ok(format!(
                "wrote book {} ({} pages) to {}",
                book.book_id,
                book.page_count(),
                path.display()
            ))
        }
        None => Ok(engine.render_book(&book, args.format)?),
    }
}

fn seed_window(start: Option<u64>, end: Option<u64>) -> Result<Option<SeedWindow>> {
    match (start, end) {
        (Some(start), Some(end)) => {
            ensure!(start < end, "window start {start} must be below end {end}");
            Ok(Some(SeedWindow::new(start, end)))
        }
        (None, None) => Ok(None),
        _ => bail!("--window-start and --window-end go together"),
    }
}

fn log_cli_event(path: &Path, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
    let logger = JsonLogger::new(path)?;
    let record = LogRecord::new("babel", level, message).with_fields(&metadata);
    logger.log(&record)
}
