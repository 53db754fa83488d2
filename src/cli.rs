//! CLI argument parsing and command handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{self, Config};
use crate::formatter::{OutputFormatter, format_elapsed};
use crate::models::KindFilter;
use crate::output;
use crate::recency::{compute_score, now_ms, recency_key};
use crate::session::{SearchSession, SymbolSearch};
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};

/// symjump: relevance-ranked jump to symbol
#[derive(Parser, Debug)]
#[command(
    name = "symjump",
    version,
    about = "Find symbol definitions by name, ranked by fuzzy match and recent use",
    long_about = "symjump scans a directory tree for symbol definitions (classes, functions, \
                  methods, types, schema models, ...) with a catalog of regex patterns run \
                  through ripgrep, then ranks them by how well they match your query and how \
                  recently and often you have jumped to them."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// State directory holding config.toml and state.db
    /// (defaults to $SYMJUMP_HOME, then ~/.symjump)
    #[arg(long, value_name = "DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan once and print ranked symbols
    ///
    /// Without a query, symbols are ordered by recency. With a query, fuzzy
    /// match quality and recency are blended.
    ///
    /// Examples:
    ///   symjump search                       # Everything, most recent first
    ///   symjump search usrsvc --kind class   # Classes fuzzy-matching "usrsvc"
    ///   symjump search --kind schema-declaration --json
    Search {
        /// Fuzzy filter
        query: Option<String>,

        /// Symbol kind to search for, or "all"
        #[arg(short, long, default_value = "all")]
        kind: KindFilter,

        /// Directory to search (defaults to current directory)
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Maximum number of results to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,

        /// Disable colors
        #[arg(long)]
        plain: bool,
    },

    /// Line-oriented picker over stdin
    ///
    /// Each plain line replaces the filter. Commands:
    ///   :open N     accept result N
    ///   :refresh    rescan (cached results shown until the scan finishes)
    ///   :kind K     switch symbol kind
    ///   :quit       exit
    Interactive {
        /// Symbol kind to search for, or "all"
        #[arg(short, long, default_value = "all")]
        kind: KindFilter,

        /// Directory to search (defaults to current directory)
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Number of results shown per update
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Disable colors
        #[arg(long)]
        plain: bool,
    },

    /// Record an access to a file or a symbol in it
    Touch {
        /// File path, relative to --root
        file: String,

        /// Symbol name
        symbol: Option<String>,

        /// Search root the file path is relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// List recorded accesses, most recent first
    Recent {
        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output (only with --json)
        #[arg(long)]
        pretty: bool,
    },

    /// Delete all recorded accesses
    ClearRecency {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the pattern catalog (builtin plus config rules)
    Patterns {
        /// Only rules for this kind
        #[arg(short, long, default_value = "all")]
        kind: KindFilter,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // Setup logging based on verbosity
        let log_level = match self.verbose {
            0 => "warn",   // Default: only warnings and errors
            1 => "info",   // -v: show info messages
            2 => "debug",  // -vv: show debug messages
            _ => "trace",  // -vvv: show trace messages
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        let state_dir = config::state_dir(self.state_dir.as_deref())?;
        let config = config::load_config(&state_dir)?;
        log::debug!("Using state directory {}", state_dir.display());

        match self.command {
            Command::Search { query, kind, root, limit, json, pretty, plain } => {
                let search = build_search(&config, &state_dir);
                handle_search(&search, query, kind, &root, limit, json, pretty, plain)
            }
            Command::Interactive { kind, root, limit, plain } => {
                let search = build_search(&config, &state_dir);
                handle_interactive(&search, kind, &root, limit, plain)
            }
            Command::Touch { file, symbol, root } => {
                let search = build_search(&config, &state_dir);
                handle_touch(&search, &file, symbol.as_deref(), &root)
            }
            Command::Recent { limit, json, pretty } => {
                let search = build_search(&config, &state_dir);
                handle_recent(&search, limit, json, pretty)
            }
            Command::ClearRecency { yes } => {
                let search = build_search(&config, &state_dir);
                handle_clear_recency(&search, yes)
            }
            Command::Patterns { kind } => handle_patterns(&config, kind),
        }
    }
}

/// Wire up the search service; an unusable state database degrades to an
/// in-memory store for this run
fn build_search(config: &Config, state_dir: &Path) -> SymbolSearch {
    let store: Arc<dyn KeyValueStore> = match SqliteStore::in_dir(state_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::warn!("Recency data will not be saved: {:#}", e);
            Arc::new(MemoryStore::new())
        }
    };

    SymbolSearch::from_config(config, store)
}

/// Canonical search root, or None (with a message) when there is no workspace
fn resolve_root(root: &Path) -> Option<PathBuf> {
    match root.canonicalize() {
        Ok(path) if path.is_dir() => Some(path),
        _ => {
            output::info(&format!("No workspace folder open at {}.", root.display()));
            None
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json_output);
    Ok(())
}

/// Handle the `search` subcommand
#[allow(clippy::too_many_arguments)]
fn handle_search(
    search: &SymbolSearch,
    query: Option<String>,
    kind: KindFilter,
    root: &Path,
    limit: Option<usize>,
    as_json: bool,
    pretty_json: bool,
    plain: bool,
) -> Result<()> {
    let Some(root) = resolve_root(root) else {
        return Ok(());
    };

    let start = Instant::now();
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let items = runtime.block_on(search.refresh(kind, &root))?;

    let mut items = match query.as_deref() {
        Some(q) => search.ranker().filter(&items, q),
        None => items,
    };
    let total = items.len();
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    let timing_str = format_elapsed(start.elapsed());

    if as_json {
        print_json(&items, pretty_json)?;
        eprintln!("Found {} symbols in {}", total, timing_str);
        return Ok(());
    }

    if items.is_empty() {
        println!("No symbols found (searched in {}).", timing_str);
        return Ok(());
    }

    OutputFormatter::new(plain).print_items(&items);
    if total > items.len() {
        println!("\nFound {} symbols ({} shown) in {}", total, items.len(), timing_str);
    } else {
        println!("\nFound {} symbols in {}", total, timing_str);
    }

    Ok(())
}

/// Handle the `interactive` subcommand
fn handle_interactive(
    search: &SymbolSearch,
    kind: KindFilter,
    root: &Path,
    limit: usize,
    plain: bool,
) -> Result<()> {
    let Some(root) = resolve_root(root) else {
        return Ok(());
    };

    let formatter = OutputFormatter::new(plain);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    runtime.block_on(async {
        let mut kind = kind;
        let mut session = search.open(kind, &root)?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        render(&session, &formatter, limit);

        loop {
            prompt(&session)?;

            tokio::select! {
                refreshed = session.wait_refresh(), if session.is_busy() => {
                    if refreshed {
                        println!();
                        render(&session, &formatter, limit);
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read stdin")? else {
                        break;
                    };
                    let line = line.trim();

                    match line.split_once(' ').unwrap_or((line, "")) {
                        (":quit" | ":q", _) => break,
                        (":open", arg) => match arg.trim().parse::<usize>() {
                            Ok(n) if n >= 1 => match session.accept(n - 1) {
                                Ok(target) => println!(
                                    "{}:{}:{}",
                                    target.path.display(),
                                    target.line,
                                    target.start_col + 1
                                ),
                                Err(e) => output::warn(&format!("{:#}", e)),
                            },
                            _ => output::warn("Usage: :open N (1-based result number)"),
                        },
                        (":refresh", _) => {
                            session = reopen(search, session, kind, &root)?;
                            render(&session, &formatter, limit);
                        }
                        (":kind", arg) => match arg.trim().parse::<KindFilter>() {
                            Ok(new_kind) => {
                                kind = new_kind;
                                session = reopen(search, session, kind, &root)?;
                                render(&session, &formatter, limit);
                            }
                            Err(e) => output::warn(&format!("{:#}", e)),
                        },
                        _ => {
                            session.set_query(line);
                            render(&session, &formatter, limit);
                        }
                    }
                }
            }
        }

        session.close();
        Ok::<(), anyhow::Error>(())
    })
}

/// Close `old` and open a new session, carrying the filter over
fn reopen(
    search: &SymbolSearch,
    mut old: SearchSession,
    kind: KindFilter,
    root: &Path,
) -> Result<SearchSession> {
    let query = old.query().to_string();
    old.close();

    let mut session = search.open(kind, root)?;
    if !query.is_empty() {
        session.set_query(&query);
    }
    Ok(session)
}

fn prompt(session: &SearchSession) -> Result<()> {
    print!("{} {}> ", session.filter(), session.query());
    std::io::stdout().flush()?;
    Ok(())
}

fn render(session: &SearchSession, formatter: &OutputFormatter, limit: usize) {
    let items = session.items();

    if items.is_empty() {
        if session.is_busy() {
            println!("Searching...");
        } else {
            println!("No symbols found");
        }
        return;
    }

    formatter.print_items(&items[..items.len().min(limit)]);
    let status = if session.is_busy() { ", refreshing..." } else { "" };
    println!("({} of {} shown{})", items.len().min(limit), items.len(), status);
}

/// Handle the `touch` subcommand
fn handle_touch(search: &SymbolSearch, file: &str, symbol: Option<&str>, root: &Path) -> Result<()> {
    let path = relative_to_root(file, root);
    search.recency().record_access(&path, symbol)?;

    let score = search.recency().get_score(&path, symbol);
    println!(
        "Recorded access to {} (count {}, score {:.1})",
        recency_key(&path, symbol),
        score.access_count,
        score.score
    );
    Ok(())
}

/// Normalize a user-supplied file path to the `/`-separated, root-relative
/// form the extractor produces
fn relative_to_root(file: &str, root: &Path) -> String {
    let file_path = Path::new(file);
    let relative = match (file_path.is_absolute(), root.canonicalize()) {
        (true, Ok(root)) => file_path.strip_prefix(&root).unwrap_or(file_path),
        _ => file_path,
    };

    let text = relative.to_string_lossy().replace('\\', "/");
    text.strip_prefix("./").unwrap_or(&text).to_string()
}

#[derive(Debug, Serialize)]
struct RecentEntry {
    key: String,
    path: String,
    last_accessed: String,
    access_count: u64,
    score: f64,
}

/// Handle the `recent` subcommand
fn handle_recent(search: &SymbolSearch, limit: Option<usize>, as_json: bool, pretty_json: bool) -> Result<()> {
    let recency = search.recency();
    let now = now_ms();

    let mut entries: Vec<RecentEntry> = recency
        .entries()
        .into_iter()
        .map(|(key, entry)| RecentEntry {
            score: compute_score(&entry, now, recency.config()),
            last_accessed: chrono::DateTime::from_timestamp_millis(entry.last_accessed)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            path: entry.path,
            access_count: entry.access_count,
            key,
        })
        .collect();

    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if as_json {
        return print_json(&entries, pretty_json);
    }

    if entries.is_empty() {
        println!("No recorded accesses.");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{:>5.1}  {:>4}x  {}  {}",
            entry.score, entry.access_count, entry.last_accessed, entry.key
        );
    }

    Ok(())
}

/// Handle the `clear-recency` subcommand
fn handle_clear_recency(search: &SymbolSearch, skip_confirm: bool) -> Result<()> {
    let recency = search.recency();

    if recency.is_empty() {
        println!("No recency data to clear.");
        return Ok(());
    }

    if !skip_confirm {
        println!("This will delete {} recorded accesses.", recency.len());
        print!("Are you sure? [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    recency.clear()?;
    println!("Recency data cleared.");

    Ok(())
}

/// Handle the `patterns` subcommand
fn handle_patterns(config: &Config, kind: KindFilter) -> Result<()> {
    let catalog = crate::catalog::Catalog::with_user_rules(&config.patterns);

    let mut shown = 0;
    for rule in catalog.rules_for(kind) {
        println!(
            "[{}] {} (precedence {}) globs: {}",
            rule.kind,
            rule.language,
            rule.precedence(),
            if rule.globs.is_empty() { "*".to_string() } else { rule.globs.join(", ") }
        );
        for pattern in rule.patterns() {
            println!("    {}", pattern.source());
        }
        shown += 1;
    }

    if shown == 0 {
        println!("No pattern rules for {}.", kind);
    }

    Ok(())
}
