//! symjump: relevance-ranked "jump to symbol" search
//!
//! Symbol definitions are found by running a catalog of regex patterns
//! through a line-oriented text search (ripgrep, or a builtin walker), then
//! ranked by fuzzy match quality blended with how recently and how often
//! each symbol was opened.
//!
//! # Architecture
//!
//! - **Catalog**: per-kind, per-language regex rules with precedence
//! - **Extractor**: runs the rules and parses `path:line:col:text` records
//! - **Dedup**: one occurrence per (file, line, name), highest precedence wins
//! - **Recency**: decayed access scores persisted in a key/value store
//! - **Session**: stale-while-revalidate result lists with fuzzy filtering
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use symjump::{Config, KindFilter, MemoryStore, SymbolSearch};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let search = SymbolSearch::from_config(&Config::default(), Arc::new(MemoryStore::new()));
//! let mut session = search.open(KindFilter::All, std::path::Path::new("."))?;
//! session.wait_refresh().await;
//! session.set_query("usrsvc");
//!
//! if !session.items().is_empty() {
//!     let target = session.accept(0)?;
//!     println!("{}:{}", target.path.display(), target.line);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod extractor;
pub mod formatter;
pub mod models;
pub mod output;
pub mod ranker;
pub mod recency;
pub mod result_cache;
pub mod search_tool;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use catalog::{Catalog, PatternRule};
pub use config::Config;
pub use extractor::SymbolExtractor;
pub use models::{KindFilter, Language, NavigationTarget, RankedItem, SymbolKind, SymbolOccurrence};
pub use ranker::{FuzzyMatcher, NucleoMatcher, Ranker};
pub use recency::RecencyEngine;
pub use result_cache::{MemoryResultCache, ResultCache};
pub use search_tool::{BuiltinSearch, Ripgrep, TextSearch};
pub use session::{SearchSession, SessionState, SymbolSearch};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
