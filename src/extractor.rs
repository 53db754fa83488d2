//! Symbol extraction: run every applicable pattern through the text search
//! backend and turn matched lines into [`SymbolOccurrence`]s
//!
//! Each pattern invocation is independent. A failing invocation is logged and
//! contributes nothing; it never aborts the rest of the scan. Malformed
//! output lines are skipped one at a time.

use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;

use crate::catalog::{Catalog, PatternRule};
use crate::models::{KindFilter, SymbolOccurrence};
use crate::search_tool::TextSearch;

/// One parsed `path:line:column:text` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLine<'a> {
    pub path: &'a str,
    /// 1-based line number
    pub line: usize,
    /// 1-based byte column of the match start
    pub column: usize,
    /// Matched text; may itself contain colons
    pub text: &'a str,
}

/// Split a search record into its four fields
///
/// Only the first three colons are separators. Returns `None` for anything
/// that does not have a path and two positive integers up front.
pub fn parse_line(line: &str) -> Option<SearchLine<'_>> {
    let mut parts = line.splitn(4, ':');
    let path = parts.next()?;
    let line_no: usize = parts.next()?.parse().ok()?;
    let column: usize = parts.next()?.parse().ok()?;
    let text = parts.next()?;

    if path.is_empty() || line_no == 0 || column == 0 {
        return None;
    }

    Some(SearchLine {
        path: path.strip_prefix("./").unwrap_or(path),
        line: line_no,
        column,
        text,
    })
}

/// Runs the pattern catalog against a search root
pub struct SymbolExtractor {
    catalog: Arc<Catalog>,
    search: Arc<dyn TextSearch>,
    max_concurrency: usize,
}

impl SymbolExtractor {
    pub fn new(catalog: Arc<Catalog>, search: Arc<dyn TextSearch>) -> Self {
        Self {
            catalog,
            search,
            max_concurrency: 8,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Extract raw (not yet deduplicated) occurrences under `root`
    ///
    /// Output order follows catalog order, then backend output order.
    pub async fn extract(&self, filter: KindFilter, root: &Path) -> Vec<SymbolOccurrence> {
        let jobs: Vec<(&PatternRule, usize)> = self
            .catalog
            .rules_for(filter)
            .flat_map(|rule| (0..rule.patterns().len()).map(move |idx| (rule, idx)))
            .collect();

        log::debug!(
            "Extracting {} symbols under {} ({} pattern invocations via {})",
            filter,
            root.display(),
            jobs.len(),
            self.search.name()
        );

        // Collected first: a lazy `map` over borrowed jobs does not satisfy
        // the higher-ranked bounds `tokio::spawn` puts on the scan future
        let pending: Vec<_> = jobs
            .into_iter()
            .map(|(rule, idx)| self.run_pattern(rule, idx, root))
            .collect();
        let batches: Vec<Vec<SymbolOccurrence>> = futures::stream::iter(pending)
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let occurrences: Vec<SymbolOccurrence> = batches.into_iter().flatten().collect();
        log::info!("Extracted {} raw {} occurrences", occurrences.len(), filter);
        occurrences
    }

    async fn run_pattern(&self, rule: &PatternRule, idx: usize, root: &Path) -> Vec<SymbolOccurrence> {
        let pattern = rule.patterns()[idx].source().to_string();

        let lines = match self.search.search(std::slice::from_ref(&pattern), &rule.globs, root).await {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!(
                    "{} search failed for {} pattern '{}': {:#}",
                    self.search.name(),
                    rule.kind,
                    pattern,
                    e
                );
                return Vec::new();
            }
        };

        let mut occurrences = Vec::new();
        for raw in &lines {
            let Some(record) = parse_line(raw) else {
                log::debug!("Skipping malformed search line: {}", raw);
                continue;
            };

            let Some((name, offset)) = rule.extract_name(idx, record.text) else {
                continue;
            };

            if rule.is_ignored(&name) {
                continue;
            }

            let start_col = record.column - 1 + offset;
            let end_col = start_col + name.len();
            occurrences.push(SymbolOccurrence {
                name,
                path: record.path.to_string(),
                line: record.line,
                start_col,
                end_col,
                kind: rule.kind,
            });
        }

        occurrences
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, SymbolKind};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Returns canned lines per pattern; patterns mapped to `None` fail
    struct StubSearch {
        responses: HashMap<String, Option<Vec<String>>>,
    }

    #[async_trait]
    impl TextSearch for StubSearch {
        async fn search(&self, patterns: &[String], _globs: &[String], _cwd: &Path) -> Result<Vec<String>> {
            match self.responses.get(&patterns[0]) {
                Some(Some(lines)) => Ok(lines.clone()),
                Some(None) => anyhow::bail!("simulated crash"),
                None => Ok(Vec::new()),
            }
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn test_parse_line_keeps_colons_in_text() {
        let record = parse_line("src/a.ts:3:5:const x: Foo = {a: 1}").unwrap();
        assert_eq!(record.path, "src/a.ts");
        assert_eq!(record.line, 3);
        assert_eq!(record.column, 5);
        assert_eq!(record.text, "const x: Foo = {a: 1}");
    }

    #[test]
    fn test_parse_line_strips_dot_slash() {
        assert_eq!(parse_line("./lib/x.rs:1:1:fn x").unwrap().path, "lib/x.rs");
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        assert!(parse_line("no colons here").is_none());
        assert!(parse_line("a.ts:x:1:text").is_none());
        assert!(parse_line("a.ts:1:text").is_none());
        assert!(parse_line("a.ts:0:1:text").is_none());
        assert!(parse_line(":1:1:text").is_none());
    }

    #[tokio::test]
    async fn test_failing_pattern_does_not_abort_scan() {
        let mut catalog = Catalog::empty();
        catalog.register(
            PatternRule::new(SymbolKind::Class, Language::TypeScript, &["*.ts"], &[r"class\s+(\w+)"]).unwrap(),
        );
        catalog.register(
            PatternRule::new(SymbolKind::Type, Language::TypeScript, &["*.ts"], &[r"type\s+(\w+)"]).unwrap(),
        );

        let mut responses = HashMap::new();
        responses.insert(r"class\s+(\w+)".to_string(), None);
        responses.insert(
            r"type\s+(\w+)".to_string(),
            Some(vec![
                "src/t.ts:2:8:type Id".to_string(),
                "garbage".to_string(),
                "src/t.ts:4:1:type Name".to_string(),
            ]),
        );

        let extractor = SymbolExtractor::new(Arc::new(catalog), Arc::new(StubSearch { responses }));
        let found = extractor.extract(KindFilter::All, Path::new(".")).await;

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Id");
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].start_col, 12);
        assert_eq!(found[0].end_col, 14);
        assert_eq!(found[1].name, "Name");
        assert!(found.iter().all(|o| o.kind == SymbolKind::Type));
    }

    #[tokio::test]
    async fn test_ignore_list_and_kind_filter() {
        let mut catalog = Catalog::empty();
        catalog.register(
            PatternRule::new(SymbolKind::Method, Language::TypeScript, &["*.ts"], &[r"^\s*(\w+)\s*\("])
                .unwrap()
                .with_ignore(&["beforeEach"]),
        );
        catalog.register(
            PatternRule::new(SymbolKind::Class, Language::TypeScript, &["*.ts"], &[r"class\s+(\w+)"]).unwrap(),
        );

        let mut responses = HashMap::new();
        responses.insert(
            r"^\s*(\w+)\s*\(".to_string(),
            Some(vec![
                "a.ts:2:1:  beforeEach(".to_string(),
                "a.ts:3:1:  render(".to_string(),
            ]),
        );
        responses.insert(r"class\s+(\w+)".to_string(), Some(vec!["a.ts:1:1:class A".to_string()]));

        let extractor = SymbolExtractor::new(Arc::new(catalog), Arc::new(StubSearch { responses }));
        let methods = extractor
            .extract(KindFilter::Only(SymbolKind::Method), Path::new("."))
            .await;

        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "render");
        assert_eq!(methods[0].start_col, 2);
    }
}
