//! Line-oriented text search backends
//!
//! The extractor talks to a [`TextSearch`] and only ever sees lines of the
//! form `relativePath:line:column:matchedText` (1-based line and column).
//!
//! - [`Ripgrep`] runs `rg` as a subprocess, one invocation per call
//! - [`BuiltinSearch`] walks the tree in-process with `ignore` + `globset`
//!   and produces the same line format; it is the fallback when `rg` is not
//!   installed
//!
//! Both backends enforce a timeout, an output ceiling and a per-file size
//! ceiling so a generated or minified file cannot stall a scan.

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::catalog::has_uppercase_literal;
use crate::config::{SearchBackend, SearchConfig};

/// Resource ceilings applied to every invocation
#[derive(Debug, Clone)]
pub struct SearchLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub max_filesize_bytes: u64,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchLimits {
    fn from(config: &SearchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
            max_filesize_bytes: config.max_filesize_bytes,
        }
    }
}

/// A line-oriented text search over a directory tree
#[async_trait]
pub trait TextSearch: Send + Sync {
    /// Search `cwd` for any of `patterns` in files matching `globs`
    ///
    /// "No matches" is `Ok(vec![])`. Any other failure is an `Err`; callers
    /// decide how to degrade.
    async fn search(&self, patterns: &[String], globs: &[String], cwd: &Path) -> Result<Vec<String>>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Build the backend selected by config
pub fn select_backend(config: &SearchConfig) -> Arc<dyn TextSearch> {
    let limits = SearchLimits::from(config);
    match config.backend {
        SearchBackend::Ripgrep => Arc::new(Ripgrep::new(&config.rg_path, limits)),
        SearchBackend::Builtin => Arc::new(BuiltinSearch::new(limits)),
        SearchBackend::Auto => {
            if Ripgrep::is_available(&config.rg_path) {
                Arc::new(Ripgrep::new(&config.rg_path, limits))
            } else {
                log::info!("'{}' not found, falling back to builtin search", config.rg_path);
                Arc::new(BuiltinSearch::new(limits))
            }
        }
    }
}

/// ripgrep subprocess backend
#[derive(Debug, Clone)]
pub struct Ripgrep {
    program: PathBuf,
    limits: SearchLimits,
}

impl Ripgrep {
    pub fn new(program: impl Into<PathBuf>, limits: SearchLimits) -> Self {
        Self {
            program: program.into(),
            limits,
        }
    }

    /// Check whether the executable runs at all
    pub fn is_available(program: &str) -> bool {
        std::process::Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self, patterns: &[String], globs: &[String], cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--no-heading",
            "--with-filename",
            "--line-number",
            "--column",
            "--only-matching",
            "--no-messages",
            "--smart-case",
            "--color",
            "never",
        ]);
        cmd.arg("--max-filesize").arg(self.limits.max_filesize_bytes.to_string());

        for glob in globs {
            cmd.arg("--glob").arg(glob);
        }
        for pattern in patterns {
            cmd.arg("--regexp").arg(pattern);
        }

        cmd.arg("--").arg(".");
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TextSearch for Ripgrep {
    async fn search(&self, patterns: &[String], globs: &[String], cwd: &Path) -> Result<Vec<String>> {
        let mut child = self
            .command(patterns, globs, cwd)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to capture ripgrep stdout")?;

        let limit = self.limits.max_output_bytes;
        let run = async {
            let mut buf = Vec::new();
            stdout.take(limit as u64).read_to_end(&mut buf).await?;
            let truncated = buf.len() >= limit;
            if truncated {
                // Stop reading; the process may still be blocked on a full pipe
                let _ = child.start_kill();
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((buf, status, truncated))
        };

        let (buf, status, truncated) = tokio::time::timeout(self.limits.timeout, run)
            .await
            .map_err(|_| anyhow::anyhow!("ripgrep timed out after {:?}", self.limits.timeout))?
            .context("Failed to read ripgrep output")?;

        if truncated {
            log::warn!(
                "ripgrep output exceeded {} bytes, keeping the first complete lines",
                limit
            );
            return Ok(split_lines(&buf, true));
        }

        match status.code() {
            Some(0) => Ok(split_lines(&buf, false)),
            Some(1) => Ok(Vec::new()),
            // rg reports a partial failure (e.g. one unreadable file) with 2
            Some(2) if !buf.is_empty() => {
                let lines = split_lines(&buf, false);
                log::warn!("ripgrep exited with {}, keeping {} matched lines", status, lines.len());
                Ok(lines)
            }
            _ => anyhow::bail!("ripgrep exited with {}", status),
        }
    }

    fn name(&self) -> &str {
        "ripgrep"
    }
}

/// Split raw output into lines; a truncated buffer loses its partial last line
fn split_lines(buf: &[u8], truncated: bool) -> Vec<String> {
    let text = String::from_utf8_lossy(buf);
    let mut lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
    if truncated && !text.ends_with('\n') {
        lines.pop();
    }
    lines
}

/// In-process search backend (no external binary required)
#[derive(Debug, Clone, Default)]
pub struct BuiltinSearch {
    limits: SearchLimits,
}

impl BuiltinSearch {
    pub fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl TextSearch for BuiltinSearch {
    async fn search(&self, patterns: &[String], globs: &[String], cwd: &Path) -> Result<Vec<String>> {
        let patterns = patterns.to_vec();
        let globs = globs.to_vec();
        let cwd = cwd.to_path_buf();
        let limits = self.limits.clone();

        let task = tokio::task::spawn_blocking(move || scan_tree(&patterns, &globs, &cwd, &limits));

        match tokio::time::timeout(self.limits.timeout, task).await {
            Ok(joined) => joined.context("Builtin search task failed")?,
            Err(_) => anyhow::bail!("Builtin search timed out after {:?}", self.limits.timeout),
        }
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

fn build_globset(globs: &[String]) -> Result<Option<GlobSet>> {
    if globs.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(Glob::new(glob).with_context(|| format!("Invalid glob: {}", glob))?);
    }
    Ok(Some(builder.build()?))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(!has_uppercase_literal(p))
                .build()
                .with_context(|| format!("Invalid pattern: {}", p))
        })
        .collect()
}

/// Walk `root` (respecting ignore files) and emit one record per match
fn scan_tree(patterns: &[String], globs: &[String], root: &Path, limits: &SearchLimits) -> Result<Vec<String>> {
    let regexes = compile_patterns(patterns)?;
    let globset = build_globset(globs)?;

    let mut records = Vec::new();
    let mut total_bytes = 0usize;

    for entry in WalkBuilder::new(root).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if let Some(set) = &globset {
            if !set.is_match(rel) {
                continue;
            }
        }

        if let Ok(meta) = entry.metadata() {
            if meta.len() > limits.max_filesize_bytes {
                log::debug!("Skipping {} ({} bytes over size ceiling)", rel.display(), meta.len());
                continue;
            }
        }

        // Non-UTF-8 files are treated as binary and skipped
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };

        let rel_str = rel.to_string_lossy().replace('\\', "/");
        for (idx, line) in content.lines().enumerate() {
            for regex in &regexes {
                for m in regex.find_iter(line) {
                    if m.as_str().is_empty() {
                        continue;
                    }
                    let record = format!("{}:{}:{}:{}", rel_str, idx + 1, m.start() + 1, m.as_str());
                    total_bytes += record.len() + 1;
                    if total_bytes > limits.max_output_bytes {
                        log::warn!(
                            "Builtin search output exceeded {} bytes, keeping {} records",
                            limits.max_output_bytes,
                            records.len()
                        );
                        return Ok(records);
                    }
                    records.push(record);
                }
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("src/shapes.ts"),
            "export class Circle {}\n\nclass Square {}\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.md"), "class NotCode\n").unwrap();
        temp
    }

    #[tokio::test]
    async fn test_builtin_emits_path_line_col_text() {
        let temp = fixture();
        let search = BuiltinSearch::default();
        let mut lines = search
            .search(
                &[r"class\s+([A-Za-z_]\w*)".to_string()],
                &["*.ts".to_string()],
                temp.path(),
            )
            .await
            .unwrap();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "src/shapes.ts:1:8:class Circle".to_string(),
                "src/shapes.ts:3:1:class Square".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_builtin_no_matches_is_empty() {
        let temp = fixture();
        let lines = BuiltinSearch::default()
            .search(&["interface".to_string()], &["*.ts".to_string()], temp.path())
            .await
            .unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_builtin_respects_size_ceiling() {
        let temp = fixture();
        let limits = SearchLimits {
            max_filesize_bytes: 4,
            ..SearchLimits::default()
        };
        let lines = BuiltinSearch::new(limits)
            .search(&["class".to_string()], &[], temp.path())
            .await
            .unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_builtin_output_ceiling_truncates() {
        let temp = fixture();
        let limits = SearchLimits {
            max_output_bytes: 40,
            ..SearchLimits::default()
        };
        let lines = BuiltinSearch::new(limits)
            .search(&["class".to_string()], &["*.ts".to_string()], temp.path())
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn test_builtin_invalid_pattern_is_error() {
        let temp = fixture();
        let result = BuiltinSearch::default()
            .search(&["(unclosed".to_string()], &[], temp.path())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_ripgrep_binary_is_error() {
        let temp = fixture();
        let rg = Ripgrep::new("definitely-not-a-real-rg-binary", SearchLimits::default());
        let result = rg.search(&["class".to_string()], &[], temp.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ripgrep_matches_builtin_format() {
        if !Ripgrep::is_available("rg") {
            eprintln!("rg not on PATH, skipping");
            return;
        }
        let temp = fixture();
        let rg = Ripgrep::new("rg", SearchLimits::default());
        let mut lines = rg
            .search(&[r"class\s+\w+".to_string()], &["*.ts".to_string()], temp.path())
            .await
            .unwrap();
        lines.sort();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("src/shapes.ts:1:8:class Circle"));

        let none = rg
            .search(&["zzz_no_such_text".to_string()], &[], temp.path())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    /// Write an executable shell script standing in for `rg`
    #[cfg(unix)]
    fn fake_rg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-rg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ripgrep_output_ceiling_keeps_complete_lines() {
        let temp = TempDir::new().unwrap();
        let program = fake_rg(temp.path(), "while true; do echo 'src/a.ts:1:1:class Foo'; done");
        let limits = SearchLimits {
            max_output_bytes: 4096,
            ..SearchLimits::default()
        };

        let start = std::time::Instant::now();
        let lines = Ripgrep::new(program, limits)
            .search(&["class".to_string()], &[], temp.path())
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| l == "src/a.ts:1:1:class Foo"));
        assert!(lines.len() * "src/a.ts:1:1:class Foo\n".len() <= 4096);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ripgrep_timeout_is_error() {
        let temp = TempDir::new().unwrap();
        let program = fake_rg(temp.path(), "exec sleep 30");
        let limits = SearchLimits {
            timeout: Duration::from_secs(1),
            ..SearchLimits::default()
        };

        let start = std::time::Instant::now();
        let err = Ripgrep::new(program, limits)
            .search(&["class".to_string()], &[], temp.path())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ripgrep_partial_failure_keeps_matches() {
        let temp = TempDir::new().unwrap();
        let partial = fake_rg(temp.path(), "echo 'src/a.ts:1:1:class Foo'\nexit 2");
        let lines = Ripgrep::new(partial, SearchLimits::default())
            .search(&["class".to_string()], &[], temp.path())
            .await
            .unwrap();
        assert_eq!(lines, vec!["src/a.ts:1:1:class Foo".to_string()]);

        let failed_dir = TempDir::new().unwrap();
        let failed = fake_rg(failed_dir.path(), "exit 2");
        let result = Ripgrep::new(failed, SearchLimits::default())
            .search(&["class".to_string()], &[], temp.path())
            .await;
        assert!(result.is_err());

        let no_match_dir = TempDir::new().unwrap();
        let no_match = fake_rg(no_match_dir.path(), "exit 1");
        let none = Ripgrep::new(no_match, SearchLimits::default())
            .search(&["class".to_string()], &[], temp.path())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_split_lines_drops_partial_tail() {
        assert_eq!(split_lines(b"a:1:1:x\nb:2:", true), vec!["a:1:1:x".to_string()]);
        assert_eq!(split_lines(b"a:1:1:x\n", true), vec!["a:1:1:x".to_string()]);
        assert_eq!(split_lines(b"a:1:1:x", false), vec!["a:1:1:x".to_string()]);
    }
}
