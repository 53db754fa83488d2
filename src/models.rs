//! Core data models for symjump
//!
//! These structures are shared by the extractor, the recency engine and the
//! search session. Everything here is a plain value type.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Type of symbol a pattern rule detects
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Variable,
    Type,
    Interface,
    SchemaDeclaration,
    Component,
    Unknown,
}

impl SymbolKind {
    /// Fixed precedence used to break ties when several patterns match the
    /// same (file, line, name). Higher wins.
    pub fn precedence(self) -> i32 {
        match self {
            SymbolKind::SchemaDeclaration => 100,
            SymbolKind::Class => 90,
            SymbolKind::Interface => 80,
            SymbolKind::Type => 70,
            SymbolKind::Component => 60,
            SymbolKind::Function => 50,
            SymbolKind::Method => 40,
            SymbolKind::Variable => 10,
            SymbolKind::Unknown => 0,
        }
    }

    /// All kinds, in declaration order
    pub fn all() -> impl Iterator<Item = SymbolKind> {
        SymbolKind::iter()
    }
}

/// Which kinds a search covers: one kind, or every kind in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindFilter {
    All,
    Only(SymbolKind),
}

impl KindFilter {
    pub fn matches(&self, kind: SymbolKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(k) => *k == kind,
        }
    }
}

impl std::fmt::Display for KindFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KindFilter::All => write!(f, "all"),
            KindFilter::Only(kind) => write!(f, "{}", kind),
        }
    }
}

impl std::str::FromStr for KindFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(KindFilter::All);
        }
        let kind = s.parse::<SymbolKind>().map_err(|_| {
            anyhow::anyhow!(
                "Unknown symbol kind: {}. Supported: all, {}",
                s,
                SymbolKind::all()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
        Ok(KindFilter::Only(kind))
    }
}

/// Source language a pattern rule targets
///
/// The language decides which reserved keywords are rejected as symbol
/// names during extraction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    Ruby,
    Php,
    CSharp,
    Prisma,
    GraphQl,
    Sql,
    Custom,
}

impl Language {
    /// Words that are structurally valid identifiers but never a symbol name
    pub fn reserved_keywords(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript | Language::JavaScript => &[
                "abstract", "as", "async", "await", "break", "case", "catch", "class", "const",
                "constructor", "continue", "declare", "default", "delete", "do", "else", "enum",
                "export", "extends", "false", "finally", "for", "function", "get", "if",
                "implements", "import", "in", "instanceof", "interface", "let", "module",
                "namespace", "new", "null", "override", "private", "protected", "public",
                "readonly", "return", "set", "static", "super", "switch", "this", "throw", "true",
                "try", "type", "typeof", "var", "void", "while", "yield",
            ],
            Language::Python => &[
                "and", "as", "async", "await", "class", "def", "del", "elif", "else", "except",
                "False", "for", "from", "global", "if", "import", "in", "is", "lambda", "None",
                "nonlocal", "not", "or", "pass", "raise", "return", "True", "try", "while",
                "with", "yield",
            ],
            Language::Rust => &[
                "as", "async", "const", "crate", "dyn", "enum", "extern", "fn", "impl", "let",
                "mod", "mut", "pub", "self", "Self", "static", "struct", "super", "trait",
                "type", "union", "unsafe", "use", "where",
            ],
            Language::Go => &[
                "chan", "const", "func", "go", "interface", "map", "package", "range", "return",
                "struct", "type", "var",
            ],
            Language::Java | Language::CSharp => &[
                "abstract", "async", "class", "const", "enum", "extends", "final", "implements",
                "interface", "internal", "new", "override", "partial", "private", "protected",
                "public", "readonly", "record", "return", "sealed", "static", "struct",
                "synchronized", "virtual", "void",
            ],
            Language::Ruby => &["class", "def", "end", "module", "self"],
            Language::Php => &[
                "abstract", "class", "const", "final", "function", "interface", "private",
                "protected", "public", "static", "trait",
            ],
            Language::Prisma => &["enum", "model", "type", "view"],
            Language::GraphQl => &["enum", "input", "interface", "scalar", "type", "union"],
            Language::Sql => &["create", "exists", "if", "not", "or", "replace", "table", "view"],
            Language::Custom => &[
                "class", "const", "export", "function", "interface", "let", "type", "var",
            ],
        }
    }

    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_keywords().contains(&word)
    }
}

/// One raw detection of a symbol at a specific line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymbolOccurrence {
    /// Symbol name (e.g., class or function identifier)
    pub name: String,
    /// Path relative to the search root, `/`-separated
    pub path: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Byte column where the identifier starts (0-indexed)
    pub start_col: usize,
    /// Byte column just past the identifier (0-indexed)
    pub end_col: usize,
    /// Kind of the rule that produced this occurrence
    pub kind: SymbolKind,
}

impl SymbolOccurrence {
    /// Key used by the recency engine: `<path>#<name>`
    pub fn recency_key(&self) -> String {
        crate::recency::recency_key(&self.path, Some(&self.name))
    }
}

/// An occurrence annotated with its current ranking score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedItem {
    #[serde(flatten)]
    pub occurrence: SymbolOccurrence,
    /// Recency score when unfiltered, combined fuzzy+recency score when filtered
    pub score: f64,
}

impl RankedItem {
    pub fn new(occurrence: SymbolOccurrence, score: f64) -> Self {
        Self { occurrence, score }
    }
}

/// Where the consumer should navigate after a result is accepted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationTarget {
    /// Absolute path of the file to open
    pub path: PathBuf,
    /// Line number (1-indexed)
    pub line: usize,
    /// Selection start column (0-indexed)
    pub start_col: usize,
    /// Selection end column (0-indexed)
    pub end_col: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_strings() {
        assert_eq!(SymbolKind::SchemaDeclaration.to_string(), "schema-declaration");
        assert_eq!(
            "schema-declaration".parse::<SymbolKind>().unwrap(),
            SymbolKind::SchemaDeclaration
        );
        assert_eq!("Class".parse::<SymbolKind>().unwrap(), SymbolKind::Class);
    }

    #[test]
    fn test_precedence_is_a_total_order() {
        let mut values: Vec<i32> = SymbolKind::all().map(|k| k.precedence()).collect();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), SymbolKind::all().count());
        assert!(SymbolKind::Component.precedence() > SymbolKind::Function.precedence());
    }

    #[test]
    fn test_kind_filter_parse() {
        assert_eq!("all".parse::<KindFilter>().unwrap(), KindFilter::All);
        assert_eq!(
            "method".parse::<KindFilter>().unwrap(),
            KindFilter::Only(SymbolKind::Method)
        );
        let err = "struct".parse::<KindFilter>().unwrap_err();
        assert!(err.to_string().contains("Unknown symbol kind"));
    }

    #[test]
    fn test_reserved_keywords() {
        assert!(Language::TypeScript.is_reserved("export"));
        assert!(Language::Rust.is_reserved("fn"));
        assert!(!Language::TypeScript.is_reserved("UserService"));
    }

    #[test]
    fn test_ranked_item_serializes_flat() {
        let item = RankedItem::new(
            SymbolOccurrence {
                name: "Foo".to_string(),
                path: "src/foo.ts".to_string(),
                line: 3,
                start_col: 6,
                end_col: 9,
                kind: SymbolKind::Class,
            },
            12.5,
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "Foo");
        assert_eq!(json["kind"], "class");
        assert_eq!(json["score"], 12.5);
    }
}
