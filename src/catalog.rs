//! Pattern catalog: the per-language regex rules that detect symbols
//!
//! Each [`PatternRule`] owns its compiled regexes together with the logic
//! that pulls an identifier out of a matched line. The catalog itself is
//! just an ordered list of rules, so adding a language or a kind means
//! registering another rule; nothing downstream (dedup, ranking, caching)
//! needs to know.
//!
//! # Name extraction heuristic
//!
//! Patterns are written so that the identifier is the rightmost meaningful
//! capture group, with modifier groups (`export`, `async`, visibility) to its
//! left. Extraction re-applies the regex to the matched text and scans the
//! capture groups from last to first, returning the first group that is a
//! valid identifier and not a reserved keyword of the rule's language.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

use crate::config::PatternConfig;
use crate::models::{KindFilter, Language, SymbolKind};

const TS_GLOBS: &[&str] = &["*.ts", "*.tsx", "*.mts", "*.cts"];
const JS_GLOBS: &[&str] = &["*.js", "*.jsx", "*.mjs", "*.cjs"];
const JSX_GLOBS: &[&str] = &["*.tsx", "*.jsx"];

/// Method names that match method patterns but are almost never what a
/// user wants to jump to
const METHOD_IGNORE: &[&str] = &[
    "constructor", "if", "for", "while", "switch", "catch", "function", "return", "super",
    "describe", "it", "test", "expect", "beforeEach", "afterEach", "beforeAll", "afterAll",
    "setUp", "tearDown", "__init__", "__construct", "new",
];

const TS_CLASS: &[&str] = &[
    r"^\s*(export\s+)?(default\s+)?(declare\s+)?(abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
];
const TS_FUNCTION: &[&str] = &[
    r"^\s*(export\s+)?(default\s+)?(async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
    r"^\s*(export\s+)?(const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
];
const TS_METHOD: &[&str] = &[
    r"^\s*((?:public|private|protected|static|readonly|abstract|override|async|get|set)\s+)*\*?([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\([^)]*\)\s*(?::\s*[^{;]+)?\{",
];
const TS_VARIABLE: &[&str] = &[r"^\s*(export\s+)?(const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?="];
const TS_TYPE: &[&str] = &[r"^\s*(export\s+)?(declare\s+)?type\s+([A-Za-z_$][\w$]*)\s*(?:<[^=]*>)?\s*="];
const TS_INTERFACE: &[&str] = &[r"^\s*(export\s+)?(declare\s+)?interface\s+([A-Za-z_$][\w$]*)"];
const TS_COMPONENT: &[&str] = &[
    r"^\s*(export\s+)?(default\s+)?function\s+([A-Z][\w$]*)\s*\(",
    r"^\s*(export\s+)?(const|let)\s+([A-Z][\w$]*)\s*(?::[^=]+)?=\s*(?:React\.)?(?:memo|forwardRef)?\(?\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
];
const TS_SCHEMA: &[&str] = &[
    r"^\s*(export\s+)?(const|let)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:z|yup|Joi|t)\.object\(",
];

/// Static description of a builtin rule
struct RuleSpec {
    kind: SymbolKind,
    language: Language,
    globs: &'static [&'static str],
    patterns: &'static [&'static str],
    ignore: &'static [&'static str],
}

const fn rule(
    kind: SymbolKind,
    language: Language,
    globs: &'static [&'static str],
    patterns: &'static [&'static str],
) -> RuleSpec {
    RuleSpec { kind, language, globs, patterns, ignore: &[] }
}

const fn rule_ignoring(
    kind: SymbolKind,
    language: Language,
    globs: &'static [&'static str],
    patterns: &'static [&'static str],
    ignore: &'static [&'static str],
) -> RuleSpec {
    RuleSpec { kind, language, globs, patterns, ignore }
}

const BUILTIN_RULES: &[RuleSpec] = &[
    // TypeScript / JavaScript
    rule(SymbolKind::Class, Language::TypeScript, TS_GLOBS, TS_CLASS),
    rule(SymbolKind::Class, Language::JavaScript, JS_GLOBS, TS_CLASS),
    rule(SymbolKind::Function, Language::TypeScript, TS_GLOBS, TS_FUNCTION),
    rule(SymbolKind::Function, Language::JavaScript, JS_GLOBS, TS_FUNCTION),
    rule_ignoring(SymbolKind::Method, Language::TypeScript, TS_GLOBS, TS_METHOD, METHOD_IGNORE),
    rule_ignoring(SymbolKind::Method, Language::JavaScript, JS_GLOBS, TS_METHOD, METHOD_IGNORE),
    rule(SymbolKind::Variable, Language::TypeScript, TS_GLOBS, TS_VARIABLE),
    rule(SymbolKind::Variable, Language::JavaScript, JS_GLOBS, TS_VARIABLE),
    rule(SymbolKind::Type, Language::TypeScript, TS_GLOBS, TS_TYPE),
    rule(SymbolKind::Interface, Language::TypeScript, TS_GLOBS, TS_INTERFACE),
    rule(SymbolKind::Component, Language::TypeScript, JSX_GLOBS, TS_COMPONENT),
    rule(SymbolKind::SchemaDeclaration, Language::TypeScript, TS_GLOBS, TS_SCHEMA),
    rule(SymbolKind::SchemaDeclaration, Language::JavaScript, JS_GLOBS, TS_SCHEMA),
    // Python
    rule(SymbolKind::Class, Language::Python, &["*.py", "*.pyi"], &[r"^\s*class\s+([A-Za-z_]\w*)"]),
    rule(SymbolKind::Function, Language::Python, &["*.py", "*.pyi"], &[r"^(async\s+)?def\s+([A-Za-z_]\w*)"]),
    rule_ignoring(
        SymbolKind::Method,
        Language::Python,
        &["*.py", "*.pyi"],
        &[r"^\s+(async\s+)?def\s+([A-Za-z_]\w*)"],
        METHOD_IGNORE,
    ),
    rule(SymbolKind::Variable, Language::Python, &["*.py", "*.pyi"], &[r"^([A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]"]),
    rule(
        SymbolKind::Type,
        Language::Python,
        &["*.py", "*.pyi"],
        &[r"^type\s+([A-Za-z_]\w*)", r"^([A-Za-z_]\w*)\s*:\s*TypeAlias\b"],
    ),
    rule(
        SymbolKind::SchemaDeclaration,
        Language::Python,
        &["*.py"],
        &[r"^\s*class\s+([A-Za-z_]\w*)\s*\([^)]*\b(?:BaseModel|Schema)\b"],
    ),
    // Rust
    rule(
        SymbolKind::Class,
        Language::Rust,
        &["*.rs"],
        &[r"^\s*(pub(?:\([^)]*\))?\s+)?(struct|enum|union)\s+([A-Za-z_]\w*)"],
    ),
    rule(
        SymbolKind::Interface,
        Language::Rust,
        &["*.rs"],
        &[r"^\s*(pub(?:\([^)]*\))?\s+)?(unsafe\s+)?trait\s+([A-Za-z_]\w*)"],
    ),
    rule(SymbolKind::Type, Language::Rust, &["*.rs"], &[r"^\s*(pub(?:\([^)]*\))?\s+)?type\s+([A-Za-z_]\w*)"]),
    rule(
        SymbolKind::Function,
        Language::Rust,
        &["*.rs"],
        &[r#"^(pub(?:\([^)]*\))?\s+)?(const\s+)?(async\s+)?(unsafe\s+)?(extern\s+"[^"]*"\s+)?fn\s+([A-Za-z_]\w*)"#],
    ),
    rule(
        SymbolKind::Method,
        Language::Rust,
        &["*.rs"],
        &[r"^\s+(pub(?:\([^)]*\))?\s+)?(const\s+)?(async\s+)?(unsafe\s+)?fn\s+([A-Za-z_]\w*)"],
    ),
    rule(
        SymbolKind::Variable,
        Language::Rust,
        &["*.rs"],
        &[r"^\s*(pub(?:\([^)]*\))?\s+)?(const|static)\s+(mut\s+)?([A-Za-z_]\w*)\s*:"],
    ),
    // Go
    rule(SymbolKind::Class, Language::Go, &["*.go"], &[r"^type\s+([A-Za-z_]\w*)\s+struct\b"]),
    rule(SymbolKind::Interface, Language::Go, &["*.go"], &[r"^type\s+([A-Za-z_]\w*)\s+interface\b"]),
    rule(SymbolKind::Type, Language::Go, &["*.go"], &[r"^type\s+([A-Za-z_]\w*)\s+(?:=\s*)?[A-Za-z_\[\*]"]),
    rule(SymbolKind::Function, Language::Go, &["*.go"], &[r"^func\s+([A-Za-z_]\w*)\s*[\(\[]"]),
    rule(SymbolKind::Method, Language::Go, &["*.go"], &[r"^func\s+\([^)]*\)\s*([A-Za-z_]\w*)\s*\("]),
    rule(SymbolKind::Variable, Language::Go, &["*.go"], &[r"^(?:var|const)\s+([A-Za-z_]\w*)"]),
    // Java / C#
    rule(
        SymbolKind::Class,
        Language::Java,
        &["*.java", "*.cs"],
        &[r"^\s*((?:public|private|protected|internal|static|abstract|final|sealed|partial)\s+)*(class|record|enum|struct)\s+([A-Za-z_]\w*)"],
    ),
    rule(
        SymbolKind::Interface,
        Language::Java,
        &["*.java", "*.cs"],
        &[r"^\s*((?:public|private|protected|internal|static|sealed|partial)\s+)*interface\s+([A-Za-z_]\w*)"],
    ),
    rule_ignoring(
        SymbolKind::Method,
        Language::Java,
        &["*.java", "*.cs"],
        &[r"^\s+((?:public|private|protected|internal|static|final|abstract|synchronized|async|override|virtual|sealed)\s+)+[\w<>\[\],.?\s]*?\s([A-Za-z_]\w*)\s*\("],
        METHOD_IGNORE,
    ),
    // Ruby
    rule(SymbolKind::Class, Language::Ruby, &["*.rb"], &[r"^\s*(class|module)\s+([A-Z]\w*)"]),
    rule_ignoring(
        SymbolKind::Method,
        Language::Ruby,
        &["*.rb"],
        &[r"^\s*def\s+(self\.)?([A-Za-z_]\w*)"],
        METHOD_IGNORE,
    ),
    // PHP
    rule(
        SymbolKind::Class,
        Language::Php,
        &["*.php"],
        &[r"^\s*(abstract\s+|final\s+)?(class|trait|enum)\s+([A-Za-z_]\w*)"],
    ),
    rule(SymbolKind::Interface, Language::Php, &["*.php"], &[r"^\s*interface\s+([A-Za-z_]\w*)"]),
    rule(SymbolKind::Function, Language::Php, &["*.php"], &[r"^\s*function\s+([A-Za-z_]\w*)"]),
    rule_ignoring(
        SymbolKind::Method,
        Language::Php,
        &["*.php"],
        &[r"^\s*((?:public|private|protected|static|abstract|final)\s+)+function\s+([A-Za-z_]\w*)"],
        METHOD_IGNORE,
    ),
    // Schema languages
    rule(
        SymbolKind::SchemaDeclaration,
        Language::Prisma,
        &["*.prisma"],
        &[r"^\s*(model|enum|type|view)\s+([A-Za-z_]\w*)\s*\{"],
    ),
    rule(
        SymbolKind::SchemaDeclaration,
        Language::GraphQl,
        &["*.graphql", "*.gql"],
        &[r"^\s*(extend\s+)?(type|input|interface|enum|union|scalar)\s+([A-Za-z_]\w*)"],
    ),
    rule(
        SymbolKind::SchemaDeclaration,
        Language::Sql,
        &["*.sql"],
        &[r#"(?i)create\s+(or\s+replace\s+)?(table|view)\s+(if\s+not\s+exists\s+)?[`"]?([a-z_]\w*)"#],
    ),
];

/// A single compiled regex together with its source text
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    /// Compile with smart case: case-insensitive unless the pattern contains
    /// an uppercase literal, mirroring the search tool's `--smart-case`
    pub fn new(source: &str) -> Result<Self> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(!has_uppercase_literal(source))
            .build()
            .with_context(|| format!("Invalid symbol pattern: {}", source))?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One entry of the catalog: patterns, globs and ignore-list for a kind in a language
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub kind: SymbolKind,
    pub language: Language,
    pub globs: Vec<String>,
    ignore: HashSet<String>,
    patterns: Vec<CompiledPattern>,
}

impl PatternRule {
    pub fn new<S: AsRef<str>>(
        kind: SymbolKind,
        language: Language,
        globs: &[S],
        patterns: &[S],
    ) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| CompiledPattern::new(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if patterns.is_empty() {
            anyhow::bail!("Pattern rule for {} ({}) has no patterns", kind, language);
        }

        Ok(Self {
            kind,
            language,
            globs: globs.iter().map(|g| g.as_ref().to_string()).collect(),
            ignore: HashSet::new(),
            patterns,
        })
    }

    pub fn with_ignore<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.ignore.extend(names.iter().map(|n| n.as_ref().to_string()));
        self
    }

    pub fn precedence(&self) -> i32 {
        self.kind.precedence()
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.contains(name)
    }

    /// Pick the symbol name out of text matched by pattern `index`
    ///
    /// Returns the name and its byte offset within `text`.
    pub fn extract_name(&self, index: usize, text: &str) -> Option<(String, usize)> {
        let pattern = self.patterns.get(index)?;
        let caps = pattern.regex.captures(text)?;

        for group in (1..caps.len()).rev() {
            let Some(m) = caps.get(group) else {
                continue;
            };
            let candidate = m.as_str();
            if is_identifier(candidate) && !self.language.is_reserved(candidate) {
                return Some((candidate.to_string(), m.start()));
            }
        }

        None
    }
}

/// Ordered collection of pattern rules
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    rules: Vec<PatternRule>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The builtin rules for every supported language
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for builtin in BUILTIN_RULES {
            match PatternRule::new(builtin.kind, builtin.language, builtin.globs, builtin.patterns) {
                Ok(rule) => catalog.register(rule.with_ignore(builtin.ignore)),
                Err(e) => log::warn!("Skipping builtin {} rule for {}: {:#}", builtin.kind, builtin.language, e),
            }
        }
        catalog
    }

    /// Builtin rules followed by user rules from config
    ///
    /// User rules with invalid regexes are logged and skipped.
    pub fn with_user_rules(user_rules: &[PatternConfig]) -> Self {
        let mut catalog = Self::builtin();
        for user in user_rules {
            let language = user.language.unwrap_or(Language::Custom);
            match PatternRule::new(user.kind, language, &user.globs, &user.patterns) {
                Ok(rule) => {
                    log::debug!("Registered user {} rule ({} patterns)", user.kind, user.patterns.len());
                    catalog.register(rule.with_ignore(&user.ignore));
                }
                Err(e) => log::warn!("Skipping user {} rule: {:#}", user.kind, e),
            }
        }
        catalog
    }

    pub fn register(&mut self, rule: PatternRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Rules applicable to a kind filter, in registration order
    pub fn rules_for(&self, filter: KindFilter) -> impl Iterator<Item = &PatternRule> + '_ {
        self.rules.iter().filter(move |r| filter.matches(r.kind))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True when the pattern contains an uppercase literal (escape sequences such
/// as `\S` or `\W` do not count)
pub fn has_uppercase_literal(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if c.is_uppercase() {
            return true;
        }
    }
    false
}
