//! Terminal output formatting for ranked symbol lists

use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::models::{RankedItem, SymbolKind};

/// Renders ranked items as numbered, colored lines
pub struct OutputFormatter {
    use_colors: bool,
}

impl OutputFormatter {
    /// Colors are used only when stdout is a terminal and `plain` is off
    pub fn new(plain: bool) -> Self {
        Self {
            use_colors: !plain && std::io::stdout().is_terminal(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn print_items(&self, items: &[RankedItem]) {
        for (idx, item) in items.iter().enumerate() {
            println!("{}", self.format_item(idx + 1, item));
        }
    }

    /// `  N. [kind] Name  path:line:col  (score)`
    ///
    /// Columns are printed 1-based, the way editors count them.
    pub fn format_item(&self, position: usize, item: &RankedItem) -> String {
        let occ = &item.occurrence;
        let location = format!("{}:{}:{}", occ.path, occ.line, occ.start_col + 1);
        let score = format!("({:.1})", item.score);

        if self.use_colors {
            format!(
                "{:>3}. {} {}  {}",
                position.dimmed(),
                self.format_symbol_badge(occ.kind, &occ.name),
                location.bright_cyan(),
                score.dimmed()
            )
        } else {
            format!(
                "{:>3}. {}  {}  {}",
                position,
                self.format_symbol_badge(occ.kind, &occ.name),
                location,
                score
            )
        }
    }

    /// Format symbol kind badge
    fn format_symbol_badge(&self, kind: SymbolKind, name: &str) -> String {
        let (kind_str, color_fn): (&str, fn(&str) -> String) = match kind {
            SymbolKind::Class => ("class", |s| s.blue().to_string()),
            SymbolKind::Function => ("fn", |s| s.green().to_string()),
            SymbolKind::Method => ("method", |s| s.green().to_string()),
            SymbolKind::Variable => ("var", |s| s.white().to_string()),
            SymbolKind::Type => ("type", |s| s.cyan().to_string()),
            SymbolKind::Interface => ("interface", |s| s.blue().to_string()),
            SymbolKind::SchemaDeclaration => ("schema", |s| s.magenta().to_string()),
            SymbolKind::Component => ("component", |s| s.bright_magenta().to_string()),
            SymbolKind::Unknown => ("?", |s| s.white().to_string()),
        };

        if self.use_colors {
            format!("{} {}", color_fn(&format!("[{}]", kind_str)), name.bold())
        } else {
            format!("[{}] {}", kind_str, name)
        }
    }
}

/// `1.2ms` below a millisecond, `34ms` otherwise
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    if elapsed.as_millis() < 1 {
        format!("{:.1}ms", elapsed.as_secs_f64() * 1000.0)
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SymbolOccurrence;
    use std::time::Duration;

    #[test]
    fn test_plain_format_item() {
        let item = RankedItem::new(
            SymbolOccurrence {
                name: "UserService".to_string(),
                path: "src/user.ts".to_string(),
                line: 12,
                start_col: 13,
                end_col: 24,
                kind: SymbolKind::Class,
            },
            42.4,
        );

        let line = OutputFormatter::with_colors(false).format_item(3, &item);
        assert_eq!(line, "  3. [class] UserService  src/user.ts:12:14  (42.4)");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_micros(300)), "0.3ms");
        assert_eq!(format_elapsed(Duration::from_millis(34)), "34ms");
    }
}
