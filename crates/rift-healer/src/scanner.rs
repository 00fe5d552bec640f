//! Line-pattern defect scanner.
//!
//! Six independent detectors run full passes over a file's lines and report
//! defects in detector order, then by ascending line number. Scanning is a
//! pure function of the file content; running it twice on the same input
//! yields the same defect list.
//!
//! Lines claimed by a LINTING removal go into a per-file exclusion set and
//! are not re-scanned by the detectors that follow.

use regex::Regex;
use std::collections::HashSet;

use crate::types::{BugCategory, Defect};

/// Block-introducing keywords that must end with a colon.
const BLOCK_KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "for", "while", "try", "except", "finally", "with",
];

/// Imports that are never flagged for removal.
const ESSENTIAL_IMPORTS: &[&str] = &["unittest", "json"];

/// Pattern-based defect scanner.
#[derive(Debug)]
pub struct DefectScanner {
    import_stmt: Regex,
    from_stmt: Regex,
    relative_import: Regex,
    str_plus_num: Regex,
    num_plus_str: Regex,
    if_assignment: Regex,
}

impl Default for DefectScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DefectScanner {
    /// Create a scanner with all detector patterns compiled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            import_stmt: Regex::new(r"^import\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            from_stmt: Regex::new(r"^from\s+([A-Za-z_][A-Za-z0-9_]*)\s+import").unwrap(),
            relative_import: Regex::new(r"^from\s+\.").unwrap(),
            str_plus_num: Regex::new(r#"("[^"]*"|'[^']*')\s*\+\s*\d+(\.\d+)?"#).unwrap(),
            num_plus_str: Regex::new(r#"(^|[^\w.])\d+(\.\d+)?\s*\+\s*("[^"]*"|'[^']*')"#).unwrap(),
            if_assignment: Regex::new(r"^if\s+[A-Za-z_]\w*\s*=[^=]").unwrap(),
        }
    }

    /// Scan one file's content and return every located defect.
    ///
    /// `file` is the path relative to the repository root, used only for
    /// reporting.
    #[must_use]
    pub fn scan(&self, file: &str, content: &str) -> Vec<Defect> {
        let lines: Vec<&str> = content.lines().collect();
        let mut excluded: HashSet<usize> = HashSet::new();
        let mut defects = Vec::new();

        defects.extend(self.scan_linting(file, &lines, &mut excluded));
        defects.extend(self.scan_syntax(file, &lines, &excluded));
        defects.extend(self.scan_indentation(file, &lines, &excluded));
        defects.extend(self.scan_type_errors(file, &lines, &excluded));
        defects.extend(self.scan_imports(file, &lines, &excluded));
        defects.extend(self.scan_logic(file, &lines, &excluded));

        defects
    }

    /// LINTING: imports whose symbol never occurs anywhere else in the file.
    fn scan_linting(
        &self,
        file: &str,
        lines: &[&str],
        excluded: &mut HashSet<usize>,
    ) -> Vec<Defect> {
        // Last import of a symbol wins, matching one tracked line per symbol.
        let mut imports: Vec<(String, usize)> = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let stripped = line.trim();
            let symbol = self
                .import_stmt
                .captures(stripped)
                .or_else(|| self.from_stmt.captures(stripped))
                .map(|c| c[1].to_string());
            if let Some(symbol) = symbol {
                imports.retain(|(existing, _)| *existing != symbol);
                imports.push((symbol, idx));
            }
        }

        let mut defects = Vec::new();
        for (symbol, idx) in imports {
            if ESSENTIAL_IMPORTS.contains(&symbol.as_str()) {
                continue;
            }
            if symbol_used(lines, &symbol, idx) {
                continue;
            }
            excluded.insert(idx);
            defects.push(Defect {
                file: file.to_string(),
                line_number: idx + 1,
                category: BugCategory::Linting,
                description: format!("Remove unused import '{symbol}'"),
                fix_hint: "remove the import statement".to_string(),
            });
        }
        defects.sort_by_key(|d| d.line_number);
        defects
    }

    /// SYNTAX: block-introducing statements missing their trailing colon.
    fn scan_syntax(&self, file: &str, lines: &[&str], excluded: &HashSet<usize>) -> Vec<Defect> {
        let mut defects = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if excluded.contains(&idx) {
                continue;
            }
            let stripped = line.trim();
            if stripped.is_empty() || stripped.ends_with(':') || stripped.ends_with('\\') {
                continue;
            }
            if BLOCK_KEYWORDS.contains(&leading_word(stripped)) {
                defects.push(Defect {
                    file: file.to_string(),
                    line_number: idx + 1,
                    category: BugCategory::Syntax,
                    description: "Add missing colon".to_string(),
                    fix_hint: "add the colon at the correct position".to_string(),
                });
            }
        }
        defects
    }

    /// INDENTATION: leading whitespace mixing tabs and spaces.
    fn scan_indentation(
        &self,
        file: &str,
        lines: &[&str],
        excluded: &HashSet<usize>,
    ) -> Vec<Defect> {
        let mut defects = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if excluded.contains(&idx) {
                continue;
            }
            let leading = leading_whitespace(line);
            if leading.contains('\t') && leading.contains(' ') {
                defects.push(Defect {
                    file: file.to_string(),
                    line_number: idx + 1,
                    category: BugCategory::Indentation,
                    description: "Normalize mixed indentation".to_string(),
                    fix_hint: "use consistent indentation".to_string(),
                });
            }
        }
        defects
    }

    /// TYPE_ERROR: string literal concatenated with a bare numeric literal.
    fn scan_type_errors(
        &self,
        file: &str,
        lines: &[&str],
        excluded: &HashSet<usize>,
    ) -> Vec<Defect> {
        let mut defects = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if excluded.contains(&idx) {
                continue;
            }
            if self.str_plus_num.is_match(line) || self.num_plus_str.is_match(line) {
                defects.push(Defect {
                    file: file.to_string(),
                    line_number: idx + 1,
                    category: BugCategory::TypeError,
                    description: "Convert number to string before concatenation".to_string(),
                    fix_hint: "convert types before concatenation".to_string(),
                });
            }
        }
        defects
    }

    /// IMPORT: relative imports.
    fn scan_imports(&self, file: &str, lines: &[&str], excluded: &HashSet<usize>) -> Vec<Defect> {
        let mut defects = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if excluded.contains(&idx) {
                continue;
            }
            if self.relative_import.is_match(line.trim()) {
                defects.push(Defect {
                    file: file.to_string(),
                    line_number: idx + 1,
                    category: BugCategory::Import,
                    description: "Convert relative import to absolute".to_string(),
                    fix_hint: "use absolute imports".to_string(),
                });
            }
        }
        defects
    }

    /// LOGIC: single `=` inside an `if` condition.
    fn scan_logic(&self, file: &str, lines: &[&str], excluded: &HashSet<usize>) -> Vec<Defect> {
        let mut defects = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if excluded.contains(&idx) {
                continue;
            }
            if self.if_assignment.is_match(line.trim()) {
                defects.push(Defect {
                    file: file.to_string(),
                    line_number: idx + 1,
                    category: BugCategory::Logic,
                    description: "Replace assignment with comparison".to_string(),
                    fix_hint: "use == for comparison".to_string(),
                });
            }
        }
        defects
    }
}

/// Leading run of spaces/tabs.
fn leading_whitespace(line: &str) -> &str {
    let rest = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - rest.len()]
}

/// Leading identifier characters of a stripped line.
fn leading_word(stripped: &str) -> &str {
    let end = stripped
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(stripped.len());
    &stripped[..end]
}

/// Whether `symbol` occurs on any line other than its import line as an
/// attribute access, call, subscript, or bare token.
fn symbol_used(lines: &[&str], symbol: &str, import_idx: usize) -> bool {
    lines
        .iter()
        .enumerate()
        .any(|(idx, line)| idx != import_idx && line_mentions_symbol(line, symbol))
}

fn line_mentions_symbol(line: &str, symbol: &str) -> bool {
    let bytes = line.as_bytes();
    let mut search_from = 0;
    while let Some(pos) = line[search_from..].find(symbol) {
        let at = search_from + pos;
        let end = at + symbol.len();
        let left_ok = at == 0 || !is_ident_byte(bytes[at - 1]);
        if left_ok {
            match bytes.get(end) {
                None => return true,
                Some(b'.' | b'(' | b'[') => return true,
                Some(&c) if !is_ident_byte(c) => return true,
                _ => {}
            }
        }
        search_from = at + 1;
    }
    false
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(content: &str) -> Vec<Defect> {
        DefectScanner::new().scan("sample.py", content)
    }

    #[test]
    fn test_unused_import_flagged_at_its_line() {
        let content = "import os\nimport sys\n\nprint(os.getcwd())\n";
        let defects = scan(content);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Linting);
        assert_eq!(defects[0].line_number, 2);
        assert!(defects[0].description.contains("'sys'"));
    }

    #[test]
    fn test_used_import_not_flagged() {
        for usage in ["os.getcwd()", "os(arg)", "os[0]", "x = os"] {
            let content = format!("import os\nresult = {usage}\n");
            assert!(scan(&content).is_empty(), "usage {usage:?} was flagged");
        }
    }

    #[test]
    fn test_import_only_self_reference_is_unused() {
        // The import's own line does not count as a use.
        let defects = scan("import sys\n\ndef main():\n    pass\n");
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Linting);
        assert_eq!(defects[0].line_number, 1);
    }

    #[test]
    fn test_partial_identifier_is_not_a_use() {
        // `system` must not count as a use of `sys`.
        let defects = scan("import sys\nsystem = 1\n");
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Linting);
    }

    #[test]
    fn test_essential_imports_exempt() {
        assert!(scan("import json\nimport unittest\n").is_empty());
    }

    #[test]
    fn test_from_import_tracks_module_symbol() {
        let defects = scan("from requests import get\n\nprint('hi')\n");
        assert_eq!(defects.len(), 1);
        assert!(defects[0].description.contains("'requests'"));
    }

    #[test]
    fn test_missing_colon_on_def() {
        let defects = scan("def subtract(a, b)\n    return a - b\n");
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Syntax);
        assert_eq!(defects[0].line_number, 1);
    }

    #[test]
    fn test_block_keywords_require_word_boundary() {
        // `definition` is not `def`; `classify` is not `class`.
        assert!(scan("definition = 1\nclassify = 2\n").is_empty());
    }

    #[test]
    fn test_continuation_line_not_flagged() {
        assert!(scan("if x and \\\n   y:\n    pass\n").is_empty());
    }

    #[test]
    fn test_mixed_indentation() {
        let defects = scan("def f():\n    x = 1\n \ty = 2\n");
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Indentation);
        assert_eq!(defects[0].line_number, 3);
    }

    #[test]
    fn test_tab_only_indentation_not_flagged() {
        assert!(scan("def f():\n\treturn 1\n").is_empty());
    }

    #[test]
    fn test_string_number_concatenation_both_orders() {
        let defects = scan("a = \"Number: \" + 42\nb = 42 + \" items\"\n");
        assert_eq!(defects.len(), 2);
        assert!(defects.iter().all(|d| d.category == BugCategory::TypeError));
    }

    #[test]
    fn test_string_string_concatenation_not_flagged() {
        assert!(scan("a = \"x\" + \"y\"\n").is_empty());
    }

    #[test]
    fn test_relative_import_flagged() {
        let defects = scan("from .utils import helper\nhelper()\n");
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Import);
    }

    #[test]
    fn test_if_assignment_flagged() {
        let defects = scan("if x = 5:\n    pass\n");
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Logic);
    }

    #[test]
    fn test_if_comparison_not_flagged_as_logic() {
        assert!(scan("if x == 5:\n    pass\n").is_empty());
    }

    #[test]
    fn test_one_line_can_trip_multiple_detectors() {
        // Missing colon and assignment-as-comparison on the same line.
        let defects = scan("if x = 5\n    pass\n");
        let categories: Vec<BugCategory> = defects.iter().map(|d| d.category).collect();
        assert_eq!(categories, vec![BugCategory::Syntax, BugCategory::Logic]);
    }

    #[test]
    fn test_linting_removal_excludes_line_from_later_detectors() {
        // The unused import line has mixed leading whitespace; once LINTING
        // claims it, INDENTATION must not re-flag it.
        let content = "def f():\n    x = 1\n \timport os\n";
        let defects = scan(content);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].category, BugCategory::Linting);
        assert_eq!(defects[0].line_number, 3);
    }

    #[test]
    fn test_detector_order_then_line_order() {
        let content = "import sys\nif y = 2:\n    pass\ndef g(a)\n    return a\n";
        let defects = scan(content);
        let summary: Vec<(BugCategory, usize)> =
            defects.iter().map(|d| (d.category, d.line_number)).collect();
        assert_eq!(
            summary,
            vec![
                (BugCategory::Linting, 1),
                (BugCategory::Syntax, 4),
                (BugCategory::Logic, 2),
            ]
        );
    }

    #[test]
    fn test_scan_is_deterministic() {
        let content = "import sys\nif x = 5\n \tprint(\"n\" + 1)\nfrom .pkg import thing\n";
        let first = scan(content);
        let second = scan(content);
        assert_eq!(first, second);
    }
}
