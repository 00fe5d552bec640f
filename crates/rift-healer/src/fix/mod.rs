//! Fix synthesis.
//!
//! [`DeterministicFixer`] applies one fixed transform per defect category and
//! is the required fallback for every defect. [`FixStrategy`] is the seam for
//! alternate whole-file strategies; the LLM-backed variant lives in
//! [`llm`].

pub mod llm;

use async_trait::async_trait;
use regex::Regex;

use crate::guard::COMMIT_PREFIX;
use crate::types::{BugCategory, Defect, Fix, FixStatus};

/// Alternate whole-file fix strategy.
///
/// Given a file's content and the defects located in it, returns revised file
/// content, or `None` when the strategy is unavailable or produced nothing
/// usable. Callers must fall back to the deterministic path on `None`.
#[async_trait]
pub trait FixStrategy: Send + Sync {
    async fn revise_file(&self, file: &str, content: &str, defects: &[Defect]) -> Option<String>;
}

/// Deterministic per-defect fix synthesis.
#[derive(Debug)]
pub struct DeterministicFixer {
    relative_import: Regex,
    if_assignment: Regex,
    str_plus_num: Regex,
    num_plus_str: Regex,
}

impl Default for DeterministicFixer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicFixer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            relative_import: Regex::new(r"^(\s*from\s+)\.+").unwrap(),
            if_assignment: Regex::new(r"^(\s*if\s+[A-Za-z_]\w*\s*)=(\s*[^=].*)$").unwrap(),
            str_plus_num: Regex::new(r#"("[^"]*"|'[^']*')(\s*\+\s*)(\d+(?:\.\d+)?)"#).unwrap(),
            num_plus_str: Regex::new(r#"(^|[^\w.])(\d+(?:\.\d+)?)(\s*\+\s*)("[^"]*"|'[^']*')"#)
                .unwrap(),
        }
    }

    /// Synthesize the remedy for one defect.
    ///
    /// When no deterministic transform applies to the line's shape, the fix
    /// is marked [`FixStatus::Failed`] and the original line is untouched;
    /// it is still reported, never dropped.
    #[must_use]
    pub fn synthesize(&self, defect: &Defect, original_line: &str) -> Fix {
        let replacement = match defect.category {
            BugCategory::Linting => Some(String::new()),
            BugCategory::Syntax => self.append_colon(original_line),
            BugCategory::Indentation => expand_leading_tabs(original_line),
            BugCategory::Import => self.strip_relative_dots(original_line),
            BugCategory::Logic => self.assignment_to_comparison(original_line),
            BugCategory::TypeError => self.wrap_numeric_operand(original_line),
        };

        // A fix that changes nothing must never be reported as Fixed.
        let replacement =
            replacement.filter(|r| r.is_empty() || r != original_line);

        match replacement {
            Some(replacement) => Fix {
                commit_message: commit_message(defect),
                defect: defect.clone(),
                original_line: original_line.to_string(),
                replacement,
                status: FixStatus::Fixed,
            },
            None => Fix {
                commit_message: commit_message(defect),
                defect: defect.clone(),
                original_line: original_line.to_string(),
                replacement: original_line.to_string(),
                status: FixStatus::Failed,
            },
        }
    }

    /// Synthesize fixes for every defect in a file and produce the revised
    /// content.
    ///
    /// Transforms chain: a defect on a line already rewritten by an earlier
    /// defect operates on the rewritten line. A defect on a line an earlier
    /// fix deleted is reported as `Failed`.
    #[must_use]
    pub fn synthesize_file(&self, defects: &[Defect], content: &str) -> (Vec<Fix>, String) {
        let mut current: Vec<Option<String>> =
            content.lines().map(|l| Some(l.to_string())).collect();
        let mut fixes = Vec::with_capacity(defects.len());

        for defect in defects {
            let idx = defect.line_number.saturating_sub(1);
            let line = current.get(idx).cloned().flatten();
            match line {
                Some(line) => {
                    let fix = self.synthesize(defect, &line);
                    if fix.status == FixStatus::Fixed {
                        current[idx] = if fix.is_deletion() {
                            None
                        } else {
                            Some(fix.replacement.clone())
                        };
                    }
                    fixes.push(fix);
                }
                None => fixes.push(Fix {
                    commit_message: commit_message(defect),
                    defect: defect.clone(),
                    original_line: String::new(),
                    replacement: String::new(),
                    status: FixStatus::Failed,
                }),
            }
        }

        let mut revised = current.into_iter().flatten().collect::<Vec<_>>().join("\n");
        if content.ends_with('\n') && !revised.is_empty() {
            revised.push('\n');
        }
        (fixes, revised)
    }

    fn append_colon(&self, line: &str) -> Option<String> {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.ends_with(':') {
            return None;
        }
        let indent = &line[..line.len() - line.trim_start().len()];
        Some(format!("{indent}{stripped}:"))
    }

    fn strip_relative_dots(&self, line: &str) -> Option<String> {
        if !self.relative_import.is_match(line) {
            return None;
        }
        Some(self.relative_import.replace(line, "${1}").into_owned())
    }

    fn assignment_to_comparison(&self, line: &str) -> Option<String> {
        let captures = self.if_assignment.captures(line)?;
        Some(format!("{}=={}", &captures[1], &captures[2]))
    }

    fn wrap_numeric_operand(&self, line: &str) -> Option<String> {
        if self.str_plus_num.is_match(line) {
            return Some(
                self.str_plus_num
                    .replace(line, "${1}${2}str(${3})")
                    .into_owned(),
            );
        }
        if self.num_plus_str.is_match(line) {
            return Some(
                self.num_plus_str
                    .replace(line, "${1}str(${2})${3}${4}")
                    .into_owned(),
            );
        }
        None
    }
}

/// Build the mandatory-prefix commit message for one defect.
#[must_use]
pub fn commit_message(defect: &Defect) -> String {
    format!(
        "{COMMIT_PREFIX} Fix {}: {} in {}:{}",
        defect.category, defect.description, defect.file, defect.line_number
    )
}

/// Build fix records by diffing strategy-revised content against the original.
///
/// Defects whose line the strategy left unchanged are reported as `Failed`
/// rather than silently claimed as fixed.
#[must_use]
pub fn diff_fixes(defects: &[Defect], original: &str, revised: &str) -> Vec<Fix> {
    let old_lines: Vec<&str> = original.lines().collect();
    let new_lines: Vec<&str> = revised.lines().collect();

    defects
        .iter()
        .map(|defect| {
            let idx = defect.line_number.saturating_sub(1);
            let old = old_lines.get(idx).copied().unwrap_or_default();
            let new = new_lines.get(idx).copied();
            let (replacement, status) = match new {
                Some(new) if new != old => (new.to_string(), FixStatus::Fixed),
                None => (String::new(), FixStatus::Fixed),
                Some(_) => (old.to_string(), FixStatus::Failed),
            };
            Fix {
                commit_message: commit_message(defect),
                defect: defect.clone(),
                original_line: old.to_string(),
                replacement,
                status,
            }
        })
        .collect()
}

fn expand_leading_tabs(line: &str) -> Option<String> {
    let rest = line.trim_start_matches([' ', '\t']);
    let leading = &line[..line.len() - rest.len()];
    if !leading.contains('\t') {
        return None;
    }
    Some(format!("{}{rest}", leading.replace('\t', "    ")))
}
