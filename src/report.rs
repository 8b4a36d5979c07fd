use console::Style;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};

use crate::mutants::{Mutant, MutantStatus, VerdictTable};
use crate::parser::Site;
use crate::Result;

const TAB_WIDTH: usize = 4;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

pub fn print_phase(msg: &str) {
    let dim = Style::new().dim();
    eprintln!("{}", dim.apply_to(msg));
}

/// The score table plus one line per survivor, to stdout.
pub fn print_report(mutants: &[Mutant], table: &VerdictTable) {
    let total = table.len();
    let killed = table.count(&MutantStatus::Killed);
    let survived = table.count(&MutantStatus::Survived);
    let errors = table.count(&MutantStatus::Error);

    println!(
        "{:<16}{:<8}{:<10}{:<8}{}",
        "Mutation Score", "Killed", "Survived", "Errors", "Total"
    );
    println!(
        "{:<16}{:<8}{:<10}{:<8}{}",
        format!("{:.2}%", score(killed, total)),
        killed,
        survived,
        errors,
        total
    );

    println!("\nSurvived Mutants:");
    for mutant in mutants {
        if table.get(mutant.id).status != MutantStatus::Survived {
            continue;
        }
        let site = &mutant.site;
        let column = std::fs::read_to_string(&site.file)
            .map(|content| visual_column(&content, site.line, site.column))
            .unwrap_or(site.column);
        println!(
            "- survived in {}:{}:{} (Operator: {})",
            site.file.display(),
            site.line,
            column,
            mutant.operator.name()
        );
    }
}

#[derive(Serialize)]
pub struct JsonReport {
    pub score: f64,
    pub killed: usize,
    pub survived: usize,
    pub errors: usize,
    pub total: usize,
    pub survivors: Vec<JsonSurvivor>,
}

#[derive(Serialize)]
pub struct JsonSurvivor {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub operator: String,
    pub original: String,
    pub replacement: String,
    pub diff: String,
}

/// Machine-readable report. Survivor columns are visual, and each survivor
/// carries a `-`/`+` line diff of the single replacement applied to the
/// original source.
pub fn json_report(mutants: &[Mutant], table: &VerdictTable) -> Result<String> {
    let total = table.len();
    let killed = table.count(&MutantStatus::Killed);
    let survived = table.count(&MutantStatus::Survived);
    let errors = table.count(&MutantStatus::Error);

    let mut survivors = Vec::new();
    for mutant in mutants {
        if table.get(mutant.id).status != MutantStatus::Survived {
            continue;
        }
        let site = &mutant.site;
        let Some(replacement) = mutant.operator.replacement(&site.expr) else {
            continue;
        };
        let source = std::fs::read_to_string(&site.file).unwrap_or_default();
        survivors.push(JsonSurvivor {
            file: site.file.display().to_string(),
            line: site.line,
            column: visual_column(&source, site.line, site.column),
            operator: mutant.operator.name().to_string(),
            original: site.expr.op.clone(),
            replacement: replacement.to_string(),
            diff: survivor_diff(&source, site, replacement),
        });
    }

    let report = JsonReport {
        score: score(killed, total),
        killed,
        survived,
        errors,
        total,
        survivors,
    };
    Ok(serde_json::to_string(&report)?)
}

pub fn score(killed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * killed as f64 / total as f64
}

/// 1-based column with tabs expanded to the fixed tab width.
pub fn visual_column(content: &str, line: usize, column: usize) -> usize {
    let Some(text) = content.lines().nth(line.saturating_sub(1)) else {
        return column;
    };
    let mut visual = 1usize;
    for (i, b) in text.bytes().enumerate() {
        if i + 1 >= column {
            break;
        }
        if b == b'\t' {
            visual += TAB_WIDTH - (visual - 1) % TAB_WIDTH;
        } else {
            visual += 1;
        }
    }
    visual
}

/// Apply the single replacement over the operator token and render the
/// changed lines.
pub fn survivor_diff(source: &str, site: &Site, replacement: &str) -> String {
    let mut mutated = String::with_capacity(source.len());
    mutated.push_str(&source[..site.op_start_byte]);
    mutated.push_str(replacement);
    mutated.push_str(&source[site.op_end_byte..]);

    let diff = TextDiff::from_lines(source, &mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => output.push_str(&format!("- {}", change)),
            ChangeTag::Insert => output.push_str(&format!("+ {}", change)),
            _ => {}
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::BinaryExpr;
    use std::path::PathBuf;

    #[test]
    fn score_two_decimal_semantics() {
        assert_eq!(format!("{:.2}%", score(1, 3)), "33.33%");
        assert_eq!(format!("{:.2}%", score(2, 2)), "100.00%");
        assert_eq!(format!("{:.2}%", score(0, 4)), "0.00%");
    }

    #[test]
    fn visual_column_expands_tabs() {
        // One tab then "x > 0": the '>' sits at byte column 4.
        let content = "\tif x > 0 {\n";
        // byte col 1 is the tab itself -> visual 1
        assert_eq!(visual_column(content, 1, 1), 1);
        // byte col 2 ('i') follows a tab expanded to width 4 -> visual 5
        assert_eq!(visual_column(content, 1, 2), 5);
    }

    #[test]
    fn visual_column_without_tabs_is_identity() {
        let content = "if x > 0 {\n";
        assert_eq!(visual_column(content, 1, 6), 6);
    }

    #[test]
    fn visual_column_out_of_range_line_falls_back() {
        assert_eq!(visual_column("one line\n", 9, 7), 7);
    }

    #[test]
    fn survivor_diff_shows_both_sides() {
        let source = "x := a + b\n";
        let site = Site {
            file: PathBuf::from("demo.go"),
            line: 1,
            column: 8,
            op_start_byte: 7,
            op_end_byte: 8,
            expr: BinaryExpr {
                op: "+".to_string(),
                left: "a".to_string(),
                right: "b".to_string(),
            },
        };
        let diff = survivor_diff(source, &site, "-");
        assert!(diff.contains("- x := a + b"));
        assert!(diff.contains("+ x := a - b"));
    }
}
