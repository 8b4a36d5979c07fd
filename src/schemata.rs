use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::error::{Error, Result};
use crate::mutants::Mutant;
use crate::operators::BinaryExpr;
use crate::parser;
use crate::workspace::Workspace;

/// Name of the per-package helper file carrying `activeMutantID`.
pub const HELPER_FILE: &str = "gorgon_schemata.go";

/// Rewrite every workspace file that has planned mutants, replacing each
/// matched binary expression with its schema, then inject the dispatch
/// helper into every affected package. Returns the affected package
/// directories, sorted.
pub fn weave(workspace: &Workspace, mutants: &[Mutant]) -> Result<Vec<PathBuf>> {
    let mut by_file: BTreeMap<PathBuf, Vec<&Mutant>> = BTreeMap::new();
    for mutant in mutants {
        let target = workspace.map_path(&mutant.site.file)?;
        by_file.entry(target).or_default().push(mutant);
    }

    let mut packages = BTreeSet::new();
    for (file, file_mutants) in &by_file {
        let source = fs::read_to_string(file)?;
        let woven = weave_source(&source, file_mutants, file)?;
        fs::write(file, woven)?;
        let pkg_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workspace.root().to_path_buf());
        packages.insert(pkg_dir);
    }

    for pkg_dir in &packages {
        inject_helper(pkg_dir)?;
    }

    Ok(packages.into_iter().collect())
}

/// Produce the woven form of one file: a verbatim byte copy in which each
/// binary expression whose operator token matches a planned `(line, column)`
/// is replaced by its schema. Nested matched expressions compose: the
/// outer schema's operand text embeds the inner schema.
pub fn weave_source(source: &str, file_mutants: &[&Mutant], file: &Path) -> Result<String> {
    let mut ts = parser::go_parser();
    let tree = ts.parse(source, None).ok_or_else(|| Error::Parse {
        file: file.to_path_buf(),
        detail: "parser produced no tree".to_string(),
    })?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(Error::Parse {
            file: file.to_path_buf(),
            detail: "syntax error".to_string(),
        });
    }

    let mut by_pos: HashMap<(usize, usize), Vec<&Mutant>> = HashMap::new();
    for mutant in file_mutants {
        by_pos
            .entry((mutant.site.line, mutant.site.column))
            .or_default()
            .push(*mutant);
    }

    let mut woven_at = HashSet::new();
    let rendered = render(root, source, &by_pos, &mut woven_at);

    for mutant in file_mutants {
        let key = (mutant.site.line, mutant.site.column);
        if !woven_at.contains(&key) {
            return Err(Error::Workspace(format!(
                "no binary expression at {}:{}:{} for mutant {}",
                file.display(),
                mutant.site.line,
                mutant.site.column,
                mutant.id
            )));
        }
    }

    Ok(rendered)
}

fn render(
    node: Node,
    source: &str,
    by_pos: &HashMap<(usize, usize), Vec<&Mutant>>,
    woven_at: &mut HashSet<(usize, usize)>,
) -> String {
    if node.kind() == "binary_expression" {
        if let Some(op) = node.child_by_field_name("operator") {
            let key = (op.start_position().row + 1, op.start_position().column + 1);
            if let Some(site_mutants) = by_pos.get(&key) {
                woven_at.insert(key);
                return schema_expr(node, op, source, site_mutants, by_pos, woven_at);
            }
        }
    }

    let child_count = node.child_count();
    if child_count == 0 {
        return parser::node_text(node, source).to_string();
    }

    let mut out = String::new();
    let mut pos = node.start_byte();
    for i in 0..child_count {
        if let Some(child) = node.child(i) {
            out.push_str(&source[pos..child.start_byte()]);
            out.push_str(&render(child, source, by_pos, woven_at));
            pos = child.end_byte();
        }
    }
    out.push_str(&source[pos..node.end_byte()]);
    out
}

/// Build the dispatch expression for one site: a zero-argument function
/// literal invoked in place, one arm per mutant in ascending ID order,
/// falling through to the original expression so the baseline is preserved
/// when no arm matches.
fn schema_expr(
    node: Node,
    op: Node,
    source: &str,
    site_mutants: &[&Mutant],
    by_pos: &HashMap<(usize, usize), Vec<&Mutant>>,
    woven_at: &mut HashSet<(usize, usize)>,
) -> String {
    let left = node
        .child_by_field_name("left")
        .map(|n| render(n, source, by_pos, woven_at))
        .unwrap_or_default();
    let right = node
        .child_by_field_name("right")
        .map(|n| render(n, source, by_pos, woven_at))
        .unwrap_or_default();
    let op_text = parser::node_text(op, source);

    // The result type is decided from the original operator token alone;
    // built-in operators preserve the boolean-vs-numeric dichotomy.
    let result_type = if is_comparison(op_text) { "bool" } else { "int" };

    // Re-ask each operator for its replacement at weave time, against the
    // re-parsed expression.
    let reparsed = BinaryExpr {
        op: op_text.to_string(),
        left: node
            .child_by_field_name("left")
            .map(|n| parser::node_text(n, source).to_string())
            .unwrap_or_default(),
        right: node
            .child_by_field_name("right")
            .map(|n| parser::node_text(n, source).to_string())
            .unwrap_or_default(),
    };
    let mut arms: Vec<(usize, &str)> = site_mutants
        .iter()
        .filter_map(|m| m.operator.replacement(&reparsed).map(|r| (m.id, r)))
        .collect();
    arms.sort_by_key(|(id, _)| *id);

    let mut body = String::new();
    for (id, replacement) in arms {
        body.push_str(&format!(
            "if activeMutantID == {} {{ return {} {} {} }}; ",
            id, left, replacement, right
        ));
    }
    body.push_str(&format!("return {} {} {}", left, op_text, right));

    format!("func() {} {{ {} }}()", result_type, body)
}

fn is_comparison(op: &str) -> bool {
    matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=")
}

/// Write the dispatch helper into `pkg_dir` unless it is already present.
/// The helper declares the package-level `activeMutantID` and an `init`
/// that parses the selection environment variable; parse failure leaves
/// the baseline value of zero.
pub fn inject_helper(pkg_dir: &Path) -> Result<()> {
    let helper_path = pkg_dir.join(HELPER_FILE);
    if helper_path.exists() {
        return Ok(());
    }
    let pkg_name = package_name(pkg_dir)?;
    let helper = format!(
        r#"package {}

import (
	"os"
	"strconv"
)

var activeMutantID int

func init() {{
	if idStr := os.Getenv("{}"); idStr != "" {{
		if id, err := strconv.Atoi(idStr); err == nil {{
			activeMutantID = id
		}}
	}}
}}
"#,
        pkg_name,
        crate::MUTANT_ID_ENV
    );
    fs::write(&helper_path, helper)?;
    Ok(())
}

/// Read the package clause from any Go file in the directory, falling back
/// to the directory basename.
fn package_name(pkg_dir: &Path) -> Result<String> {
    let mut entries: Vec<PathBuf> = fs::read_dir(pkg_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| crate::is_go_source(p) && !crate::is_go_test_file(p))
        .collect();
    entries.sort();

    for file in entries {
        let source = fs::read_to_string(&file)?;
        let mut ts = parser::go_parser();
        if let Some(tree) = ts.parse(&source, None) {
            if let Some(name) = clause_package_name(tree.root_node(), &source) {
                return Ok(name);
            }
        }
    }

    Ok(pkg_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "main".to_string()))
}

fn clause_package_name(root: Node, source: &str) -> Option<String> {
    let count = root.child_count();
    for i in 0..count {
        let child = root.child(i)?;
        if child.kind() == "package_clause" {
            let inner = child.child_count();
            for j in 0..inner {
                if let Some(ident) = child.child(j) {
                    if ident.kind() == "package_identifier" {
                        return Some(parser::node_text(ident, source).to_string());
                    }
                }
            }
        }
    }
    None
}
