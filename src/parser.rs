use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tree_sitter::{Node, Parser};

use crate::error::{Error, Result};
use crate::operators::{BinaryExpr, Operator};

/// A source location where at least one loaded operator can apply.
/// Immutable after discovery. `line`/`column` are 1-based and point at the
/// operator token; the byte range covers the operator token only.
#[derive(Debug, Clone)]
pub struct Site {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub op_start_byte: usize,
    pub op_end_byte: usize,
    pub expr: BinaryExpr,
}

pub fn go_parser() -> Parser {
    let mut parser = Parser::new();
    let language = tree_sitter_go::LANGUAGE;
    parser
        .set_language(&language.into())
        .expect("Failed to set Go grammar");
    parser
}

/// Discover mutation sites in a file or directory tree. The result is
/// sorted by `(file, line, column)` so that downstream ID assignment is
/// reproducible across runs on the same inputs.
pub fn discover_sites(path: &Path, operators: &[Arc<dyn Operator>]) -> Result<Vec<Site>> {
    // Canonical paths keep site identity stable when sites are later mapped
    // into the workspace copy.
    let path = std::fs::canonicalize(path).map_err(|e| Error::Read {
        file: path.to_path_buf(),
        source: e,
    })?;
    let mut sites = if path.is_dir() {
        discover_in_dir(&path, operators)?
    } else if crate::is_go_source(&path) {
        let source = std::fs::read_to_string(&path).map_err(|e| Error::Read {
            file: path.clone(),
            source: e,
        })?;
        sites_in_source(&path, &source, operators)?
    } else {
        Vec::new()
    };
    sites.sort_by(|a, b| {
        (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column))
    });
    Ok(sites)
}

/// Parse every non-test Go file under `dir` on a bounded pool (CPU − 1,
/// leaving headroom for the caller), serializing emission into one vector.
fn discover_in_dir(dir: &Path, operators: &[Arc<dyn Operator>]) -> Result<Vec<Site>> {
    let mut files = Vec::new();
    collect_go_files(dir, &mut files)?;
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
        .min(files.len());

    let queue: Mutex<VecDeque<PathBuf>> = Mutex::new(files.into());
    let collected: Mutex<Vec<Site>> = Mutex::new(Vec::new());
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let file = queue.lock().unwrap().pop_front();
                let Some(file) = file else { break };
                let result = std::fs::read_to_string(&file)
                    .map_err(|e| Error::Read {
                        file: file.clone(),
                        source: e,
                    })
                    .and_then(|source| sites_in_source(&file, &source, operators));
                match result {
                    Ok(mut sites) => collected.lock().unwrap().append(&mut sites),
                    Err(e) => {
                        *failure.lock().unwrap() = Some(e);
                        break;
                    }
                }
            });
        }
    });

    if let Some(e) = failure.into_inner().unwrap() {
        return Err(e);
    }
    Ok(collected.into_inner().unwrap())
}

/// Recursively collect `.go` files, skipping `_test.go` files (verdicts
/// must come from the project's own unmodified tests), VCS directories,
/// vendored trees, and hidden or `_`-prefixed entries. The prefix check
/// applies to files too: the Go toolchain ignores `.`/`_`-prefixed
/// sources, so a mutant planted in one could never be exercised.
fn collect_go_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') || name_str.starts_with('_') {
            continue;
        }
        let path = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            if name_str == "vendor" {
                continue;
            }
            collect_go_files(&path, files)?;
        } else if ft.is_file() && crate::is_go_source(&path) && !crate::is_go_test_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

pub fn sites_in_source(
    file: &Path,
    source: &str,
    operators: &[Arc<dyn Operator>],
) -> Result<Vec<Site>> {
    let mut parser = go_parser();
    let tree = parser.parse(source, None).ok_or_else(|| Error::Parse {
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

    let mut sites = Vec::new();
    walk(root, source, file, operators, &mut sites);
    Ok(sites)
}

fn walk(
    node: Node,
    source: &str,
    file: &Path,
    operators: &[Arc<dyn Operator>],
    sites: &mut Vec<Site>,
) {
    if node.kind() == "binary_expression" {
        if let (Some(left), Some(op), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("operator"),
            node.child_by_field_name("right"),
        ) {
            let expr = BinaryExpr {
                op: node_text(op, source).to_string(),
                left: node_text(left, source).to_string(),
                right: node_text(right, source).to_string(),
            };
            if operators.iter().any(|o| o.applies(&expr)) {
                sites.push(Site {
                    file: file.to_path_buf(),
                    line: op.start_position().row + 1,
                    column: op.start_position().column + 1,
                    op_start_byte: op.start_byte(),
                    op_end_byte: op.end_byte(),
                    expr,
                });
            }
        }
    }

    let child_count = node.child_count();
    for i in 0..child_count {
        if let Some(child) = node.child(i) {
            walk(child, source, file, operators, sites);
        }
    }
}

pub(crate) fn node_text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}
