use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::error::{Error, Result};
use crate::parser;

/// Print the syntax tree of a file, or of every Go source under a
/// directory. Diagnostic mode only; nothing is mutated.
pub fn print_path(path: &Path, out: &mut impl Write) -> Result<()> {
    let meta = fs::metadata(path)?;
    if !meta.is_dir() {
        return print_file(path, out);
    }

    let mut files = Vec::new();
    collect(path, &mut files)?;
    files.sort();
    for (i, file) in files.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        print_file(file, out)?;
    }
    Ok(())
}

fn collect(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') || name_str.starts_with('_') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if name_str == "vendor" {
                continue;
            }
            collect(&path, files)?;
        } else if crate::is_go_source(&path) {
            files.push(path);
        }
    }
    Ok(())
}

pub fn print_file(path: &Path, out: &mut impl Write) -> Result<()> {
    let source = fs::read_to_string(path)?;
    let mut ts = parser::go_parser();
    let tree = ts.parse(&source, None).ok_or_else(|| Error::Parse {
        file: path.to_path_buf(),
        detail: "parser produced no tree".to_string(),
    })?;
    writeln!(out, "=== AST for {} ===", path.display())?;
    print_node(tree.root_node(), &source, "", true, out)?;
    Ok(())
}

fn print_node(
    node: Node,
    source: &str,
    prefix: &str,
    is_last: bool,
    out: &mut impl Write,
) -> Result<()> {
    let connector = if is_last { "└── " } else { "├── " };
    let pos = node.start_position();
    writeln!(
        out,
        "{}{}{} [{}:{}]",
        prefix,
        connector,
        node.kind(),
        pos.row + 1,
        pos.column + 1
    )?;

    let next_prefix = if is_last {
        format!("{}    ", prefix)
    } else {
        format!("{}│   ", prefix)
    };

    let named: Vec<Node> = (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .collect();

    if named.is_empty() {
        let text: String = parser::node_text(node, source).chars().take(20).collect();
        if !text.is_empty() {
            writeln!(out, "{}└── {:?}", next_prefix, text)?;
        }
        return Ok(());
    }

    let last = named.len() - 1;
    for (i, child) in named.into_iter().enumerate() {
        print_node(child, source, &next_prefix, i == last, out)?;
    }
    Ok(())
}
