use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::parser;

/// Module identifier given to every workspace copy. A fixed synthetic name
/// guarantees self-imports can never resolve back to the original module.
pub const SYNTHETIC_MODULE: &str = "gorgon-workspace";

const SKIP_DIRS: &[&str] = &[".git", ".hg", ".svn", "vendor"];

/// Per-run scratch copy of the project under test. The backing temp
/// directory is removed on drop, so teardown happens even when the run
/// fails or is cancelled mid-flight.
pub struct Workspace {
    root: PathBuf,
    module_root: PathBuf,
    module_path: Option<String>,
    _temp_dir: TempDir,
}

impl Workspace {
    /// Root of the scratch copy.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute root of the original module the workspace was copied from.
    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    /// The original module identifier, if the project had a manifest.
    pub fn module_path(&self) -> Option<&str> {
        self.module_path.as_deref()
    }

    /// Map a file under the original module root to its workspace copy.
    pub fn map_path(&self, original: &Path) -> Result<PathBuf> {
        let rel = original.strip_prefix(&self.module_root).map_err(|_| {
            Error::Workspace(format!(
                "{} is outside the module root {}",
                original.display(),
                self.module_root.display()
            ))
        })?;
        Ok(self.root.join(rel))
    }
}

/// Materialize an isolated workspace for the project containing `path`:
/// deep-copy the module, rename its identity, rewrite self-imports, and
/// reconcile the dependency graph.
pub fn build(path: &Path) -> Result<Workspace> {
    let abs = fs::canonicalize(path)?;
    let start_dir = if abs.is_dir() {
        abs.clone()
    } else {
        abs.parent().unwrap_or(&abs).to_path_buf()
    };
    let module_root = find_module_root(&start_dir);

    let run_id = format!("{:08x}", fastrand::u32(..));
    let temp_dir = tempfile::Builder::new()
        .prefix(&format!("gorgon-{}-", run_id))
        .tempdir()?;

    copy_module(&module_root, temp_dir.path())?;
    let module_path = rename_module(temp_dir.path())?;
    rewrite_imports(temp_dir.path(), module_path.as_deref())?;
    tidy(temp_dir.path())?;

    Ok(Workspace {
        root: temp_dir.path().to_path_buf(),
        module_root,
        module_path,
        _temp_dir: temp_dir,
    })
}

/// Walk upward from `dir` until a go.mod is found. Projects without a
/// manifest fall back to the starting directory; `rename_module`
/// synthesizes a manifest for them.
pub fn find_module_root(dir: &Path) -> PathBuf {
    let mut current = dir;
    loop {
        if current.join("go.mod").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => return dir.to_path_buf(),
        }
    }
}

/// Deep copy `src` into `dst`, keeping only Go sources and the module
/// manifest plus its lock. VCS directories, vendored trees, and hidden or
/// `_`-prefixed directories are excluded.
pub fn copy_module(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            if SKIP_DIRS.contains(&name_str.as_ref())
                || name_str.starts_with('.')
                || name_str.starts_with('_')
            {
                continue;
            }
            copy_module(&src_path, &dst_path)?;
        } else if ft.is_file() && keep_file(&name_str) {
            fs::copy(&src_path, &dst_path)?;
        }
        // Symlinks and other special files are skipped.
    }
    Ok(())
}

fn keep_file(name: &str) -> bool {
    if name.starts_with('.') || name.starts_with('_') {
        // The Go toolchain ignores these; copying them would let the
        // weaver plant mutants no test binary ever compiles in.
        return false;
    }
    name.ends_with(".go") || name == "go.mod" || name == "go.sum"
}

/// Rewrite the workspace manifest so the module identifier becomes
/// [`SYNTHETIC_MODULE`]. Returns the original identifier, or `None` when
/// the project had no manifest (one is synthesized).
pub fn rename_module(root: &Path) -> Result<Option<String>> {
    let go_mod = root.join("go.mod");
    if !go_mod.exists() {
        fs::write(
            &go_mod,
            format!("module {}\n\ngo 1.21\n", SYNTHETIC_MODULE),
        )?;
        return Ok(None);
    }

    let content = fs::read_to_string(&go_mod)?;
    let mut original = None;
    let mut lines = Vec::new();
    for line in content.lines() {
        match line.trim().strip_prefix("module ") {
            Some(rest) if original.is_none() => {
                original = Some(rest.trim().to_string());
                lines.push(format!("module {}", SYNTHETIC_MODULE));
            }
            _ => lines.push(line.to_string()),
        }
    }
    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    fs::write(&go_mod, rewritten)?;
    Ok(original)
}

/// Rewrite every workspace import path prefixed with the original module
/// identifier to the synthetic one. Files with no matching import are left
/// byte-for-byte untouched.
pub fn rewrite_imports(root: &Path, module_path: Option<&str>) -> Result<()> {
    let Some(module_path) = module_path else {
        return Ok(());
    };
    let mut files = Vec::new();
    collect_workspace_go_files(root, &mut files)?;
    for file in files {
        let source = fs::read_to_string(&file)?;
        if let Some(rewritten) = rewrite_source_imports(&source, module_path, &file)? {
            fs::write(&file, rewritten)?;
        }
    }
    Ok(())
}

fn collect_workspace_go_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_workspace_go_files(&path, files)?;
        } else if crate::is_go_source(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Splice rewritten import string literals in place; everything outside
/// the literals stays byte-identical. Returns `None` when nothing matched.
pub fn rewrite_source_imports(
    source: &str,
    module_path: &str,
    file: &Path,
) -> Result<Option<String>> {
    let mut ts = parser::go_parser();
    let tree = ts.parse(source, None).ok_or_else(|| Error::Parse {
        file: file.to_path_buf(),
        detail: "parser produced no tree".to_string(),
    })?;

    let mut splices: Vec<(usize, usize, String)> = Vec::new();
    collect_import_splices(tree.root_node(), source, module_path, &mut splices);
    if splices.is_empty() {
        return Ok(None);
    }

    let mut rewritten = source.to_string();
    splices.sort_by_key(|(start, _, _)| *start);
    for (start, end, text) in splices.into_iter().rev() {
        rewritten.replace_range(start..end, &text);
    }
    Ok(Some(rewritten))
}

fn collect_import_splices(
    node: tree_sitter::Node,
    source: &str,
    module_path: &str,
    splices: &mut Vec<(usize, usize, String)>,
) {
    if node.kind() == "import_spec" {
        if let Some(path_node) = node.child_by_field_name("path") {
            let literal = parser::node_text(path_node, source);
            let value = literal.trim_matches('"');
            if value == module_path || value.starts_with(&format!("{}/", module_path)) {
                let rewritten = format!(
                    "\"{}{}\"",
                    SYNTHETIC_MODULE,
                    &value[module_path.len()..]
                );
                splices.push((path_node.start_byte(), path_node.end_byte(), rewritten));
            }
        }
        return;
    }
    let child_count = node.child_count();
    for i in 0..child_count {
        if let Some(child) = node.child(i) {
            collect_import_splices(child, source, module_path, splices);
        }
    }
}

/// Reconcile the renamed module with its transitive dependency graph.
pub fn tidy(root: &Path) -> Result<()> {
    let output = Command::new("go")
        .args(["mod", "tidy"])
        .current_dir(root)
        .output()
        .map_err(|e| Error::Workspace(format!("failed to run go mod tidy: {}", e)))?;
    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::Tidy(combined));
    }
    Ok(())
}
