use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Fixed filename each package's test binary is compiled to.
pub const TEST_BINARY: &str = "package.test";

/// Compile one test binary per affected package, cwd'd at the workspace
/// root. Returns package directory → binary path. Compilation failure is
/// fatal for the whole run; the toolchain's combined output is surfaced.
pub fn compile_test_binaries(
    workspace_root: &Path,
    packages: &[PathBuf],
) -> Result<BTreeMap<PathBuf, PathBuf>> {
    let mut binaries = BTreeMap::new();
    for pkg_dir in packages {
        if binaries.contains_key(pkg_dir) {
            continue;
        }
        let rel_pkg = relative_package(workspace_root, pkg_dir)?;
        let binary = pkg_dir.join(TEST_BINARY);

        let output = Command::new("go")
            .arg("test")
            .arg("-c")
            .arg("-o")
            .arg(&binary)
            .arg(&rel_pkg)
            .current_dir(workspace_root)
            .output()
            .map_err(|e| Error::Workspace(format!("failed to run go test -c: {}", e)))?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(Error::Compile {
                package: rel_pkg,
                output: combined,
            });
        }

        binaries.insert(pkg_dir.clone(), binary);
    }
    Ok(binaries)
}

/// `./`-anchored package path for the command line. Newline-bearing values
/// are rejected before they reach the toolchain.
pub fn relative_package(workspace_root: &Path, pkg_dir: &Path) -> Result<String> {
    let rel = pkg_dir.strip_prefix(workspace_root).map_err(|_| {
        Error::Workspace(format!(
            "package {} is outside the workspace {}",
            pkg_dir.display(),
            workspace_root.display()
        ))
    })?;
    let rel_pkg = if rel.as_os_str().is_empty() {
        ".".to_string()
    } else {
        format!("./{}", rel.display())
    };
    if rel_pkg.contains('\n') || rel_pkg.contains('\r') {
        return Err(Error::InvalidPackagePath(rel_pkg));
    }
    Ok(rel_pkg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_package_anchors_subdirectories() {
        let root = Path::new("/tmp/ws");
        let pkg = root.join("internal").join("calc");
        assert_eq!(relative_package(root, &pkg).unwrap(), "./internal/calc");
    }

    #[test]
    fn relative_package_root_is_dot() {
        let root = Path::new("/tmp/ws");
        assert_eq!(relative_package(root, root).unwrap(), ".");
    }

    #[test]
    fn relative_package_rejects_newlines() {
        let root = Path::new("/tmp/ws");
        let pkg = root.join("bad\npkg");
        assert!(matches!(
            relative_package(root, &pkg),
            Err(Error::InvalidPackagePath(_))
        ));
    }

    #[test]
    fn relative_package_rejects_outside_paths() {
        let root = Path::new("/tmp/ws");
        assert!(relative_package(root, Path::new("/elsewhere")).is_err());
    }
}
