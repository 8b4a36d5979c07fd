use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::mutants::{Mutant, MutantStatus, VerdictTable};
use crate::workspace::Workspace;

pub struct RunConfig {
    /// Parallel package tasks. `0` means the host CPU count.
    pub concurrent: usize,
    /// Per-invocation wall-clock budget.
    pub timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            concurrent: 0,
            timeout: Duration::from_secs(10),
        }
    }
}

enum Event {
    Started(usize),
    Finished(usize, MutantStatus, String),
}

/// Map each mutant ID to the workspace package directory owning its woven
/// file. IDs within a package stay in ascending order.
pub fn group_by_package(
    workspace: &Workspace,
    mutants: &[Mutant],
) -> Result<BTreeMap<PathBuf, Vec<usize>>> {
    let mut by_package: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
    for mutant in mutants {
        let pkg_dir = workspace
            .map_path(&mutant.site.file)?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workspace.root().to_path_buf());
        by_package.entry(pkg_dir).or_default().push(mutant.id);
    }
    Ok(by_package)
}

/// Execute every mutant against its package's precompiled test binary.
///
/// One pool task per package; within a task, mutant IDs run sequentially so
/// a binary is never contended. Cross-package tasks run in parallel up to
/// the configured bound. Verdicts travel over a channel to the collector
/// that owns the table, so results arriving in any order land at their ID
/// and nothing is dropped on cancellation: in-flight tasks drain before
/// the channel closes.
pub fn run_mutants(
    total: usize,
    by_package: &BTreeMap<PathBuf, Vec<usize>>,
    binaries: &BTreeMap<PathBuf, PathBuf>,
    config: &RunConfig,
    cancel: &AtomicBool,
) -> VerdictTable {
    let concurrent = if config.concurrent == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        config.concurrent
    };

    let mut table = VerdictTable::new(total);
    let jobs: Vec<(&PathBuf, &Vec<usize>)> = by_package.iter().collect();
    let workers = concurrent.min(jobs.len());
    let queue: Mutex<Vec<(&PathBuf, &Vec<usize>)>> = Mutex::new(jobs);
    let (tx, rx) = mpsc::channel::<Event>();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            scope.spawn(move || loop {
                let job = queue.lock().unwrap().pop();
                let Some((pkg_dir, ids)) = job else { break };

                let Some(binary) = binaries.get(pkg_dir.as_path()) else {
                    for id in ids {
                        let _ = tx.send(Event::Finished(
                            *id,
                            MutantStatus::Error,
                            format!("no test binary for package {}", pkg_dir.display()),
                        ));
                    }
                    continue;
                };

                for id in ids {
                    // Cooperative cancellation: checked before each spawn.
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    let _ = tx.send(Event::Started(*id));
                    let (status, diagnostic) =
                        run_one(binary, pkg_dir, *id, config.timeout, cancel);
                    let _ = tx.send(Event::Finished(*id, status, diagnostic));
                }
            });
        }
        drop(tx);

        for event in rx {
            match event {
                Event::Started(id) => table.mark_running(id),
                Event::Finished(id, status, diagnostic) => table.record(id, status, diagnostic),
            }
        }
    });

    table
}

/// One invocation of a precompiled test binary with the mutant selected
/// through the environment. Clean exit means no test noticed the change.
fn run_one(
    binary: &Path,
    pkg_dir: &Path,
    id: usize,
    timeout: Duration,
    cancel: &AtomicBool,
) -> (MutantStatus, String) {
    let child = Command::new(binary)
        .arg(format!("-test.timeout={}s", timeout.as_secs()))
        .current_dir(pkg_dir)
        .env(crate::MUTANT_ID_ENV, id.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            return (
                MutantStatus::Error,
                format!("failed to spawn {}: {}", binary.display(), e),
            )
        }
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let output = read_combined(&mut child);
                if status.success() {
                    return (MutantStatus::Survived, String::new());
                }
                return (MutantStatus::Killed, output);
            }
            Ok(None) => {
                if cancel.load(Ordering::SeqCst) {
                    let _ = child.kill();
                    let _ = child.wait();
                    return (MutantStatus::Error, "run cancelled".to_string());
                }
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return (
                        MutantStatus::Killed,
                        format!("timed out after {}s", timeout.as_secs()),
                    );
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return (
                    MutantStatus::Error,
                    format!("failed to wait for {}: {}", binary.display(), e),
                );
            }
        }
    }
}

fn read_combined(child: &mut Child) -> String {
    let mut out = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = std::io::Read::read_to_string(&mut stdout, &mut out);
    }
    if let Some(mut stderr) = child.stderr.take() {
        let _ = std::io::Read::read_to_string(&mut stderr, &mut out);
    }
    out
}
