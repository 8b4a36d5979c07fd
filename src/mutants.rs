use std::sync::Arc;

use serde::Serialize;

use crate::operators::Operator;
use crate::parser::Site;

/// The unit of work: one candidate fault. IDs are dense (`1..=N`), assigned
/// at plan time, and never renumbered; the verdict lives in [`VerdictTable`].
pub struct Mutant {
    pub id: usize,
    pub site: Site,
    pub operator: Arc<dyn Operator>,
}

/// Assign IDs over sites in their sorted order, operators in selection
/// order within each site. Identical inputs yield an identical ID-to-site
/// mapping.
pub fn plan_mutants(sites: &[Site], operators: &[Arc<dyn Operator>]) -> Vec<Mutant> {
    let mut mutants = Vec::new();
    let mut next_id = 1;
    for site in sites {
        for op in operators {
            if op.applies(&site.expr) {
                mutants.push(Mutant {
                    id: next_id,
                    site: site.clone(),
                    operator: Arc::clone(op),
                });
                next_id += 1;
            }
        }
    }
    mutants
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MutantStatus {
    Pending,
    Running,
    Killed,
    Survived,
    Error,
}

impl MutantStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MutantStatus::Killed | MutantStatus::Survived | MutantStatus::Error
        )
    }
}

#[derive(Debug, Clone)]
pub struct Verdict {
    pub status: MutantStatus,
    pub diagnostic: String,
}

/// Dense verdict store indexed by `id − 1`. During a run each slot is
/// written only via the runner's result channel; after the run reads are
/// plain indexing.
pub struct VerdictTable {
    entries: Vec<Verdict>,
}

impl VerdictTable {
    pub fn new(total: usize) -> Self {
        VerdictTable {
            entries: vec![
                Verdict {
                    status: MutantStatus::Pending,
                    diagnostic: String::new(),
                };
                total
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: usize) -> &Verdict {
        &self.entries[id - 1]
    }

    pub fn mark_running(&mut self, id: usize) {
        let entry = &mut self.entries[id - 1];
        debug_assert_eq!(entry.status, MutantStatus::Pending);
        entry.status = MutantStatus::Running;
    }

    pub fn record(&mut self, id: usize, status: MutantStatus, diagnostic: String) {
        debug_assert!(status.is_terminal());
        let entry = &mut self.entries[id - 1];
        debug_assert!(!entry.status.is_terminal());
        entry.status = status;
        entry.diagnostic = diagnostic;
    }

    /// Iterate `(id, verdict)` in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Verdict)> {
        self.entries.iter().enumerate().map(|(i, v)| (i + 1, v))
    }

    pub fn count(&self, status: &MutantStatus) -> usize {
        self.entries.iter().filter(|v| &v.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_starts_pending() {
        let table = VerdictTable::new(3);
        assert_eq!(table.len(), 3);
        for (_, v) in table.iter() {
            assert_eq!(v.status, MutantStatus::Pending);
        }
    }

    #[test]
    fn record_sets_terminal_status_and_diagnostic() {
        let mut table = VerdictTable::new(2);
        table.mark_running(2);
        table.record(2, MutantStatus::Killed, "boom".to_string());
        assert_eq!(table.get(2).status, MutantStatus::Killed);
        assert_eq!(table.get(2).diagnostic, "boom");
        assert_eq!(table.get(1).status, MutantStatus::Pending);
    }

    #[test]
    fn count_by_status() {
        let mut table = VerdictTable::new(3);
        table.record(1, MutantStatus::Killed, String::new());
        table.record(2, MutantStatus::Survived, String::new());
        assert_eq!(table.count(&MutantStatus::Killed), 1);
        assert_eq!(table.count(&MutantStatus::Survived), 1);
        assert_eq!(table.count(&MutantStatus::Pending), 1);
    }
}
