// moodlesync-core/src/domain/reconcile.rs

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::error::DomainError;
use crate::domain::plan::SourcePlan;
use crate::domain::record::{RosterEntry, SourceRecord, SourceValue, normalize_email};

/// What one source says about one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    pub value: SourceValue,
    pub timestamp: Option<String>,
}

/// One row per user in the final table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedRow {
    /// Normalized merge key.
    pub email: String,
    pub full_name: String,
    /// Indexed by source position; `None` renders as blank cells.
    contributions: Vec<Option<Contribution>>,
}

impl UnifiedRow {
    fn new(email: String, width: usize) -> Self {
        Self {
            email,
            full_name: String::new(),
            contributions: vec![None; width],
        }
    }

    pub fn contribution(&self, position: usize) -> Option<&Contribution> {
        self.contributions.get(position).and_then(Option::as_ref)
    }

    pub fn value(&self, position: usize) -> Option<&SourceValue> {
        self.contribution(position).map(|c| &c.value)
    }

    pub fn contributions(&self) -> &[Option<Contribution>] {
        &self.contributions
    }
}

/// Reconciled output of one run: rows in first-seen order, columns in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedTable {
    plan: SourcePlan,
    rows: Vec<UnifiedRow>,
}

impl UnifiedTable {
    pub fn plan(&self) -> &SourcePlan {
        &self.plan
    }

    pub fn rows(&self) -> &[UnifiedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Source labels in configured order.
    pub fn header(&self) -> Vec<String> {
        self.plan.labels().into_iter().map(String::from).collect()
    }

    pub fn row(&self, email: &str) -> Option<&UnifiedRow> {
        let key = normalize_email(email);
        self.rows.iter().find(|r| r.email == key)
    }

    /// Value a given source (by label) holds for a given user.
    pub fn value_for(&self, email: &str, label: &str) -> Option<&SourceValue> {
        let position = self.plan.position_of(label)?;
        self.row(email)?.value(position)
    }
}

/// Counters returned by [`Reconciler::absorb`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsorbStats {
    pub records: usize,
    pub new_rows: usize,
    pub skipped: usize,
}

/// Reconciliation context of one run. Consumed by [`Reconciler::finish`].
pub struct Reconciler<'a> {
    plan: &'a SourcePlan,
    index: HashMap<String, usize>,
    rows: Vec<UnifiedRow>,
}

impl<'a> Reconciler<'a> {
    pub fn new(plan: &'a SourcePlan) -> Self {
        Self {
            plan,
            index: HashMap::new(),
            rows: Vec::new(),
        }
    }

    /// Merge every record of the source at `position`.
    ///
    /// Later records of the same source overwrite earlier ones for the same email. Names are
    /// only written while still blank.
    pub fn absorb<I>(&mut self, position: usize, records: I) -> Result<AbsorbStats, DomainError>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let plan: &'a SourcePlan = self.plan;
        let spec = plan.sources().get(position).ok_or_else(|| {
            DomainError::InvalidSource(format!(
                "position {} is outside the {} configured source(s)",
                position,
                plan.len()
            ))
        })?;
        let width = plan.len();
        let mut stats = AbsorbStats::default();

        for record in records {
            stats.records += 1;

            let key = normalize_email(&record.email);
            if key.is_empty() {
                warn!(source = %spec.label, name = %record.full_name, "Record without email skipped");
                stats.skipped += 1;
                continue;
            }
            if record.value.kind() != spec.kind {
                warn!(
                    source = %spec.label,
                    email = %key,
                    "Record of kind {} does not belong to a {} source, skipped",
                    record.value.kind(),
                    spec.kind
                );
                stats.skipped += 1;
                continue;
            }

            let idx = match self.index.get(&key) {
                Some(&idx) => idx,
                None => {
                    let idx = self.rows.len();
                    self.rows.push(UnifiedRow::new(key.clone(), width));
                    self.index.insert(key, idx);
                    stats.new_rows += 1;
                    idx
                }
            };

            let row = &mut self.rows[idx];
            let name = record.full_name.trim();
            if row.full_name.is_empty() && !name.is_empty() {
                row.full_name = name.to_string();
            }
            row.contributions[position] = Some(Contribution {
                value: record.value,
                timestamp: record.timestamp,
            });
        }

        debug!(
            source = %spec.label,
            records = stats.records,
            new_rows = stats.new_rows,
            skipped = stats.skipped,
            "Source absorbed"
        );
        Ok(stats)
    }

    /// Fill blank names from the course roster. Returns how many names were filled.
    pub fn fill_names(&mut self, roster: &[RosterEntry]) -> usize {
        let mut filled = 0;
        for entry in roster {
            let key = normalize_email(&entry.email);
            let name = entry.full_name.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(&idx) = self.index.get(&key) {
                let row = &mut self.rows[idx];
                if row.full_name.is_empty() {
                    row.full_name = name.to_string();
                    filled += 1;
                }
            }
        }
        filled
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self) -> UnifiedTable {
        UnifiedTable {
            plan: self.plan.clone(),
            rows: self.rows,
        }
    }
}
