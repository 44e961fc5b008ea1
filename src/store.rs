use crate::edits::HierarchyEdit;
use crate::error::{Result, SalesPerformanceError};
use crate::filter::{build_view, CustomerQuery, DayRange, ViewOutcome};
use crate::hierarchy::validate_tree;
use crate::schema::{
    CommittedInputs, InputKind, PerformanceNode, Period, RawTable, Role, SalesPortalConfig,
    Snapshot, StagedInputs,
};
use crate::SalesPerformanceProcessor;
use log::{debug, info};
use std::collections::BTreeMap;

/// Chronologically ordered history of committed periods.
///
/// Every snapshot's month-over-month figures depend on the snapshot before it,
/// so any change to the set of periods reprocesses the whole history in order.
/// The rebuilt history replaces the current one only once every period has
/// been processed.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    config: SalesPortalConfig,
    snapshots: BTreeMap<Period, Snapshot>,
    staged: StagedInputs,
}

struct PendingPeriod {
    inputs: CommittedInputs,
    edited_tree: Option<PerformanceNode>,
}

impl SnapshotStore {
    pub fn new(config: SalesPortalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            snapshots: BTreeMap::new(),
            staged: StagedInputs::default(),
        })
    }

    pub fn config(&self) -> &SalesPortalConfig {
        &self.config
    }

    /// Holds one sheet for the next [`SnapshotStore::commit_staged`].
    pub fn stage(&mut self, kind: InputKind, table: RawTable) {
        debug!("Staged {} sheet with {} rows", kind, table.len());
        self.staged.set(kind, table);
    }

    pub fn staged(&self) -> &StagedInputs {
        &self.staged
    }

    pub fn clear_staged(&mut self) {
        self.staged = StagedInputs::default();
    }

    /// Commits the staged sheets and clears the staging area on success.
    pub fn commit_staged(&mut self, period: Period) -> Result<&Snapshot> {
        let staged = std::mem::take(&mut self.staged);
        if let Err(e) = self.commit_inputs(period, &staged) {
            self.staged = staged;
            return Err(e);
        }
        self.find(period)
            .ok_or_else(|| SalesPerformanceError::NoSnapshotForPeriod(period.to_string()))
    }

    /// Builds the snapshot for `period`, replacing any existing one, and
    /// reprocesses every period in chronological order.
    pub fn commit(&mut self, period: Period, inputs: &StagedInputs) -> Result<&Snapshot> {
        self.commit_inputs(period, inputs)?;
        self.find(period)
            .ok_or_else(|| SalesPerformanceError::NoSnapshotForPeriod(period.to_string()))
    }

    fn commit_inputs(&mut self, period: Period, inputs: &StagedInputs) -> Result<()> {
        let committed = inputs.to_committed(period)?;

        let mut pending = self.pending_periods();
        let replaced = pending
            .insert(
                period,
                PendingPeriod {
                    inputs: committed,
                    edited_tree: None,
                },
            )
            .is_some();

        info!(
            "Committing {} ({}), reprocessing {} period(s)",
            period,
            if replaced { "replacing existing snapshot" } else { "new period" },
            pending.len()
        );

        self.snapshots = self.reprocess(pending)?;
        Ok(())
    }

    /// Drops a period and reprocesses the remaining history.
    pub fn remove(&mut self, period: Period) -> Result<Snapshot> {
        if !self.snapshots.contains_key(&period) {
            return Err(SalesPerformanceError::NoSnapshotForPeriod(period.to_string()));
        }

        let mut pending = self.pending_periods();
        pending.remove(&period);
        let rebuilt = self.reprocess(pending)?;

        let removed = self
            .snapshots
            .remove(&period)
            .ok_or_else(|| SalesPerformanceError::NoSnapshotForPeriod(period.to_string()))?;
        self.snapshots = rebuilt;
        info!("Removed {} and reprocessed {} period(s)", period, self.snapshots.len());
        Ok(removed)
    }

    pub fn find(&self, period: Period) -> Option<&Snapshot> {
        self.snapshots.get(&period)
    }

    /// The snapshot immediately before `period` in the store's order, which is
    /// not necessarily the previous calendar month.
    pub fn predecessor(&self, period: Period) -> Option<&Snapshot> {
        self.snapshots.range(..period).next_back().map(|(_, s)| s)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.values().next_back()
    }

    pub fn periods(&self) -> Vec<Period> {
        self.snapshots.keys().copied().collect()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.values()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Replaces the tree of one snapshot and re-aggregates it from that
    /// snapshot's own customers and targets. Other periods are untouched.
    ///
    /// The new tree must keep the Admin root and the four-tier role order.
    pub fn update_tree(&mut self, period: Period, new_tree: PerformanceNode) -> Result<&Snapshot> {
        let config = self.config.clone();
        let snapshot = self
            .snapshots
            .get_mut(&period)
            .ok_or_else(|| SalesPerformanceError::NoSnapshotForPeriod(period.to_string()))?;

        if new_tree.id != snapshot.tree.id || new_tree.role != Role::Admin {
            return Err(SalesPerformanceError::RootDeletion(snapshot.tree.id.clone()));
        }
        validate_tree(&new_tree)?;

        let tree = SalesPerformanceProcessor::reaggregate(&config, snapshot, &new_tree)?;
        snapshot.tree = tree;
        snapshot.hierarchy_edited = true;
        info!("Updated hierarchy of {} ({} nodes)", period, snapshot.tree.node_count());
        Ok(&*snapshot)
    }

    pub fn update_hierarchy(&mut self, period: Period, edit: &HierarchyEdit) -> Result<&Snapshot> {
        let snapshot = self
            .find(period)
            .ok_or_else(|| SalesPerformanceError::NoSnapshotForPeriod(period.to_string()))?;
        let edited = edit.apply(&snapshot.tree)?;
        debug!("Applying {:?} to {}", edit, period);
        self.update_tree(period, edited)
    }

    /// View with the default customer ordering (highest revenue first).
    pub fn view(&self, period: Period, viewer_id: &str, range: DayRange) -> Result<ViewOutcome> {
        self.view_with_query(period, viewer_id, range, &CustomerQuery::default())
    }

    /// A missing period is reported as [`ViewOutcome::NoData`]; an unknown
    /// viewer is an error.
    pub fn view_with_query(
        &self,
        period: Period,
        viewer_id: &str,
        range: DayRange,
        query: &CustomerQuery,
    ) -> Result<ViewOutcome> {
        match self.find(period) {
            Some(snapshot) => Ok(ViewOutcome::Ready(Box::new(build_view(
                snapshot, viewer_id, range, query,
            )?))),
            None => {
                info!("No snapshot for {}, returning empty view", period);
                Ok(ViewOutcome::NoData { period })
            }
        }
    }

    fn pending_periods(&self) -> BTreeMap<Period, PendingPeriod> {
        self.snapshots
            .iter()
            .map(|(period, snapshot)| {
                (
                    *period,
                    PendingPeriod {
                        inputs: snapshot.raw_inputs.clone(),
                        edited_tree: snapshot.hierarchy_edited.then(|| snapshot.tree.clone()),
                    },
                )
            })
            .collect()
    }

    fn reprocess(
        &self,
        pending: BTreeMap<Period, PendingPeriod>,
    ) -> Result<BTreeMap<Period, Snapshot>> {
        let mut rebuilt: BTreeMap<Period, Snapshot> = BTreeMap::new();
        let mut prior: Option<Snapshot> = None;

        for (period, entry) in pending {
            let snapshot = SalesPerformanceProcessor::process(
                &self.config,
                period,
                &entry.inputs,
                prior.as_ref(),
                entry.edited_tree.as_ref(),
            )?;
            prior = Some(snapshot.clone());
            rebuilt.insert(period, snapshot);
        }

        Ok(rebuilt)
    }
}
