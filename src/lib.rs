//! # Sales Performance Builder
//!
//! A library for turning the three monthly sales sheets (organisation
//! hierarchy, daily customer performance, revenue targets) into aggregated
//! performance snapshots for a sales organisation.
//!
//! ## Core Concepts
//!
//! - **Hierarchy**: Admin -> Senior Regional Manager -> Regional Manager -> Account Owner
//! - **Customer ledger**: one record per customer code with 31 days of revenue and
//!   consignments, linked to the previous committed period for month-over-month change
//! - **Aggregation**: every node's revenue, consignment, yields and customer counts are
//!   rolled up from the customers attributed to it; manager targets are at least the sum
//!   of their subordinates' targets
//! - **Snapshot store**: committed periods kept in chronological order and reprocessed
//!   together whenever history changes
//! - **Range views**: read-only projections of a snapshot for one viewer and a day range
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_performance_builder::*;
//!
//! let mut store = SnapshotStore::default();
//! store.stage(InputKind::Hierarchy, hierarchy_rows);
//! store.stage(InputKind::Performance, performance_rows);
//! store.stage(InputKind::Target, target_rows);
//!
//! let period = Period::new("Dec", "2025")?;
//! store.commit_staged(period)?;
//!
//! let outcome = store.view(period, "SME001", DayRange::new(1, 10)?)?;
//! if let Some(view) = outcome.view() {
//!     println!("{} revenue: {:.2}", view.viewer.name, view.metrics.revenue);
//! }
//! ```

pub mod edits;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod ingestion;
pub mod ledger;
pub mod schema;
pub mod store;
pub mod utils;

pub use edits::{apply_edits, HierarchyEdit};
pub use engine::{aggregate_tree, compute_yields, customer_stats, Aggregator, Totals};
pub use error::{Result, SalesPerformanceError};
pub use filter::*;
pub use hierarchy::{
    build_hierarchy, build_name_lookup, collect_ids, find_node, find_parent, insert_node,
    remove_node, rename_node, validate_tree, HierarchyBuild, NameLookup,
};
pub use ingestion::*;
pub use ledger::{build_customer_ledger, month_over_month_change, LedgerBuild};
pub use schema::*;
pub use store::SnapshotStore;

use log::{debug, info};

pub struct SalesPerformanceProcessor;

impl SalesPerformanceProcessor {
    /// Builds one period's snapshot from its sheets.
    ///
    /// `prior` is the chronologically preceding snapshot, used for the
    /// month-over-month figures. When `edited_tree` is given its structure is
    /// aggregated instead of the tree described by the hierarchy sheet.
    pub fn process(
        config: &SalesPortalConfig,
        period: Period,
        inputs: &CommittedInputs,
        prior: Option<&Snapshot>,
        edited_tree: Option<&PerformanceNode>,
    ) -> Result<Snapshot> {
        config.validate()?;

        info!(
            "Processing sales performance for {} (prior period: {})",
            period,
            prior
                .map(|p| p.period.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let hierarchy_rows = parse_hierarchy_rows(&inputs.hierarchy);
        let performance_rows = parse_performance_rows(&inputs.performance);
        let target_rows = parse_target_rows(&inputs.target);

        let names = build_name_lookup(&hierarchy_rows.rows);
        let built = build_hierarchy(&hierarchy_rows.rows);
        let skeleton = match edited_tree {
            Some(tree) => tree.skeleton(),
            None => config.root_node().with_children(built.senior_managers),
        };

        let ledger = build_customer_ledger(
            &performance_rows.rows,
            &names,
            prior.map(|p| p.customers.as_slice()),
            &config.unknown_name,
        );
        let targets = TargetTable::from_rows(&target_rows.rows);
        let tree = aggregate_tree(&skeleton, &ledger.customers, &targets);

        debug!(
            "{}: {} nodes, {} customers, {} targets",
            period,
            tree.node_count(),
            ledger.customers.len(),
            targets.len()
        );

        let diagnostics = IngestionDiagnostics {
            skipped_hierarchy_rows: built.skipped_rows,
            skipped_performance_rows: performance_rows.skipped_rows,
            skipped_target_rows: target_rows.skipped_rows,
            unknown_owner_ids: ledger.unknown_owner_ids,
            merged_duplicate_codes: ledger.merged_duplicate_codes,
            malformed_cells: performance_rows.malformed_cells + target_rows.malformed_cells,
        };
        if !diagnostics.is_clean() {
            debug!("{} ingestion diagnostics: {:?}", period, diagnostics);
        }

        Ok(Snapshot {
            period,
            customers: ledger.customers,
            tree,
            raw_inputs: inputs.clone(),
            hierarchy_edited: edited_tree.is_some(),
            diagnostics,
        })
    }

    /// Re-aggregates an edited tree against an existing snapshot's customers
    /// and targets without touching its customer data.
    pub fn reaggregate(
        config: &SalesPortalConfig,
        snapshot: &Snapshot,
        tree: &PerformanceNode,
    ) -> Result<PerformanceNode> {
        config.validate()?;
        let targets = TargetTable::from_rows(&parse_target_rows(&snapshot.raw_inputs.target).rows);
        Ok(aggregate_tree(&tree.skeleton(), &snapshot.customers, &targets))
    }
}

/// Processes a single period with the default configuration and no history.
pub fn process_period(period: Period, inputs: &StagedInputs) -> Result<Snapshot> {
    let committed = inputs.to_committed(period)?;
    SalesPerformanceProcessor::process(
        &SalesPortalConfig::default(),
        period,
        &committed,
        None,
        None,
    )
}
