use crate::hierarchy::NameLookup;
use crate::ingestion::PerformanceRow;
use crate::schema::{Attribution, CustomerRecord, DailyEntry, DAYS_PER_SERIES};
use crate::utils::percent_change;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerBuild {
    pub customers: Vec<CustomerRecord>,
    pub unknown_owner_ids: Vec<String>,
    pub merged_duplicate_codes: Vec<String>,
}

pub fn month_over_month_change(revenue: f64, prior_revenue: f64) -> f64 {
    percent_change(revenue, prior_revenue)
}

fn daily_series(revenue: &[f64], consignment: &[f64]) -> Vec<DailyEntry> {
    (0..DAYS_PER_SERIES)
        .map(|d| DailyEntry {
            day: d as u32 + 1,
            revenue: revenue.get(d).copied().unwrap_or(0.0),
            consignment_count: consignment.get(d).copied().unwrap_or(0.0),
        })
        .collect()
}

fn refresh_totals(record: &mut CustomerRecord) {
    record.revenue = record.daily_series.iter().map(|d| d.revenue).sum();
    record.consignment_count = record.daily_series.iter().map(|d| d.consignment_count).sum();
}

/// Turns performance rows into one customer record per code.
///
/// Prior-period figures come from `prior` (the chronologically preceding
/// snapshot's customers) matched on code; customers without a predecessor get
/// zeros and a month-over-month change of 0. Rows repeating a code are folded
/// into the first record with that code.
pub fn build_customer_ledger(
    rows: &[PerformanceRow],
    names: &NameLookup,
    prior: Option<&[CustomerRecord]>,
    unknown_name: &str,
) -> LedgerBuild {
    let mut build = LedgerBuild::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unknown: BTreeSet<String> = BTreeSet::new();
    let mut merged: BTreeSet<String> = BTreeSet::new();

    let mut resolve = |id: &str| -> String {
        if !id.is_empty() && !names.contains(id) {
            unknown.insert(id.to_string());
        }
        names.resolve(id, unknown_name)
    };

    for row in rows {
        if let Some(&pos) = index.get(&row.code) {
            let existing = &mut build.customers[pos];
            if existing.owner_ids.account_owner_id != row.owner_id {
                warn!(
                    "Customer '{}' on line {} is attributed to '{}' but was first seen under '{}'; keeping the first attribution",
                    row.code, row.line, row.owner_id, existing.owner_ids.account_owner_id
                );
            }
            for (entry, d) in existing.daily_series.iter_mut().zip(0..) {
                entry.revenue += row.daily_revenue.get(d).copied().unwrap_or(0.0);
                entry.consignment_count += row.daily_consignment.get(d).copied().unwrap_or(0.0);
            }
            existing.weight += row.weight;
            refresh_totals(existing);
            merged.insert(row.code.clone());
            continue;
        }

        let owner_ids = Attribution {
            account_owner_id: row.owner_id.clone(),
            regional_manager_id: row.regional_id.clone(),
            senior_manager_id: row.senior_id.clone(),
            account_owner_name: resolve(&row.owner_id),
            regional_manager_name: resolve(&row.regional_id),
            senior_manager_name: resolve(&row.senior_id),
        };

        let mut record = CustomerRecord {
            code: row.code.clone(),
            name: row.name.clone(),
            mobile: row.mobile.clone(),
            revenue: 0.0,
            consignment_count: 0.0,
            weight: row.weight,
            prior_revenue: 0.0,
            prior_consignment: 0.0,
            prior_weight: 0.0,
            month_over_month_change_percent: 0.0,
            status: row.status,
            owner_ids,
            daily_series: daily_series(&row.daily_revenue, &row.daily_consignment),
        };
        refresh_totals(&mut record);

        index.insert(row.code.clone(), build.customers.len());
        build.customers.push(record);
    }

    let prior_by_code: HashMap<&str, &CustomerRecord> = prior
        .unwrap_or(&[])
        .iter()
        .rev()
        .map(|c| (c.code.as_str(), c))
        .collect();

    for record in &mut build.customers {
        if let Some(previous) = prior_by_code.get(record.code.as_str()) {
            record.prior_revenue = previous.revenue;
            record.prior_consignment = previous.consignment_count;
            record.prior_weight = previous.weight;
        }
        record.month_over_month_change_percent =
            month_over_month_change(record.revenue, record.prior_revenue);
    }

    if !unknown.is_empty() {
        warn!(
            "{} attribution id(s) not found in hierarchy, named '{}': {:?}",
            unknown.len(),
            unknown_name,
            unknown
        );
    }
    if !merged.is_empty() {
        warn!("Merged duplicate customer codes: {:?}", merged);
    }
    debug!(
        "Built ledger with {} customers ({} with prior-period data)",
        build.customers.len(),
        build
            .customers
            .iter()
            .filter(|c| prior_by_code.contains_key(c.code.as_str()))
            .count()
    );

    build.unknown_owner_ids = unknown.into_iter().collect();
    build.merged_duplicate_codes = merged.into_iter().collect();
    build
}
