//! Read-side projections of a snapshot for a viewer and a day range.
//!
//! Nothing here mutates a stored snapshot: range-scoped revenue and
//! consignment are re-summed from each customer's daily series, while weight,
//! prior-period figures, month-over-month change and status keep their
//! full-period values.

use crate::engine::{customer_stats, progress_percent, Totals};
use crate::error::{Result, SalesPerformanceError};
use crate::hierarchy::find_node;
use crate::schema::{
    CustomerRecord, CustomerStats, DailyEntry, PerformanceNode, Period, Role, Snapshot,
    YieldMetrics, DAYS_PER_SERIES,
};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Closed, 1-based range of days within a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DayRange {
    pub start: u32,
    pub end: u32,
}

impl DayRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start < 1 || end > DAYS_PER_SERIES as u32 || start > end {
            return Err(SalesPerformanceError::InvalidDayRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn full_month() -> Self {
        Self {
            start: 1,
            end: DAYS_PER_SERIES as u32,
        }
    }

    pub fn contains(&self, day: u32) -> bool {
        (self.start..=self.end).contains(&day)
    }

    pub fn is_full_month(&self) -> bool {
        *self == Self::full_month()
    }
}

impl Default for DayRange {
    fn default() -> Self {
        Self::full_month()
    }
}

/// Customers visible to a node: everyone for Admin, otherwise those
/// attributed to the node at its own tier.
pub fn filter_by_attribution<'a>(
    customers: &'a [CustomerRecord],
    role: Role,
    id: &str,
) -> Vec<&'a CustomerRecord> {
    customers
        .iter()
        .filter(|c| c.is_attributed_to(role, id))
        .collect()
}

pub fn apply_day_range(customer: &CustomerRecord, range: DayRange) -> CustomerRecord {
    let daily_series: Vec<DailyEntry> = customer
        .daily_series
        .iter()
        .filter(|d| range.contains(d.day))
        .copied()
        .collect();

    CustomerRecord {
        revenue: daily_series.iter().map(|d| d.revenue).sum(),
        consignment_count: daily_series.iter().map(|d| d.consignment_count).sum(),
        daily_series,
        ..customer.clone()
    }
}

/// Per-day sums over `customers` for every day of `range`.
pub fn aggregate_daily_series(customers: &[CustomerRecord], range: DayRange) -> Vec<DailyEntry> {
    (range.start..=range.end)
        .map(|day| {
            customers
                .iter()
                .flat_map(|c| c.daily_series.iter().filter(move |d| d.day == day))
                .fold(
                    DailyEntry {
                        day,
                        revenue: 0.0,
                        consignment_count: 0.0,
                    },
                    |mut acc, d| {
                        acc.revenue += d.revenue;
                        acc.consignment_count += d.consignment_count;
                        acc
                    },
                )
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RangeMetrics {
    pub revenue: f64,
    pub consignment: f64,
    pub weight: f64,
    /// Full-period target of the viewing node.
    pub target: f64,
    pub progress_percent: f64,
    pub yields: YieldMetrics,
    pub customer_stats: CustomerStats,
}

pub fn range_metrics(customers: &[CustomerRecord], target: f64) -> RangeMetrics {
    let totals = Totals::from_customers(customers);
    RangeMetrics {
        revenue: totals.revenue,
        consignment: totals.consignment,
        weight: totals.weight,
        target,
        progress_percent: progress_percent(totals.revenue, target),
        yields: totals.yields(),
        customer_stats: customer_stats(customers),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeProjection {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub region: String,
    pub metrics: RangeMetrics,
    pub children: Vec<NodeProjection>,
}

/// Range-scoped metrics for `node` and its subtree. `range_customers` must
/// already be range-filtered.
pub fn project_tree(node: &PerformanceNode, range_customers: &[CustomerRecord]) -> NodeProjection {
    let own: Vec<CustomerRecord> = filter_by_attribution(range_customers, node.role, &node.id)
        .into_iter()
        .cloned()
        .collect();

    NodeProjection {
        id: node.id.clone(),
        name: node.name.clone(),
        role: node.role,
        region: node.region.clone(),
        metrics: range_metrics(&own, node.revenue.target),
        children: node
            .children
            .iter()
            .map(|c| project_tree(c, range_customers))
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSortKey {
    Revenue,
    Consignment,
    Weight,
    MonthOverMonth,
    RevenuePerItem,
    RevenuePerWeight,
    WeightPerItem,
    Code,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Search, sort and limit for a customer list. Defaults to highest revenue first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_sort_key")]
    pub sort_key: CustomerSortKey,
    #[serde(default = "default_direction")]
    pub direction: SortDirection,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_sort_key() -> CustomerSortKey {
    CustomerSortKey::Revenue
}

fn default_direction() -> SortDirection {
    SortDirection::Descending
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            search: None,
            sort_key: default_sort_key(),
            direction: default_direction(),
            limit: None,
        }
    }
}

impl CustomerQuery {
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn sort_by(mut self, key: CustomerSortKey, direction: SortDirection) -> Self {
        self.sort_key = key;
        self.direction = direction;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Case-insensitive substring match over code, name, mobile and attribution.
    pub fn matches(&self, customer: &CustomerRecord) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => return true,
        };

        let owners = &customer.owner_ids;
        [
            Some(customer.code.as_str()),
            Some(customer.name.as_str()),
            customer.mobile.as_deref(),
            Some(owners.account_owner_id.as_str()),
            Some(owners.account_owner_name.as_str()),
            Some(owners.regional_manager_id.as_str()),
            Some(owners.regional_manager_name.as_str()),
            Some(owners.senior_manager_id.as_str()),
            Some(owners.senior_manager_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    fn compare(&self, a: &CustomerRecord, b: &CustomerRecord) -> Ordering {
        let number = |f: fn(&CustomerRecord) -> f64| {
            f(a).partial_cmp(&f(b)).unwrap_or(Ordering::Equal)
        };
        let ordering = match self.sort_key {
            CustomerSortKey::Revenue => number(|c| c.revenue),
            CustomerSortKey::Consignment => number(|c| c.consignment_count),
            CustomerSortKey::Weight => number(|c| c.weight),
            CustomerSortKey::MonthOverMonth => number(|c| c.month_over_month_change_percent),
            CustomerSortKey::RevenuePerItem => number(|c| c.yields().revenue_per_item),
            CustomerSortKey::RevenuePerWeight => number(|c| c.yields().revenue_per_weight),
            CustomerSortKey::WeightPerItem => number(|c| c.yields().weight_per_item),
            CustomerSortKey::Code => a.code.cmp(&b.code),
            CustomerSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    pub fn apply(&self, customers: Vec<CustomerRecord>) -> Vec<CustomerRecord> {
        let mut result: Vec<CustomerRecord> =
            customers.into_iter().filter(|c| self.matches(c)).collect();
        result.sort_by(|a, b| self.compare(a, b));
        if let Some(limit) = self.limit {
            result.truncate(limit);
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViewerSummary {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceView {
    pub period: Period,
    pub viewer: ViewerSummary,
    pub range: DayRange,
    pub metrics: RangeMetrics,
    /// Range-filtered customers after search, sort and limit.
    pub customers: Vec<CustomerRecord>,
    pub daily_series: Vec<DailyEntry>,
    pub subordinates: Vec<NodeProjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewOutcome {
    Ready(Box<PerformanceView>),
    NoData { period: Period },
}

impl ViewOutcome {
    pub fn view(&self) -> Option<&PerformanceView> {
        match self {
            ViewOutcome::Ready(view) => Some(view.as_ref()),
            ViewOutcome::NoData { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ViewOutcome::Ready(_))
    }
}

pub fn build_view(
    snapshot: &Snapshot,
    viewer_id: &str,
    range: DayRange,
    query: &CustomerQuery,
) -> Result<PerformanceView> {
    let viewer = find_node(&snapshot.tree, viewer_id)
        .ok_or_else(|| SalesPerformanceError::UserNotFound(viewer_id.to_string()))?;

    let range_customers: Vec<CustomerRecord> = snapshot
        .customers
        .iter()
        .map(|c| apply_day_range(c, range))
        .collect();

    let projection = project_tree(viewer, &range_customers);
    let visible: Vec<CustomerRecord> =
        filter_by_attribution(&range_customers, viewer.role, &viewer.id)
            .into_iter()
            .cloned()
            .collect();

    info!(
        "Built {} view for '{}' (days {}-{}): {} customers",
        snapshot.period,
        viewer.id,
        range.start,
        range.end,
        visible.len()
    );

    Ok(PerformanceView {
        period: snapshot.period,
        viewer: ViewerSummary {
            id: viewer.id.clone(),
            name: viewer.name.clone(),
            role: viewer.role,
            region: viewer.region.clone(),
        },
        range,
        metrics: projection.metrics,
        daily_series: aggregate_daily_series(&visible, range),
        customers: query.apply(visible),
        subordinates: projection.children,
    })
}
