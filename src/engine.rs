use crate::ingestion::TargetTable;
use crate::schema::{
    ConsignmentMetric, CustomerRecord, CustomerStats, CustomerStatus, PerformanceNode, Role,
    SalesMetric, YieldMetrics,
};
use crate::utils::safe_ratio;
use serde::{Deserialize, Serialize};

/// Revenue, consignment and weight summed over a set of customers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub revenue: f64,
    pub consignment: f64,
    pub weight: f64,
}

impl Totals {
    pub fn from_customers<'a>(customers: impl IntoIterator<Item = &'a CustomerRecord>) -> Self {
        customers.into_iter().fold(Totals::default(), |acc, c| Totals {
            revenue: acc.revenue + c.revenue,
            consignment: acc.consignment + c.consignment_count,
            weight: acc.weight + c.weight,
        })
    }

    pub fn yields(&self) -> YieldMetrics {
        compute_yields(self.revenue, self.consignment, self.weight)
    }
}

pub fn compute_yields(revenue: f64, consignment: f64, weight: f64) -> YieldMetrics {
    YieldMetrics {
        revenue_per_item: safe_ratio(revenue, consignment),
        revenue_per_weight: safe_ratio(revenue, weight),
        weight_per_item: safe_ratio(weight, consignment),
    }
}

pub fn progress_percent(actual: f64, target: f64) -> f64 {
    safe_ratio(actual, target) * 100.0
}

pub fn customer_stats<'a>(
    customers: impl IntoIterator<Item = &'a CustomerRecord>,
) -> CustomerStats {
    customers
        .into_iter()
        .fold(CustomerStats::default(), |mut stats, c| {
            stats.total_senders += 1;
            if c.is_active() {
                stats.active_senders += 1;
            }
            match c.status {
                CustomerStatus::New => stats.new_customers += 1,
                CustomerStatus::Existing => stats.existing_customers += 1,
            }
            stats
        })
}

/// Rolls customer totals up a management tree.
pub struct Aggregator<'a> {
    customers: &'a [CustomerRecord],
    targets: &'a TargetTable,
}

impl<'a> Aggregator<'a> {
    pub fn new(customers: &'a [CustomerRecord], targets: &'a TargetTable) -> Self {
        Self { customers, targets }
    }

    /// Returns a copy of `node` with every metric in its subtree recomputed.
    ///
    /// Children are aggregated first so that a manager's target can be raised
    /// to the sum of its subordinates' targets. The Admin root always takes
    /// the sum of its direct children's targets.
    pub fn aggregate(&self, node: &PerformanceNode) -> PerformanceNode {
        let children: Vec<PerformanceNode> =
            node.children.iter().map(|c| self.aggregate(c)).collect();

        let selected: Vec<&CustomerRecord> = self
            .customers
            .iter()
            .filter(|c| c.is_attributed_to(node.role, &node.id))
            .collect();
        let totals = Totals::from_customers(selected.iter().copied());

        let children_target: f64 = children.iter().map(|c| c.revenue.target).sum();
        let target = match node.role {
            Role::Admin => children_target,
            _ if children.is_empty() => self.targets.lookup(&node.id),
            _ => self.targets.lookup(&node.id).max(children_target),
        };

        PerformanceNode {
            id: node.id.clone(),
            name: node.name.clone(),
            role: node.role,
            region: node.region.clone(),
            consignment: ConsignmentMetric {
                actual: totals.consignment,
            },
            revenue: SalesMetric {
                target,
                actual: totals.revenue,
                progress_percent: progress_percent(totals.revenue, target),
            },
            yields: totals.yields(),
            customer_stats: customer_stats(selected.iter().copied()),
            children,
        }
    }
}

pub fn aggregate_tree(
    root: &PerformanceNode,
    customers: &[CustomerRecord],
    targets: &TargetTable,
) -> PerformanceNode {
    Aggregator::new(customers, targets).aggregate(root)
}
