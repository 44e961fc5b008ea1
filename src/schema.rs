use crate::error::{Result, SalesPerformanceError};
use crate::utils::{days_in_month, month_abbreviation, parse_month_name, parse_year};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub type RawRow = Vec<serde_json::Value>;

/// A sheet as delivered by the import layer: rows of raw cells, header first.
pub type RawTable = Vec<RawRow>;

pub const DAYS_PER_SERIES: usize = 31;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Role {
    #[schemars(description = "Owns every customer in the organization")]
    Admin,

    #[schemars(description = "Senior Regional Sales Manager, heads a region of regional managers")]
    SeniorManager,

    #[schemars(description = "Regional Sales Manager, heads a group of account owners")]
    RegionalManager,

    #[schemars(description = "Account owner directly responsible for customers; always a leaf")]
    AccountOwner,
}

impl Role {
    /// Lenient parse of the labels found in target sheets and exports.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "admin" | "administrator" => Some(Role::Admin),
            "seniormanager" | "srrsm" | "srsm" | "seniorregionalsalesmanager"
            | "seniorregionalmanager" => Some(Role::SeniorManager),
            "regionalmanager" | "rsm" | "regionalsalesmanager" => Some(Role::RegionalManager),
            "accountowner" | "sme" | "smeaccount" | "owner" => Some(Role::AccountOwner),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::SeniorManager => "Senior Regional Sales Manager",
            Role::RegionalManager => "Regional Sales Manager",
            Role::AccountOwner => "Account Owner",
        }
    }

    /// The role a direct subordinate of this role is expected to have.
    pub fn child_role(&self) -> Option<Self> {
        match self {
            Role::Admin => Some(Role::SeniorManager),
            Role::SeniorManager => Some(Role::RegionalManager),
            Role::RegionalManager => Some(Role::AccountOwner),
            Role::AccountOwner => None,
        }
    }

    pub fn can_have_children(&self) -> bool {
        self.child_role().is_some()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A reporting month. Ordering is chronological (year, then month).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Period {
    pub year: i32,
    #[schemars(description = "Calendar month, 1 = January")]
    pub month: u32,
}

impl Period {
    /// Builds a period from the selector values, e.g. `("Dec", "2025")`.
    pub fn new(month_name: &str, year: &str) -> Result<Self> {
        Ok(Self {
            year: parse_year(year)?,
            month: parse_month_name(month_name)?,
        })
    }

    pub fn from_parts(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(SalesPerformanceError::InvalidPeriod(format!(
                "Month {} is outside 1..=12",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn month_name(&self) -> &'static str {
        month_abbreviation(self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesMetric {
    pub target: f64,
    pub actual: f64,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsignmentMetric {
    pub actual: f64,
}

/// Efficiency ratios. Always derived from revenue, consignment and weight totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct YieldMetrics {
    #[schemars(description = "YPC: revenue / consignment count")]
    pub revenue_per_item: f64,
    #[schemars(description = "YPW: revenue / total weight")]
    pub revenue_per_weight: f64,
    #[schemars(description = "WPC: total weight / consignment count")]
    pub weight_per_item: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerStats {
    pub total_senders: usize,
    pub active_senders: usize,
    pub new_customers: usize,
    pub existing_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceNode {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub region: String,
    pub consignment: ConsignmentMetric,
    pub revenue: SalesMetric,
    pub yields: YieldMetrics,
    pub customer_stats: CustomerStats,
    #[serde(default)]
    pub children: Vec<PerformanceNode>,
}

impl PerformanceNode {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            region: region.into(),
            consignment: ConsignmentMetric::default(),
            revenue: SalesMetric::default(),
            yields: YieldMetrics::default(),
            customer_stats: CustomerStats::default(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<PerformanceNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Copy of the tree shape with every metric reset.
    pub fn skeleton(&self) -> Self {
        Self::new(self.id.clone(), self.name.clone(), self.role, self.region.clone())
            .with_children(self.children.iter().map(|c| c.skeleton()).collect())
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum CustomerStatus {
    New,
    Existing,
}

impl CustomerStatus {
    /// Anything other than an explicit "new" is treated as an existing sender.
    pub fn parse(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("new") {
            CustomerStatus::New
        } else {
            CustomerStatus::Existing
        }
    }
}

/// Which hierarchy members a customer was credited to at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Attribution {
    pub account_owner_id: String,
    pub regional_manager_id: String,
    pub senior_manager_id: String,
    pub account_owner_name: String,
    pub regional_manager_name: String,
    pub senior_manager_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyEntry {
    pub day: u32,
    pub revenue: f64,
    pub consignment_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerRecord {
    pub code: String,
    pub name: String,
    pub mobile: Option<String>,
    pub revenue: f64,
    pub consignment_count: f64,
    pub weight: f64,
    pub prior_revenue: f64,
    pub prior_consignment: f64,
    pub prior_weight: f64,
    pub month_over_month_change_percent: f64,
    pub status: CustomerStatus,
    pub owner_ids: Attribution,
    pub daily_series: Vec<DailyEntry>,
}

impl CustomerRecord {
    pub fn is_active(&self) -> bool {
        self.consignment_count > 0.0
    }

    pub fn yields(&self) -> YieldMetrics {
        crate::engine::compute_yields(self.revenue, self.consignment_count, self.weight)
    }

    /// Whether this customer counts toward a node with the given role and id.
    pub fn is_attributed_to(&self, role: Role, id: &str) -> bool {
        match role {
            Role::Admin => true,
            Role::SeniorManager => self.owner_ids.senior_manager_id == id,
            Role::RegionalManager => self.owner_ids.regional_manager_id == id,
            Role::AccountOwner => self.owner_ids.account_owner_id == id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Hierarchy,
    Performance,
    Target,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputKind::Hierarchy => "hierarchy",
            InputKind::Performance => "performance",
            InputKind::Target => "target",
        };
        f.write_str(name)
    }
}

/// Sheets uploaded so far for the next commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StagedInputs {
    pub hierarchy: Option<RawTable>,
    pub performance: Option<RawTable>,
    pub target: Option<RawTable>,
}

impl StagedInputs {
    pub fn set(&mut self, kind: InputKind, table: RawTable) {
        match kind {
            InputKind::Hierarchy => self.hierarchy = Some(table),
            InputKind::Performance => self.performance = Some(table),
            InputKind::Target => self.target = Some(table),
        }
    }

    pub fn missing(&self) -> Vec<InputKind> {
        let mut missing = Vec::new();
        if self.hierarchy.is_none() {
            missing.push(InputKind::Hierarchy);
        }
        if self.performance.is_none() {
            missing.push(InputKind::Performance);
        }
        if self.target.is_none() {
            missing.push(InputKind::Target);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn to_committed(&self, period: Period) -> Result<CommittedInputs> {
        match (&self.hierarchy, &self.performance, &self.target) {
            (Some(hierarchy), Some(performance), Some(target)) => Ok(CommittedInputs {
                hierarchy: hierarchy.clone(),
                performance: performance.clone(),
                target: target.clone(),
            }),
            _ => Err(SalesPerformanceError::IncompleteInput {
                period: period.to_string(),
                missing: self.missing().iter().map(|k| k.to_string()).collect(),
            }),
        }
    }
}

/// The complete triple of sheets a snapshot was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CommittedInputs {
    pub hierarchy: RawTable,
    pub performance: RawTable,
    pub target: RawTable,
}

/// Dirty-data conditions that were tolerated while building a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IngestionDiagnostics {
    #[schemars(description = "1-based sheet row numbers of hierarchy rows missing a senior, regional or owner id")]
    pub skipped_hierarchy_rows: Vec<usize>,
    #[schemars(description = "1-based sheet row numbers of performance rows without a customer code")]
    pub skipped_performance_rows: Vec<usize>,
    #[schemars(description = "1-based sheet row numbers of target rows without an id")]
    pub skipped_target_rows: Vec<usize>,
    #[schemars(description = "Attribution ids referenced by customers but absent from the hierarchy sheet")]
    pub unknown_owner_ids: Vec<String>,
    #[schemars(description = "Customer codes that appeared on more than one performance row")]
    pub merged_duplicate_codes: Vec<String>,
    #[schemars(description = "Numeric cells that could not be parsed and were read as zero")]
    pub malformed_cells: usize,
}

impl IngestionDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.skipped_hierarchy_rows.is_empty()
            && self.skipped_performance_rows.is_empty()
            && self.skipped_target_rows.is_empty()
            && self.unknown_owner_ids.is_empty()
            && self.merged_duplicate_codes.is_empty()
            && self.malformed_cells == 0
    }
}

/// One committed month: customers, the aggregated tree and the sheets behind them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Snapshot {
    pub period: Period,
    pub customers: Vec<CustomerRecord>,
    pub tree: PerformanceNode,
    pub raw_inputs: CommittedInputs,
    #[serde(default)]
    #[schemars(
        description = "True once the tree structure was edited by hand. Reprocessing then keeps the edited structure instead of rebuilding it from the hierarchy sheet."
    )]
    pub hierarchy_edited: bool,
    #[serde(default)]
    pub diagnostics: IngestionDiagnostics,
}

impl Snapshot {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Snapshot)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesPortalConfig {
    #[serde(default = "default_admin_id")]
    pub admin_id: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    #[serde(default = "default_admin_region")]
    pub admin_region: String,
    #[serde(default = "default_unknown_name")]
    #[schemars(description = "Placeholder name for attribution ids missing from the hierarchy sheet")]
    pub unknown_name: String,
}

fn default_admin_id() -> String {
    "admin".to_string()
}

fn default_admin_name() -> String {
    "System Admin".to_string()
}

fn default_admin_region() -> String {
    "Thailand".to_string()
}

fn default_unknown_name() -> String {
    "Unknown".to_string()
}

impl Default for SalesPortalConfig {
    fn default() -> Self {
        Self {
            admin_id: default_admin_id(),
            admin_name: default_admin_name(),
            admin_region: default_admin_region(),
            unknown_name: default_unknown_name(),
        }
    }
}

impl SalesPortalConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin_id.trim().is_empty() {
            return Err(SalesPerformanceError::InvalidConfig(
                "admin_id must not be empty".to_string(),
            ));
        }
        if self.admin_name.trim().is_empty() {
            return Err(SalesPerformanceError::InvalidConfig(
                "admin_name must not be empty".to_string(),
            ));
        }
        if self.unknown_name.trim().is_empty() {
            return Err(SalesPerformanceError::InvalidConfig(
                "unknown_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn root_node(&self) -> PerformanceNode {
        PerformanceNode::new(
            self.admin_id.clone(),
            self.admin_name.clone(),
            Role::Admin,
            self.admin_region.clone(),
        )
    }
}
