use crate::schema::{CustomerStatus, RawRow, Role, DAYS_PER_SERIES};
use crate::utils::{cell_at, cell_to_string, is_malformed_number, number_or_zero};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const HIERARCHY_COLUMNS: usize = 9;
pub const PERFORMANCE_FIXED_COLUMNS: usize = 8;
pub const PERFORMANCE_COLUMNS: usize = PERFORMANCE_FIXED_COLUMNS + 2 * DAYS_PER_SERIES;
pub const TARGET_COLUMNS: usize = 3;

/// `[ownerName, ownerId, ownerRegion, regionalName, regionalId, regionalRegion,
/// seniorName, seniorId, seniorRegion]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyRow {
    /// 1-based row number in the sheet, header included.
    pub line: usize,
    pub owner_name: String,
    pub owner_id: String,
    pub owner_region: String,
    pub regional_name: String,
    pub regional_id: String,
    pub regional_region: String,
    pub senior_name: String,
    pub senior_id: String,
    pub senior_region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub line: usize,
    pub code: String,
    pub name: String,
    pub mobile: Option<String>,
    pub owner_id: String,
    pub regional_id: String,
    pub senior_id: String,
    pub weight: f64,
    pub status: CustomerStatus,
    /// Index 0 is day 1.
    pub daily_revenue: Vec<f64>,
    pub daily_consignment: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRow {
    pub line: usize,
    pub role: Option<Role>,
    pub id: String,
    pub target_revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable<T> {
    pub rows: Vec<T>,
    pub skipped_rows: Vec<usize>,
    pub malformed_cells: usize,
}

impl<T> Default for ParsedTable<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped_rows: Vec::new(),
            malformed_cells: 0,
        }
    }
}

fn is_blank_row(row: &RawRow) -> bool {
    row.iter().all(|cell| cell_to_string(cell).is_empty())
}

/// Header rows are dropped and entirely blank rows are ignored; yields the
/// 1-based sheet line number with each row.
fn data_rows(table: &[RawRow]) -> impl Iterator<Item = (usize, &RawRow)> {
    table
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| !is_blank_row(row))
        .map(|(idx, row)| (idx + 1, row))
}

fn read_number(row: &[Value], index: usize, malformed: &mut usize) -> f64 {
    let cell = cell_at(row, index);
    if is_malformed_number(cell) {
        *malformed += 1;
    }
    number_or_zero(cell)
}

/// Rows missing ids are kept here; the hierarchy builder decides what to skip.
pub fn parse_hierarchy_rows(table: &[RawRow]) -> ParsedTable<HierarchyRow> {
    let mut parsed = ParsedTable::default();

    for (line, row) in data_rows(table) {
        let text = |i: usize| cell_to_string(cell_at(row, i));
        parsed.rows.push(HierarchyRow {
            line,
            owner_name: text(0),
            owner_id: text(1),
            owner_region: text(2),
            regional_name: text(3),
            regional_id: text(4),
            regional_region: text(5),
            senior_name: text(6),
            senior_id: text(7),
            senior_region: text(8),
        });
    }

    debug!("Parsed {} hierarchy rows", parsed.rows.len());
    parsed
}

pub fn parse_performance_rows(table: &[RawRow]) -> ParsedTable<PerformanceRow> {
    let mut parsed = ParsedTable::default();

    for (line, row) in data_rows(table) {
        let text = |i: usize| cell_to_string(cell_at(row, i));

        let code = text(0);
        if code.is_empty() {
            parsed.skipped_rows.push(line);
            continue;
        }

        let mobile = Some(text(2)).filter(|m| !m.is_empty());
        let weight = read_number(row, 6, &mut parsed.malformed_cells);

        let daily_revenue: Vec<f64> = (0..DAYS_PER_SERIES)
            .map(|d| read_number(row, PERFORMANCE_FIXED_COLUMNS + d, &mut parsed.malformed_cells))
            .collect();
        let daily_consignment: Vec<f64> = (0..DAYS_PER_SERIES)
            .map(|d| {
                read_number(
                    row,
                    PERFORMANCE_FIXED_COLUMNS + DAYS_PER_SERIES + d,
                    &mut parsed.malformed_cells,
                )
            })
            .collect();

        parsed.rows.push(PerformanceRow {
            line,
            code,
            name: text(1),
            mobile,
            owner_id: text(3),
            regional_id: text(4),
            senior_id: text(5),
            weight,
            status: CustomerStatus::parse(&text(7)),
            daily_revenue,
            daily_consignment,
        });
    }

    debug!(
        "Parsed {} performance rows ({} skipped, {} malformed cells)",
        parsed.rows.len(),
        parsed.skipped_rows.len(),
        parsed.malformed_cells
    );
    parsed
}

/// `[type, id, targetRevenue]`
pub fn parse_target_rows(table: &[RawRow]) -> ParsedTable<TargetRow> {
    let mut parsed = ParsedTable::default();

    for (line, row) in data_rows(table) {
        let id = cell_to_string(cell_at(row, 1));
        if id.is_empty() {
            parsed.skipped_rows.push(line);
            continue;
        }

        let target_revenue = read_number(row, 2, &mut parsed.malformed_cells);
        parsed.rows.push(TargetRow {
            line,
            role: Role::parse(&cell_to_string(cell_at(row, 0))),
            id,
            target_revenue,
        });
    }

    debug!("Parsed {} target rows", parsed.rows.len());
    parsed
}

/// Declared revenue targets keyed by hierarchy id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetTable {
    targets: HashMap<String, f64>,
}

impl TargetTable {
    /// Later rows for the same id replace earlier ones.
    pub fn from_rows(rows: &[TargetRow]) -> Self {
        let mut targets = HashMap::new();
        for row in rows {
            if let Some(previous) = targets.insert(row.id.clone(), row.target_revenue) {
                debug!(
                    "Target for '{}' declared again on line {} ({} replaces {})",
                    row.id, row.line, row.target_revenue, previous
                );
            }
        }
        Self { targets }
    }

    pub fn lookup(&self, id: &str) -> f64 {
        self.targets.get(id).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
