use anyhow::Result;
use sales_performance_builder::*;
use serde_json::{json, Value};

fn csv_to_table(text: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = record
            .iter()
            .map(|field| match field.parse::<f64>() {
                Ok(n) => json!(n),
                Err(_) => json!(field),
            })
            .collect();
        table.push(row);
    }
    Ok(table)
}

const HIERARCHY_CSV: &str = "\
ownerName,ownerId,ownerRegion,regionalName,regionalId,regionalRegion,seniorName,seniorId,seniorRegion
Somchai SME,SME001,BKK_E1,Artit RSM,RSM001,BKK_EAST,Akarapol SR,SRSM001,METRO
Jane SME,SME002,BKK_E2,Artit RSM,RSM001,BKK_EAST,Akarapol SR,SRSM001,METRO
Niran SME,SME003,CNX_1,Ploy RSM,RSM002,NORTH,Akarapol SR,SRSM001,METRO
Kanya SME,SME004,HKT_1,Mali RSM,RSM003,SOUTH,Dao SR,SRSM002,SOUTH
Orphan SME,SME005,BKK_E1,Artit RSM,RSM001,BKK_EAST,,,
";

const TARGET_CSV: &str = "\
type,id,targetRevenue
SME,SME001,300000
SME,SME002,100000
SME,SME003,50000
SME,SME004,80000
RSM,RSM001,450000
RSM,RSM002,10000
SR_RSM,SRSM001,0
";

/// code, name, mobile, ownerId, regionalId, seniorId, weight, status, daily rev, daily con
fn performance_line(
    code: &str,
    owner: &str,
    regional: &str,
    senior: &str,
    weight: f64,
    status: &str,
    daily_rev: f64,
    daily_con: f64,
) -> String {
    let mut fields = vec![
        code.to_string(),
        format!("{} Co", code),
        "0812345678".to_string(),
        owner.to_string(),
        regional.to_string(),
        senior.to_string(),
        weight.to_string(),
        status.to_string(),
    ];
    fields.extend((0..31).map(|_| daily_rev.to_string()));
    fields.extend((0..31).map(|_| daily_con.to_string()));
    fields.join(",")
}

fn performance_csv(lines: &[String]) -> String {
    let mut header: Vec<String> = [
        "code",
        "name",
        "mobile",
        "ownerId",
        "regionalId",
        "seniorId",
        "weight",
        "status",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    header.extend((1..=31).map(|d| format!("rev{}", d)));
    header.extend((1..=31).map(|d| format!("con{}", d)));

    let mut text = header.join(",");
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

fn december_performance() -> String {
    performance_csv(&[
        performance_line(
            "CUST001",
            "SME001",
            "RSM001",
            "SRSM001",
            1200.0,
            "Existing",
            5000.0,
            80.0,
        ),
        performance_line("CUST002", "SME001", "RSM001", "SRSM001", 450.0, "New", 2800.0, 40.0),
        performance_line("CUST003", "SME002", "RSM001", "SRSM001", 800.0, "Existing", 900.0, 0.0),
        performance_line("CUST004", "SME003", "RSM002", "SRSM001", 300.0, "Existing", 100.0, 1.0),
        performance_line("CUST005", "SME004", "RSM003", "SRSM002", 0.0, "New", 0.0, 0.0),
    ])
}

fn staged(performance: &str) -> Result<StagedInputs> {
    Ok(StagedInputs {
        hierarchy: Some(csv_to_table(HIERARCHY_CSV)?),
        performance: Some(csv_to_table(performance)?),
        target: Some(csv_to_table(TARGET_CSV)?),
    })
}

fn december() -> Period {
    Period::new("Dec", "2025").unwrap()
}

fn committed_store() -> Result<SnapshotStore> {
    let mut store = SnapshotStore::default();
    store.commit(december(), &staged(&december_performance())?)?;
    Ok(store)
}

fn attributed_revenue(node: &PerformanceNode, customers: &[CustomerRecord]) -> f64 {
    if node.role == Role::Admin {
        return customers.iter().map(|c| c.revenue).sum();
    }
    let ids = collect_ids(node);
    customers
        .iter()
        .filter(|c| {
            ids.iter().any(|id| {
                *id == c.owner_ids.account_owner_id
                    || *id == c.owner_ids.regional_manager_id
                    || *id == c.owner_ids.senior_manager_id
            })
        })
        .map(|c| c.revenue)
        .sum()
}

fn walk<'a>(node: &'a PerformanceNode, out: &mut Vec<&'a PerformanceNode>) {
    out.push(node);
    for child in &node.children {
        walk(child, out);
    }
}

#[test]
fn test_single_owner_month_and_range() -> Result<()> {
    let hierarchy = csv_to_table("h\nA,o1,R1,B,r1,R1,C,s1,R1\n")?;
    let performance = csv_to_table(&performance_csv(&[performance_line(
        "C1", "o1", "r1", "s1", 50.0, "Existing", 100.0, 2.0,
    )]))?;
    let target = csv_to_table("type,id,target\nAccountOwner,o1,2000\n")?;

    let mut store = SnapshotStore::default();
    store.stage(InputKind::Hierarchy, hierarchy.clone());
    store.stage(InputKind::Performance, performance);
    store.stage(InputKind::Target, target.clone());
    let jan = Period::new("Jan", "2026")?;
    let snapshot = store.commit_staged(jan)?;

    let owner = find_node(&snapshot.tree, "o1").expect("owner o1");
    assert_eq!(owner.revenue.actual, 3100.0);
    assert_eq!(owner.consignment.actual, 62.0);
    assert_eq!(owner.revenue.target, 2000.0);
    assert!((owner.revenue.progress_percent - 155.0).abs() < 0.01);
    assert!((owner.yields.revenue_per_item - 50.0).abs() < 0.01);
    assert!((owner.yields.weight_per_item - 50.0 / 62.0).abs() < 1e-9);

    let outcome = store.view(jan, "o1", DayRange::new(1, 10)?)?;
    let view = outcome.view().expect("view for committed period");
    assert_eq!(view.metrics.revenue, 1000.0);
    assert_eq!(view.metrics.consignment, 20.0);
    assert!((view.metrics.yields.revenue_per_item - 50.0).abs() < 0.01);
    assert_eq!(view.daily_series.len(), 10);

    let february = csv_to_table(&performance_csv(&[performance_line(
        "C1",
        "o1",
        "r1",
        "s1",
        50.0,
        "Existing",
        2000.0 / 31.0,
        2.0,
    )]))?;
    let feb = Period::new("Feb", "2026")?;
    store.commit(
        feb,
        &StagedInputs {
            hierarchy: Some(hierarchy),
            performance: Some(february),
            target: Some(target),
        },
    )?;
    let customer = &store.find(feb).expect("february snapshot").customers[0];
    assert_eq!(customer.prior_revenue, 3100.0);
    assert!((customer.month_over_month_change_percent + 35.48).abs() < 0.01);
    Ok(())
}

#[test]
fn test_hierarchy_shape_and_skipped_rows() -> Result<()> {
    let store = committed_store()?;
    let snapshot = store.find(december()).expect("december");

    assert_eq!(snapshot.tree.children.len(), 2);
    assert_eq!(snapshot.tree.children[0].id, "SRSM001");
    assert_eq!(snapshot.tree.children[0].children.len(), 2);
    assert!(find_node(&snapshot.tree, "SME005").is_none());
    assert_eq!(snapshot.diagnostics.skipped_hierarchy_rows, vec![6]);
    assert_eq!(
        find_parent(&snapshot.tree, "SME002").map(|n| n.id.as_str()),
        Some("RSM001")
    );
    Ok(())
}

#[test]
fn test_owner_without_regional_id_can_view() -> Result<()> {
    let mut store = SnapshotStore::default();
    store.commit(
        december(),
        &StagedInputs {
            hierarchy: Some(csv_to_table("h\nA,o1,R1,B,,R1,C,s1,R1\n")?),
            performance: Some(csv_to_table(&performance_csv(&[performance_line(
                "C1", "o1", "", "s1", 50.0, "Existing", 100.0, 2.0,
            )]))?),
            target: Some(csv_to_table("type,id,target\nAccountOwner,o1,2000\n")?),
        },
    )?;

    let snapshot = store.find(december()).expect("december");
    assert!(snapshot.diagnostics.skipped_hierarchy_rows.is_empty());
    assert_eq!(snapshot.tree.children.len(), 1);
    assert_eq!(find_parent(&snapshot.tree, "o1").map(|n| n.id.as_str()), Some(""));

    let outcome = store.view(december(), "o1", DayRange::full_month())?;
    let view = outcome.view().expect("view for o1");
    assert_eq!(view.metrics.revenue, 3100.0);
    assert_eq!(view.metrics.target, 2000.0);
    Ok(())
}

#[test]
fn test_aggregation_matches_attributed_customers() -> Result<()> {
    let store = committed_store()?;
    let snapshot = store.find(december()).expect("december");

    let mut nodes = Vec::new();
    walk(&snapshot.tree, &mut nodes);
    assert_eq!(nodes.len(), 10);

    for node in nodes {
        let expected = attributed_revenue(node, &snapshot.customers);
        assert!(
            (node.revenue.actual - expected).abs() < 0.01,
            "{} should have revenue {}, got {}",
            node.id,
            expected,
            node.revenue.actual
        );

        if !node.children.is_empty() {
            let children_target: f64 = node.children.iter().map(|c| c.revenue.target).sum();
            assert!(node.revenue.target + 1e-9 >= children_target);
        }

        if node.consignment.actual > 0.0 {
            let product = node.yields.revenue_per_item * node.consignment.actual;
            assert!((product - node.revenue.actual).abs() < 0.01);
        } else {
            assert_eq!(node.yields.revenue_per_item, 0.0);
        }
    }
    Ok(())
}

#[test]
fn test_target_rollup_values() -> Result<()> {
    let store = committed_store()?;
    let tree = &store.find(december()).expect("december").tree;

    // RSM001 declares more than its owners (400k), RSM002 declares less than its owner.
    assert_eq!(find_node(tree, "RSM001").unwrap().revenue.target, 450_000.0);
    assert_eq!(find_node(tree, "RSM002").unwrap().revenue.target, 50_000.0);
    assert_eq!(find_node(tree, "SRSM001").unwrap().revenue.target, 500_000.0);
    assert_eq!(find_node(tree, "RSM003").unwrap().revenue.target, 80_000.0);
    assert_eq!(tree.revenue.target, 580_000.0);
    Ok(())
}

#[test]
fn test_customer_stats() -> Result<()> {
    let store = committed_store()?;
    let tree = &store.find(december()).expect("december").tree;

    let stats = tree.customer_stats;
    assert_eq!(stats.total_senders, 5);
    assert_eq!(stats.active_senders, 3);
    assert_eq!(stats.new_customers, 2);
    assert_eq!(stats.existing_customers, 3);

    let sme001 = find_node(tree, "SME001").unwrap().customer_stats;
    assert_eq!(sme001.total_senders, 2);
    assert_eq!(sme001.new_customers, 1);
    Ok(())
}

#[test]
fn test_full_range_view_matches_snapshot() -> Result<()> {
    let store = committed_store()?;
    let snapshot = store.find(december()).expect("december");

    for viewer in ["admin", "SRSM001", "RSM001", "SME002"] {
        let outcome = store.view(december(), viewer, DayRange::full_month())?;
        let view = outcome.view().expect("ready view");
        let node = find_node(&snapshot.tree, viewer).unwrap();
        assert!((view.metrics.revenue - node.revenue.actual).abs() < 1e-6);
        assert!((view.metrics.consignment - node.consignment.actual).abs() < 1e-6);
        assert_eq!(view.metrics.target, node.revenue.target);
        assert_eq!(view.viewer.role, node.role);
    }
    Ok(())
}

#[test]
fn test_role_scoped_views() -> Result<()> {
    let store = committed_store()?;
    let range = DayRange::new(1, 15)?;

    let admin = store.view(december(), "admin", range)?;
    assert_eq!(admin.view().unwrap().customers.len(), 5);
    assert_eq!(admin.view().unwrap().subordinates.len(), 2);

    let senior = store.view(december(), "SRSM001", range)?;
    assert_eq!(senior.view().unwrap().customers.len(), 4);

    let regional = store.view(december(), "RSM001", range)?;
    let regional = regional.view().unwrap();
    assert_eq!(regional.customers.len(), 3);
    assert_eq!(regional.customers[0].code, "CUST001");
    assert_eq!(regional.customers[0].revenue, 5000.0 * 15.0);
    assert_eq!(regional.subordinates.len(), 2);
    assert_eq!(regional.subordinates[0].metrics.revenue, (5000.0 + 2800.0) * 15.0);

    let owner = store.view(december(), "SME002", range)?;
    let owner = owner.view().unwrap();
    assert_eq!(owner.customers.len(), 1);
    assert_eq!(owner.metrics.revenue, 900.0 * 15.0);
    assert_eq!(owner.metrics.consignment, 0.0);
    assert_eq!(owner.metrics.yields.revenue_per_item, 0.0);
    assert_eq!(owner.metrics.weight, 800.0);
    assert!((owner.metrics.yields.revenue_per_weight - 900.0 * 15.0 / 800.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_view_daily_series_and_query() -> Result<()> {
    let store = committed_store()?;
    let query = CustomerQuery::default()
        .search("cust00")
        .sort_by(CustomerSortKey::Code, SortDirection::Ascending)
        .limit(2);

    let outcome = store.view_with_query(december(), "RSM001", DayRange::new(10, 12)?, &query)?;
    let view = outcome.view().unwrap();

    assert_eq!(view.daily_series.len(), 3);
    assert_eq!(view.daily_series[0].day, 10);
    assert_eq!(view.daily_series[0].revenue, 5000.0 + 2800.0 + 900.0);
    assert_eq!(view.daily_series[0].consignment_count, 120.0);

    assert_eq!(view.customers.len(), 2);
    assert_eq!(view.customers[0].code, "CUST001");
    assert_eq!(view.customers[1].code, "CUST002");
    // Metrics cover every visible customer, not just the page.
    assert_eq!(view.metrics.customer_stats.total_senders, 3);
    Ok(())
}

#[test]
fn test_missing_period_and_unknown_viewer() -> Result<()> {
    let store = committed_store()?;

    let outcome = store.view(Period::new("Nov", "2025")?, "admin", DayRange::full_month())?;
    assert!(matches!(outcome, ViewOutcome::NoData { .. }));

    let err = store
        .view(december(), "SME999", DayRange::full_month())
        .unwrap_err();
    assert!(matches!(err, SalesPerformanceError::UserNotFound(id) if id == "SME999"));
    Ok(())
}

#[test]
fn test_month_over_month_across_gap() -> Result<()> {
    let mut store = SnapshotStore::default();
    let jan = Period::new("Jan", "2026")?;
    let mar = Period::new("Mar", "2026")?;

    store.commit(mar, &staged(&december_performance())?)?;
    for customer in &store.find(mar).unwrap().customers {
        assert_eq!(customer.month_over_month_change_percent, 0.0);
        assert_eq!(customer.prior_revenue, 0.0);
    }

    let january = performance_csv(&[performance_line(
        "CUST001", "SME001", "RSM001", "SRSM001", 1000.0, "Existing", 4000.0, 70.0,
    )]);
    store.commit(jan, &staged(&january)?)?;

    let march = store.find(mar).unwrap();
    let cust001 = march.customers.iter().find(|c| c.code == "CUST001").unwrap();
    assert_eq!(cust001.prior_revenue, 124_000.0);
    assert_eq!(cust001.prior_weight, 1000.0);
    assert!((cust001.month_over_month_change_percent - 25.0).abs() < 1e-9);

    let cust002 = march.customers.iter().find(|c| c.code == "CUST002").unwrap();
    assert_eq!(cust002.month_over_month_change_percent, 0.0);
    Ok(())
}

#[test]
fn test_root_protection_through_store() -> Result<()> {
    let mut store = committed_store()?;
    let before = store.find(december()).unwrap().tree.clone();

    let err = store
        .update_hierarchy(december(), &HierarchyEdit::Remove { id: "admin".to_string() })
        .unwrap_err();
    assert!(matches!(err, SalesPerformanceError::RootDeletion(_)));
    assert_eq!(store.find(december()).unwrap().tree, before);
    Ok(())
}

#[test]
fn test_hierarchy_edit_keeps_customer_attribution() -> Result<()> {
    let mut store = committed_store()?;

    store.update_hierarchy(
        december(),
        &HierarchyEdit::Move {
            id: "SME003".to_string(),
            new_parent_id: "RSM001".to_string(),
        },
    )?;
    let snapshot = store.find(december()).unwrap();

    // Customers stay credited to their ingestion-time regional manager.
    let rsm002 = find_node(&snapshot.tree, "RSM002").unwrap();
    assert_eq!(rsm002.revenue.actual, 3100.0);
    assert!(rsm002.children.is_empty());
    assert_eq!(rsm002.revenue.target, 10_000.0);

    let cust004 = snapshot.customers.iter().find(|c| c.code == "CUST004").unwrap();
    assert_eq!(cust004.owner_ids.regional_manager_id, "RSM002");
    assert_eq!(find_node(&snapshot.tree, "SME003").unwrap().revenue.actual, 3100.0);
    Ok(())
}

#[test]
fn test_dirty_sheet_is_tolerated() -> Result<()> {
    let mut lines = vec![
        performance_line("CUST001", "SME001", "RSM001", "SRSM001", 10.0, "Existing", 10.0, 1.0),
        performance_line("CUST001", "SME001", "RSM001", "SRSM001", 5.0, "Existing", 1.0, 1.0),
        performance_line("CUST009", "GHOST", "RSM001", "SRSM001", 1.0, "New", 1.0, 1.0),
    ];
    lines.push(lines[2].replacen("CUST009", "", 1));
    let mut text = performance_csv(&lines);
    text = text.replacen(",10,1,", ",oops,1,", 1);

    let mut table = csv_to_table(&text)?;
    table.push(vec![Value::Null; 3]);

    let mut store = SnapshotStore::default();
    store.commit(
        december(),
        &StagedInputs {
            hierarchy: Some(csv_to_table(HIERARCHY_CSV)?),
            performance: Some(table),
            target: Some(csv_to_table(TARGET_CSV)?),
        },
    )?;

    let snapshot = store.find(december()).unwrap();
    let diagnostics = &snapshot.diagnostics;
    assert_eq!(diagnostics.merged_duplicate_codes, vec!["CUST001".to_string()]);
    assert_eq!(diagnostics.unknown_owner_ids, vec!["GHOST".to_string()]);
    assert_eq!(diagnostics.skipped_performance_rows, vec![5]);
    assert_eq!(diagnostics.malformed_cells, 1);

    assert_eq!(snapshot.customers.len(), 2);
    let cust001 = &snapshot.customers[0];
    assert_eq!(cust001.revenue, 11.0 * 31.0 - 10.0);
    assert_eq!(cust001.weight, 15.0);
    let ghost = &snapshot.customers[1];
    assert_eq!(ghost.owner_ids.account_owner_name, "Unknown");
    Ok(())
}
