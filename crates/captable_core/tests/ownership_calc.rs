use captable_core::calc::summary::company_summary;
use captable_core::{
    effective_price_per_share, fully_diluted_shares, holder_ownership, ownership_by_holder,
    percentage, post_money_valuation, total_issued_shares, Allocation, AllocationType, CapTable,
    HolderId, Percent, Round, RoundTerms,
};

fn founders_table() -> (CapTable, HolderId, HolderId) {
    let mut table = CapTable::new("Acme");
    let alice = table.ensure_holder("Alice").unwrap();
    let bob = table.ensure_holder("Bob").unwrap();

    let mut common = Round::new("Founders", RoundTerms::Common);
    common
        .allocations
        .push(Allocation::new(alice, 6_000_000, AllocationType::Common));
    common
        .allocations
        .push(Allocation::new(bob, 4_000_000, AllocationType::Common));
    table.rounds.push(common);
    (table, alice, bob)
}

fn safe_round(cap: f64, investor: HolderId, amount: f64) -> Round {
    let mut safe = Round::new(
        "Pre-seed SAFE",
        RoundTerms::Safe {
            valuation_cap: cap,
            target_investment: None,
            conversion: None,
        },
    );
    safe.allocations.push(Allocation::investing(
        investor,
        amount,
        AllocationType::Preferred,
    ));
    safe
}

#[test]
fn empty_table_has_no_shares_and_no_price() {
    let table = CapTable::new("Empty");

    assert_eq!(total_issued_shares(&table), 0);
    assert_eq!(fully_diluted_shares(&table), 0);
    assert!(ownership_by_holder(&table).is_empty());
    assert_eq!(effective_price_per_share(&table), None);
    assert_eq!(post_money_valuation(&table), None);
}

#[test]
fn zero_over_zero_percentage_is_not_available() {
    assert_eq!(percentage(0.0, 0.0), Percent::NotAvailable);
    assert_eq!(percentage(0.0, 0.0).to_string(), "N/A");
}

#[test]
fn issued_shares_equal_sum_of_holder_shares() {
    let (mut table, alice, _) = founders_table();
    let investor = table.ensure_holder("Investor").unwrap();
    table
        .rounds
        .push(safe_round(5_000_000.0, investor, 250_000.0));

    let rows = ownership_by_holder(&table);
    let held: u64 = rows.iter().map(|row| row.shares).sum();
    assert_eq!(held, total_issued_shares(&table));
    assert_eq!(total_issued_shares(&table), 10_000_000);
    assert_eq!(rows[0].holder_id, alice);

    let percent_sum: f64 = rows.iter().filter_map(|row| row.percent.value()).sum();
    assert!((percent_sum - 100.0).abs() < 1e-6);
}

#[test]
fn holders_are_merged_across_rounds_by_id() {
    let (mut table, alice, _) = founders_table();
    let mut seed = Round::new(
        "Seed",
        RoundTerms::Priced {
            price_per_share: 1.0,
            money_raised: None,
        },
    );
    seed.allocations
        .push(Allocation::new(alice, 1_000_000, AllocationType::Preferred));
    table.rounds.push(seed);

    let rows = ownership_by_holder(&table);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].shares, 7_000_000);

    let alice_percent = holder_ownership(&table, alice).value().unwrap();
    assert!((alice_percent - 7_000_000.0 / 11_000_000.0 * 100.0).abs() < 1e-9);
}

#[test]
fn fully_diluted_includes_pool_headroom_and_safe_estimates() {
    let (mut table, alice, _) = founders_table();
    let employee = table.ensure_holder("Employee").unwrap();
    let investor = table.ensure_holder("Investor").unwrap();

    let mut pool = Round::new(
        "Option pool",
        RoundTerms::EquityPool {
            authorized_size: 1_000_000,
        },
    );
    pool.allocations
        .push(Allocation::new(employee, 100_000, AllocationType::Option));
    table.rounds.push(pool);
    table
        .rounds
        .push(safe_round(11_000_000.0, investor, 550_000.0));

    // Base is 10M issued common plus the 1M pool authorization.
    assert_eq!(fully_diluted_shares(&table), 10_000_000 + 1_000_000 + 550_000);
    assert_eq!(total_issued_shares(&table), 10_100_000);
    assert!(fully_diluted_shares(&table) >= total_issued_shares(&table));
    assert!(holder_ownership(&table, alice).is_available());
}

#[test]
fn effective_price_prefers_latest_dated_priced_round() {
    let (mut table, alice, _) = founders_table();
    let mut series_a = Round::new(
        "Series A",
        RoundTerms::Priced {
            price_per_share: 2.5,
            money_raised: None,
        },
    );
    series_a.date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1);
    series_a
        .allocations
        .push(Allocation::new(alice, 100, AllocationType::Preferred));
    let mut seed = Round::new(
        "Seed",
        RoundTerms::Priced {
            price_per_share: 1.0,
            money_raised: None,
        },
    );
    seed.date = chrono::NaiveDate::from_ymd_opt(2023, 1, 15);
    seed.allocations
        .push(Allocation::new(alice, 100, AllocationType::Preferred));
    table.rounds.push(series_a);
    table.rounds.push(seed);

    assert_eq!(effective_price_per_share(&table), Some(2.5));
    let expected = 2.5 * fully_diluted_shares(&table) as f64;
    assert_eq!(post_money_valuation(&table), Some(expected));
}

#[test]
fn effective_price_falls_back_to_highest_safe_cap() {
    let (mut table, _, _) = founders_table();
    let investor = table.ensure_holder("Investor").unwrap();
    table
        .rounds
        .push(safe_round(5_000_000.0, investor, 100_000.0));
    table
        .rounds
        .push(safe_round(8_000_000.0, investor, 100_000.0));

    assert_eq!(effective_price_per_share(&table), Some(0.8));
}

#[test]
fn summary_flags_over_allocation_and_suggests_headroom() {
    let (mut table, _, _) = founders_table();
    table.authorized_shares = 9_000_000;

    let summary = company_summary(&table, 1.2);
    assert!(summary.over_allocated);
    assert_eq!(summary.unallocated_shares, 0);
    assert_eq!(summary.suggested_authorized_shares, 12_000_000);
    assert_eq!(summary.holder_count, 2);

    table.authorized_shares = 15_000_000;
    let summary = company_summary(&table, 1.2);
    assert!(!summary.over_allocated);
    assert_eq!(summary.unallocated_shares, 5_000_000);
}

#[test]
fn summary_reports_pool_utilization() {
    let (mut table, _, _) = founders_table();
    let employee = table.ensure_holder("Employee").unwrap();
    let mut pool = Round::new(
        "Option pool",
        RoundTerms::EquityPool {
            authorized_size: 1_000,
        },
    );
    pool.allocations
        .push(Allocation::new(employee, 250, AllocationType::Option));
    table.rounds.push(pool);

    let summary = company_summary(&table, 1.2);
    assert_eq!(summary.pools.len(), 1);
    assert_eq!(summary.pools[0].unallocated, 750);
    assert_eq!(summary.pools[0].utilization, Percent::Value(25.0));
}
