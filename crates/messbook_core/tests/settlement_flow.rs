use messbook_core::db::open_db_in_memory;
use messbook_core::{
    settlement_for, ActorId, AttendanceService, BalanceStatus, EngineContext, EntryDraft,
    ExpenseCategory, ExpenseItem, LedgerService, Member, MonthKey, Roster, SettlementWatch,
    SqliteAttendanceRepository, SqliteExpenseRepository, StaticIdentityResolver,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

const RAHIM: &str = "rahim@mess";
const KARIM: &str = "karim@mess";

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

fn context() -> Arc<EngineContext> {
    let roster = Roster::new(vec![
        Member::new(1, "Rahim", 1, 15),
        Member::new(2, "Karim", 16, 30),
    ])
    .unwrap();
    let resolver = StaticIdentityResolver::default()
        .with_identity(RAHIM, 1)
        .with_identity(KARIM, 2);
    Arc::new(EngineContext::new(roster, resolver))
}

fn september() -> MonthKey {
    MonthKey::new(2026, 9).unwrap()
}

fn draft(attributed_id: Option<u32>, items: &[(&str, &str)]) -> EntryDraft {
    dated_draft("2026-09-02", attributed_id, items)
}

fn dated_draft(date: &str, attributed_id: Option<u32>, items: &[(&str, &str)]) -> EntryDraft {
    EntryDraft {
        date: date.to_string(),
        attributed_id,
        items: items
            .iter()
            .map(|(name, price)| ExpenseItem::new(*name, dec(price)))
            .collect(),
        category: ExpenseCategory::Regular,
    }
}

#[test]
fn empty_ledger_with_full_attendance_settles_to_zero() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );

    let report = settlement_for(&ledger, &attendance, september()).unwrap();
    assert_eq!(report.total_bazaar_cost, Decimal::ZERO);
    assert_eq!(report.grand_total_meals, 60);
    assert_eq!(report.meal_rate, Decimal::ZERO);
    assert!(report
        .members
        .iter()
        .all(|row| row.balance == Decimal::ZERO && row.total_meals == 30));
}

#[test]
fn direct_purchase_credits_payer_against_meal_share() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );

    ledger
        .add_entry(
            draft(None, &[("Rice", "100"), ("Oil", "50")]),
            &ActorId::new(RAHIM),
        )
        .unwrap();

    let report = settlement_for(&ledger, &attendance, september()).unwrap();
    assert_eq!(report.total_bazaar_cost, dec("150"));
    assert_eq!(report.meal_rate, dec("2.5"));

    let rahim = report.member(1).unwrap();
    assert_eq!(rahim.meal_cost, dec("75"));
    assert_eq!(rahim.balance, dec("75"));
    assert_eq!(rahim.status(), BalanceStatus::Receives);
    let karim = report.member(2).unwrap();
    assert_eq!(karim.balance, dec("-75"));
    assert_eq!(karim.status(), BalanceStatus::Owes);
    assert_eq!(report.balance_sum(), Decimal::ZERO);
}

#[test]
fn proxy_purchase_credits_only_the_payer() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );

    ledger
        .add_entry(draft(Some(1), &[("Eggs", "60")]), &ActorId::new(KARIM))
        .unwrap();

    let report = settlement_for(&ledger, &attendance, september()).unwrap();
    let rahim = report.member(1).unwrap();
    let karim = report.member(2).unwrap();
    assert_eq!(karim.total_spent, dec("60"));
    assert_eq!(rahim.total_spent, Decimal::ZERO);
    assert_eq!(rahim.attributed_spent, dec("60"));
    assert_eq!(report.meal_rate, Decimal::ONE);
    assert_eq!(karim.balance, dec("30"));
    assert_eq!(rahim.balance, dec("-30"));
}

#[test]
fn absences_shift_the_meal_split() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    attendance.get_or_init_grid(september()).unwrap();
    for day in 1..=10 {
        attendance.toggle_cell(september(), day, 2).unwrap();
    }
    ledger
        .add_entry(draft(None, &[("Fish", "500")]), &ActorId::new(RAHIM))
        .unwrap();

    let report = settlement_for(&ledger, &attendance, september()).unwrap();
    assert_eq!(report.grand_total_meals, 50);
    assert_eq!(report.meal_rate, dec("10"));
    assert_eq!(report.member(1).unwrap().balance, dec("200"));
    assert_eq!(report.member(2).unwrap().meal_cost, dec("200"));
    assert_eq!(report.member(2).unwrap().balance, dec("-200"));
}

#[test]
fn each_month_settles_only_its_own_purchases() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    ledger
        .add_entry(
            dated_draft("2026-09-14", None, &[("Fish", "600")]),
            &ActorId::new(RAHIM),
        )
        .unwrap();
    ledger
        .add_entry(
            dated_draft("2026-10-03", None, &[("Rice", "62")]),
            &ActorId::new(KARIM),
        )
        .unwrap();

    let september_report = settlement_for(&ledger, &attendance, september()).unwrap();
    assert_eq!(september_report.total_bazaar_cost, dec("600"));
    assert_eq!(september_report.meal_rate, dec("10"));
    assert_eq!(september_report.member(1).unwrap().balance, dec("300"));
    assert_eq!(september_report.member(2).unwrap().balance, dec("-300"));

    let october = MonthKey::new(2026, 10).unwrap();
    let october_report = settlement_for(&ledger, &attendance, october).unwrap();
    assert_eq!(october_report.total_bazaar_cost, dec("62"));
    assert_eq!(october_report.grand_total_meals, 62);
    assert_eq!(october_report.meal_rate, Decimal::ONE);
    assert_eq!(october_report.member(1).unwrap().balance, dec("-31"));
    assert_eq!(october_report.member(2).unwrap().balance, dec("31"));

    let empty_month = MonthKey::new(2026, 11).unwrap();
    let november_report = settlement_for(&ledger, &attendance, empty_month).unwrap();
    assert_eq!(november_report.total_bazaar_cost, Decimal::ZERO);
    assert!(november_report
        .members
        .iter()
        .all(|row| row.balance == Decimal::ZERO));
}

#[test]
fn tampered_subtotal_is_used_as_stored() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    ledger
        .add_entry(draft(None, &[("Rice", "100")]), &ActorId::new(RAHIM))
        .unwrap();
    conn.execute("UPDATE expense_entries SET subtotal = '120';", [])
        .unwrap();

    let report = settlement_for(&ledger, &attendance, september()).unwrap();
    assert_eq!(report.total_bazaar_cost, dec("120"));
    assert_eq!(report.meal_rate, dec("2"));
}

#[test]
fn settlement_watch_goes_stale_on_every_committed_change() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let watch = Arc::new(SettlementWatch::new());
    let subscription = ctx.feed().subscribe(watch.clone());

    let first = watch
        .refresh(&ledger, &attendance, september())
        .unwrap()
        .expect("initial refresh computes a report");
    assert_eq!(first.total_bazaar_cost, Decimal::ZERO);
    // Grid initialization during the refresh is itself a change.
    assert!(watch.is_stale());
    watch.refresh(&ledger, &attendance, september()).unwrap();
    assert!(watch
        .refresh(&ledger, &attendance, september())
        .unwrap()
        .is_none());

    ledger
        .add_entry(draft(None, &[("Rice", "100")]), &ActorId::new(RAHIM))
        .unwrap();
    assert!(watch.is_stale());
    assert_eq!(watch.last_revision(), ctx.feed().revision());
    let updated = watch
        .refresh(&ledger, &attendance, september())
        .unwrap()
        .unwrap();
    assert_eq!(updated.total_bazaar_cost, dec("100"));

    attendance.toggle_cell(september(), 1, 1).unwrap();
    assert!(watch.is_stale());

    assert!(ctx.feed().unsubscribe(subscription));
    watch.refresh(&ledger, &attendance, september()).unwrap();
    attendance.toggle_cell(september(), 1, 1).unwrap();
    assert!(!watch.is_stale());
}
