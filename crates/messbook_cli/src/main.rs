//! Settlement report entry point.
//!
//! # Responsibility
//! - Load the mess config and ledger database named on the command line.
//! - Print the month's meal rate and per-member Get/Give amounts.
//!
//! Usage: `messbook <config.json> <ledger.db> [YYYY-MM]`
//!
//! Set `MESSBOOK_LOG_DIR` (absolute path) to enable file logging.

use log::info;
use messbook_core::db::open_db;
use messbook_core::{
    default_log_level, init_logging, settlement_for, AttendanceService, BalanceStatus,
    EngineContext, LedgerService, MessConfig, MonthKey, SettlementReport,
    SqliteAttendanceRepository, SqliteExpenseRepository,
};
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "usage: messbook <config.json> <ledger.db> [YYYY-MM]";

fn main() -> ExitCode {
    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("messbook: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let (config_path, db_path, month) = match args.as_slice() {
        [config, db] => (config, db, MonthKey::current()),
        [config, db, month] => (
            config,
            db,
            month.parse::<MonthKey>().map_err(|err| err.to_string())?,
        ),
        _ => return Err(USAGE.to_string()),
    };

    if let Ok(log_dir) = std::env::var("MESSBOOK_LOG_DIR") {
        init_logging(default_log_level().as_str(), &log_dir)?;
    }

    let config = MessConfig::load(config_path).map_err(|err| err.to_string())?;
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let ctx = Arc::new(EngineContext::from_config(config));

    let ledger = LedgerService::new(
        SqliteExpenseRepository::try_new(&conn).map_err(|err| err.to_string())?,
        Arc::clone(&ctx),
    );
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).map_err(|err| err.to_string())?,
        Arc::clone(&ctx),
    );

    let report = settlement_for(&ledger, &attendance, month).map_err(|err| err.to_string())?;
    info!(
        "event=cli_report module=cli status=ok month={month} members={}",
        report.members.len()
    );
    print_report(&report);
    if let Some(manager) = ctx.manager_on_duty() {
        println!();
        println!("on duty today: {}", manager.name);
    }
    Ok(())
}

fn print_report(report: &SettlementReport) {
    println!("{}", report.month.label());
    println!("total bazaar cost: {:.2}", report.total_bazaar_cost);
    println!("total meals:       {}", report.grand_total_meals);
    println!("meal rate:         {:.2}", report.meal_rate);
    println!();
    println!(
        "{:<16} {:>6} {:>12} {:>12} {:>12}",
        "member", "meals", "given", "meal cost", "balance"
    );
    for row in &report.members {
        let direction = match row.status() {
            BalanceStatus::Receives => "Get",
            BalanceStatus::Owes => "Give",
        };
        println!(
            "{:<16} {:>6} {:>12.2} {:>12.2} {:>7} {:.2}",
            row.name,
            row.total_meals,
            row.total_spent,
            row.meal_cost,
            direction,
            row.balance.abs()
        );
    }
}
