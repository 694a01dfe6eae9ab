use messbook_core::db::{open_db, open_db_in_memory};
use messbook_core::{
    AttendanceService, Change, ChangeEvent, EngineContext, EngineError, Member, MonthKey,
    NotFound, Roster, SqliteAttendanceRepository, StaticIdentityResolver,
};
use std::path::Path;
use std::sync::{Arc, Barrier, Mutex};

fn roster() -> Roster {
    Roster::new(vec![
        Member::new(1, "Rahim", 1, 15),
        Member::new(2, "Karim", 16, 31),
    ])
    .unwrap()
}

fn context() -> Arc<EngineContext> {
    Arc::new(EngineContext::new(roster(), StaticIdentityResolver::default()))
}

fn september() -> MonthKey {
    MonthKey::new(2026, 9).unwrap()
}

fn toggle_on_fresh_connection(path: &Path, month: MonthKey, day: u32, member_id: u32) -> bool {
    let conn = open_db(path).unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        context(),
    );
    service.toggle_cell(month, day, member_id).unwrap()
}

#[test]
fn first_read_initializes_all_present_grid_once() {
    let conn = open_db_in_memory().unwrap();
    let ctx = context();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        Arc::clone(&ctx),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    ctx.feed().subscribe(Arc::new(move |event: &ChangeEvent| {
        sink.lock().unwrap().push(event.change.clone());
    }));

    let grid = service.get_or_init_grid(september()).unwrap();
    assert_eq!(grid.days.len(), 30);
    assert_eq!(grid.meals_for(1), 30);
    assert_eq!(grid.meals_for(2), 30);

    let again = service.get_or_init_grid(september()).unwrap();
    assert_eq!(again, grid);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Change::GridInitialized(september())]
    );
}

#[test]
fn february_grid_follows_leap_years() {
    let conn = open_db_in_memory().unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        context(),
    );

    let leap = service
        .get_or_init_grid(MonthKey::new(2028, 2).unwrap())
        .unwrap();
    assert_eq!(leap.days.len(), 29);
    let common = service
        .get_or_init_grid(MonthKey::new(2027, 2).unwrap())
        .unwrap();
    assert_eq!(common.days.len(), 28);
}

#[test]
fn toggle_flips_cell_and_double_toggle_restores() {
    let conn = open_db_in_memory().unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        context(),
    );
    let original = service.get_or_init_grid(september()).unwrap();

    assert!(!service.toggle_cell(september(), 5, 2).unwrap());
    let grid = service.get_grid(september()).unwrap().unwrap();
    assert!(!grid.is_present(5, 2));
    assert!(grid.is_present(5, 1));
    assert_eq!(grid.meals_for(2), 29);

    assert!(service.toggle_cell(september(), 5, 2).unwrap());
    assert_eq!(service.get_grid(september()).unwrap().unwrap(), original);
}

#[test]
fn toggle_rejects_bad_coordinates_and_missing_grid() {
    let conn = open_db_in_memory().unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        context(),
    );

    let err = service.toggle_cell(september(), 3, 1).unwrap_err();
    assert!(matches!(err, EngineError::NotFound(NotFound::Grid(_))));
    assert_eq!(err.code(), "not_found");

    service.get_or_init_grid(september()).unwrap();
    assert!(matches!(
        service.toggle_cell(september(), 31, 1),
        Err(EngineError::NotFound(NotFound::Day {
            day: 31,
            days_in_month: 30
        }))
    ));
    assert!(matches!(
        service.toggle_cell(september(), 0, 1),
        Err(EngineError::NotFound(NotFound::Day { day: 0, .. }))
    ));
    assert!(matches!(
        service.toggle_cell(september(), 3, 9),
        Err(EngineError::NotFound(NotFound::Member(9)))
    ));
    assert_eq!(
        service.get_grid(september()).unwrap().unwrap().meals_for(1),
        30
    );
}

#[test]
fn second_session_init_does_not_overwrite_existing_grid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("messbook.db");

    let first = open_db(&path).unwrap();
    let first_service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&first).unwrap(),
        context(),
    );
    first_service.get_or_init_grid(september()).unwrap();
    first_service.toggle_cell(september(), 10, 1).unwrap();

    let second = open_db(&path).unwrap();
    let second_service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&second).unwrap(),
        context(),
    );
    let seen_by_second = second_service.get_or_init_grid(september()).unwrap();

    assert!(!seen_by_second.is_present(10, 1));
    assert_eq!(seen_by_second.meals_for(1), 29);
}

#[test]
fn concurrent_first_access_creates_grid_exactly_once() {
    const SESSIONS: usize = 6;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("messbook.db");
    // Migrate up front so the sessions race on the grid only.
    drop(open_db(&path).unwrap());

    let ctx = context();
    let initialized = Arc::new(Mutex::new(0_usize));
    let sink = Arc::clone(&initialized);
    ctx.feed().subscribe(Arc::new(move |event: &ChangeEvent| {
        if matches!(event.change, Change::GridInitialized(_)) {
            *sink.lock().unwrap() += 1;
        }
    }));

    let barrier = Barrier::new(SESSIONS);
    std::thread::scope(|scope| {
        for session in 0..SESSIONS {
            let (path, ctx, barrier) = (path.as_path(), Arc::clone(&ctx), &barrier);
            scope.spawn(move || {
                let conn = open_db(path).unwrap();
                let service = AttendanceService::new(
                    SqliteAttendanceRepository::try_new(&conn).unwrap(),
                    ctx,
                );
                barrier.wait();
                let grid = service.get_or_init_grid(september()).unwrap();
                assert_eq!(grid.days.len(), 30);
                if session == 0 {
                    assert!(!service.toggle_cell(september(), 7, 2).unwrap());
                }
            });
        }
    });

    assert_eq!(*initialized.lock().unwrap(), 1);
    let conn = open_db(&path).unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        context(),
    );
    let grid = service.get_grid(september()).unwrap().unwrap();
    assert!(!grid.is_present(7, 2));
    assert_eq!(grid.meals_for(2), 29);
    assert_eq!(grid.meals_for(1), 30);
}

#[test]
fn concurrent_toggles_on_different_cells_both_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("messbook.db");

    let conn = open_db(&path).unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        context(),
    );
    service.get_or_init_grid(september()).unwrap();

    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = [(1_u32, 1_u32), (2, 2), (3, 1), (4, 2)]
            .into_iter()
            .map(|(day, member_id)| {
                let path = path.as_path();
                scope.spawn(move || toggle_on_fresh_connection(path, september(), day, member_id))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    assert!(results.iter().all(|present| !present));

    let grid = service.get_grid(september()).unwrap().unwrap();
    assert!(!grid.is_present(1, 1));
    assert!(!grid.is_present(2, 2));
    assert!(!grid.is_present(3, 1));
    assert!(!grid.is_present(4, 2));
    assert_eq!(grid.meals_for(1), 28);
    assert_eq!(grid.meals_for(2), 28);
}

#[test]
fn read_path_rejects_grid_with_wrong_day_count() {
    let conn = open_db_in_memory().unwrap();
    let service = AttendanceService::new(
        SqliteAttendanceRepository::try_new(&conn).unwrap(),
        context(),
    );
    service.get_or_init_grid(september()).unwrap();
    conn.execute(
        "UPDATE attendance_grids SET days_in_month = 31 WHERE month_key = '2026-09';",
        [],
    )
    .unwrap();

    let err = service.get_grid(september()).unwrap_err();
    assert_eq!(err.code(), "persistence_error");
}
