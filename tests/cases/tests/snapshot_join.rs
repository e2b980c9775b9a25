#[test]
fn snapshot_join() {
    cases::init_test_logger();
    cases::snapshot_join::run();
}
