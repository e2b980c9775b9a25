#[test]
fn replication() {
    cases::init_test_logger();
    cases::replication::run();
}
