#[test]
fn restart() {
    cases::init_test_logger();
    cases::restart::run();
}
