#[test]
fn leader_failover() {
    cases::init_test_logger();
    cases::leader_failover::run();
}
