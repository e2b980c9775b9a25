#[test]
fn no_quorum() {
    cases::init_test_logger();
    cases::no_quorum::run();
}
