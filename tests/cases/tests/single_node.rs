#[test]
fn single_node() {
    cases::init_test_logger();
    cases::single_node::run();
}
