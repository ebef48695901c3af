use super::*;

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__INKBOARD_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__INKBOARD_TEST_VALID__", "99") };
    let val: usize = env_parse("__INKBOARD_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__INKBOARD_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__INKBOARD_TEST_INVALID__", "lots") };
    let val: u16 = env_parse("__INKBOARD_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__INKBOARD_TEST_INVALID__") };
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.port, 3000);
    assert_eq!(config.database_url, None);
    assert_eq!(config.db_max_connections, 5);
    assert_eq!(config.max_record_bytes, 262_144);
}
