//! Property tests for bootstrap input validation

use batch_trigger::orchestrator::user_data::{ShellInputError, validate_shell_input};
use proptest::prelude::*;

const FORBIDDEN: &[char] = &['"', '\'', '\\', '`', '$', ';', '|', '&', '<', '>', ' ', '\t', '\n'];

proptest! {
    #[test]
    fn safe_values_pass(value in "[A-Za-z0-9._/:=@%+,-]{1,64}") {
        prop_assert!(validate_shell_input(&value, "value").is_ok());
    }

    #[test]
    fn any_forbidden_char_is_rejected(
        prefix in "[A-Za-z0-9./-]{0,16}",
        suffix in "[A-Za-z0-9./-]{0,16}",
        idx in 0..FORBIDDEN.len(),
    ) {
        let bad = FORBIDDEN[idx];
        let value = format!("{prefix}{bad}{suffix}");
        prop_assert_eq!(
            validate_shell_input(&value, "value"),
            Err(ShellInputError::Forbidden { field: "value", found: bad })
        );
    }
}

#[test]
fn test_empty_is_rejected() {
    assert_eq!(
        validate_shell_input("", "bucket"),
        Err(ShellInputError::Empty { field: "bucket" })
    );
}

#[test]
fn test_s3_uri_and_url_pass() {
    validate_shell_input("s3://genomics-data/results/run-42/", "results uri").unwrap();
    validate_shell_input("https://tracker.example.com/api/analyses", "endpoint").unwrap();
}
