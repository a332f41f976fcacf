use std::{env, process::Command};

fn run_tally(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_tally"))
        .args(args)
        .output()
        .expect("failed to execute tally");

    let stdout = String::from_utf8(output.stdout).expect("Invalid output in stdout");
    let stderr = String::from_utf8(output.stderr).expect("Invalid output in stderr");

    (output.status.success(), stdout, stderr)
}

fn check_output(args: &[&str], expected_output: &str) {
    let (success, stdout, stderr) = run_tally(args);

    assert!(
        success,
        "Process exited with an error
stdout:
{stdout}

stderr:
{stderr}",
    );
    assert_eq!(stdout, expected_output);
}

mod cli_tests {
    use super::*;

    #[test]
    fn make_shared_demo() {
        let expected_output = "\
=== make_shared ===
  [#1] control block allocated (fused)
Car(50)
  [#1] value constructed in place
  handle created (made)
ptr->value = 50
(*ptr).value = 50
ptr.get()->value = 50
use_count = 1
is unique = true
bool conversion = true
=== empty handle ===
  handle created (empty)
use_count = 0
bool conversion = false
=== clone 0 copies ===
use_count = 1
=== teardown ===
  [#1] handle released, count = 0
~Car() value=50
  [#1] value destroyed
  [#1] control block deallocated
";
        check_output(&[], expected_output);
    }

    #[test]
    fn raw_pointer_demo_with_copies() {
        let expected_output = "\
=== adopt a raw pointer ===
Car(7)
  [#1] control block allocated (plain)
  [#1] value adopted
  handle created (adopted)
ptr->value = 7
(*ptr).value = 7
ptr.get()->value = 7
use_count = 1
is unique = true
bool conversion = true
=== empty handle ===
  handle created (empty)
use_count = 0
bool conversion = false
=== clone 2 copies ===
  [#1] handle cloned, count = 2
  [#1] handle cloned, count = 3
use_count = 3
=== teardown ===
  [#1] handle released, count = 2
use_count = 2
  [#1] handle released, count = 1
use_count = 1
  [#1] handle released, count = 0
~Car() value=7
  [#1] value destroyed
  [#1] control block deallocated
";
        check_output(&["--raw", "--value", "7", "--copies", "2"], expected_output);
    }

    #[test]
    fn quiet_demo() {
        let expected_output = "\
=== make_shared ===
Car(3)
ptr->value = 3
(*ptr).value = 3
ptr.get()->value = 3
use_count = 1
is unique = true
bool conversion = true
=== empty handle ===
use_count = 0
bool conversion = false
=== clone 1 copies ===
use_count = 2
=== teardown ===
use_count = 1
~Car() value=3
";
        check_output(&["-q", "-v", "3", "-c", "1"], expected_output);
    }

    #[test]
    fn failed_construction_frees_the_block() {
        let (success, stdout, stderr) = run_tally(&["--value", "-1"]);

        assert!(!success);
        assert_eq!(
            stdout,
            "\
=== make_shared ===
  [#1] control block allocated (fused)
  [#1] control block deallocated
"
        );
        assert!(stderr.contains("Failed to make the car"));
        assert!(stderr.contains("negative value"));
    }

    #[test]
    fn version() {
        check_output(
            &["--version"],
            &format!("Tally {}\n", env!("CARGO_PKG_VERSION")),
        );
    }

    #[test]
    fn unsupported_argument() {
        let (success, _, stderr) = run_tally(&["--bogus"]);

        assert!(!success);
        assert!(stderr.contains("Unsupported argument: --bogus"));
    }

    #[test]
    fn option_values_are_separate_arguments() {
        let (success, _, stderr) = run_tally(&["--value=-1"]);

        assert!(!success);
        assert!(stderr.contains("Unsupported argument: --value=-1"));
    }
}
