//! Custom assertion helpers.

use ck_protocol::CommandStatus;
use ck_protocol::CommandStatus::*;

/// Assert that `statuses` is one of the legal lifecycles: IDLE, RUNNING,
/// terminal or IDLE, ERROR.
pub fn assert_valid_lifecycle(statuses: &[CommandStatus]) {
    let valid = matches!(
        statuses,
        [Idle, Running, Exited] | [Idle, Running, Error] | [Idle, Error]
    );
    assert!(valid, "invalid status sequence: {statuses:?}");
}

/// Assert that exactly one terminal status was observed.
pub fn assert_single_terminal(statuses: &[CommandStatus]) {
    let terminal = statuses.iter().filter(|s| s.is_terminal()).count();
    assert_eq!(terminal, 1, "expected one terminal status in {statuses:?}");
}
