//! Exit codes for `dialogue` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, config, session state, or any other failure.
pub const INVALID: i32 = 1;
/// The named session does not exist.
pub const NOT_FOUND: i32 = 2;
