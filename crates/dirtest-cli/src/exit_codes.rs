//! Exit codes of the `dirtest` binary. These are part of the public contract.

pub const SUCCESS: i32 = 0;
pub const TEST_FAILED: i32 = 1; // At least one FAIL or ERROR
pub const USAGE_ERROR: i32 = 1; // Bad arguments
pub const PATH_ERROR: i32 = 1; // Directory argument missing, not a directory, or unreadable
pub const NO_TESTS: i32 = 2; // Nothing was discovered
pub const INTERNAL_ERROR: i32 = 1;
