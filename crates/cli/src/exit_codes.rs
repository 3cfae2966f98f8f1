//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: batch scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Domain    | Description                                        |
//! |------|-----------|----------------------------------------------------|
//! | 0    | Universal | Success (every folder processed or skipped)        |
//! | 1    | Universal | General error (unspecified)                        |
//! | 2    | Universal | Usage or config error (bad args, invalid TOML)     |
//! | 3    | batch     | One or more folders failed; the batch continued    |
//! | 4    | batch     | One or more folders aborted on missing targets     |
//!
//! When a batch has both kinds of failure, 4 wins.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `BatchReport::exit_code` or the command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable root, invalid config.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Batch (3-4)
// =============================================================================

/// At least one folder failed with a read, parse or export error.
pub const EXIT_FOLDERS_FAILED: u8 = 3;

/// At least one folder had outlet items without a catalog price.
/// Those folders produced no plots and no bulk file.
pub const EXIT_MISSING_TARGETS: u8 = 4;
