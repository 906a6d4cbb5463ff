//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad arguments or flag names)
pub const USAGE_ERROR: u8 = 2;

/// Permission denied (filesystem or automation access)
pub const PERMISSION_DENIED: u8 = 5;

/// The Finder script failed
pub const SCRIPT_FAILED: u8 = 6;

/// Path or attribute not found
pub const NOT_FOUND: u8 = 7;

/// Extended attributes are not supported on this filesystem
pub const UNSUPPORTED: u8 = 8;

/// Operation cancelled or interrupted
pub const CANCELLED: u8 = 9;
