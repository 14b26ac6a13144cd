//! Coded diagnostics for descriptor allocation.
//!
//! This module provides:
//! - **Runtime diagnostics**: allocator-aware messages with stable codes
//! - **Contract checks**: `fd_contract!` reports a violated precondition and aborts
//! - **Strict mode**: optional panic-on-warning for CI
//! - **Log routing**: with the `log` feature, output goes through the `log` crate
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                          |
//! |-------|----------------------------------|
//! | FD1xx | Caller contract violations       |
//! | FD2xx | Device / backing storage issues  |
//! | FD3xx | Pool growth warnings             |
//! | FD9xx | Internal invariant violations    |

pub mod kind;
pub mod emit;
pub mod strict;
pub mod macros;

pub use kind::{Diagnostic, DiagnosticKind};
pub use emit::{emit, emit_with_context, is_suppressed, suppress_diagnostics, set_verbose, violation};
pub use strict::{StrictMode, set_strict_mode, strict_mode, StrictModeGuard, init_from_env};

pub use kind::{
    FD101, FD102, FD103, FD104, FD105, FD106, FD107, FD108, FD201, FD301, FD302, FD901, FD902,
};
