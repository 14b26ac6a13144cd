//! Build script for descalloc.
//!
//! Prints feature notes for users integrating descalloc into a renderer.

use std::env;

fn main() {
    // Re-run if features change
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_VALIDATION");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DIAGNOSTICS");

    let parking_lot_enabled = env::var("CARGO_FEATURE_PARKING_LOT").is_ok();
    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();
    let validation_enabled = env::var("CARGO_FEATURE_VALIDATION").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    // =========================================================================
    // Feature-specific notes
    // =========================================================================

    if parking_lot_enabled {
        emit_info("Using parking_lot for pool and allocator locks");
    }

    if log_enabled {
        emit_info("Diagnostics routed through the log crate (target \"descalloc\")");
        emit_note("Heap lifecycle tracing is emitted at trace level");
    }

    if validation_enabled {
        emit_info("Contract checks (FD1xx/FD9xx) kept in this build");
        if is_release {
            emit_note("Every allocation and staging call is checked; expect a small cost");
        }
    } else if is_release {
        emit_note("Contract checks are compiled out of release builds");
        emit_note("Enable them with:");
        emit_note("  descalloc = { version = \"0.3\", features = [\"validation\"] }");
    }

    if is_release && !parking_lot_enabled {
        emit_note("Tip: Consider enabling 'parking_lot' when many threads allocate handles");
    }
}

// =============================================================================
// Diagnostic emission helpers
// =============================================================================

fn emit_info(msg: &str) {
    println!("cargo:warning=[descalloc] {}", msg);
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[descalloc]    {}", msg);
}
