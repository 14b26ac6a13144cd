//! Diagnostic kinds and predefined diagnostics.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Informational note.
    Note,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `FD1xx` - Caller contract violations
/// - `FD2xx` - Device issues
/// - `FD3xx` - Pool growth
/// - `FD9xx` - Internal errors
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "FD101").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// FD1xx - Caller contract violations
// =============================================================================

/// FD101: Persistent request larger than one heap.
pub const FD101: Diagnostic = Diagnostic::error(
    "FD101",
    "persistent descriptor request does not fit in one heap"
).with_note("a single allocation never spans two heaps")
 .with_help("request between 1 and the category's persistent heap capacity, or raise it in DescriptorConfig");

/// FD102: Layout needs more shadow slots than the cache holds.
pub const FD102: Diagnostic = Diagnostic::error(
    "FD102",
    "binding layout exceeds the shadow cache capacity"
).with_note("the table sizes of one category must fit in the shadow buffer together")
 .with_help("raise max_cached_handles in DescriptorConfig or split the layout");

/// FD103: Staging into a parameter that is not a table.
pub const FD103: Diagnostic = Diagnostic::error(
    "FD103",
    "root parameter is not a descriptor table of this category"
).with_help("check the layout bound with set_layout() for this consumer");

/// FD104: Staging past the end of a table.
pub const FD104: Diagnostic = Diagnostic::error(
    "FD104",
    "staged handles overrun the descriptor table"
).with_note("offset + handle count must not exceed the table size");

/// FD105: User heap exhausted.
pub const FD105: Diagnostic = Diagnostic::error(
    "FD105",
    "user descriptor heap out of space"
).with_help("create the heap with a larger capacity");

/// FD106: Transient request larger than a whole segment.
pub const FD106: Diagnostic = Diagnostic::error(
    "FD106",
    "transient request exceeds the segment capacity"
).with_help("raise transient_heap_capacity in DescriptorConfig");

/// FD107: Malformed binding layout.
pub const FD107: Diagnostic = Diagnostic::error(
    "FD107",
    "malformed binding layout"
).with_note("layouts hold at most 16 root parameters and every table needs at least one slot");

/// FD108: A handle without a host address was staged or uploaded.
pub const FD108: Diagnostic = Diagnostic::error(
    "FD108",
    "descriptor handle has no host address"
).with_note("only handles from a persistent allocator or a user heap can be copied from")
 .with_help("do not stage DescriptorHandle::NULL");

// =============================================================================
// FD2xx - Device
// =============================================================================

/// FD201: The device failed to create backing storage.
pub const FD201: Diagnostic = Diagnostic::error(
    "FD201",
    "device failed to create a descriptor heap"
).with_note("the error is returned to the caller and nothing is retried")
 .with_help("treat DeviceError::DeviceLost as a signal to recreate the device");

// =============================================================================
// FD3xx - Pool growth
// =============================================================================

/// FD301: Transient pool grew past its soft limit.
pub const FD301: Diagnostic = Diagnostic::warning(
    "FD301",
    "transient heap pool exceeded its soft limit"
).with_note("retired segments are not being reclaimed fast enough")
 .with_help("check that the completion gate is signaled, or raise heap_soft_limit");

/// FD302: Persistent pool grew past its soft limit.
pub const FD302: Diagnostic = Diagnostic::warning(
    "FD302",
    "persistent heap pool exceeded its soft limit"
).with_note("persistent handles are never freed individually")
 .with_help("look for resource views being recreated every frame");

// =============================================================================
// FD9xx - Internal
// =============================================================================

/// FD901: Stale table without assigned handles.
pub const FD901: Diagnostic = Diagnostic::error(
    "FD901",
    "descriptor table marked stale but has no assigned handles"
).with_note("this indicates a bug in descalloc");

/// FD902: Segment bookkeeping broken.
pub const FD902: Diagnostic = Diagnostic::error(
    "FD902",
    "transient segment bookkeeping is inconsistent"
).with_note("this indicates a bug in descalloc");
