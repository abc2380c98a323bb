//! Process-wide diagnostic sink and error types.
//!
//! Message/warning/error counters are process-wide and never reset across
//! compiles. Internal (programmer) errors panic; user errors flow through
//! [`Diagnostic`] values pushed onto a [`DiagnosticSink`].

use std::fmt;
use std::sync::{Mutex, OnceLock};

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    fn to_log_level(self) -> log::Level {
        match self {
            Severity::Trace => log::Level::Trace,
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::Fatal => log::Level::Error,
        }
    }

    fn bumps_error_count(self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// A single user-facing diagnostic. Position is attached whenever the
/// diagnostic originates from source text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Option<Position>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic { severity, position: None, message: message.into() }
    }

    pub fn at(severity: Severity, position: Position, message: impl Into<String>) -> Self {
        Diagnostic { severity, position: Some(position), message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(p) => write!(f, "{} {}: {}", p, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    messages: u64,
    warnings: u64,
    errors: u64,
}

/// Handle to a diagnostic sink. The CLI uses [`DiagnosticSink::global`]; tests
/// and embedders may construct a context-local instance instead, each with
/// its own counters, without breaking the single-sink contract observed by
/// any one caller.
pub struct DiagnosticSink {
    counters: Mutex<Counters>,
}

static GLOBAL_SINK: OnceLock<DiagnosticSink> = OnceLock::new();

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink { counters: Mutex::new(Counters::default()) }
    }

    /// The process-wide singleton sink used by the CLI driver.
    pub fn global() -> &'static DiagnosticSink {
        GLOBAL_SINK.get_or_init(DiagnosticSink::new)
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        let mut counters = self.counters.lock().unwrap();
        counters.messages += 1;
        if diagnostic.severity == Severity::Warning {
            counters.warnings += 1;
        }
        if diagnostic.severity.bumps_error_count() {
            counters.errors += 1;
        }
        drop(counters);
        log::log!(diagnostic.severity.to_log_level(), "{diagnostic}");
    }

    pub fn error_count(&self) -> u64 {
        self.counters.lock().unwrap().errors
    }

    pub fn warning_count(&self) -> u64 {
        self.counters.lock().unwrap().warnings
    }

    pub fn message_count(&self) -> u64 {
        self.counters.lock().unwrap().messages
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Programmer errors: wrong payload accessor, compare on non-literal,
/// out-of-range index, unbalanced unlock, etc. Always fatal, never recovered
/// — callers should `panic!` with this type's `Display`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InternalError {
    #[error("wrong payload kind for node `{kind:?}`: expected {expected}")]
    WrongPayloadKind { kind: crate::compiler::ast::kind::SyntaxKind, expected: &'static str },
    #[error("child index {index} out of range (len {len})")]
    ChildIndexOutOfRange { index: usize, len: usize },
    #[error("node has no parent")]
    MissingParent,
    #[error("compare requested on non-literal node `{kind:?}`")]
    CompareOnNonLiteral { kind: crate::compiler::ast::kind::SyntaxKind },
    #[error("attempt to modify a locked node")]
    NodeLocked,
    #[error("unbalanced unlock: lock counter already zero")]
    UnbalancedUnlock,
    #[error("flag `{flag}` is not valid for node kind `{kind:?}`")]
    InvalidFlagForKind { kind: crate::compiler::ast::kind::SyntaxKind, flag: &'static str },
    #[error("unsupported IR operation kind: {0:?}")]
    UnsupportedOperation(crate::compiler::flatten::OpKind),
    #[error("operand missing where addressing requires data")]
    MissingOperand,
    #[error("store target is a literal, not an addressable location")]
    UnaddressableStoreTarget,
}

/// Fallible outcomes of the public entry points (archive/image IO, build
/// file serialization). Distinct from [`Diagnostic`] (user errors reported
/// mid-pass); this is the `Result` error type of operations that must abort.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad archive: {0}")]
    Archive(String),
    #[error("bad image: {0}")]
    Image(String),
    #[error("runtime function `{0}` not found in archive")]
    MissingRuntimeFunction(String),
}
