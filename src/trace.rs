#![allow(unused_imports, unused_macros)]

pub use tracing::Level;

// span guard that exits its span when the owning scope ends, so `let _span = span_auto!(...)`
// brackets the rest of a function without an explicit exit call

pub struct ExitOnDropSpan {
    entered_span: Option<tracing::span::EnteredSpan>,
}

macro_rules! span_auto {
    ($lvl:expr, $name:expr, $($fields:tt)*) => {
        $crate::trace::ExitOnDropSpan::from(tracing::span!($lvl, $name, $($fields)*).entered())
    };
    ($lvl:expr, $name:expr) => {
        $crate::trace::ExitOnDropSpan::from(tracing::span!($lvl, $name).entered())
    };
}
pub(crate) use span_auto;

macro_rules! trace {
    ($name:expr, $($arg:tt)*) => (tracing::trace!($name, $($arg)*));
    ($name:expr) => (tracing::trace!($name))
}
pub(crate) use trace;

macro_rules! debug {
    ($name:expr, $($arg:tt)*) => (tracing::debug!($name, $($arg)*));
    ($name:expr) => (tracing::debug!($name))
}
pub(crate) use debug;

macro_rules! warning {
    ($name:expr, $($arg:tt)*) => (tracing::warn!($name, $($arg)*));
    ($name:expr) => (tracing::warn!($name))
}
pub(crate) use warning;

macro_rules! error {
    ($name:expr, $($arg:tt)*) => (tracing::error!($name, $($arg)*));
    ($name:expr) => (tracing::error!($name))
}
pub(crate) use error;

impl From<tracing::span::EnteredSpan> for ExitOnDropSpan {
    fn from(entered_span: tracing::span::EnteredSpan) -> Self {
        Self {
            entered_span: Some(entered_span),
        }
    }
}

impl Drop for ExitOnDropSpan {
    fn drop(&mut self) {
        if let Some(span) = self.entered_span.take() {
            span.exit();
        }
    }
}
