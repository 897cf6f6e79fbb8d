use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::{Hook, NodeId};

/// Where a failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised while evaluating a node's output.
    Evaluation,
    /// Raised by any other lifecycle hook.
    Hook(Hook),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Evaluation => f.write_str("evaluation error"),
            ErrorKind::Hook(hook) => write!(f, "error in {}", hook),
        }
    }
}

/// A failure raised by a node, travelling toward the nearest boundary.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    error: Arc<anyhow::Error>,
    hook: Hook,
    origin: NodeId,
    component: &'static str,
    component_stack: Vec<&'static str>,
}

impl ErrorRecord {
    pub(crate) fn new(
        error: anyhow::Error,
        hook: Hook,
        origin: NodeId,
        component: &'static str,
        component_stack: Vec<&'static str>,
    ) -> Self {
        Self {
            error: Arc::new(error),
            hook,
            origin,
            component,
            component_stack,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.hook {
            Hook::Evaluate => ErrorKind::Evaluation,
            hook => ErrorKind::Hook(hook),
        }
    }

    pub fn hook(&self) -> Hook {
        self.hook
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Top-level message of the original error.
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Component names from the failing node up to the root.
    pub fn component_stack(&self) -> &[&'static str] {
        &self.component_stack
    }
}

impl Display for ErrorRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {} {}: {}",
            self.kind(),
            self.component,
            self.origin,
            self.error
        )
    }
}

/// Context handed to `on_error_captured` next to the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub boundary: NodeId,
    pub component_stack: Vec<&'static str>,
}

/// A failure that reached the root without being captured.
#[derive(Debug, Clone, thiserror::Error)]
#[error("uncaught {record}")]
pub struct UncaughtError {
    record: ErrorRecord,
}

impl UncaughtError {
    pub(crate) fn new(record: ErrorRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &ErrorRecord {
        &self.record
    }

    pub fn into_record(self) -> ErrorRecord {
        self.record
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Uncaught(#[from] UncaughtError),
    #[error("update depth exceeded: more than {limit} drain cycles in one flush")]
    UpdateDepthExceeded { limit: usize },
    #[error("the tree has been torn down")]
    TornDown,
    #[error("no committed element with id `{0}`")]
    UnknownTarget(String),
}

impl RuntimeError {
    pub fn uncaught(&self) -> Option<&UncaughtError> {
        match self {
            RuntimeError::Uncaught(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_hook() {
        let record = ErrorRecord::new(
            anyhow::anyhow!("Something went wrong."),
            Hook::Evaluate,
            NodeId(4),
            "ErrorButton",
            vec!["ErrorButton", "App"],
        );
        assert_eq!(record.kind(), ErrorKind::Evaluation);
        assert_eq!(record.message(), "Something went wrong.");
        assert_eq!(
            record.to_string(),
            "evaluation error in ErrorButton #4: Something went wrong."
        );

        let record = ErrorRecord::new(
            anyhow::anyhow!("boom"),
            Hook::AfterMount,
            NodeId(2),
            "Example",
            vec!["Example"],
        );
        assert_eq!(record.kind(), ErrorKind::Hook(Hook::AfterMount));
    }

    #[test]
    fn uncaught_is_usable_with_anyhow() {
        let record = ErrorRecord::new(
            anyhow::anyhow!("boom"),
            Hook::Evaluate,
            NodeId(1),
            "Child",
            vec!["Child"],
        );
        let err: anyhow::Error = RuntimeError::from(UncaughtError::new(record)).into();
        assert_eq!(err.to_string(), "uncaught evaluation error in Child #1: boom");
    }
}
