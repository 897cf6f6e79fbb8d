use std::fmt::{self, Display, Formatter};
use std::time::Instant;

use crate::NodeId;

/// Named points at which the runtime calls into a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Initialize,
    DeriveStateFromProps,
    ShouldEvaluate,
    Evaluate,
    CaptureBeforeCommit,
    AfterMount,
    AfterUpdate,
    BeforeUnmount,
    DeriveStateFromError,
    OnErrorCaptured,
    /// Applying a queued state patch or updater function.
    StateUpdate,
}

impl Hook {
    pub fn name(&self) -> &'static str {
        match self {
            Hook::Initialize => "initialize",
            Hook::DeriveStateFromProps => "derive_state_from_props",
            Hook::ShouldEvaluate => "should_evaluate",
            Hook::Evaluate => "evaluate",
            Hook::CaptureBeforeCommit => "capture_before_commit",
            Hook::AfterMount => "after_mount",
            Hook::AfterUpdate => "after_update",
            Hook::BeforeUnmount => "before_unmount",
            Hook::DeriveStateFromError => "derive_state_from_error",
            Hook::OnErrorCaptured => "on_error_captured",
            Hook::StateUpdate => "state_update",
        }
    }
}

impl Display for Hook {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One recorded hook invocation.
#[derive(Debug, Clone, Copy)]
pub struct HookEvent {
    pub hook: Hook,
    pub node: NodeId,
    pub component: &'static str,
    pub at: Instant,
}

impl Display for HookEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.hook, self.node, self.component)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Trace {
    enabled: bool,
    events: Vec<HookEvent>,
}

impl Trace {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, hook: Hook, node: NodeId, component: &'static str) {
        log::debug!(target: "lifecycle", "hook={} node={} component={}", hook, node, component);
        if self.enabled {
            self.events.push(HookEvent {
                hook,
                node,
                component,
                at: Instant::now(),
            });
        }
    }

    pub(crate) fn events(&self) -> &[HookEvent] {
        &self.events
    }

    pub(crate) fn take(&mut self) -> Vec<HookEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_trace_keeps_nothing() {
        let mut trace = Trace::new(false);
        trace.record(Hook::Evaluate, NodeId(1), "Example");
        assert!(trace.events().is_empty());
    }

    #[test]
    fn enabled_trace_keeps_order() {
        let mut trace = Trace::new(true);
        trace.record(Hook::Initialize, NodeId(1), "Example");
        trace.record(Hook::Evaluate, NodeId(1), "Example");
        let hooks: Vec<Hook> = trace.take().iter().map(|e| e.hook).collect();
        assert_eq!(hooks, vec![Hook::Initialize, Hook::Evaluate]);
        assert!(trace.events().is_empty());
    }
}
