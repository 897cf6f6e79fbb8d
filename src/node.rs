use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use crate::component::AnyComponent;
use crate::{Element, ErrorRecord, Key};

/// Stable identity of a node. Never reused within one root.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    #[inline(always)]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type NodeKey = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Created in the current pass, not committed yet.
    Constructing,
    Mounted,
    /// Re-evaluated in the current pass, not committed yet.
    Updating,
    Unmounting,
    /// Captured a descendant failure in the current pass.
    ErrorCaught,
}

#[derive(Debug, Clone)]
pub enum Health {
    Healthy,
    Failed(ErrorRecord),
}

impl Health {
    pub fn is_failed(&self) -> bool {
        matches!(self, Health::Failed(_))
    }
}

/// Read-only snapshot of a node for inspection.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub component: &'static str,
    pub key: Option<Key>,
    pub phase: LifecyclePhase,
    pub health: Health,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

pub(crate) struct Instance {
    pub(crate) id: NodeId,
    pub(crate) component: Rc<dyn AnyComponent>,
    pub(crate) key: Option<Key>,
    pub(crate) props: Rc<dyn Any>,
    pub(crate) state: Box<dyn Any>,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) output: Element,
    pub(crate) phase: LifecyclePhase,
    pub(crate) health: Health,
}

impl Instance {
    #[inline(always)]
    pub(crate) fn name(&self) -> &'static str {
        self.component.name()
    }

    #[inline(always)]
    pub(crate) fn is_committed(&self) -> bool {
        self.phase != LifecyclePhase::Constructing
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("component", &self.name())
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("phase", &self.phase)
            .finish()
    }
}
