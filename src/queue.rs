use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;

use generational_box::GenerationalBox;

use crate::component::{downcast_mut, ComponentState};
use crate::{Loc, NodeId};

pub(crate) type Op = Box<dyn FnOnce(&mut dyn Any) -> anyhow::Result<()>>;
pub(crate) type Callback = Box<dyn FnOnce()>;

pub(crate) struct Request {
    pub(crate) node: NodeId,
    pub(crate) op: Op,
    pub(crate) callback: Option<Callback>,
    pub(crate) loc: Loc,
}

#[derive(Default)]
pub(crate) struct UpdateQueue {
    requests: Vec<Request>,
}

impl UpdateQueue {
    pub(crate) fn push(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub(crate) fn take(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Drops every queued request for `node`, callbacks included.
    pub(crate) fn cancel(&mut self, node: NodeId) -> usize {
        let before = self.requests.len();
        self.requests.retain(|r| r.node != node);
        before - self.requests.len()
    }
}

/// Handle for queueing state changes on one node.
///
/// Requests are applied in order at the next drain cycle, which re-evaluates
/// the node once no matter how many requests were queued.
pub struct Updater<S> {
    node: NodeId,
    queue: GenerationalBox<UpdateQueue>,
    ty: PhantomData<fn() -> S>,
}

impl<S> Clone for Updater<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Updater<S> {}

impl<S> Updater<S>
where
    S: ComponentState,
{
    #[inline(always)]
    pub(crate) fn new(node: NodeId, queue: GenerationalBox<UpdateQueue>) -> Self {
        Self {
            node,
            queue,
            ty: PhantomData,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    #[track_caller]
    pub fn set(&self, patch: S::Patch) {
        self.enqueue(Self::patch_op(patch), None, Loc::new());
    }

    /// Queues a patch and runs `callback` after the resulting re-evaluation
    /// has been committed.
    #[track_caller]
    pub fn set_then<F>(&self, patch: S::Patch, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.enqueue(Self::patch_op(patch), Some(Box::new(callback)), Loc::new());
    }

    /// Queues a patch computed from the state as it stands when the request
    /// is applied.
    #[track_caller]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&S) -> S::Patch + 'static,
    {
        self.enqueue(Self::updater_op(f), None, Loc::new());
    }

    #[track_caller]
    pub fn update_then<F, C>(&self, f: F, callback: C)
    where
        F: FnOnce(&S) -> S::Patch + 'static,
        C: FnOnce() + 'static,
    {
        self.enqueue(Self::updater_op(f), Some(Box::new(callback)), Loc::new());
    }

    fn patch_op(patch: S::Patch) -> Op {
        Box::new(move |state| {
            downcast_mut::<S>(state)?.merge(patch);
            Ok(())
        })
    }

    fn updater_op<F>(f: F) -> Op
    where
        F: FnOnce(&S) -> S::Patch + 'static,
    {
        Box::new(move |state| {
            let state = downcast_mut::<S>(state)?;
            let patch = f(state);
            state.merge(patch);
            Ok(())
        })
    }

    fn enqueue(&self, op: Op, callback: Option<Callback>, loc: Loc) {
        match self.queue.try_write() {
            Ok(mut queue) => {
                log::trace!(target: "lifecycle", "queued update for {} from {}", self.node, loc);
                queue.push(Request {
                    node: self.node,
                    op,
                    callback,
                    loc,
                });
            }
            Err(err) => {
                log::warn!(
                    "dropping update for {} from {}: queue unavailable ({})",
                    self.node,
                    loc,
                    err
                );
            }
        }
    }
}

impl<S> Debug for Updater<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").field("node", &self.node).finish()
    }
}

#[cfg(test)]
mod tests {
    use generational_box::{AnyStorage, UnsyncStorage};

    use super::*;

    #[test]
    fn requests_apply_in_order() {
        let owner = UnsyncStorage::owner();
        let queue = owner.insert(UpdateQueue::default());
        let updater = Updater::<u32>::new(NodeId(1), queue);
        updater.set(3);
        updater.update(|n| n * 10);
        updater.set(7);
        updater.update(|n| n + 1);

        let mut state: Box<dyn Any> = Box::new(0u32);
        let requests = queue.write().take();
        assert_eq!(requests.len(), 4);
        let mut seen = Vec::new();
        for request in requests {
            (request.op)(state.as_mut()).unwrap();
            seen.push(*state.downcast_ref::<u32>().unwrap());
        }
        assert_eq!(seen, vec![3, 30, 7, 8]);
    }

    #[test]
    fn cancel_drops_only_that_node() {
        let owner = UnsyncStorage::owner();
        let queue = owner.insert(UpdateQueue::default());
        Updater::<bool>::new(NodeId(1), queue).set(true);
        Updater::<bool>::new(NodeId(2), queue).set(true);
        Updater::<bool>::new(NodeId(1), queue).set(false);
        assert_eq!(queue.write().cancel(NodeId(1)), 2);
        let left = queue.write().take();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].node, NodeId(2));
    }

    #[test]
    fn dropped_owner_does_not_panic() {
        let owner = UnsyncStorage::owner();
        let queue = owner.insert(UpdateQueue::default());
        let updater = Updater::<bool>::new(NodeId(1), queue);
        drop(owner);
        updater.set(true);
    }
}
