use std::any::Any;
use std::rc::Rc;

use generational_box::GenerationalBox;
use rustc_hash::{FxHashMap, FxHashSet};
use slab::Slab;

use crate::component::{ComponentId, ComponentState, ErasedCx};
use crate::element::{ComponentElement, Handler};
use crate::error::Result;
use crate::hook::Trace;
use crate::node::{Instance, NodeKey};
use crate::queue::{Callback, Request, UpdateQueue};
use crate::{
    Config, Element, ErrorInfo, ErrorRecord, Health, Hook, Key, LifecyclePhase, NodeId, NodeInfo,
    RenderHost, RuntimeError, Snapshot, UncaughtError, View,
};

pub(crate) type Map<K, V> = FxHashMap<K, V>;
pub(crate) type Set<K> = FxHashSet<K>;

type Outcome<T = ()> = std::result::Result<T, ErrorRecord>;

enum Effect {
    Mount {
        key: NodeKey,
        id: NodeId,
    },
    Update {
        key: NodeKey,
        id: NodeId,
        prev_props: Rc<dyn Any>,
        prev_state: Box<dyn Any>,
        snapshot: Option<Snapshot>,
    },
}

#[derive(PartialEq, Eq, Hash)]
enum SlotKey {
    Keyed(Key),
    Position(Vec<usize>),
}

/// Where a child sits in its parent's output: explicit key, or position.
#[derive(PartialEq, Eq, Hash)]
struct Slot(ComponentId, SlotKey);

impl Slot {
    fn of(element: &ComponentElement, path: &[usize]) -> Self {
        let key = match &element.key {
            Some(key) => SlotKey::Keyed(key.clone()),
            None => SlotKey::Position(path.to_vec()),
        };
        Slot(element.component_id(), key)
    }
}

fn slots_of(output: &Element) -> Vec<Slot> {
    let mut slots = Vec::new();
    output.for_each_component(&mut |path, element| slots.push(Slot::of(element, path)));
    slots
}

/// Owns the node tree and sequences every hook call on it.
pub(crate) struct Runtime {
    nodes: Slab<Instance>,
    index: Map<NodeId, NodeKey>,
    next_id: u64,
    queue: GenerationalBox<UpdateQueue>,
    pending: Map<NodeId, Vec<Request>>,
    effects: Vec<Effect>,
    callbacks: Vec<(NodeId, Callback)>,
    errors: Vec<(Vec<NodeId>, ErrorRecord)>,
    // slots a failed boundary replaced with its fallback
    failed: Map<NodeId, Set<Slot>>,
    handlers: Map<String, Handler>,
    root: Option<NodeKey>,
    max_passes: usize,
    pub(crate) trace: Trace,
}

impl Runtime {
    pub(crate) fn new(queue: GenerationalBox<UpdateQueue>, config: &Config) -> Self {
        Self {
            nodes: Slab::with_capacity(config.capacity),
            index: Map::with_capacity_and_hasher(config.capacity, Default::default()),
            next_id: 0,
            queue,
            pending: Map::default(),
            effects: Vec::new(),
            callbacks: Vec::new(),
            errors: Vec::new(),
            failed: Map::default(),
            handlers: Map::default(),
            root: None,
            max_passes: config.max_passes,
            trace: Trace::new(config.trace),
        }
    }

    /// Render phase of the initial mount. Nothing is committed on failure.
    pub(crate) fn mount(&mut self, element: &ComponentElement) -> Result<()> {
        let key = self.create(None, element).map_err(uncaught)?;
        self.root = Some(key);
        Ok(())
    }

    /// Re-renders the root with new props.
    pub(crate) fn rerender_root(&mut self, props: Rc<dyn Any>) -> Result<()> {
        let Some(root) = self.root else {
            return Err(RuntimeError::TornDown);
        };
        self.update(root, Some(props)).map_err(uncaught)
    }

    /// Applies every queued request, re-evaluating each dirty node once.
    ///
    /// Returns `false` when the queue was empty.
    pub(crate) fn drain_cycle(&mut self) -> Result<bool> {
        let requests = self.queue.write().take();
        if requests.is_empty() {
            return Ok(false);
        }
        let mut dirty = Vec::new();
        for request in requests {
            let Some(&key) = self.index.get(&request.node) else {
                log::warn!(
                    "dropping update for unmounted node {} queued at {}",
                    request.node,
                    request.loc
                );
                continue;
            };
            let queued = self.pending.entry(request.node).or_default();
            if queued.is_empty() {
                dirty.push((key, request.node));
            }
            queued.push(request);
        }
        dirty.sort_by_key(|&(key, _)| self.depth(key));
        for (key, id) in dirty {
            // consumed by an ancestor re-render or unmounted by it
            if !self.pending.contains_key(&id) || !self.is_alive(key, id) {
                continue;
            }
            if let Err(record) = self.update(key, None) {
                let ancestors = self.ancestors(key);
                self.route(ancestors, record).map_err(uncaught)?;
            }
        }
        Ok(true)
    }

    /// Commit phase: snapshots, host commit, mount/update effects, callbacks.
    pub(crate) fn commit<H>(&mut self, host: &mut H) -> Result<()>
    where
        H: RenderHost,
    {
        let mut passes = 0;
        loop {
            passes += 1;
            if passes > self.max_passes {
                return Err(RuntimeError::UpdateDepthExceeded {
                    limit: self.max_passes,
                });
            }
            let mut effects = std::mem::take(&mut self.effects);
            for effect in effects.iter_mut() {
                if let Effect::Update {
                    key,
                    id,
                    prev_props,
                    prev_state,
                    snapshot,
                } = effect
                {
                    if self.is_alive(*key, *id) {
                        *snapshot =
                            self.capture_before_commit(*key, prev_props, &**prev_state);
                    }
                }
            }

            let views = self.render_views();
            host.commit(&views);

            for effect in effects {
                match effect {
                    Effect::Mount { key, id } => {
                        if self.is_alive(key, id) {
                            self.nodes[key].phase = LifecyclePhase::Mounted;
                            self.after_mount(key);
                        }
                    }
                    Effect::Update {
                        key,
                        id,
                        prev_props,
                        prev_state,
                        snapshot,
                    } => {
                        if self.is_alive(key, id) {
                            self.nodes[key].phase = LifecyclePhase::Mounted;
                            self.after_update(key, &prev_props, &*prev_state, snapshot.as_ref());
                        }
                    }
                }
            }
            for (_, node) in self.nodes.iter_mut() {
                if matches!(
                    node.phase,
                    LifecyclePhase::Updating | LifecyclePhase::ErrorCaught
                ) {
                    node.phase = LifecyclePhase::Mounted;
                }
            }

            for (id, callback) in std::mem::take(&mut self.callbacks) {
                if self.index.contains_key(&id) {
                    callback();
                }
            }

            let errors = std::mem::take(&mut self.errors);
            if errors.is_empty() {
                return Ok(());
            }
            for (ancestors, record) in errors {
                self.route(ancestors, record).map_err(uncaught)?;
            }
        }
    }

    /// Unmounts the whole tree. Hook failures are logged, not routed.
    pub(crate) fn teardown(&mut self) {
        if let Some(root) = self.root.take() {
            self.unmount(root);
        }
        for (_, record) in self.errors.drain(..) {
            log::error!("{} during teardown", record);
        }
        self.effects.clear();
        self.callbacks.clear();
        self.pending.clear();
        self.failed.clear();
        self.handlers.clear();
        if let Ok(mut queue) = self.queue.try_write() {
            queue.take();
        }
    }

    pub(crate) fn has_queued(&self) -> bool {
        self.queue.try_read().map(|q| !q.is_empty()).unwrap_or(false)
    }

    pub(crate) fn discard_queued(&mut self) -> usize {
        self.queue
            .try_write()
            .map(|mut q| q.take().len())
            .unwrap_or(0)
    }

    pub(crate) fn handler(&self, id: &str) -> Option<Handler> {
        self.handlers.get(id).cloned()
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.root.is_some()
    }

    fn next_node_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    fn create(&mut self, parent: Option<NodeKey>, element: &ComponentElement) -> Outcome<NodeKey> {
        let id = self.next_node_id();
        let component = element.component.clone();
        self.trace.record(Hook::Initialize, id, component.name());
        let state = match component.initialize(&*element.props) {
            Ok(state) => state,
            Err(err) => {
                let mut stack = vec![component.name()];
                if let Some(parent) = parent {
                    stack.extend(self.component_stack(parent));
                }
                return Err(ErrorRecord::new(
                    err,
                    Hook::Initialize,
                    id,
                    component.name(),
                    stack,
                ));
            }
        };
        let key = self.nodes.insert(Instance {
            id,
            component,
            key: element.key.clone(),
            props: element.props.clone(),
            state,
            parent,
            children: Vec::new(),
            output: Element::Empty,
            phase: LifecyclePhase::Constructing,
            health: Health::Healthy,
        });
        self.index.insert(id, key);
        match self.render_new(key) {
            Ok(()) => {
                self.effects.push(Effect::Mount { key, id });
                Ok(key)
            }
            Err(record) => {
                self.unmount(key);
                Err(record)
            }
        }
    }

    fn render_new(&mut self, key: NodeKey) -> Outcome {
        self.derive_state_from_props(key)?;
        let output = self.evaluate(key)?;
        self.reconcile_or_capture(key, output)
    }

    fn update(&mut self, key: NodeKey, next_props: Option<Rc<dyn Any>>) -> Outcome {
        let (id, component, prev_props) = {
            let node = &self.nodes[key];
            (node.id, node.component.clone(), node.props.clone())
        };
        let prev_state = component
            .clone_state(&*self.nodes[key].state)
            .map_err(|err| self.fail(key, Hook::StateUpdate, err))?;

        let requests = self.pending.remove(&id).unwrap_or_default();
        for request in requests {
            if let Some(callback) = request.callback {
                self.callbacks.push((id, callback));
            }
            let applied = (request.op)(self.nodes[key].state.as_mut());
            applied.map_err(|err| self.fail(key, Hook::StateUpdate, err))?;
        }
        if let Some(props) = next_props {
            self.nodes[key].props = props;
        }
        self.derive_state_from_props(key)?;

        if component.has_should_evaluate() {
            self.trace.record(Hook::ShouldEvaluate, id, component.name());
            let node = &self.nodes[key];
            let cx = ErasedCx {
                props: &*prev_props,
                state: &*prev_state,
                node: id,
                queue: self.queue,
            };
            let should = component.should_evaluate(cx, &*node.props, &*node.state);
            if !should.map_err(|err| self.fail(key, Hook::ShouldEvaluate, err))? {
                log::trace!(target: "lifecycle", "skipped evaluation of {} {}", component.name(), id);
                return Ok(());
            }
        }

        self.nodes[key].phase = LifecyclePhase::Updating;
        let output = self.evaluate(key)?;
        if self.restores(id, &output) {
            log::debug!(target: "lifecycle", "{} {} recovered", component.name(), id);
            self.failed.remove(&id);
            self.nodes[key].health = Health::Healthy;
        }
        self.reconcile_or_capture(key, output)?;
        self.effects.push(Effect::Update {
            key,
            id,
            prev_props,
            prev_state,
            snapshot: None,
        });
        Ok(())
    }

    fn derive_state_from_props(&mut self, key: NodeKey) -> Outcome {
        let component = self.nodes[key].component.clone();
        if !component.has_derive_state_from_props() {
            return Ok(());
        }
        self.record(Hook::DeriveStateFromProps, key);
        let node = &mut self.nodes[key];
        let derived = component.derive_state_from_props(&*node.props, node.state.as_mut());
        derived
            .map(|_| ())
            .map_err(|err| self.fail(key, Hook::DeriveStateFromProps, err))
    }

    fn evaluate(&mut self, key: NodeKey) -> Outcome<Element> {
        self.record(Hook::Evaluate, key);
        let node = &self.nodes[key];
        let output = node.component.evaluate(self.cx(node));
        output.map_err(|err| self.fail(key, Hook::Evaluate, err))
    }

    fn reconcile_or_capture(&mut self, key: NodeKey, output: Element) -> Outcome {
        if !self.nodes[key].component.is_boundary() {
            return self.reconcile(key, output);
        }
        let attempted = slots_of(&output);
        match self.reconcile(key, output) {
            Ok(()) => Ok(()),
            Err(record) => self.capture(key, record, attempted),
        }
    }

    /// Whether `output` puts back a subtree the failed boundary `id` lost.
    fn restores(&self, id: NodeId, output: &Element) -> bool {
        let Some(lost) = self.failed.get(&id) else {
            return false;
        };
        slots_of(output).iter().any(|slot| lost.contains(slot))
    }

    /// Matches the components in `output` against the node's children.
    fn reconcile(&mut self, key: NodeKey, output: Element) -> Outcome {
        let mut elements = Vec::new();
        output.for_each_component(&mut |path, el| elements.push((Slot::of(el, path), el.clone())));

        // children line up one to one with the components of the last output
        let old = self.nodes[key].children.clone();
        let mut by_slot = Map::default();
        for (slot, &child) in slots_of(&self.nodes[key].output).into_iter().zip(&old) {
            by_slot.entry(slot).or_insert(child);
        }

        let mut next = Vec::with_capacity(elements.len());
        for (slot, element) in &elements {
            let result = match by_slot.remove(slot) {
                Some(child) => {
                    self.nodes[child].component = element.component.clone();
                    self.update(child, Some(element.props.clone()))
                        .map(|()| child)
                }
                None => self.create(Some(key), element),
            };
            match result {
                Ok(child) => next.push(child),
                Err(record) => {
                    for child in next {
                        if !self.nodes[child].is_committed() {
                            self.unmount(child);
                        }
                    }
                    return Err(record);
                }
            }
        }

        let kept: Set<NodeKey> = next.iter().copied().collect();
        let node = &mut self.nodes[key];
        node.output = output;
        node.children = next;
        for child in old {
            if !kept.contains(&child) {
                self.unmount(child);
            }
        }
        Ok(())
    }

    /// Lets the boundary at `key` handle a failure from its subtree and
    /// renders its fallback. Failures past this point are not captured here.
    fn capture(&mut self, key: NodeKey, record: ErrorRecord, attempted: Vec<Slot>) -> Outcome {
        let (id, component) = {
            let node = &self.nodes[key];
            (node.id, node.component.clone())
        };
        log::debug!(
            target: "lifecycle",
            "{} {} captured {}",
            component.name(),
            id,
            record
        );

        if component.has_derive_state_from_error() {
            self.record(Hook::DeriveStateFromError, key);
            let derived = component.derive_state_from_error(self.nodes[key].state.as_mut(), &record);
            derived.map_err(|err| self.fail(key, Hook::DeriveStateFromError, err))?;
        }

        self.failed.insert(id, attempted.into_iter().collect());
        let node = &mut self.nodes[key];
        node.health = Health::Failed(record.clone());
        if node.is_committed() {
            node.phase = LifecyclePhase::ErrorCaught;
        }

        if component.has_on_error_captured() {
            self.record(Hook::OnErrorCaptured, key);
            let info = ErrorInfo {
                boundary: id,
                component_stack: record.component_stack().to_vec(),
            };
            let node = &self.nodes[key];
            let captured = component.on_error_captured(self.cx(node), &record, &info);
            captured.map_err(|err| self.fail(key, Hook::OnErrorCaptured, err))?;
        }

        self.derive_state_from_props(key)?;
        let output = self.evaluate(key)?;
        self.reconcile(key, output)
    }

    /// Hands `record` to the first live boundary among `ancestors`.
    fn route(&mut self, ancestors: Vec<NodeId>, mut record: ErrorRecord) -> Outcome {
        for id in ancestors {
            let Some(&key) = self.index.get(&id) else {
                continue;
            };
            let node = &self.nodes[key];
            if !node.component.is_boundary() {
                continue;
            }
            let committed = node.is_committed();
            let attempted = slots_of(&node.output);
            let prev_props = node.props.clone();
            let prev_state = match node.component.clone_state(&*node.state) {
                Ok(state) => state,
                Err(err) => {
                    record = self.fail(key, Hook::StateUpdate, err);
                    continue;
                }
            };
            match self.capture(key, record, attempted) {
                Ok(()) => {
                    if committed {
                        self.effects.push(Effect::Update {
                            key,
                            id,
                            prev_props,
                            prev_state,
                            snapshot: None,
                        });
                    }
                    return Ok(());
                }
                Err(next) => record = next,
            }
        }
        Err(record)
    }

    /// Removes a subtree. Committed nodes get `before_unmount`, parents first.
    fn unmount(&mut self, key: NodeKey) {
        let (id, component, committed, children) = {
            let node = &mut self.nodes[key];
            let committed = node.is_committed();
            if committed {
                node.phase = LifecyclePhase::Unmounting;
            }
            (
                node.id,
                node.component.clone(),
                committed,
                std::mem::take(&mut node.children),
            )
        };
        if committed && component.has_before_unmount() {
            self.record(Hook::BeforeUnmount, key);
            let node = &self.nodes[key];
            if let Err(err) = component.before_unmount(self.cx(node)) {
                let record = self.fail(key, Hook::BeforeUnmount, err);
                let ancestors = self.ancestors(key);
                self.errors.push((ancestors, record));
            }
        }
        for child in children {
            self.unmount(child);
        }
        self.nodes.remove(key);
        self.index.remove(&id);
        self.pending.remove(&id);
        self.failed.remove(&id);
        if let Ok(mut queue) = self.queue.try_write() {
            let cancelled = queue.cancel(id);
            if cancelled > 0 {
                log::trace!(target: "lifecycle", "cancelled {} queued updates for {}", cancelled, id);
            }
        }
    }

    fn capture_before_commit(
        &mut self,
        key: NodeKey,
        prev_props: &Rc<dyn Any>,
        prev_state: &dyn Any,
    ) -> Option<Snapshot> {
        let component = self.nodes[key].component.clone();
        if !component.has_capture_before_commit() {
            return None;
        }
        self.record(Hook::CaptureBeforeCommit, key);
        let node = &self.nodes[key];
        match component.capture_before_commit(self.cx(node), &**prev_props, prev_state) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.defer(key, Hook::CaptureBeforeCommit, err);
                None
            }
        }
    }

    fn after_mount(&mut self, key: NodeKey) {
        let component = self.nodes[key].component.clone();
        if !component.has_after_mount() {
            return;
        }
        self.record(Hook::AfterMount, key);
        let node = &self.nodes[key];
        if let Err(err) = component.after_mount(self.cx(node)) {
            self.defer(key, Hook::AfterMount, err);
        }
    }

    fn after_update(
        &mut self,
        key: NodeKey,
        prev_props: &Rc<dyn Any>,
        prev_state: &dyn Any,
        snapshot: Option<&Snapshot>,
    ) {
        let component = self.nodes[key].component.clone();
        if !component.has_after_update() {
            return;
        }
        self.record(Hook::AfterUpdate, key);
        let node = &self.nodes[key];
        let updated = component.after_update(self.cx(node), &**prev_props, prev_state, snapshot);
        if let Err(err) = updated {
            self.defer(key, Hook::AfterUpdate, err);
        }
    }

    fn defer(&mut self, key: NodeKey, hook: Hook, err: anyhow::Error) {
        let record = self.fail(key, hook, err);
        let ancestors = self.ancestors(key);
        self.errors.push((ancestors, record));
    }

    fn render_views(&mut self) -> Vec<View> {
        let mut handlers = Map::default();
        let views = self.collect_views(&mut handlers);
        self.handlers = handlers;
        views
    }

    pub(crate) fn views(&self) -> Vec<View> {
        self.collect_views(&mut Map::default())
    }

    fn collect_views(&self, handlers: &mut Map<String, Handler>) -> Vec<View> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.view_node(root, &mut out, handlers);
        }
        out
    }

    fn view_node(&self, key: NodeKey, out: &mut Vec<View>, handlers: &mut Map<String, Handler>) {
        let node = &self.nodes[key];
        let mut children = node.children.iter();
        self.view_element(&node.output, &mut children, out, handlers);
    }

    fn view_element(
        &self,
        element: &Element,
        children: &mut std::slice::Iter<'_, NodeKey>,
        out: &mut Vec<View>,
        handlers: &mut Map<String, Handler>,
    ) {
        match element {
            Element::Empty => {}
            Element::Text(text) => out.push(View::Text(text.clone())),
            Element::Tag(tag) => {
                let mut inner = Vec::with_capacity(tag.children.len());
                for child in &tag.children {
                    self.view_element(child, children, &mut inner, handlers);
                }
                if let (Some(id), Some(handler)) = (&tag.id, &tag.on_click) {
                    handlers.insert(id.clone(), handler.clone());
                }
                out.push(View::Element {
                    tag: tag.name,
                    id: tag.id.clone(),
                    children: inner,
                });
            }
            Element::Fragment(items) => {
                for item in items {
                    self.view_element(item, children, out, handlers);
                }
            }
            Element::Component(_) => {
                if let Some(&child) = children.next() {
                    self.view_node(child, out, handlers);
                }
            }
        }
    }

    pub(crate) fn find(&self, component: &str) -> Vec<NodeId> {
        let mut found: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.name() == component)
            .map(|(_, node)| node.id)
            .collect();
        found.sort();
        found
    }

    pub(crate) fn info(&self, id: NodeId) -> Option<NodeInfo> {
        let node = &self.nodes[*self.index.get(&id)?];
        Some(NodeInfo {
            id: node.id,
            component: node.name(),
            key: node.key.clone(),
            phase: node.phase,
            health: node.health.clone(),
            parent: node.parent.map(|parent| self.nodes[parent].id),
            children: node.children.iter().map(|&c| self.nodes[c].id).collect(),
        })
    }

    pub(crate) fn state<S: ComponentState>(&self, id: NodeId) -> Option<S> {
        let node = &self.nodes[*self.index.get(&id)?];
        node.state.downcast_ref::<S>().cloned()
    }

    /// Lines of `(depth, label)` in pre-order, for tree printing.
    pub(crate) fn outline(&self) -> Vec<(usize, String)> {
        let mut lines = Vec::new();
        if let Some(root) = self.root {
            self.outline_node(root, 0, &mut lines);
        }
        lines
    }

    fn outline_node(&self, key: NodeKey, depth: usize, lines: &mut Vec<(usize, String)>) {
        let node = &self.nodes[key];
        let health = match &node.health {
            Health::Healthy => String::new(),
            Health::Failed(record) => format!(" failed: {}", record.message()),
        };
        lines.push((
            depth,
            format!("{} [{:?} {:?}]{}", node.name(), node.id, node.phase, health),
        ));
        for &child in &node.children {
            self.outline_node(child, depth + 1, lines);
        }
    }

    fn cx<'a>(&self, node: &'a Instance) -> ErasedCx<'a> {
        ErasedCx {
            props: &*node.props,
            state: &*node.state,
            node: node.id,
            queue: self.queue,
        }
    }

    fn record(&mut self, hook: Hook, key: NodeKey) {
        let node = &self.nodes[key];
        self.trace.record(hook, node.id, node.name());
    }

    fn fail(&self, key: NodeKey, hook: Hook, err: anyhow::Error) -> ErrorRecord {
        let node = &self.nodes[key];
        ErrorRecord::new(err, hook, node.id, node.name(), self.component_stack(key))
    }

    fn is_alive(&self, key: NodeKey, id: NodeId) -> bool {
        self.nodes.get(key).is_some_and(|node| node.id == id)
    }

    fn depth(&self, key: NodeKey) -> usize {
        let mut depth = 0;
        let mut cursor = self.nodes[key].parent;
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.nodes[parent].parent;
        }
        depth
    }

    /// Ids from the parent of `key` up to the root.
    fn ancestors(&self, key: NodeKey) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut cursor = self.nodes[key].parent;
        while let Some(parent) = cursor {
            let node = &self.nodes[parent];
            ids.push(node.id);
            cursor = node.parent;
        }
        ids
    }

    fn component_stack(&self, key: NodeKey) -> Vec<&'static str> {
        let mut names = vec![self.nodes[key].name()];
        let mut cursor = self.nodes[key].parent;
        while let Some(parent) = cursor {
            let node = &self.nodes[parent];
            names.push(node.name());
            cursor = node.parent;
        }
        names
    }
}

fn uncaught(record: ErrorRecord) -> RuntimeError {
    RuntimeError::Uncaught(UncaughtError::new(record))
}
