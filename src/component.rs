use std::any::{type_name, Any, TypeId};
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use anyhow::anyhow;
use generational_box::GenerationalBox;

use crate::element::ComponentElement;
use crate::queue::{UpdateQueue, Updater};
use crate::{Element, ErrorInfo, ErrorRecord, Loc, NodeId};

/// State owned by a node.
///
/// Queued patches are merged in request order. Structured state usually
/// pairs with a patch struct of `Option` fields and merges by field; the
/// scalar impls below replace the whole value.
pub trait ComponentState: Clone + 'static {
    type Patch: 'static;

    fn merge(&mut self, patch: Self::Patch);
}

macro_rules! replace_state {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ComponentState for $ty {
                type Patch = $ty;

                #[inline(always)]
                fn merge(&mut self, patch: Self::Patch) {
                    *self = patch;
                }
            }
        )*
    };
}

replace_state!((), bool, char, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, String);

impl<T> ComponentState for Option<T>
where
    T: Clone + 'static,
{
    type Patch = Option<T>;

    fn merge(&mut self, patch: Self::Patch) {
        *self = patch;
    }
}

/// Value captured by `capture_before_commit` and handed to `after_update`.
pub struct Snapshot(Box<dyn Any>);

impl Snapshot {
    pub fn new<T: 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Debug for Snapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Snapshot(..)")
    }
}

/// What an instance hook sees of its node.
pub struct Context<'a, P, S> {
    props: &'a P,
    state: &'a S,
    node: NodeId,
    updater: Updater<S>,
}

impl<'a, P, S> Context<'a, P, S>
where
    S: ComponentState,
{
    pub fn props(&self) -> &'a P {
        self.props
    }

    pub fn state(&self) -> &'a S {
        self.state
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Handle to this node's update queue. Handlers capture it by value.
    pub fn updater(&self) -> Updater<S> {
        self.updater
    }
}

type InitFn<P, S> = Rc<dyn Fn(&P) -> anyhow::Result<S>>;
type DeriveFn<P, S> = Rc<dyn Fn(&P, &S) -> anyhow::Result<Option<<S as ComponentState>::Patch>>>;
type ShouldFn<P, S> = Rc<dyn Fn(&Context<P, S>, &P, &S) -> anyhow::Result<bool>>;
type EvalFn<P, S> = Rc<dyn Fn(&Context<P, S>) -> anyhow::Result<Element>>;
type EffectFn<P, S> = Rc<dyn Fn(&Context<P, S>) -> anyhow::Result<()>>;
type CaptureFn<P, S> = Rc<dyn Fn(&Context<P, S>, &P, &S) -> anyhow::Result<Option<Snapshot>>>;
type UpdatedFn<P, S> = Rc<dyn Fn(&Context<P, S>, &P, &S, Option<&Snapshot>) -> anyhow::Result<()>>;
type FromErrorFn<S> =
    Rc<dyn Fn(&ErrorRecord) -> anyhow::Result<Option<<S as ComponentState>::Patch>>>;
type CapturedFn<P, S> = Rc<dyn Fn(&Context<P, S>, &ErrorRecord, &ErrorInfo) -> anyhow::Result<()>>;

/// Identity used to match elements against existing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    loc: Loc,
    ty: TypeId,
}

/// A component definition: a record of the hooks it provides.
///
/// `initialize` and `evaluate` are required; every other hook is optional and
/// only invoked when present. Definitions created at the same call site are
/// the same component for reconciliation.
pub struct Component<P, S>
where
    S: ComponentState,
{
    id: ComponentId,
    name: &'static str,
    initialize: InitFn<P, S>,
    evaluate: EvalFn<P, S>,
    derive_state_from_props: Option<DeriveFn<P, S>>,
    should_evaluate: Option<ShouldFn<P, S>>,
    capture_before_commit: Option<CaptureFn<P, S>>,
    after_mount: Option<EffectFn<P, S>>,
    after_update: Option<UpdatedFn<P, S>>,
    before_unmount: Option<EffectFn<P, S>>,
    derive_state_from_error: Option<FromErrorFn<S>>,
    on_error_captured: Option<CapturedFn<P, S>>,
}

impl<P, S> Clone for Component<P, S>
where
    S: ComponentState,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name,
            initialize: self.initialize.clone(),
            evaluate: self.evaluate.clone(),
            derive_state_from_props: self.derive_state_from_props.clone(),
            should_evaluate: self.should_evaluate.clone(),
            capture_before_commit: self.capture_before_commit.clone(),
            after_mount: self.after_mount.clone(),
            after_update: self.after_update.clone(),
            before_unmount: self.before_unmount.clone(),
            derive_state_from_error: self.derive_state_from_error.clone(),
            on_error_captured: self.on_error_captured.clone(),
        }
    }
}

impl<P, S> Component<P, S>
where
    P: 'static,
    S: ComponentState,
{
    #[track_caller]
    pub fn new<I, E>(name: &'static str, initialize: I, evaluate: E) -> Self
    where
        I: Fn(&P) -> anyhow::Result<S> + 'static,
        E: Fn(&Context<P, S>) -> anyhow::Result<Element> + 'static,
    {
        Self {
            id: ComponentId {
                loc: Loc::new(),
                ty: TypeId::of::<(P, S)>(),
            },
            name,
            initialize: Rc::new(initialize),
            evaluate: Rc::new(evaluate),
            derive_state_from_props: None,
            should_evaluate: None,
            capture_before_commit: None,
            after_mount: None,
            after_update: None,
            before_unmount: None,
            derive_state_from_error: None,
            on_error_captured: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn derive_state_from_props<F>(mut self, f: F) -> Self
    where
        F: Fn(&P, &S) -> anyhow::Result<Option<S::Patch>> + 'static,
    {
        self.derive_state_from_props = Some(Rc::new(f));
        self
    }

    pub fn should_evaluate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<P, S>, &P, &S) -> anyhow::Result<bool> + 'static,
    {
        self.should_evaluate = Some(Rc::new(f));
        self
    }

    pub fn capture_before_commit<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<P, S>, &P, &S) -> anyhow::Result<Option<Snapshot>> + 'static,
    {
        self.capture_before_commit = Some(Rc::new(f));
        self
    }

    pub fn after_mount<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<P, S>) -> anyhow::Result<()> + 'static,
    {
        self.after_mount = Some(Rc::new(f));
        self
    }

    pub fn after_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<P, S>, &P, &S, Option<&Snapshot>) -> anyhow::Result<()> + 'static,
    {
        self.after_update = Some(Rc::new(f));
        self
    }

    pub fn before_unmount<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<P, S>) -> anyhow::Result<()> + 'static,
    {
        self.before_unmount = Some(Rc::new(f));
        self
    }

    pub fn derive_state_from_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ErrorRecord) -> anyhow::Result<Option<S::Patch>> + 'static,
    {
        self.derive_state_from_error = Some(Rc::new(f));
        self
    }

    pub fn on_error_captured<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<P, S>, &ErrorRecord, &ErrorInfo) -> anyhow::Result<()> + 'static,
    {
        self.on_error_captured = Some(Rc::new(f));
        self
    }

    /// Describes an instance of this component with `props`.
    pub fn element(&self, props: P) -> ComponentElement {
        ComponentElement {
            component: Rc::new(self.clone()),
            props: Rc::new(props),
            key: None,
        }
    }

    fn context<'a>(&self, cx: &ErasedCx<'a>) -> anyhow::Result<Context<'a, P, S>> {
        Ok(Context {
            props: downcast_ref::<P>(cx.props)?,
            state: downcast_ref::<S>(cx.state)?,
            node: cx.node,
            updater: Updater::new(cx.node, cx.queue),
        })
    }
}

impl<S> Component<(), S>
where
    S: ComponentState,
{
    pub fn el(&self) -> ComponentElement {
        self.element(())
    }
}

impl<P> Component<P, ()>
where
    P: 'static,
{
    /// A component without state.
    #[track_caller]
    pub fn stateless<E>(name: &'static str, evaluate: E) -> Self
    where
        E: Fn(&P) -> anyhow::Result<Element> + 'static,
    {
        Component::new(name, |_| Ok(()), move |cx: &Context<P, ()>| evaluate(cx.props()))
    }
}

impl<P, S> Debug for Component<P, S>
where
    S: ComponentState,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

pub(crate) fn downcast_ref<'a, T: 'static>(value: &'a dyn Any) -> anyhow::Result<&'a T> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("expected value of type {}", type_name::<T>()))
}

pub(crate) fn downcast_mut<'a, T: 'static>(value: &'a mut dyn Any) -> anyhow::Result<&'a mut T> {
    value
        .downcast_mut::<T>()
        .ok_or_else(|| anyhow!("expected value of type {}", type_name::<T>()))
}

/// Type-erased view of a node passed through [`AnyComponent`].
#[derive(Clone, Copy)]
pub(crate) struct ErasedCx<'a> {
    pub(crate) props: &'a dyn Any,
    pub(crate) state: &'a dyn Any,
    pub(crate) node: NodeId,
    pub(crate) queue: GenerationalBox<UpdateQueue>,
}

/// Object-safe face of [`Component`] used by the runtime.
pub(crate) trait AnyComponent {
    fn id(&self) -> ComponentId;
    fn name(&self) -> &'static str;
    fn is_boundary(&self) -> bool;
    fn clone_state(&self, state: &dyn Any) -> anyhow::Result<Box<dyn Any>>;
    fn initialize(&self, props: &dyn Any) -> anyhow::Result<Box<dyn Any>>;
    fn has_derive_state_from_props(&self) -> bool;
    fn derive_state_from_props(&self, props: &dyn Any, state: &mut dyn Any) -> anyhow::Result<bool>;
    fn has_should_evaluate(&self) -> bool;
    fn should_evaluate(
        &self,
        cx: ErasedCx<'_>,
        next_props: &dyn Any,
        next_state: &dyn Any,
    ) -> anyhow::Result<bool>;
    fn evaluate(&self, cx: ErasedCx<'_>) -> anyhow::Result<Element>;
    fn has_capture_before_commit(&self) -> bool;
    fn capture_before_commit(
        &self,
        cx: ErasedCx<'_>,
        prev_props: &dyn Any,
        prev_state: &dyn Any,
    ) -> anyhow::Result<Option<Snapshot>>;
    fn has_after_mount(&self) -> bool;
    fn after_mount(&self, cx: ErasedCx<'_>) -> anyhow::Result<()>;
    fn has_after_update(&self) -> bool;
    fn after_update(
        &self,
        cx: ErasedCx<'_>,
        prev_props: &dyn Any,
        prev_state: &dyn Any,
        snapshot: Option<&Snapshot>,
    ) -> anyhow::Result<()>;
    fn has_before_unmount(&self) -> bool;
    fn before_unmount(&self, cx: ErasedCx<'_>) -> anyhow::Result<()>;
    fn has_derive_state_from_error(&self) -> bool;
    fn derive_state_from_error(&self, state: &mut dyn Any, error: &ErrorRecord) -> anyhow::Result<bool>;
    fn has_on_error_captured(&self) -> bool;
    fn on_error_captured(
        &self,
        cx: ErasedCx<'_>,
        error: &ErrorRecord,
        info: &ErrorInfo,
    ) -> anyhow::Result<()>;
}

impl<P, S> AnyComponent for Component<P, S>
where
    P: 'static,
    S: ComponentState,
{
    fn id(&self) -> ComponentId {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_boundary(&self) -> bool {
        self.derive_state_from_error.is_some() || self.on_error_captured.is_some()
    }

    fn clone_state(&self, state: &dyn Any) -> anyhow::Result<Box<dyn Any>> {
        Ok(Box::new(downcast_ref::<S>(state)?.clone()))
    }

    fn initialize(&self, props: &dyn Any) -> anyhow::Result<Box<dyn Any>> {
        let state = (self.initialize)(downcast_ref::<P>(props)?)?;
        Ok(Box::new(state))
    }

    fn has_derive_state_from_props(&self) -> bool {
        self.derive_state_from_props.is_some()
    }

    fn derive_state_from_props(&self, props: &dyn Any, state: &mut dyn Any) -> anyhow::Result<bool> {
        let Some(derive) = &self.derive_state_from_props else {
            return Ok(false);
        };
        let state = downcast_mut::<S>(state)?;
        match derive(downcast_ref::<P>(props)?, state)? {
            Some(patch) => {
                state.merge(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn has_should_evaluate(&self) -> bool {
        self.should_evaluate.is_some()
    }

    fn should_evaluate(
        &self,
        cx: ErasedCx<'_>,
        next_props: &dyn Any,
        next_state: &dyn Any,
    ) -> anyhow::Result<bool> {
        let Some(should) = &self.should_evaluate else {
            return Ok(true);
        };
        should(
            &self.context(&cx)?,
            downcast_ref::<P>(next_props)?,
            downcast_ref::<S>(next_state)?,
        )
    }

    fn evaluate(&self, cx: ErasedCx<'_>) -> anyhow::Result<Element> {
        (self.evaluate)(&self.context(&cx)?)
    }

    fn has_capture_before_commit(&self) -> bool {
        self.capture_before_commit.is_some()
    }

    fn capture_before_commit(
        &self,
        cx: ErasedCx<'_>,
        prev_props: &dyn Any,
        prev_state: &dyn Any,
    ) -> anyhow::Result<Option<Snapshot>> {
        let Some(capture) = &self.capture_before_commit else {
            return Ok(None);
        };
        capture(
            &self.context(&cx)?,
            downcast_ref::<P>(prev_props)?,
            downcast_ref::<S>(prev_state)?,
        )
    }

    fn has_after_mount(&self) -> bool {
        self.after_mount.is_some()
    }

    fn after_mount(&self, cx: ErasedCx<'_>) -> anyhow::Result<()> {
        match &self.after_mount {
            Some(f) => f(&self.context(&cx)?),
            None => Ok(()),
        }
    }

    fn has_after_update(&self) -> bool {
        self.after_update.is_some()
    }

    fn after_update(
        &self,
        cx: ErasedCx<'_>,
        prev_props: &dyn Any,
        prev_state: &dyn Any,
        snapshot: Option<&Snapshot>,
    ) -> anyhow::Result<()> {
        let Some(updated) = &self.after_update else {
            return Ok(());
        };
        updated(
            &self.context(&cx)?,
            downcast_ref::<P>(prev_props)?,
            downcast_ref::<S>(prev_state)?,
            snapshot,
        )
    }

    fn has_before_unmount(&self) -> bool {
        self.before_unmount.is_some()
    }

    fn before_unmount(&self, cx: ErasedCx<'_>) -> anyhow::Result<()> {
        match &self.before_unmount {
            Some(f) => f(&self.context(&cx)?),
            None => Ok(()),
        }
    }

    fn has_derive_state_from_error(&self) -> bool {
        self.derive_state_from_error.is_some()
    }

    fn derive_state_from_error(&self, state: &mut dyn Any, error: &ErrorRecord) -> anyhow::Result<bool> {
        let Some(derive) = &self.derive_state_from_error else {
            return Ok(false);
        };
        match derive(error)? {
            Some(patch) => {
                downcast_mut::<S>(state)?.merge(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn has_on_error_captured(&self) -> bool {
        self.on_error_captured.is_some()
    }

    fn on_error_captured(
        &self,
        cx: ErasedCx<'_>,
        error: &ErrorRecord,
        info: &ErrorInfo,
    ) -> anyhow::Result<()> {
        match &self.on_error_captured {
            Some(f) => f(&self.context(&cx)?, error, info),
            None => Ok(()),
        }
    }
}
