use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use generational_box::{AnyStorage, Owner, UnsyncStorage};

use crate::error::Result;
use crate::queue::UpdateQueue;
use crate::runtime::Runtime;
use crate::{
    utils, Component, ComponentState, Config, Element, HookEvent, NodeId, NodeInfo, RenderHost,
    RuntimeError, View,
};

fn host_root() -> Component<Element, ()> {
    Component::stateless("Root", |element: &Element| Ok(element.clone()))
}

/// Mounts `element` onto `host` with the default [`Config`].
pub fn mount<E, H>(element: E, host: H) -> Result<Root<H>>
where
    E: Into<Element>,
    H: RenderHost,
{
    Root::mount(element, host)
}

/// A mounted tree and the host it renders to.
pub struct Root<H>
where
    H: RenderHost,
{
    #[allow(dead_code)]
    owner: Owner,
    runtime: Runtime,
    host: H,
    config: Config,
    torn_down: bool,
}

impl<H> Root<H>
where
    H: RenderHost,
{
    pub fn mount<E>(element: E, host: H) -> Result<Self>
    where
        E: Into<Element>,
    {
        Self::with_config(element, host, Config::default())
    }

    /// Runs the creation sequence for the whole tree and commits it.
    ///
    /// An uncaught failure during the render phase returns before anything
    /// reaches the host.
    pub fn with_config<E>(element: E, host: H, config: Config) -> Result<Self>
    where
        E: Into<Element>,
    {
        let owner = UnsyncStorage::owner();
        let queue = owner.insert(UpdateQueue::default());
        let runtime = Runtime::new(queue, &config);
        let mut root = Self {
            owner,
            runtime,
            host,
            config,
            torn_down: false,
        };
        let element = host_root().element(element.into());
        if let Err(err) = root.runtime.mount(&element) {
            root.runtime.teardown();
            root.torn_down = true;
            return Err(err);
        }
        root.commit()?;
        root.flush()?;
        Ok(root)
    }

    /// Replaces the root element, updating the tree in place.
    pub fn render<E>(&mut self, element: E) -> Result<()>
    where
        E: Into<Element>,
    {
        self.ensure_live()?;
        let element: Element = element.into();
        let props: Rc<dyn std::any::Any> = Rc::new(element);
        if let Err(err) = self.runtime.rerender_root(props) {
            return Err(self.fail(err));
        }
        self.commit()?;
        self.flush()
    }

    /// Runs drain cycles until no state-mutation requests are queued.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_live()?;
        let mut passes = 0;
        while self.runtime.has_queued() {
            passes += 1;
            if passes > self.config.max_passes {
                let dropped = self.runtime.discard_queued();
                log::error!(
                    "giving up after {} drain cycles, {} requests dropped",
                    self.config.max_passes,
                    dropped
                );
                return Err(RuntimeError::UpdateDepthExceeded {
                    limit: self.config.max_passes,
                });
            }
            match self.runtime.drain_cycle() {
                Ok(true) => self.commit()?,
                Ok(false) => break,
                Err(err) => return Err(self.fail(err)),
            }
        }
        Ok(())
    }

    /// Invokes the click handler of the committed tag with `id`, then flushes.
    pub fn click(&mut self, id: &str) -> Result<()> {
        self.ensure_live()?;
        let handler = self
            .runtime
            .handler(id)
            .ok_or_else(|| RuntimeError::UnknownTarget(id.to_string()))?;
        handler();
        self.flush()
    }

    /// Runs `before_unmount` for every node and clears the host. Dropping a
    /// live root does the same.
    pub fn unmount(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.teardown();
        Ok(())
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output of the current tree, as last evaluated.
    pub fn view(&self) -> Vec<View> {
        self.runtime.views()
    }

    /// Ids of live nodes of the named component, oldest first.
    pub fn find(&self, component: &str) -> Vec<NodeId> {
        self.runtime.find(component)
    }

    pub fn node(&self, id: NodeId) -> Option<NodeInfo> {
        self.runtime.info(id)
    }

    pub fn state<S>(&self, id: NodeId) -> Option<S>
    where
        S: ComponentState,
    {
        self.runtime.state::<S>(id)
    }

    /// Hook calls recorded so far when [`Config::trace`] is set.
    pub fn trace(&self) -> &[HookEvent] {
        self.runtime.trace.events()
    }

    pub fn take_trace(&mut self) -> Vec<HookEvent> {
        self.runtime.trace.take()
    }

    pub fn format_tree(&self) -> String {
        utils::format_outline("Root", &self.runtime.outline())
    }

    pub fn print_tree(&self) {
        print!("{}", self.format_tree());
    }

    fn commit(&mut self) -> Result<()> {
        if let Err(err) = self.runtime.commit(&mut self.host) {
            return Err(self.fail(err));
        }
        Ok(())
    }

    fn fail(&mut self, err: RuntimeError) -> RuntimeError {
        if let Some(uncaught) = err.uncaught() {
            log::error!("{}, tearing down", uncaught);
            self.teardown();
        }
        err
    }

    fn teardown(&mut self) {
        self.runtime.teardown();
        self.host.clear();
        self.torn_down = true;
    }

    fn ensure_live(&self) -> Result<()> {
        if self.torn_down || !self.runtime.is_mounted() {
            return Err(RuntimeError::TornDown);
        }
        Ok(())
    }
}

impl<H> Drop for Root<H>
where
    H: RenderHost,
{
    fn drop(&mut self) {
        if !self.torn_down {
            self.teardown();
        }
    }
}

impl<H> Debug for Root<H>
where
    H: RenderHost,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("config", &self.config)
            .field("torn_down", &self.torn_down)
            .field("tree", &self.runtime.outline())
            .finish()
    }
}
