//! A single-threaded component lifecycle runtime.
//!
//! A [`Component`] is a record of lifecycle hooks. Elements returned by
//! `evaluate` describe output and child components; the runtime creates,
//! updates and unmounts nodes for them, calling the hooks in a fixed order:
//!
//! - creation: `initialize`, `derive_state_from_props`, `evaluate`, `after_mount`
//! - update: `derive_state_from_props`, `should_evaluate`, `evaluate`,
//!   `capture_before_commit`, `after_update`
//! - destruction: `before_unmount`
//!
//! State changes are queued through an [`Updater`] and coalesced into one
//! re-evaluation per node per drain cycle. A component declaring
//! `derive_state_from_error` or `on_error_captured` is an error boundary and
//! replaces a failing subtree with its fallback output.
//!
//! ```
//! use lifecycle_rt::{mount, Component, Element, MemoryHost};
//!
//! let counter: Component<(), u32> = Component::new("Counter", |_| Ok(0), |cx| {
//!     let updater = cx.updater();
//!     Ok(Element::tag("button")
//!         .id("inc")
//!         .on_click(move || updater.update(|n| n + 1))
//!         .child(format!("clicked {} times", cx.state()))
//!         .into())
//! });
//!
//! let mut host = MemoryHost::new();
//! let mut root = mount(counter.el(), &mut host).unwrap();
//! root.click("inc").unwrap();
//! assert_eq!(root.host().text(), "clicked 1 times");
//! ```
#![allow(clippy::new_without_default)]

mod loc;
pub use loc::Loc;

mod config;
pub use config::Config;

mod error;
pub use error::{ErrorInfo, ErrorKind, ErrorRecord, Result, RuntimeError, UncaughtError};

mod hook;
pub use hook::{Hook, HookEvent};

mod node;
pub use node::{Health, LifecyclePhase, NodeId, NodeInfo};

mod element;
pub use element::{ComponentElement, Element, Handler, Key, Tag};

mod component;
pub use component::{Component, ComponentState, Context, Snapshot};

mod queue;
pub use queue::Updater;

mod host;
pub use host::{MemoryHost, RenderHost, View};

mod runtime;

mod root;
pub use root::{mount, Root};

pub mod utils;
