use std::env;

use anyhow::{anyhow, bail};
use lifecycle_rt::{
    utils, Component, ComponentState, Element, RenderHost, Root, RuntimeError, Snapshot, View,
};

#[derive(Debug, Clone)]
struct ExampleProps {
    name: String,
}

#[derive(Debug, Clone)]
struct ExampleState {
    count: u32,
}

#[derive(Debug, Default)]
struct ExamplePatch {
    count: Option<u32>,
}

impl ComponentState for ExampleState {
    type Patch = ExamplePatch;

    fn merge(&mut self, patch: ExamplePatch) {
        if let Some(count) = patch.count {
            self.count = count;
        }
    }
}

fn example() -> Component<ExampleProps, ExampleState> {
    Component::<ExampleProps, ExampleState>::new(
        "Example",
        |_| {
            log::info!("constructor");
            Ok(ExampleState { count: 0 })
        },
        |cx| {
            log::info!("render");
            let updater = cx.updater();
            Ok(Element::fragment([
                Element::from(Element::tag("p").child(cx.props().name.clone())),
                Element::from(
                    Element::tag("p").child(format!("You clicked {} times", cx.state().count)),
                ),
                Element::from(
                    Element::tag("button")
                        .id("increment")
                        .on_click(move || {
                            updater.update_then(
                                |s: &ExampleState| ExamplePatch {
                                    count: Some(s.count + 1),
                                },
                                || log::info!("state updated and re-rendered"),
                            )
                        })
                        .child("Click me"),
                ),
            ]))
        },
    )
    .derive_state_from_props(|_, _| {
        log::info!("get derived state from props");
        Ok(None)
    })
    .should_evaluate(|_, _, _| {
        log::info!("should component update");
        Ok(true)
    })
    .after_mount(|_| {
        log::info!("component did mount");
        Ok(())
    })
    .capture_before_commit(|_, _, _| {
        log::info!("get snapshot before update");
        Ok(Some(Snapshot::new(5)))
    })
    .after_update(|_, _, _, snapshot| {
        let snapshot = snapshot.and_then(|s| s.get::<i32>()).copied();
        log::info!("component did update, snapshot {:?}", snapshot);
        Ok(())
    })
    .before_unmount(|_| {
        log::info!("component will unmount");
        Ok(())
    })
}

fn error_button() -> Component<(), bool> {
    Component::new(
        "ErrorButton",
        |_| Ok(false),
        |cx| {
            if *cx.state() {
                bail!("Something went wrong.");
            }
            let updater = cx.updater();
            Ok(Element::tag("button")
                .id("error")
                .on_click(move || updater.set(true))
                .child("Trigger Error")
                .into())
        },
    )
}

fn error_boundary() -> Component<Vec<Element>, Option<String>> {
    Component::<Vec<Element>, Option<String>>::new(
        "ErrorBoundary",
        |_| Ok(None),
        |cx| match cx.state() {
            Some(message) => Ok(Element::tag("h1")
                .child(format!("Oops! {}", message))
                .into()),
            None => Ok(Element::fragment(cx.props().iter().cloned())),
        },
    )
    .derive_state_from_error(|error| Ok(Some(Some(error.message()))))
    .on_error_captured(|cx, error, info| {
        log::warn!("error => {}", error);
        log::warn!("info => {:?}", info.component_stack);
        log::warn!("state.error_message => {:?}", cx.state());
        Ok(())
    })
}

fn app() -> Component<(), bool> {
    Component::new(
        "App",
        |_| Ok(true),
        |cx| {
            let mounted = *cx.state();
            let updater = cx.updater();
            Ok(Element::tag("div")
                .id("app")
                .child(
                    Element::tag("button")
                        .id("toggle")
                        .on_click(move || updater.update(|m| !m))
                        .child("Mount / unMount"),
                )
                .child(Element::when(mounted, || {
                    example()
                        .element(ExampleProps {
                            name: "Example".to_string(),
                        })
                        .into()
                }))
                .child(Element::tag("br"))
                .child(error_button().el())
                .into())
        },
    )
}

struct TerminalHost;

impl RenderHost for TerminalHost {
    fn commit(&mut self, views: &[View]) {
        utils::print_views(views);
    }

    fn clear(&mut self) {
        println!("Surface cleared");
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut actions: Vec<String> = env::args().skip(1).collect();
    if actions.is_empty() {
        actions = ["click", "click", "toggle", "toggle", "break"]
            .map(String::from)
            .to_vec();
    }

    let page = error_boundary().element(vec![app().el().into()]);
    let mut root = Root::mount(page, TerminalHost)?;
    root.print_tree();

    for action in &actions {
        let target = match action.as_str() {
            "click" => "increment",
            "toggle" => "toggle",
            "break" => "error",
            other => {
                return Err(anyhow!(
                    "unknown action `{}`, expected click, toggle or break",
                    other
                ))
            }
        };
        log::info!("action: {}", action);
        match root.click(target) {
            Ok(()) => {}
            Err(RuntimeError::UnknownTarget(id)) => log::warn!("nothing to click at `{}`", id),
            Err(err) => return Err(err.into()),
        }
        root.print_tree();
    }
    root.unmount()?;
    Ok(())
}
