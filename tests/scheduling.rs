use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lifecycle_rt::Hook::*;
use lifecycle_rt::{
    Component, ComponentState, Config, Element, Hook, HookEvent, MemoryHost, Root, RuntimeError,
    Updater,
};

fn traced() -> Config {
    Config::default().trace(true)
}

fn hooks_of(trace: &[HookEvent], component: &str) -> Vec<Hook> {
    trace
        .iter()
        .filter(|e| e.component == component)
        .map(|e| e.hook)
        .collect()
}

fn counter() -> Component<(), u32> {
    Component::new("Counter", |_| Ok(0), |cx| {
        let updater = cx.updater();
        Ok(Element::tag("button")
            .id("triple")
            .on_click(move || {
                updater.update(|n| n + 1);
                updater.update(|n| n + 1);
                updater.update(|n| n + 1);
            })
            .child(cx.state().to_string())
            .into())
    })
}

#[test]
fn queued_requests_coalesce_into_one_evaluation() {
    let mut host = MemoryHost::new();
    let mut root = Root::with_config(counter().el(), &mut host, traced()).unwrap();
    root.take_trace();

    root.click("triple").unwrap();
    assert_eq!(hooks_of(&root.take_trace(), "Counter"), vec![Evaluate]);
    assert_eq!(root.host().text(), "3");
    assert_eq!(root.host().commits(), 2);
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Form {
    name: String,
    age: u32,
}

#[derive(Default)]
struct FormPatch {
    name: Option<String>,
    age: Option<u32>,
}

impl ComponentState for Form {
    type Patch = FormPatch;

    fn merge(&mut self, patch: FormPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
    }
}

#[test]
fn patches_merge_shallowly_in_request_order() {
    let form = Component::<(), Form>::new(
        "Form",
        |_| Ok(Form::default()),
        |cx| {
            let updater = cx.updater();
            Ok(Element::tag("button")
                .id("fill")
                .on_click(move || {
                    updater.set(FormPatch {
                        name: Some("ada".to_string()),
                        ..Default::default()
                    });
                    updater.set(FormPatch {
                        age: Some(36),
                        ..Default::default()
                    });
                    updater.set(FormPatch {
                        name: Some("grace".to_string()),
                        ..Default::default()
                    });
                })
                .child(format!("{} {}", cx.state().name, cx.state().age))
                .into())
        },
    );

    let mut host = MemoryHost::new();
    let mut root = Root::with_config(form.el(), &mut host, traced()).unwrap();
    let id = root.find("Form")[0];
    root.take_trace();

    root.click("fill").unwrap();
    assert_eq!(hooks_of(&root.take_trace(), "Form"), vec![Evaluate]);
    assert_eq!(
        root.state::<Form>(id),
        Some(Form {
            name: "grace".to_string(),
            age: 36
        })
    );
    assert_eq!(root.host().text(), "grace 36");
}

#[test]
fn completion_callback_runs_after_commit() {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let events = log.clone();
    let sink = log.clone();
    let notified = Component::<(), u32>::new(
        "Notified",
        |_| Ok(0),
        move |cx| {
            events.borrow_mut().push("evaluate");
            let updater = cx.updater();
            let events = events.clone();
            Ok(Element::tag("button")
                .id("go")
                .on_click(move || {
                    let events = events.clone();
                    updater.set_then(1, move || events.borrow_mut().push("callback"));
                })
                .into())
        },
    )
    .after_update(move |_, _, _, _| {
        sink.borrow_mut().push("after_update");
        Ok(())
    });

    let mut root = Root::mount(notified.el(), MemoryHost::new()).unwrap();
    assert_eq!(*log.borrow(), ["evaluate"]);
    root.click("go").unwrap();
    assert_eq!(
        *log.borrow(),
        ["evaluate", "evaluate", "after_update", "callback"]
    );
}

#[test]
fn completion_callback_runs_when_evaluation_is_skipped() {
    let fired = Rc::new(Cell::new(0));
    let count = fired.clone();
    let frozen = Component::<(), u32>::new(
        "Frozen",
        |_| Ok(0),
        move |cx| {
            let updater = cx.updater();
            let count = count.clone();
            Ok(Element::tag("button")
                .id("poke")
                .on_click(move || {
                    let count = count.clone();
                    updater.set_then(1, move || count.set(count.get() + 1));
                })
                .into())
        },
    )
    .should_evaluate(|_, _, _| Ok(false));

    let mut host = MemoryHost::new();
    let mut root = Root::with_config(frozen.el(), &mut host, traced()).unwrap();
    root.take_trace();
    root.click("poke").unwrap();
    assert_eq!(fired.get(), 1);
    assert_eq!(hooks_of(root.trace(), "Frozen"), vec![ShouldEvaluate]);
}

#[test]
fn parent_and_child_updates_share_one_cycle() {
    let parent_slot: Rc<Cell<Option<Updater<u32>>>> = Rc::default();
    let child_slot: Rc<Cell<Option<Updater<u32>>>> = Rc::default();

    let leaf = {
        let slot = child_slot.clone();
        Component::<u32, u32>::new(
            "Leaf",
            |_| Ok(0),
            |cx| Ok(Element::text(format!("{}:{}", cx.props(), cx.state()))),
        )
        .after_mount(move |cx| {
            slot.set(Some(cx.updater()));
            Ok(())
        })
    };
    let parent = {
        let slot = parent_slot.clone();
        Component::<(), u32>::new(
            "Parent",
            |_| Ok(0),
            move |cx| Ok(leaf.element(*cx.state()).into()),
        )
        .after_mount(move |cx| {
            slot.set(Some(cx.updater()));
            Ok(())
        })
    };

    let mut host = MemoryHost::new();
    let mut root = Root::with_config(parent.el(), &mut host, traced()).unwrap();
    root.take_trace();

    child_slot.get().unwrap().set(7);
    parent_slot.get().unwrap().set(5);
    root.flush().unwrap();

    let trace = root.take_trace();
    assert_eq!(hooks_of(&trace, "Parent"), vec![Evaluate]);
    assert_eq!(hooks_of(&trace, "Leaf"), vec![Evaluate]);
    assert_eq!(root.host().text(), "5:7");
    assert_eq!(root.host().commits(), 2);
}

#[test]
fn runaway_updates_hit_the_pass_limit() {
    let runaway = Component::<(), u32>::new(
        "Runaway",
        |_| Ok(0),
        |cx| {
            let updater = cx.updater();
            Ok(Element::tag("button")
                .id("start")
                .on_click(move || updater.set(1))
                .into())
        },
    )
    .after_update(|cx, _, _, _| {
        cx.updater().update(|n| n + 1);
        Ok(())
    });

    let config = Config::default().max_passes(5);
    let mut root = Root::with_config(runaway.el(), MemoryHost::new(), config).unwrap();
    let id = root.find("Runaway")[0];

    let err = root.click("start").unwrap_err();
    assert!(matches!(err, RuntimeError::UpdateDepthExceeded { limit: 5 }));
    assert!(!root.is_torn_down());
    assert_eq!(root.state::<u32>(id), Some(5));
    assert!(root.flush().is_ok());
}

#[test]
fn clicking_an_unknown_target_fails() {
    let mut root = Root::mount(counter().el(), MemoryHost::new()).unwrap();
    let err = root.click("missing").unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownTarget(ref id) if id == "missing"));
    assert!(!root.is_torn_down());
}
