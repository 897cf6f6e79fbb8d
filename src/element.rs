use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use crate::component::{AnyComponent, ComponentId};

/// Click handler attached to a tag.
pub type Handler = Rc<dyn Fn()>;

/// Reconciliation key distinguishing siblings of the same component.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(Rc::from(value))
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key(Rc::from(value.to_string()))
    }
}

/// Description of output produced by `evaluate`.
#[derive(Clone, Default)]
pub enum Element {
    #[default]
    Empty,
    Text(String),
    Tag(Tag),
    Fragment(Vec<Element>),
    Component(ComponentElement),
}

impl Element {
    pub fn text<T: Into<String>>(text: T) -> Self {
        Element::Text(text.into())
    }

    pub fn tag(name: &'static str) -> Tag {
        Tag {
            name,
            id: None,
            on_click: None,
            children: Vec::new(),
        }
    }

    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator<Item = Element>,
    {
        Element::Fragment(children.into_iter().collect())
    }

    /// `Empty` unless `cond` holds.
    pub fn when<F>(cond: bool, element: F) -> Self
    where
        F: FnOnce() -> Element,
    {
        if cond {
            element()
        } else {
            Element::Empty
        }
    }

    /// Visits component elements in output order together with their
    /// position, the child indices leading to them. Empty children keep
    /// their index.
    pub(crate) fn for_each_component<F>(&self, f: &mut F)
    where
        F: FnMut(&[usize], &ComponentElement),
    {
        self.walk(&mut Vec::new(), f);
    }

    fn walk<F>(&self, path: &mut Vec<usize>, f: &mut F)
    where
        F: FnMut(&[usize], &ComponentElement),
    {
        let children = match self {
            Element::Empty | Element::Text(_) => return,
            Element::Component(component) => return f(path, component),
            Element::Tag(tag) => &tag.children,
            Element::Fragment(children) => children,
        };
        for (index, child) in children.iter().enumerate() {
            path.push(index);
            child.walk(path, f);
            path.pop();
        }
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Text(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::Text(value)
    }
}

impl From<Tag> for Element {
    fn from(value: Tag) -> Self {
        Element::Tag(value)
    }
}

impl From<ComponentElement> for Element {
    fn from(value: ComponentElement) -> Self {
        Element::Component(value)
    }
}

impl Debug for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Element::Empty => f.write_str("Empty"),
            Element::Text(text) => write!(f, "Text({:?})", text),
            Element::Tag(tag) => tag.fmt(f),
            Element::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            Element::Component(component) => component.fmt(f),
        }
    }
}

/// A host element such as `div` or `button`.
#[derive(Clone)]
pub struct Tag {
    pub(crate) name: &'static str,
    pub(crate) id: Option<String>,
    pub(crate) on_click: Option<Handler>,
    pub(crate) children: Vec<Element>,
}

impl Tag {
    pub fn id<T: Into<String>>(mut self, id: T) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn on_click<F>(mut self, handler: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.on_click = Some(Rc::new(handler));
        self
    }

    pub fn child<E: Into<Element>>(mut self, child: E) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Element>,
    {
        self.children.extend(children);
        self
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("on_click", &self.on_click.is_some())
            .field("children", &self.children)
            .finish()
    }
}

/// A request to render a component with the given props.
#[derive(Clone)]
pub struct ComponentElement {
    pub(crate) component: Rc<dyn AnyComponent>,
    pub(crate) props: Rc<dyn Any>,
    pub(crate) key: Option<Key>,
}

impl ComponentElement {
    pub fn key<K: Into<Key>>(mut self, key: K) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.component.name()
    }

    pub(crate) fn component_id(&self) -> ComponentId {
        self.component.id()
    }
}

impl Debug for ComponentElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_false_is_empty() {
        let el = Element::when(false, || Element::text("hidden"));
        assert!(matches!(el, Element::Empty));
        let el = Element::when(true, || Element::text("shown"));
        assert!(matches!(el, Element::Text(ref t) if t == "shown"));
    }

    #[test]
    fn hidden_children_keep_their_position() {
        let item: crate::Component<u32, ()> =
            crate::Component::stateless("Item", |n: &u32| Ok(Element::text(n.to_string())));
        let output = |show: bool| {
            Element::fragment([
                Element::when(show, || item.element(1).into()),
                Element::tag("div").child(item.element(2)).into(),
            ])
        };
        let mut paths = Vec::new();
        output(true).for_each_component(&mut |path, _| paths.push(path.to_vec()));
        assert_eq!(paths, vec![vec![0], vec![1, 0]]);
        paths.clear();
        output(false).for_each_component(&mut |path, _| paths.push(path.to_vec()));
        assert_eq!(paths, vec![vec![1, 0]]);
    }

    #[test]
    fn tag_builder_collects_children() {
        let tag = Element::tag("div")
            .id("app")
            .child("a")
            .children(vec![Element::text("b"), Element::Empty]);
        assert_eq!(tag.id.as_deref(), Some("app"));
        assert_eq!(tag.children.len(), 3);
        assert!(tag.on_click.is_none());
    }
}
