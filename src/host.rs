/// Committed output handed to the render host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Text(String),
    Element {
        tag: &'static str,
        id: Option<String>,
        children: Vec<View>,
    },
}

impl View {
    /// Concatenated text of this view and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            View::Text(text) => out.push_str(text),
            View::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Depth-first search for the element with `id`.
    pub fn find(&self, id: &str) -> Option<&View> {
        match self {
            View::Text(_) => None,
            View::Element {
                id: Some(own), ..
            } if own == id => Some(self),
            View::Element { children, .. } => children.iter().find_map(|c| c.find(id)),
        }
    }
}

/// The surface a root is mounted on.
pub trait RenderHost {
    /// Replaces the displayed output with `views`.
    fn commit(&mut self, views: &[View]);

    /// Called once when the tree is torn down.
    fn clear(&mut self);
}

impl<H> RenderHost for &mut H
where
    H: RenderHost + ?Sized,
{
    fn commit(&mut self, views: &[View]) {
        (**self).commit(views);
    }

    fn clear(&mut self) {
        (**self).clear();
    }
}

/// Keeps the last committed output in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    views: Vec<View>,
    commits: usize,
    clears: usize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn text(&self) -> String {
        self.views.iter().map(View::text).collect()
    }

    pub fn find(&self, id: &str) -> Option<&View> {
        self.views.iter().find_map(|v| v.find(id))
    }
}

impl RenderHost for MemoryHost {
    fn commit(&mut self, views: &[View]) {
        self.views = views.to_vec();
        self.commits += 1;
    }

    fn clear(&mut self) {
        self.views.clear();
        self.clears += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> View {
        View::Element {
            tag: "div",
            id: Some("app".into()),
            children: vec![
                View::Element {
                    tag: "button",
                    id: Some("toggle".into()),
                    children: vec![View::Text("Mount / unMount".into())],
                },
                View::Text("You clicked 0 times".into()),
            ],
        }
    }

    #[test]
    fn text_and_find() {
        let view = page();
        assert_eq!(view.text(), "Mount / unMountYou clicked 0 times");
        assert_eq!(view.find("toggle").map(View::text).as_deref(), Some("Mount / unMount"));
        assert!(view.find("missing").is_none());
    }

    #[test]
    fn memory_host_counts() {
        let mut host = MemoryHost::new();
        {
            let mut by_ref = &mut host;
            RenderHost::commit(&mut by_ref, &[page()]);
        }
        assert_eq!(host.commits(), 1);
        assert!(host.find("app").is_some());
        host.clear();
        assert!(host.views().is_empty());
        assert_eq!(host.clears(), 1);
    }
}
