use std::fmt::Write;

use crate::View;

/// Renders `(depth, label)` lines, given in pre-order, as a box-drawing tree.
pub fn format_outline(title: &str, lines: &[(usize, String)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    for (index, (depth, label)) in lines.iter().enumerate() {
        let mut prefix = String::new();
        for level in 0..*depth {
            let bar = if has_sibling_at(lines, index, level) {
                "│   "
            } else {
                "    "
            };
            prefix.push_str(bar);
        }
        let fork = if has_sibling_at(lines, index, *depth) {
            "├── "
        } else {
            "└── "
        };
        let _ = writeln!(out, "{}{}{}", prefix, fork, label);
    }
    out
}

// whether a later line continues the branch at `level` below line `index`
fn has_sibling_at(lines: &[(usize, String)], index: usize, level: usize) -> bool {
    for (depth, _) in &lines[index + 1..] {
        if *depth < level {
            return false;
        }
        if *depth == level {
            return true;
        }
    }
    false
}

pub fn format_views(views: &[View]) -> String {
    let mut lines = Vec::new();
    for view in views {
        outline_view(view, 0, &mut lines);
    }
    format_outline("Surface", &lines)
}

pub fn print_views(views: &[View]) {
    print!("{}", format_views(views));
}

fn outline_view(view: &View, depth: usize, lines: &mut Vec<(usize, String)>) {
    match view {
        View::Text(text) => lines.push((depth, format!("{:?}", text))),
        View::Element { tag, id, children } => {
            let label = match id {
                Some(id) => format!("<{} #{}>", tag, id),
                None => format!("<{}>", tag),
            };
            lines.push((depth, label));
            for child in children {
                outline_view(child, depth + 1, lines);
            }
        }
    }
}
