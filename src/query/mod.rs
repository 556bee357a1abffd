pub mod parse;
pub mod types;

pub use parse::parse;
pub use types::{PathQuery, QueryError, Selector};

use serde_json::Value;

impl PathQuery {
    /// Apply every selector in order, returning the matched nodes.
    pub fn apply<'v>(&self, root: &'v Value) -> Vec<&'v Value> {
        let mut current = vec![root];
        for selector in &self.selectors {
            let mut next = Vec::new();
            for node in current {
                apply_selector(node, selector, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Apply the query and render every matched leaf as a string.
    pub fn select_strings(&self, root: &Value) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.apply(root) {
            push_leaves(node, &mut out);
        }
        out
    }
}

/// Parse `expr` and return the stringified leaves it matches in `root`.
pub fn select(root: &Value, expr: &str) -> Result<Vec<String>, QueryError> {
    Ok(parse(expr)?.select_strings(root))
}

fn apply_selector<'v>(node: &'v Value, selector: &Selector, out: &mut Vec<&'v Value>) {
    match selector {
        Selector::Child(name) => {
            if let Value::Object(map) = node
                && let Some(child) = map.get(name)
            {
                out.push(child);
            }
        }
        Selector::Index(index) => {
            if let Value::Array(items) = node {
                let len = items.len() as i64;
                let pos = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&pos) {
                    out.push(&items[pos as usize]);
                }
            }
        }
        Selector::Wildcard => match node {
            Value::Object(map) => out.extend(map.values()),
            Value::Array(items) => out.extend(items.iter()),
            _ => {}
        },
        Selector::Descendant(name) => collect_descendants(node, name, out),
    }
}

/// Depth-first search for every member named `name` below `node`, in document order.
fn collect_descendants<'v>(node: &'v Value, name: &str, out: &mut Vec<&'v Value>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                if key == name {
                    out.push(child);
                }
                collect_descendants(child, name, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_descendants(child, name, out);
            }
        }
        _ => {}
    }
}

/// Arrays are flattened into their elements; objects render as compact JSON.
fn push_leaves(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                push_leaves(item, out);
            }
        }
        other => out.push(other.to_string()),
    }
}
