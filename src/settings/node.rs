//! Settings groups and their registration-time builder.

use super::field::FieldSpec;
use crate::error::TreeShapeError;
use crate::paths::{PathNamer, SettingsPath, validate_segment};
use std::collections::{HashMap, HashSet};

/// One child of a [`SettingsNode`].
#[derive(Debug, Clone)]
pub enum SettingsEntry {
    Field(FieldSpec),
    Node(SettingsNode),
}

/// A named group of fields and nested groups.
///
/// Nodes are templates: they carry no path and can be placed anywhere in a
/// tree. Only a resolution walk binds a node to a location. Instances are
/// produced by [`SettingsNodeBuilder::build`] and are immutable afterwards.
#[derive(Debug, Clone)]
pub struct SettingsNode {
    name: String,
    children: Vec<(String, SettingsEntry)>,
}

impl SettingsNode {
    /// Start declaring a node named `name`.
    pub fn builder(name: impl Into<String>) -> SettingsNodeBuilder {
        SettingsNodeBuilder::new(name.into())
    }

    /// Start declaring a root node. The root contributes no key segment.
    pub fn root() -> SettingsNodeBuilder {
        SettingsNodeBuilder::new(String::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &SettingsEntry)> {
        self.children.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.children.iter().find_map(|(n, entry)| match entry {
            SettingsEntry::Field(spec) if n == name => Some(spec),
            _ => None,
        })
    }

    pub fn node(&self, name: &str) -> Option<&SettingsNode> {
        self.children.iter().find_map(|(n, entry)| match entry {
            SettingsEntry::Node(node) if n == name => Some(node),
            _ => None,
        })
    }

    /// Every leaf in declaration order, with its full path.
    pub fn leaves(&self) -> Vec<(SettingsPath, &FieldSpec)> {
        let mut out = Vec::new();
        self.collect_leaves(&SettingsPath::root().child(&self.name), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, path: &SettingsPath, out: &mut Vec<(SettingsPath, &'a FieldSpec)>) {
        for (name, entry) in &self.children {
            match entry {
                SettingsEntry::Field(spec) => out.push((path.child(name), spec)),
                SettingsEntry::Node(node) => node.collect_leaves(&path.child(name), out),
            }
        }
    }

    /// Canonical keys of every leaf under `namer`, in declaration order.
    pub fn keys(&self, namer: &PathNamer) -> Vec<String> {
        self.leaves()
            .iter()
            .map(|(path, _)| namer.name(path))
            .collect()
    }
}

/// Validating builder for [`SettingsNode`].
///
/// Checks are deferred to [`build`](Self::build) so declarations read as a
/// flat chain; nothing produced by a failed build is usable.
#[derive(Debug)]
pub struct SettingsNodeBuilder {
    name: String,
    children: Vec<(String, SettingsEntry)>,
    pending: Vec<TreeShapeError>,
}

impl SettingsNodeBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.children.push((name.into(), SettingsEntry::Field(spec)));
        self
    }

    /// Attach an already-built child node under its own name.
    pub fn node(mut self, child: SettingsNode) -> Self {
        self.children
            .push((child.name.clone(), SettingsEntry::Node(child)));
        self
    }

    /// Attach a child produced by a template function.
    ///
    /// The template is called here, so every tree gets its own instance.
    pub fn node_from<F>(mut self, template: F) -> Self
    where
        F: FnOnce() -> Result<SettingsNode, TreeShapeError>,
    {
        match template() {
            Ok(child) => self.node(child),
            Err(err) => {
                self.pending.push(err);
                self
            }
        }
    }

    /// Validate the declaration and produce an immutable node.
    pub fn build(mut self) -> Result<SettingsNode, TreeShapeError> {
        if let Some(err) = self.pending.into_iter().next() {
            return Err(err);
        }
        if !self.name.is_empty() {
            validate_segment(&self.name)?;
        }

        let mut seen = HashSet::new();
        for (name, entry) in &mut self.children {
            validate_segment(name)?;
            if !seen.insert(name.clone()) {
                return Err(TreeShapeError::DuplicateName {
                    node: display_name(&self.name),
                    name: name.clone(),
                });
            }
            if let SettingsEntry::Field(spec) = entry {
                spec.validate(name)?;
            }
        }

        let node = SettingsNode {
            name: self.name,
            children: self.children,
        };
        check_key_collisions(&node)?;
        Ok(node)
    }
}

/// Node name for messages; the root has none.
pub(crate) fn display_name(name: &str) -> String {
    if name.is_empty() {
        "<root>".to_string()
    } else {
        name.to_string()
    }
}

/// Distinct leaf paths must flatten to distinct keys, e.g. `a.b_c` and
/// `a_b.c` would both become `A_B_C`.
fn check_key_collisions(node: &SettingsNode) -> Result<(), TreeShapeError> {
    let mut keys: HashMap<String, SettingsPath> = HashMap::new();
    for (path, _) in node.leaves() {
        let key = PathNamer::relative_key(path.segments());
        if let Some(existing) = keys.get(&key) {
            return Err(TreeShapeError::KeyCollision {
                key,
                first: existing.to_string(),
                second: path.to_string(),
            });
        }
        keys.insert(key, path);
    }
    Ok(())
}
