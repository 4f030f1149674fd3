//! Nested route tree for the wire dispatcher.
//!
//! Callers address endpoints by a segment path rather than a URL, so the
//! tree is a plain name hierarchy: interior nodes group, leaves execute.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::PathSlot;
use crate::endpoint::{Endpoint, EndpointInner};

#[derive(Default)]
pub struct Routes {
    children: BTreeMap<String, RouteNode>,
}

enum RouteNode {
    Tree(Routes),
    Leaf(Arc<EndpointInner>),
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an endpoint under `name`. The endpoint keeps working through any
    /// direct registration it also has; the tree holds a shared handle.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken, so collisions surface at startup.
    pub fn at<P: PathSlot>(mut self, name: impl Into<String>, endpoint: &Endpoint<P>) -> Self {
        let name = name.into();
        self.insert(name, RouteNode::Leaf(endpoint.inner()));
        self
    }

    /// Nest a subtree under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken.
    pub fn nest(mut self, name: impl Into<String>, routes: Routes) -> Self {
        let name = name.into();
        self.insert(name, RouteNode::Tree(routes));
        self
    }

    fn insert(&mut self, name: String, node: RouteNode) {
        if self.children.contains_key(&name) {
            panic!("duplicate route segment: {name}");
        }
        self.children.insert(name, node);
    }

    /// Walk the segment path. Only a full match ending on a leaf resolves;
    /// stopping on an interior node or overshooting a leaf does not.
    pub(crate) fn resolve(&self, segments: &[String]) -> Option<&Arc<EndpointInner>> {
        let (last, front) = segments.split_last()?;
        let mut current = self;
        for segment in front {
            match current.children.get(segment)? {
                RouteNode::Tree(tree) => current = tree,
                RouteNode::Leaf(_) => return None,
            }
        }
        match current.children.get(last)? {
            RouteNode::Leaf(leaf) => Some(leaf),
            RouteNode::Tree(_) => None,
        }
    }
}
