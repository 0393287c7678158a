//! A `Link` joins exactly two [`Node`]s. It holds its endpoints weakly —
//! the node, not the link, is the strongly-owned side of the graph — so
//! destroying a tile's node never leaves a link keeping it alive.

use crate::node::Node;
use std::sync::{Arc, Weak};

pub struct Link {
    endpoints: [Weak<Node>; 2],
}

impl Link {
    pub fn new(a: &Arc<Node>, b: &Arc<Node>) -> Arc<Self> {
        Arc::new(Link {
            endpoints: [Arc::downgrade(a), Arc::downgrade(b)],
        })
    }

    /// Returns the node at the other end from `from`, or `None` if that
    /// endpoint no longer exists or `from` isn't one of this link's ends.
    pub fn get_next(&self, from: &Node) -> Option<Arc<Node>> {
        let from_ptr = from as *const Node;
        for endpoint in &self.endpoints {
            if let Some(node) = endpoint.upgrade() {
                if Arc::as_ptr(&node) != from_ptr {
                    return Some(node);
                }
            }
        }
        None
    }

    pub fn has_endpoint(&self, node: &Node) -> bool {
        let ptr = node as *const Node;
        self.endpoints
            .iter()
            .any(|e| e.upgrade().is_some_and(|n| Arc::as_ptr(&n) == ptr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileId;

    #[test]
    fn get_next_returns_the_opposite_node() {
        let a = Node::new(TileId::Straight);
        let b = Node::new(TileId::Straight);
        let link = Link::new(&a, &b);
        assert!(Arc::ptr_eq(&link.get_next(&a).unwrap(), &b));
        assert!(Arc::ptr_eq(&link.get_next(&b).unwrap(), &a));
    }

    #[test]
    fn get_next_is_none_once_opposite_node_is_dropped() {
        let a = Node::new(TileId::Straight);
        let link = {
            let b = Node::new(TileId::Straight);
            Link::new(&a, &b)
        };
        assert!(link.get_next(&a).is_none());
    }
}
