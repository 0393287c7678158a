//! A tile's node: the ordered vector of link slots, one per port, plus —
//! for the tile kinds the signal path cares about — the small bit of
//! live state (block occupancy, turnout position, ...) it switches on.

use crate::link::Link;
use crate::tile::{BlockState, DirectionControlState, SignalAspect, TileId, TurnoutPosition};
use parking_lot::RwLock;
use std::sync::Arc;
use traintastic_core::{Event, Subscription};

/// The live state a node carries beyond its wiring, for the tile kinds a
/// signal path subscribes to.
pub enum NodeBehavior {
    None,
    Block {
        state: RwLock<BlockState>,
        state_changed: Event<BlockState>,
    },
    Turnout {
        position: RwLock<TurnoutPosition>,
        position_changed: Event<TurnoutPosition>,
    },
    DirectionControl {
        state: RwLock<DirectionControlState>,
        state_changed: Event<DirectionControlState>,
    },
    Signal {
        aspect: RwLock<SignalAspect>,
        aspect_changed: Event<SignalAspect>,
    },
}

pub struct Node {
    tile_id: TileId,
    links: RwLock<Vec<Option<Arc<Link>>>>,
    behavior: NodeBehavior,
    /// For `TileId::LinkRail`: the node this one teleports to.
    link_target: RwLock<Option<std::sync::Weak<Node>>>,
}

impl Node {
    pub fn new(tile_id: TileId) -> Arc<Self> {
        Self::with_behavior(tile_id, NodeBehavior::None)
    }

    pub fn new_block() -> Arc<Self> {
        Self::with_behavior(
            TileId::BlockRail,
            NodeBehavior::Block {
                state: RwLock::new(BlockState::Unknown),
                state_changed: Event::new(),
            },
        )
    }

    pub fn new_turnout(tile_id: TileId) -> Arc<Self> {
        debug_assert!(tile_id.is_turnout());
        Self::with_behavior(
            tile_id,
            NodeBehavior::Turnout {
                position: RwLock::new(TurnoutPosition::Unknown),
                position_changed: Event::new(),
            },
        )
    }

    pub fn new_direction_control() -> Arc<Self> {
        Self::with_behavior(
            TileId::DirectionControlRail,
            NodeBehavior::DirectionControl {
                state: RwLock::new(DirectionControlState::Both),
                state_changed: Event::new(),
            },
        )
    }

    pub fn new_signal() -> Arc<Self> {
        Self::with_behavior(
            TileId::Signal,
            NodeBehavior::Signal {
                aspect: RwLock::new(SignalAspect::Unknown),
                aspect_changed: Event::new(),
            },
        )
    }

    fn with_behavior(tile_id: TileId, behavior: NodeBehavior) -> Arc<Self> {
        let port_count = tile_id.port_count();
        Arc::new(Node {
            tile_id,
            links: RwLock::new(vec![None; port_count]),
            behavior,
            link_target: RwLock::new(None),
        })
    }

    pub fn block_state(&self) -> Option<BlockState> {
        match &self.behavior {
            NodeBehavior::Block { state, .. } => Some(*state.read()),
            _ => None,
        }
    }

    pub fn set_block_state(&self, new_state: BlockState) {
        if let NodeBehavior::Block { state, state_changed } = &self.behavior {
            *state.write() = new_state;
            state_changed.emit(new_state);
        }
    }

    pub fn subscribe_block_state_changed<F>(&self, f: F) -> Option<Subscription<BlockState>>
    where
        F: FnMut(BlockState) + Send + 'static,
    {
        match &self.behavior {
            NodeBehavior::Block { state_changed, .. } => Some(state_changed.connect(f)),
            _ => None,
        }
    }

    pub fn turnout_position(&self) -> Option<TurnoutPosition> {
        match &self.behavior {
            NodeBehavior::Turnout { position, .. } => Some(*position.read()),
            _ => None,
        }
    }

    pub fn set_turnout_position(&self, new_position: TurnoutPosition) {
        if let NodeBehavior::Turnout { position, position_changed } = &self.behavior {
            *position.write() = new_position;
            position_changed.emit(new_position);
        }
    }

    pub fn subscribe_turnout_position_changed<F>(&self, f: F) -> Option<Subscription<TurnoutPosition>>
    where
        F: FnMut(TurnoutPosition) + Send + 'static,
    {
        match &self.behavior {
            NodeBehavior::Turnout { position_changed, .. } => Some(position_changed.connect(f)),
            _ => None,
        }
    }

    pub fn direction_control_state(&self) -> Option<DirectionControlState> {
        match &self.behavior {
            NodeBehavior::DirectionControl { state, .. } => Some(*state.read()),
            _ => None,
        }
    }

    pub fn set_direction_control_state(&self, new_state: DirectionControlState) {
        if let NodeBehavior::DirectionControl { state, state_changed } = &self.behavior {
            *state.write() = new_state;
            state_changed.emit(new_state);
        }
    }

    pub fn subscribe_direction_control_state_changed<F>(&self, f: F) -> Option<Subscription<DirectionControlState>>
    where
        F: FnMut(DirectionControlState) + Send + 'static,
    {
        match &self.behavior {
            NodeBehavior::DirectionControl { state_changed, .. } => Some(state_changed.connect(f)),
            _ => None,
        }
    }

    pub fn signal_aspect(&self) -> Option<SignalAspect> {
        match &self.behavior {
            NodeBehavior::Signal { aspect, .. } => Some(*aspect.read()),
            _ => None,
        }
    }

    pub fn set_signal_aspect(&self, new_aspect: SignalAspect) {
        if let NodeBehavior::Signal { aspect, aspect_changed } = &self.behavior {
            *aspect.write() = new_aspect;
            aspect_changed.emit(new_aspect);
        }
    }

    pub fn subscribe_signal_aspect_changed<F>(&self, f: F) -> Option<Subscription<SignalAspect>>
    where
        F: FnMut(SignalAspect) + Send + 'static,
    {
        match &self.behavior {
            NodeBehavior::Signal { aspect_changed, .. } => Some(aspect_changed.connect(f)),
            _ => None,
        }
    }

    /// For a `LinkRail` tile: the node it teleports to, if the pairing is
    /// currently live.
    pub fn link_target(&self) -> Option<Arc<Node>> {
        self.link_target.read().as_ref().and_then(|w| w.upgrade())
    }

    pub fn set_link_target(&self, target: Option<&Arc<Node>>) {
        *self.link_target.write() = target.map(Arc::downgrade);
    }

    pub fn tile_id(&self) -> TileId {
        self.tile_id
    }

    pub fn port_count(&self) -> usize {
        self.tile_id.port_count()
    }

    pub fn get_link(&self, port: usize) -> Option<Arc<Link>> {
        self.links.read().get(port).and_then(|s| s.clone())
    }

    /// The link at `port`, panicking if that port is unconnected — used
    /// where the walker already knows, from the tile kind, that a port
    /// must be wired (the reference walker's `getLink` has the same
    /// precondition).
    pub fn link(&self, port: usize) -> Arc<Link> {
        self.get_link(port).expect("port must be connected")
    }

    /// All connected links, in port order, skipping unconnected ports.
    pub fn links(&self) -> Vec<Arc<Link>> {
        self.links.read().iter().flatten().cloned().collect()
    }

    /// Connects `link` at `port`, first disconnecting whatever was there.
    pub fn connect(self: &Arc<Self>, port: usize, link: Arc<Link>) {
        self.disconnect(port);
        self.links.write()[port] = Some(link);
    }

    /// Disconnects `port`, and also removes the link from the node at its
    /// other end, so no link ever survives attached to only one side.
    pub fn disconnect(self: &Arc<Self>, port: usize) -> Option<Arc<Link>> {
        let removed = self.links.write().get_mut(port).and_then(Option::take);
        if let Some(link) = &removed {
            if let Some(other) = link.get_next(self) {
                other.remove_link_reference(link);
            }
        }
        removed
    }

    fn remove_link_reference(&self, link: &Arc<Link>) {
        let mut guard = self.links.write();
        for slot in guard.iter_mut() {
            if matches!(slot, Some(existing) if Arc::ptr_eq(existing, link)) {
                *slot = None;
            }
        }
    }

    /// Detaches every link this node participates in — called before a
    /// tile is destroyed so no dangling link survives pointing at it.
    pub fn disconnect_all(self: &Arc<Self>) {
        for port in 0..self.port_count() {
            self.disconnect(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_visible_from_both_sides() {
        let a = Node::new(TileId::Straight);
        let b = Node::new(TileId::Straight);
        let link = Link::new(&a, &b);
        a.connect(0, link.clone());
        b.connect(1, link.clone());
        assert_eq!(a.links().len(), 1);
        assert!(Arc::ptr_eq(&a.link(0), &link));
    }

    #[test]
    fn disconnect_detaches_both_ends() {
        let a = Node::new(TileId::Straight);
        let b = Node::new(TileId::Straight);
        let link = Link::new(&a, &b);
        a.connect(0, link.clone());
        b.connect(1, link.clone());

        a.disconnect(0);
        assert!(a.get_link(0).is_none());
        assert!(b.get_link(1).is_none());
    }

    #[test]
    fn disconnect_all_clears_every_port() {
        let a = Node::new(TileId::TurnoutThreeWay);
        let n1 = Node::new(TileId::Straight);
        let n2 = Node::new(TileId::Straight);
        let n3 = Node::new(TileId::Straight);
        a.connect(1, Link::new(&a, &n1));
        a.connect(2, Link::new(&a, &n2));
        a.connect(3, Link::new(&a, &n3));

        a.disconnect_all();
        assert!(a.links().is_empty());
    }

    #[test]
    fn block_state_changes_notify_subscribers() {
        let block = Node::new_block();
        let seen = Arc::new(RwLock::new(None));
        let s = seen.clone();
        let _sub = block.subscribe_block_state_changed(move |st| *s.write() = Some(st)).unwrap();
        block.set_block_state(BlockState::Occupied);
        assert_eq!(*seen.read(), Some(BlockState::Occupied));
        assert_eq!(block.block_state(), Some(BlockState::Occupied));
    }

    #[test]
    fn non_turnout_node_has_no_turnout_position() {
        let block = Node::new_block();
        assert_eq!(block.turnout_position(), None);
        assert!(block.subscribe_turnout_position_changed(|_| {}).is_none());
    }
}
