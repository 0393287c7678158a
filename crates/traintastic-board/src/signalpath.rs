//! Walks the rail graph ahead of a signal and recomputes the ordered
//! list of reachable [`BlockState`]s whenever anything along the active
//! route changes.

use crate::link::Link;
use crate::node::Node;
use crate::tile::{BlockState, DirectionControlState, TileId, TurnoutPosition};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use traintastic_core::Subscription;

/// A node in the signal path's item tree. Built once per topology
/// change, walked fresh on every `evaluate()`.
enum Item {
    Block {
        node: Arc<Node>,
        next: Option<Arc<Item>>,
    },
    Turnout {
        node: Arc<Node>,
        next: HashMap<TurnoutPosition, Option<Arc<Item>>>,
    },
    DirectionControl {
        node: Arc<Node>,
        one_way_state: DirectionControlState,
        next: Option<Arc<Item>>,
    },
}

/// Type-erases `Subscription<T>` so differently-typed subscriptions
/// (block state, turnout position, direction-control state) can share
/// one disconnect-on-drop list.
trait ErasedSubscription: Send {
    fn disconnect(&self);
}

impl<T: Clone + Send + 'static> ErasedSubscription for Subscription<T> {
    fn disconnect(&self) {
        Subscription::disconnect(self)
    }
}

struct Inner {
    root: RwLock<Option<Arc<Item>>>,
    on_evaluated: Box<dyn Fn(&[BlockState]) + Send + Sync>,
    subscriptions: Mutex<Vec<Box<dyn ErasedSubscription>>>,
}

/// Subscribes to every tile along the active route ahead of a signal and
/// invokes `on_evaluated` with the ordered block states whenever the
/// route (or a block's state along it) changes.
pub struct SignalPath {
    inner: Arc<Inner>,
}

impl SignalPath {
    pub fn new(
        signal_node: &Arc<Node>,
        blocks_ahead: usize,
        on_evaluated: impl Fn(&[BlockState]) + Send + Sync + 'static,
    ) -> Self {
        let inner = Arc::new(Inner {
            root: RwLock::new(None),
            on_evaluated: Box::new(on_evaluated),
            subscriptions: Mutex::new(Vec::new()),
        });

        if let Some(link) = signal_node.get_link(1) {
            let root = find_blocks(&inner, signal_node, &link, blocks_ahead);
            *inner.root.write() = root;
        }

        evaluate_inner(&inner);
        SignalPath { inner }
    }

    /// Walks the current item tree, following only the branch active at
    /// each turnout/direction-control, and reports the ordered block
    /// states found along the way.
    pub fn evaluate(&self) {
        evaluate_inner(&self.inner);
    }
}

/// The actual walk, shared between `SignalPath::evaluate` and the
/// per-tile re-evaluation callbacks. Takes `&Arc<Inner>` rather than
/// `&SignalPath` so a reactive callback can re-run it without ever
/// constructing (and then dropping) a `SignalPath` — dropping one runs
/// `Drop for SignalPath`, which would disconnect every subscription from
/// inside the very `Event::emit` call that triggered the re-evaluation.
fn evaluate_inner(inner: &Arc<Inner>) {
    let mut states = Vec::new();
    let mut current = inner.root.read().clone();

    while let Some(item) = current {
        current = match item.as_ref() {
            Item::Block { node, next } => {
                states.push(node.block_state().unwrap_or(BlockState::Unknown));
                next.clone()
            }
            Item::Turnout { node, next } => {
                let position = node.turnout_position().unwrap_or(TurnoutPosition::Unknown);
                next.get(&position).cloned().flatten()
            }
            Item::DirectionControl { node, one_way_state, next } => {
                let state = node.direction_control_state().unwrap_or(DirectionControlState::Both);
                if state == DirectionControlState::Both || state == *one_way_state {
                    next.clone()
                } else {
                    None
                }
            }
        };
    }

    (inner.on_evaluated)(&states);
}

impl Drop for SignalPath {
    fn drop(&mut self) {
        for sub in self.inner.subscriptions.lock().iter() {
            sub.disconnect();
        }
    }
}

fn other_link(node: &Arc<Node>, arriving: &Arc<Link>) -> Option<Arc<Link>> {
    let links = node.links();
    if links.len() != 2 {
        return None;
    }
    if Arc::ptr_eq(&links[0], arriving) {
        Some(links[1].clone())
    } else {
        Some(links[0].clone())
    }
}

fn arrived_via(node: &Node, port: usize, arriving: &Arc<Link>) -> bool {
    node.get_link(port).is_some_and(|l| Arc::ptr_eq(&l, arriving))
}

fn subscribe_reevaluate<T>(inner_weak: Weak<Inner>) -> impl FnMut(T) + Send + 'static
where
    T: Clone + Send + 'static,
{
    move |_: T| {
        if let Some(inner) = inner_weak.upgrade() {
            evaluate_inner(&inner);
        }
    }
}

fn find_blocks(inner: &Arc<Inner>, node: &Arc<Node>, link: &Arc<Link>, blocks_ahead: usize) -> Option<Arc<Item>> {
    let next_node = link.get_next(node)?;
    let tile_id = next_node.tile_id();

    match tile_id {
        TileId::BlockRail => {
            let weak = Arc::downgrade(inner);
            let sub = next_node
                .subscribe_block_state_changed(subscribe_reevaluate::<BlockState>(weak))
                .expect("BlockRail node always carries block behavior");
            inner.subscriptions.lock().push(Box::new(sub));

            let next = if blocks_ahead > 1 {
                other_link(&next_node, link).and_then(|nl| find_blocks(inner, &next_node, &nl, blocks_ahead - 1))
            } else {
                None
            };
            Some(Arc::new(Item::Block { node: next_node, next }))
        }

        _ if tile_id.is_turnout() => {
            let weak = Arc::downgrade(inner);
            let sub = next_node
                .subscribe_turnout_position_changed(subscribe_reevaluate::<TurnoutPosition>(weak))
                .expect("turnout node always carries turnout behavior");
            inner.subscriptions.lock().push(Box::new(sub));

            let next = build_turnout_branches(inner, &next_node, link, tile_id, blocks_ahead);
            if next.is_empty() {
                None
            } else {
                Some(Arc::new(Item::Turnout { node: next_node, next }))
            }
        }

        TileId::DirectionControlRail => {
            let next_link = other_link(&next_node, link)?;
            let weak = Arc::downgrade(inner);
            let sub = next_node
                .subscribe_direction_control_state_changed(subscribe_reevaluate::<DirectionControlState>(weak))
                .expect("DirectionControlRail node always carries direction-control behavior");
            inner.subscriptions.lock().push(Box::new(sub));

            let one_way_state = if arrived_via(&next_node, 0, link) {
                DirectionControlState::AtoB
            } else {
                DirectionControlState::BtoA
            };
            let next = find_blocks(inner, &next_node, &next_link, blocks_ahead);
            Some(Arc::new(Item::DirectionControl { node: next_node, one_way_state, next }))
        }

        TileId::OneWayRail => {
            let next_link = other_link(&next_node, link)?;
            if arrived_via(&next_node, 0, link) {
                find_blocks(inner, &next_node, &next_link, blocks_ahead)
            } else {
                None
            }
        }

        _ if tile_id.is_bridge_or_cross() => {
            const OPPOSITE: [(usize, usize); 4] = [(0, 2), (1, 3), (2, 0), (3, 1)];
            for (from, to) in OPPOSITE {
                if arrived_via(&next_node, from, link) {
                    let next_link = next_node.get_link(to)?;
                    return find_blocks(inner, &next_node, &next_link, blocks_ahead);
                }
            }
            None
        }

        TileId::LinkRail => {
            let target = next_node.link_target()?;
            let target_link = target.get_link(0)?;
            find_blocks(inner, &target, &target_link, blocks_ahead)
        }

        TileId::BufferStop => None,

        _ => {
            if blocks_ahead == 0 {
                return None;
            }
            let next_link = other_link(&next_node, link)?;
            find_blocks(inner, &next_node, &next_link, blocks_ahead - 1)
        }
    }
}

fn build_turnout_branches(
    inner: &Arc<Inner>,
    next_node: &Arc<Node>,
    arriving: &Arc<Link>,
    tile_id: TileId,
    blocks_ahead: usize,
) -> HashMap<TurnoutPosition, Option<Arc<Item>>> {
    let mut next = HashMap::new();
    let from_port0 = arrived_via(next_node, 0, arriving);

    match tile_id {
        TileId::TurnoutLeft45 | TileId::TurnoutLeft90 | TileId::TurnoutLeftCurved => {
            if from_port0 {
                if let Some(l) = next_node.get_link(1) {
                    next.insert(TurnoutPosition::Left, find_blocks(inner, next_node, &l, blocks_ahead));
                }
                if let Some(l) = next_node.get_link(2) {
                    next.insert(TurnoutPosition::Straight, find_blocks(inner, next_node, &l, blocks_ahead));
                }
            } else if let Some(l) = next_node.get_link(0) {
                let position = if arrived_via(next_node, 1, arriving) { TurnoutPosition::Left } else { TurnoutPosition::Straight };
                next.insert(position, find_blocks(inner, next_node, &l, blocks_ahead));
            }
        }

        TileId::TurnoutRight45 | TileId::TurnoutRight90 | TileId::TurnoutRightCurved => {
            if from_port0 {
                if let Some(l) = next_node.get_link(1) {
                    next.insert(TurnoutPosition::Straight, find_blocks(inner, next_node, &l, blocks_ahead));
                }
                if let Some(l) = next_node.get_link(2) {
                    next.insert(TurnoutPosition::Right, find_blocks(inner, next_node, &l, blocks_ahead));
                }
            } else if let Some(l) = next_node.get_link(0) {
                let position = if arrived_via(next_node, 1, arriving) { TurnoutPosition::Straight } else { TurnoutPosition::Right };
                next.insert(position, find_blocks(inner, next_node, &l, blocks_ahead));
            }
        }

        TileId::TurnoutWye => {
            if from_port0 {
                if let Some(l) = next_node.get_link(1) {
                    next.insert(TurnoutPosition::Left, find_blocks(inner, next_node, &l, blocks_ahead));
                }
                if let Some(l) = next_node.get_link(2) {
                    next.insert(TurnoutPosition::Right, find_blocks(inner, next_node, &l, blocks_ahead));
                }
            } else if let Some(l) = next_node.get_link(0) {
                let position = if arrived_via(next_node, 1, arriving) { TurnoutPosition::Left } else { TurnoutPosition::Right };
                next.insert(position, find_blocks(inner, next_node, &l, blocks_ahead));
            }
        }

        TileId::TurnoutThreeWay => {
            if from_port0 {
                for (port, position) in [(1, TurnoutPosition::Left), (2, TurnoutPosition::Straight), (3, TurnoutPosition::Right)] {
                    if let Some(l) = next_node.get_link(port) {
                        next.insert(position, find_blocks(inner, next_node, &l, blocks_ahead));
                    }
                }
            } else {
                let position = [(1, TurnoutPosition::Left), (2, TurnoutPosition::Straight), (3, TurnoutPosition::Right)]
                    .into_iter()
                    .find(|(port, _)| arrived_via(next_node, *port, arriving))
                    .map(|(_, p)| p);
                if let (Some(position), Some(l)) = (position, next_node.get_link(0)) {
                    next.insert(position, find_blocks(inner, next_node, &l, blocks_ahead));
                }
            }
        }

        TileId::TurnoutDoubleSlip | TileId::TurnoutSingleSlip => {
            let is_double = tile_id == TileId::TurnoutDoubleSlip;
            let (crossed_port, diverged_port) = if arrived_via(next_node, 0, arriving) {
                (2, Some(1))
            } else if arrived_via(next_node, 1, arriving) {
                (3, Some(0))
            } else if arrived_via(next_node, 2, arriving) {
                (0, is_double.then_some(3))
            } else if arrived_via(next_node, 3, arriving) {
                (1, is_double.then_some(2))
            } else {
                return next;
            };

            if let Some(l) = next_node.get_link(crossed_port) {
                next.insert(TurnoutPosition::Crossed, find_blocks(inner, next_node, &l, blocks_ahead));
            }
            if let Some(port) = diverged_port {
                if let Some(l) = next_node.get_link(port) {
                    next.insert(TurnoutPosition::Diverged, find_blocks(inner, next_node, &l, blocks_ahead));
                }
            }
        }

        _ => {}
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn straight_chain(len: usize) -> (Arc<Node>, Vec<Arc<Node>>) {
        let signal = Node::new(TileId::Straight);
        let mut blocks = Vec::new();
        let mut prev = signal.clone();
        for _ in 0..len {
            let block = Node::new_block();
            let link = Link::new(&prev, &block);
            prev.connect(if Arc::ptr_eq(&prev, &signal) { 1 } else { 1 }, link.clone());
            block.connect(0, link);
            blocks.push(block.clone());
            prev = block;
        }
        (signal, blocks)
    }

    #[test]
    fn walks_straight_chain_of_blocks() {
        let (signal, blocks) = straight_chain(3);
        blocks[0].set_block_state(BlockState::Free);
        blocks[1].set_block_state(BlockState::Occupied);

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        let path = SignalPath::new(&signal, 2, move |states| {
            *s.lock().unwrap() = states.to_vec();
        });

        assert_eq!(*seen.lock().unwrap(), vec![BlockState::Free, BlockState::Occupied]);
        drop(path);
    }

    #[test]
    fn block_state_change_triggers_reevaluation() {
        let (signal, blocks) = straight_chain(1);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        let _path = SignalPath::new(&signal, 1, move |states| {
            *s.lock().unwrap() = states.to_vec();
        });
        assert_eq!(*seen.lock().unwrap(), vec![BlockState::Unknown]);

        blocks[0].set_block_state(BlockState::Occupied);
        assert_eq!(*seen.lock().unwrap(), vec![BlockState::Occupied]);
    }

    #[test]
    fn turnout_follows_active_position() {
        let signal = Node::new(TileId::Straight);
        let turnout = Node::new_turnout(TileId::TurnoutLeft90);
        let left_block = Node::new_block();
        let straight_block = Node::new_block();

        let entry = Link::new(&signal, &turnout);
        signal.connect(1, entry.clone());
        turnout.connect(0, entry);

        let left_link = Link::new(&turnout, &left_block);
        turnout.connect(1, left_link.clone());
        left_block.connect(0, left_link);

        let straight_link = Link::new(&turnout, &straight_block);
        turnout.connect(2, straight_link.clone());
        straight_block.connect(0, straight_link);

        left_block.set_block_state(BlockState::Free);
        straight_block.set_block_state(BlockState::Occupied);

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        let path = SignalPath::new(&signal, 1, move |states| {
            *s.lock().unwrap() = states.to_vec();
        });
        assert!(seen.lock().unwrap().is_empty(), "no position selected yet");

        turnout.set_turnout_position(TurnoutPosition::Left);
        assert_eq!(*seen.lock().unwrap(), vec![BlockState::Free]);

        turnout.set_turnout_position(TurnoutPosition::Straight);
        assert_eq!(*seen.lock().unwrap(), vec![BlockState::Occupied]);

        drop(path);
    }

    #[test]
    fn single_slip_has_no_diverged_branch_from_port_two() {
        let signal = Node::new(TileId::Straight);
        let slip = Node::new_turnout(TileId::TurnoutSingleSlip);

        let entry = Link::new(&signal, &slip);
        signal.connect(1, entry.clone());
        slip.connect(2, entry);

        let crossed_block = Node::new_block();
        let crossed_link = Link::new(&slip, &crossed_block);
        slip.connect(0, crossed_link.clone());
        crossed_block.connect(0, crossed_link);

        crossed_block.set_block_state(BlockState::Free);

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let s = seen.clone();
        let path = SignalPath::new(&signal, 1, move |states| {
            *s.lock().unwrap() = states.to_vec();
        });

        slip.set_turnout_position(TurnoutPosition::Diverged);
        assert!(seen.lock().unwrap().is_empty(), "single slip has no diverged exit from port 2");

        slip.set_turnout_position(TurnoutPosition::Crossed);
        assert_eq!(*seen.lock().unwrap(), vec![BlockState::Free]);

        drop(path);
    }

    #[test]
    fn destroying_signal_path_disconnects_all_subscriptions() {
        let (signal, blocks) = straight_chain(1);
        let calls = Arc::new(StdMutex::new(0));
        let c = calls.clone();
        let path = SignalPath::new(&signal, 1, move |_| {
            *c.lock().unwrap() += 1;
        });
        let before = *calls.lock().unwrap();
        drop(path);

        blocks[0].set_block_state(BlockState::Occupied);
        assert_eq!(*calls.lock().unwrap(), before, "no callback should fire after the path is dropped");
    }
}
