//! Tiles placed on a board and the board that owns them.
//!
//! A [`Tile`] pairs a position with the [`Node`] that actually carries the
//! link graph and signal-relevant state; a [`Board`] is nothing more than
//! an [`ObjectList`] of tiles plus a by-position index, so placing two
//! tiles on the same square is rejected up front rather than silently
//! overlapping.

use crate::node::Node;
use crate::signalpath::SignalPath;
use crate::tile::{BlockState, SignalAspect, TileId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use traintastic_core::{
    Error, IdObject, InterfaceItem, ObjectBase, ObjectList, Property, PropertyFlags, Result,
    Subscription,
};

/// A single placed tile: its shape, board position, and the node backing
/// its wiring and live state.
pub struct Tile {
    base: ObjectBase,
    pub tile_id: TileId,
    pub x: Arc<Property<i16>>,
    pub y: Arc<Property<i16>>,
    pub node: Arc<Node>,
    /// Only set for `TileId::Signal`: the evaluator watching the blocks
    /// ahead and the derived aspect it drives.
    signal: Option<SignalTile>,
}

struct SignalTile {
    blocks_ahead: usize,
    path: Mutex<Option<SignalPath>>,
}

impl Tile {
    pub fn new(id: impl Into<Arc<str>>, tile_id: TileId, x: i16, y: i16) -> Arc<Self> {
        let node = match tile_id {
            TileId::BlockRail => Node::new_block(),
            TileId::DirectionControlRail => Node::new_direction_control(),
            TileId::Signal => Node::new_signal(),
            t if t.is_turnout() => Node::new_turnout(t),
            t => Node::new(t),
        };
        let tile = Arc::new(Tile {
            base: ObjectBase::new(id),
            tile_id,
            x: Arc::new(Property::new("x", x, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            y: Arc::new(Property::new("y", y, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            node,
            signal: (tile_id == TileId::Signal).then(|| SignalTile {
                blocks_ahead: 2,
                path: Mutex::new(None),
            }),
        });
        tile.base.with_items_mut(|items| {
            items.add(tile.x.clone() as Arc<dyn InterfaceItem>);
            items.add(tile.y.clone() as Arc<dyn InterfaceItem>);
        });
        tile
    }

    /// For a `Signal` tile: (re)builds the signal path once the tile is
    /// wired into the board graph, deriving the displayed aspect from the
    /// block states the evaluator reports. A no-op for any other tile.
    pub fn arm_signal(self: &Arc<Self>) {
        let Some(signal) = &self.signal else { return };
        let weak: Weak<Tile> = Arc::downgrade(self);
        let path = SignalPath::new(&self.node, signal.blocks_ahead, move |states: &[BlockState]| {
            if let Some(tile) = weak.upgrade() {
                tile.apply_signal_states(states);
            }
        });
        *signal.path.lock() = Some(path);
    }

    fn apply_signal_states(&self, states: &[BlockState]) {
        let aspect = match states.first() {
            None => SignalAspect::Stop,
            Some(BlockState::Occupied | BlockState::Reserved | BlockState::Unknown) => SignalAspect::Stop,
            Some(BlockState::Free) => {
                if states.iter().skip(1).all(|s| *s == BlockState::Free) {
                    SignalAspect::Proceed
                } else {
                    SignalAspect::ProceedReduced
                }
            }
        };
        self.node.set_signal_aspect(aspect);
    }

    pub fn signal_aspect(&self) -> Option<SignalAspect> {
        self.node.signal_aspect()
    }
}

impl IdObject for Tile {
    fn id(&self) -> Arc<str> {
        self.base.id()
    }

    fn interface_items(&self) -> traintastic_core::InterfaceItems {
        self.base.interface_items()
    }

    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }

    /// Drops the tile's signal path (if any) and detaches every link it
    /// participated in before marking its own properties destroyed, so no
    /// dangling link or subscription survives removal from a board.
    fn destroy(&self) {
        if self.base.is_destroyed() {
            return;
        }
        if let Some(signal) = &self.signal {
            signal.path.lock().take();
        }
        self.node.disconnect_all();
        self.base.destroy();
    }

    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

/// A track plan: an ordered, owning collection of tiles plus a
/// by-position index used to reject overlapping placement.
pub struct Board {
    base: ObjectBase,
    pub name: Arc<Property<String>>,
    pub tiles: ObjectList<Tile>,
    positions: Mutex<HashMap<(i16, i16), Arc<str>>>,
}

impl Board {
    pub fn new(id: impl Into<Arc<str>>) -> Arc<Self> {
        let board = Arc::new(Board {
            base: ObjectBase::new(id),
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            tiles: ObjectList::new(),
            positions: Mutex::new(HashMap::new()),
        });
        board.base.with_items_mut(|items| {
            items.add(board.name.clone() as Arc<dyn InterfaceItem>);
        });
        board
    }

    /// Places `tile`, rejecting it if its `(x, y)` is already occupied.
    pub fn add_tile(&self, tile: Arc<Tile>) -> Result<()> {
        let pos = (tile.x.get(), tile.y.get());
        let mut positions = self.positions.lock();
        if positions.contains_key(&pos) {
            return Err(Error::InvalidValue);
        }
        positions.insert(pos, tile.id());
        drop(positions);
        self.tiles.append(tile);
        Ok(())
    }

    pub fn tile_at(&self, x: i16, y: i16) -> Option<Arc<Tile>> {
        let id = self.positions.lock().get(&(x, y)).cloned()?;
        self.tiles.get_by_id(&id)
    }

    /// Removes the tile with `id`, destroying it if the board held the
    /// last strong reference, and freeing its position for reuse.
    pub fn remove_tile(&self, id: &str) -> bool {
        if let Some(tile) = self.tiles.get_by_id(id) {
            self.positions.lock().retain(|_, v| &**v != id);
            let _ = tile;
        }
        self.tiles.remove_by_id(id)
    }
}

impl IdObject for Board {
    fn id(&self) -> Arc<str> {
        self.base.id()
    }

    fn interface_items(&self) -> traintastic_core::InterfaceItems {
        self.base.interface_items()
    }

    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }

    fn destroy(&self) {
        if self.base.is_destroyed() {
            return;
        }
        self.tiles.destroy_all();
        self.base.destroy();
    }

    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tile_rejects_overlapping_position() {
        let board = Board::new("board1");
        board.add_tile(Tile::new("t1", TileId::Straight, 0, 0)).unwrap();
        let err = board.add_tile(Tile::new("t2", TileId::Straight, 0, 0)).unwrap_err();
        assert_eq!(err, Error::InvalidValue);
        assert_eq!(board.tiles.len(), 1);
    }

    #[test]
    fn tile_at_finds_placed_tile() {
        let board = Board::new("board1");
        board.add_tile(Tile::new("t1", TileId::Curve, 3, 4)).unwrap();
        assert!(board.tile_at(3, 4).is_some());
        assert!(board.tile_at(0, 0).is_none());
    }

    #[test]
    fn remove_tile_frees_its_position() {
        let board = Board::new("board1");
        board.add_tile(Tile::new("t1", TileId::Straight, 1, 1)).unwrap();
        assert!(board.remove_tile("t1"));
        board.add_tile(Tile::new("t2", TileId::Curve, 1, 1)).unwrap();
        assert!(board.tile_at(1, 1).is_some());
    }

    #[test]
    fn signal_reports_stop_with_no_blocks_ahead() {
        let signal = Tile::new("s1", TileId::Signal, 0, 0);
        signal.arm_signal();
        assert_eq!(signal.signal_aspect(), Some(SignalAspect::Stop));
    }

    #[test]
    fn signal_reports_proceed_when_the_block_ahead_is_free() {
        use crate::link::Link;

        let signal = Tile::new("s1", TileId::Signal, 0, 0);
        let block = Tile::new("b1", TileId::BlockRail, 1, 0);
        let link = Link::new(&signal.node, &block.node);
        signal.node.connect(1, link.clone());
        block.node.connect(0, link);
        block.node.set_block_state(BlockState::Free);

        signal.arm_signal();
        assert_eq!(signal.signal_aspect(), Some(SignalAspect::Proceed));

        block.node.set_block_state(BlockState::Occupied);
        assert_eq!(signal.signal_aspect(), Some(SignalAspect::Stop));
    }

    #[test]
    fn destroying_board_destroys_every_tile() {
        let board = Board::new("board1");
        board.add_tile(Tile::new("t1", TileId::Straight, 0, 0)).unwrap();
        board.add_tile(Tile::new("t2", TileId::Curve, 1, 0)).unwrap();
        board.destroy();
        assert!(board.is_destroyed());
        assert_eq!(board.tiles.len(), 0);
    }
}
