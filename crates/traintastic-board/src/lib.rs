//! Track-plan topology: tiles placed on a board, the link graph joining
//! their ports, and the signal-path evaluator that walks it.

pub mod board;
pub mod link;
pub mod node;
pub mod signalpath;
pub mod tile;

pub use board::{Board, Tile};
pub use link::Link;
pub use node::{Node, NodeBehavior};
pub use signalpath::SignalPath;
pub use tile::{BlockState, DirectionControlState, SignalAspect, TileId, TurnoutPosition};
