//! Tile shapes and the small per-tile enums the signal-path walker
//! switches on.

/// Fixes a tile's shape and port arity. Only the signal-relevant classes
/// named in this crate's scope are enumerated here — purely decorative
/// tiles (scenery, labels) have no representation in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileId {
    Straight,
    Curve,
    BlockRail,
    Signal,
    TurnoutLeft45,
    TurnoutLeft90,
    TurnoutLeftCurved,
    TurnoutRight45,
    TurnoutRight90,
    TurnoutRightCurved,
    TurnoutWye,
    TurnoutThreeWay,
    TurnoutDoubleSlip,
    TurnoutSingleSlip,
    DirectionControlRail,
    OneWayRail,
    RailBridge45,
    RailBridge90,
    RailCross45,
    RailCross90,
    LinkRail,
    BufferStop,
}

impl TileId {
    /// Number of ports (link slots) a node of this tile kind has.
    pub fn port_count(&self) -> usize {
        match self {
            TileId::BufferStop => 1,
            TileId::Straight
            | TileId::Curve
            | TileId::BlockRail
            | TileId::Signal
            | TileId::DirectionControlRail
            | TileId::OneWayRail
            | TileId::LinkRail => 2,
            TileId::TurnoutLeft45
            | TileId::TurnoutLeft90
            | TileId::TurnoutLeftCurved
            | TileId::TurnoutRight45
            | TileId::TurnoutRight90
            | TileId::TurnoutRightCurved
            | TileId::TurnoutWye => 3,
            TileId::TurnoutThreeWay
            | TileId::TurnoutDoubleSlip
            | TileId::TurnoutSingleSlip
            | TileId::RailBridge45
            | TileId::RailBridge90
            | TileId::RailCross45
            | TileId::RailCross90 => 4,
        }
    }

    pub fn is_turnout(&self) -> bool {
        matches!(
            self,
            TileId::TurnoutLeft45
                | TileId::TurnoutLeft90
                | TileId::TurnoutLeftCurved
                | TileId::TurnoutRight45
                | TileId::TurnoutRight90
                | TileId::TurnoutRightCurved
                | TileId::TurnoutWye
                | TileId::TurnoutThreeWay
                | TileId::TurnoutDoubleSlip
                | TileId::TurnoutSingleSlip
        )
    }

    pub fn is_bridge_or_cross(&self) -> bool {
        matches!(
            self,
            TileId::RailBridge45 | TileId::RailBridge90 | TileId::RailCross45 | TileId::RailCross90
        )
    }
}

/// The occupancy/reservation state reported by a block, as seen from a
/// signal looking down the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Unknown,
    Free,
    Reserved,
    Occupied,
}

/// Which exit(s) a turnout currently offers, keyed by the arm the train
/// takes when moving through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnoutPosition {
    Unknown,
    Left,
    Straight,
    Right,
    Crossed,
    Diverged,
}

/// Which way a direction-control tile currently permits travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionControlState {
    Both,
    AtoB,
    BtoA,
}

/// The aspect a signal tile displays, derived from the block states a
/// [`crate::signalpath::SignalPath`] evaluates ahead of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAspect {
    Unknown,
    Stop,
    Proceed,
    ProceedReduced,
}
