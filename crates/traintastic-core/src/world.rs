//! The world: global mode, broadcast flags, and the shared id registry
//! every object in a layout is reachable through.

use crate::error::Error;
use crate::event::{Event, Subscription};
use crate::registry::Registry;
use bitflags::bitflags;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

bitflags! {
    /// The world's global mode and broadcast flags, combined into one
    /// bitset so a single snapshot read gives a consistent view of both.
    /// `EDIT`/`RUN`/`STOP` are mutually exclusive; the remaining flags are
    /// independent toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WorldState: u16 {
        const EDIT               = 1 << 0;
        const RUN                = 1 << 1;
        const STOP               = 1 << 2;
        const MUTE                = 1 << 3;
        const NO_SMOKE            = 1 << 4;
        const POWER_ON            = 1 << 5;
        const TRACK_VOLTAGE_OFF   = 1 << 6;
    }
}

impl Default for WorldState {
    fn default() -> Self {
        WorldState::STOP
    }
}

/// The single-value mode a world is in, mirrored from the `EDIT`/`RUN`/
/// `STOP` bits of [`WorldState`] for callers that only care about the
/// mode and not the broadcast flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraintasticMode {
    Stop,
    Run,
    Edit,
}

impl WorldState {
    pub fn mode(&self) -> TraintasticMode {
        if self.contains(WorldState::EDIT) {
            TraintasticMode::Edit
        } else if self.contains(WorldState::RUN) {
            TraintasticMode::Run
        } else {
            TraintasticMode::Stop
        }
    }
}

/// A typed transition fired alongside the world's new state whenever
/// something about it changes. Every object in the world is expected to
/// subscribe to (a subset of) these through `World::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    EditEnabled,
    EditDisabled,
    Run,
    Stop,
    Mute,
    Unmute,
    Smoke,
    NoSmoke,
    PowerOn,
    PowerOff,
    TrackVoltageOn,
    TrackVoltageOff,
}

pub struct World {
    state: RwLock<WorldState>,
    event: Event<(WorldState, WorldEvent)>,
    registry: Registry,
    interfaces_online: AtomicUsize,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        World {
            state: RwLock::new(WorldState::default()),
            event: Event::new(),
            registry: Registry::new(),
            interfaces_online: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> WorldState {
        *self.state.read()
    }

    pub fn mode(&self) -> TraintasticMode {
        self.state().mode()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn subscribe<F>(&self, f: F) -> Subscription<(WorldState, WorldEvent)>
    where
        F: FnMut((WorldState, WorldEvent)) + Send + 'static,
    {
        self.event.connect(f)
    }

    /// Called by an interface as it transitions online. Refused while the
    /// world is in `Edit` mode — editing and live hardware control are
    /// mutually exclusive.
    pub fn note_interface_online(&self) -> Result<(), Error> {
        if self.state.read().contains(WorldState::EDIT) {
            return Err(Error::EditingLocked);
        }
        self.interfaces_online.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn note_interface_offline(&self) {
        self.interfaces_online.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn interfaces_online(&self) -> usize {
        self.interfaces_online.load(Ordering::Acquire)
    }

    /// Enters or leaves `Edit` mode. Entering fails while any interface
    /// is online.
    pub fn set_edit_enabled(&self, enabled: bool) -> Result<(), Error> {
        if enabled && self.interfaces_online() > 0 {
            return Err(Error::EditingLocked);
        }
        let mut guard = self.state.write();
        let already = guard.contains(WorldState::EDIT);
        if already == enabled {
            return Ok(());
        }
        if enabled {
            guard.remove(WorldState::RUN | WorldState::STOP);
            guard.insert(WorldState::EDIT);
        } else {
            guard.remove(WorldState::EDIT);
            guard.insert(WorldState::STOP);
        }
        let snapshot = *guard;
        drop(guard);
        self.event.emit((
            snapshot,
            if enabled { WorldEvent::EditEnabled } else { WorldEvent::EditDisabled },
        ));
        Ok(())
    }

    /// Switches between `Run` and `Stop` mode. A no-op while in `Edit`
    /// mode — leave edit mode first.
    pub fn set_running(&self, running: bool) -> Result<(), Error> {
        let mut guard = self.state.write();
        if guard.contains(WorldState::EDIT) {
            return Err(Error::EditingLocked);
        }
        let already = guard.contains(WorldState::RUN);
        if already == running {
            return Ok(());
        }
        guard.remove(WorldState::RUN | WorldState::STOP);
        guard.insert(if running { WorldState::RUN } else { WorldState::STOP });
        let snapshot = *guard;
        drop(guard);
        self.event.emit((snapshot, if running { WorldEvent::Run } else { WorldEvent::Stop }));
        Ok(())
    }

    fn toggle_flag(&self, flag: WorldState, enable: bool, on_event: WorldEvent, off_event: WorldEvent) {
        let mut guard = self.state.write();
        let already = guard.contains(flag);
        if already == enable {
            return;
        }
        guard.set(flag, enable);
        let snapshot = *guard;
        drop(guard);
        self.event.emit((snapshot, if enable { on_event } else { off_event }));
    }

    pub fn set_mute(&self, enabled: bool) {
        self.toggle_flag(WorldState::MUTE, enabled, WorldEvent::Mute, WorldEvent::Unmute);
    }

    pub fn set_no_smoke(&self, enabled: bool) {
        self.toggle_flag(WorldState::NO_SMOKE, enabled, WorldEvent::NoSmoke, WorldEvent::Smoke);
    }

    pub fn set_power_on(&self, enabled: bool) {
        self.toggle_flag(WorldState::POWER_ON, enabled, WorldEvent::PowerOn, WorldEvent::PowerOff);
    }

    pub fn set_track_voltage_off(&self, enabled: bool) {
        self.toggle_flag(
            WorldState::TRACK_VOLTAGE_OFF,
            enabled,
            WorldEvent::TrackVoltageOff,
            WorldEvent::TrackVoltageOn,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::sync::Arc;

    #[test]
    fn edit_blocked_while_interface_online() {
        let world = World::new();
        world.note_interface_online().unwrap();
        assert_eq!(world.set_edit_enabled(true), Err(Error::EditingLocked));
    }

    #[test]
    fn interface_online_blocked_while_editing() {
        let world = World::new();
        world.set_edit_enabled(true).unwrap();
        assert_eq!(world.note_interface_online(), Err(Error::EditingLocked));
    }

    #[test]
    fn edit_enable_clears_run_stop_bits() {
        let world = World::new();
        world.set_running(true).unwrap();
        world.set_edit_enabled(true).unwrap();
        assert_eq!(world.mode(), TraintasticMode::Edit);
        assert!(!world.state().contains(WorldState::RUN));
    }

    #[test]
    fn idempotent_flag_toggle_does_not_notify() {
        let world = World::new();
        let count = Arc::new(Counter::new(0));
        let c = count.clone();
        let _sub = world.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        world.set_mute(false);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        world.set_mute(true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        world.set_mute(true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registry_is_reachable_from_world() {
        let world = World::new();
        assert_eq!(world.registry().len(), 0);
    }
}
