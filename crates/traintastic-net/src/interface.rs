//! Binds a command-station kernel and transport to the world.
//!
//! `Interface` is the concrete type that implements
//! `DecoderController`/`InputController`/`OutputController` by composing
//! the three `*ControllerBase` mixins, and owns the transport settings
//! plus the online/offline lifecycle that starts and stops its kernel.
//! Grounded on `original_source/server/src/hardware/interface/
//! hardwareinterface.cpp` (online/offline sequencing) and this crate's
//! own kernel/io modules, which this type is the sole caller of.

use crate::error::{Error, Result};
use crate::io::{frame_channel, FrameReceiver, FrameSender, IoHandler, SerialIoHandler, SimulationIoHandler, TcpIoHandler, UdpIoHandler};
use crate::kernel::diy::{DiyConfig, DiyKernel};
use crate::kernel::marklincan::{MarklinCanConfig, MarklinCanKernel};
use crate::protocol::diy::{Message, OpCode};
use crate::protocol::marklincan::{Command as CanCommand, Frame};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use traintastic_core::{IdObject, InterfaceItem, ObjectBase, Property, PropertyFlags, Subscription, World};
use traintastic_hardware::{
    DecoderChangeFlags, DecoderController, DecoderControllerBase, Decoder, Direction, InputController,
    InputControllerBase, OutputController, OutputControllerBase,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceStatus {
    Offline,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Serial,
    Tcp,
    Udp,
    Simulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceProtocol {
    TraintasticDiy,
    MarklinCan,
}

enum KernelHandle {
    Diy(DiyKernel),
    MarklinCan(MarklinCanKernel),
}

impl KernelHandle {
    async fn start(&mut self) -> Result<()> {
        match self {
            KernelHandle::Diy(k) => k.start().await,
            KernelHandle::MarklinCan(k) => k.start().await,
        }
    }

    async fn stop(&mut self) -> Result<()> {
        match self {
            KernelHandle::Diy(k) => k.stop().await,
            KernelHandle::MarklinCan(k) => k.stop().await,
        }
    }

    async fn receive(&mut self) -> Option<Incoming> {
        match self {
            KernelHandle::Diy(k) => k.receive().await.map(Incoming::Diy),
            KernelHandle::MarklinCan(k) => k.receive().await.map(Incoming::MarklinCan),
        }
    }

    async fn handle(&mut self, command: KernelCommand) {
        match (self, command) {
            (KernelHandle::MarklinCan(k), KernelCommand::DecoderChanged(decoder, changes, _)) => {
                if changes.contains(DecoderChangeFlags::THROTTLE) {
                    let speed = (decoder.throttle.get() * 1000.0).round() as u16;
                    let _ = k.locomotive_speed(decoder.address.get() as u32, speed).await;
                }
                if changes.contains(DecoderChangeFlags::DIRECTION) {
                    let forward = decoder.direction.get() == Direction::Forward;
                    let _ = k.locomotive_direction(decoder.address.get() as u32, forward).await;
                }
            }
            // The Traintastic-DIY kernel modelled in this crate only
            // forwards input/output state (§4.9); it has no throttle
            // message, so a decoder change bound to a DIY interface is
            // silently dropped here.
            (KernelHandle::Diy(_), KernelCommand::DecoderChanged(..)) => {}
            (KernelHandle::Diy(k), KernelCommand::SetOutput(_, address, value)) => {
                let _ = k.set_output_state(address as u16, value).await;
            }
            (KernelHandle::MarklinCan(k), KernelCommand::SetOutput(_, address, value)) => {
                let _ = k.accessory_control(address, if value { 1 } else { 0 }).await;
            }
            (KernelHandle::Diy(k), KernelCommand::SetConfigDiy(cfg)) => {
                k.set_config(cfg);
            }
            (KernelHandle::MarklinCan(k), KernelCommand::SetConfigMarklinCan(cfg)) => {
                k.set_config(cfg);
            }
            _ => {}
        }
    }
}

enum Incoming {
    Diy(Message),
    MarklinCan(Frame),
}

enum KernelCommand {
    DecoderChanged(Arc<Decoder>, DecoderChangeFlags, u32),
    SetOutput(u32, u32, bool),
    SetConfigDiy(DiyConfig),
    SetConfigMarklinCan(MarklinCanConfig),
}

struct RunningKernel {
    command_tx: mpsc::UnboundedSender<KernelCommand>,
    task: JoinHandle<()>,
}

/// Drains commands and incoming frames until `command_tx` is dropped,
/// then stops the kernel — the background task an online interface
/// keeps alive for as long as it stays bound to a transport.
async fn run_kernel(mut kernel: KernelHandle, mut command_rx: mpsc::UnboundedReceiver<KernelCommand>, interface: Weak<Interface>) {
    loop {
        tokio::select! {
            command = command_rx.recv() => {
                match command {
                    Some(command) => kernel.handle(command).await,
                    None => break,
                }
            }
            incoming = kernel.receive() => {
                match incoming {
                    Some(frame) => {
                        if let Some(interface) = interface.upgrade() {
                            interface.dispatch_incoming(frame);
                        }
                    }
                    None => break,
                }
            }
        }
    }
    let _ = kernel.stop().await;
}

pub struct Interface {
    base: ObjectBase,
    self_weak: Mutex<Weak<Interface>>,
    world: Weak<World>,
    protocol: InterfaceProtocol,

    pub name: Arc<Property<String>>,
    pub status: Arc<Property<InterfaceStatus>>,
    pub transport_kind: Arc<Property<TransportKind>>,
    pub device: Arc<Property<String>>,
    pub baudrate: Arc<Property<u32>>,
    pub hostname: Arc<Property<String>>,
    pub port: Arc<Property<u16>>,
    /// Traintastic-DIY only: heartbeat period pushed to the command
    /// station's config whenever it changes while online.
    pub heartbeat_interval_ms: Arc<Property<u32>>,
    /// Märklin-CAN only: the member UID this interface binds to.
    pub device_uid: Arc<Property<u32>>,

    decoders: DecoderControllerBase,
    inputs: InputControllerBase,
    outputs: OutputControllerBase,

    running: Mutex<Option<RunningKernel>>,
    config_subscription: Mutex<Option<Subscription<(u32, u32)>>>,
}

impl Interface {
    pub fn new(world: &Arc<World>, id: impl Into<Arc<str>>, protocol: InterfaceProtocol) -> Arc<Self> {
        let default_kind = match protocol {
            InterfaceProtocol::TraintasticDiy => TransportKind::Serial,
            InterfaceProtocol::MarklinCan => TransportKind::Udp,
        };
        let interface = Arc::new(Interface {
            base: ObjectBase::new(id),
            self_weak: Mutex::new(Weak::new()),
            world: Arc::downgrade(world),
            protocol,
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            status: Arc::new(Property::new("status", InterfaceStatus::Offline, PropertyFlags::empty())),
            transport_kind: Arc::new(Property::new("transport_kind", default_kind, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            device: Arc::new(Property::new("device", String::from("/dev/ttyUSB0"), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            baudrate: Arc::new(Property::new("baudrate", 115_200u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            hostname: Arc::new(Property::new("hostname", String::from("127.0.0.1"), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            port: Arc::new(Property::new("port", 5740u16, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            heartbeat_interval_ms: Arc::new(Property::new("heartbeat_interval_ms", 1000u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            device_uid: Arc::new(Property::new("device_uid", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            decoders: DecoderControllerBase::new(),
            inputs: InputControllerBase::new(),
            outputs: OutputControllerBase::new(),
            running: Mutex::new(None),
            config_subscription: Mutex::new(None),
        });

        interface.base.with_items_mut(|items| {
            items.add(interface.name.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.status.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.transport_kind.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.device.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.baudrate.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.hostname.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.port.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.heartbeat_interval_ms.clone() as Arc<dyn InterfaceItem>);
            items.add(interface.device_uid.clone() as Arc<dyn InterfaceItem>);
        });

        *interface.self_weak.lock() = Arc::downgrade(&interface);
        interface
    }

    pub fn protocol(&self) -> InterfaceProtocol {
        self.protocol
    }

    pub fn is_online(&self) -> bool {
        self.status.get() == InterfaceStatus::Online
    }

    fn build_io_handler(&self, frame_tx: FrameSender) -> Box<dyn IoHandler> {
        match self.transport_kind.get() {
            TransportKind::Serial => Box::new(SerialIoHandler::new(self.device.get(), self.baudrate.get(), frame_tx)),
            TransportKind::Tcp => Box::new(TcpIoHandler::new(self.hostname.get(), self.port.get(), frame_tx)),
            TransportKind::Udp => Box::new(UdpIoHandler::new(self.hostname.get(), frame_tx)),
            TransportKind::Simulation => Box::new(SimulationIoHandler::new(frame_tx)),
        }
    }

    fn build_kernel(&self, io: Box<dyn IoHandler>, frame_rx: FrameReceiver) -> KernelHandle {
        match self.protocol {
            InterfaceProtocol::TraintasticDiy => KernelHandle::Diy(DiyKernel::new(io, frame_rx)),
            InterfaceProtocol::MarklinCan => KernelHandle::MarklinCan(MarklinCanKernel::new(io, frame_rx)),
        }
    }

    fn set_transport_enabled(&self, enabled: bool) {
        self.transport_kind.set_enabled(enabled);
        self.device.set_enabled(enabled);
        self.baudrate.set_enabled(enabled);
        self.hostname.set_enabled(enabled);
        self.port.set_enabled(enabled);
    }

    /// Brings the interface online or offline. Going online constructs
    /// the transport and kernel for the current settings, starts them,
    /// registers with the world, disables the transport-setting
    /// properties, and restores any non-zero decoder throttle. Going
    /// offline reverses all of that; it is always infallible.
    pub async fn set_online(self: &Arc<Self>, online: bool) -> Result<()> {
        if online == self.is_online() {
            return Ok(());
        }
        if online {
            self.go_online().await
        } else {
            self.go_offline().await;
            Ok(())
        }
    }

    async fn go_online(self: &Arc<Self>) -> Result<()> {
        let world = self.world.upgrade().ok_or(Error::Core(traintastic_core::Error::ObjectDestroyed))?;
        world.note_interface_online()?;

        let (frame_tx, frame_rx) = frame_channel();
        let io = self.build_io_handler(frame_tx);
        let mut kernel = self.build_kernel(io, frame_rx);
        if let Err(e) = kernel.start().await {
            world.note_interface_offline();
            return Err(e);
        }

        let initial_config = match self.protocol {
            InterfaceProtocol::TraintasticDiy => KernelCommand::SetConfigDiy(DiyConfig {
                heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms.get() as u64),
            }),
            InterfaceProtocol::MarklinCan => KernelCommand::SetConfigMarklinCan(MarklinCanConfig {
                device_uid: self.device_uid.get(),
            }),
        };
        kernel.handle(initial_config).await;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let weak = self.self_weak.lock().clone();
        let task = tokio::spawn(run_kernel(kernel, command_rx, weak));
        *self.running.lock() = Some(RunningKernel { command_tx, task });

        self.set_transport_enabled(false);
        let _ = self.status.set_internal(InterfaceStatus::Online);
        self.decoders.restore_decoder_speed(self.as_ref());
        self.subscribe_config();
        Ok(())
    }

    async fn go_offline(self: &Arc<Self>) {
        if let Some(sub) = self.config_subscription.lock().take() {
            sub.disconnect();
        }
        if let Some(running) = self.running.lock().take() {
            drop(running.command_tx);
            let _ = running.task.await;
        }
        self.set_transport_enabled(true);
        let _ = self.status.set_internal(InterfaceStatus::Offline);
        if let Some(world) = self.world.upgrade() {
            world.note_interface_offline();
        }
    }

    fn subscribe_config(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let sub = match self.protocol {
            InterfaceProtocol::TraintasticDiy => self.heartbeat_interval_ms.subscribe(move |(_, new): (u32, u32)| {
                if let Some(interface) = weak.upgrade() {
                    interface.send_command(KernelCommand::SetConfigDiy(DiyConfig {
                        heartbeat_interval: Duration::from_millis(new as u64),
                    }));
                }
            }),
            InterfaceProtocol::MarklinCan => self.device_uid.subscribe(move |(_, new): (u32, u32)| {
                if let Some(interface) = weak.upgrade() {
                    interface.send_command(KernelCommand::SetConfigMarklinCan(MarklinCanConfig { device_uid: new }));
                }
            }),
        };
        *self.config_subscription.lock() = Some(sub);
    }

    fn send_command(&self, command: KernelCommand) {
        if let Some(running) = self.running.lock().as_ref() {
            let _ = running.command_tx.send(command);
        }
    }

    /// Interprets a frame read off the wire and forwards it to the
    /// matching input/output, mirroring the reference kernel's message
    /// dispatch (§4.9). Anything this crate's protocol modules don't
    /// model yet (DIY subscriptions, CAN locomotive-function echoes) is
    /// silently ignored rather than treated as an error.
    fn dispatch_incoming(&self, frame: Incoming) {
        match frame {
            Incoming::Diy(msg) => {
                if msg.opcode() == Some(OpCode::SetInputState) {
                    let data = msg.data();
                    if data.len() >= 3 {
                        let address = u16::from_le_bytes([data[0], data[1]]) as u32;
                        let value = data[2] != 0;
                        self.input_changed(0, address, value);
                    }
                }
            }
            Incoming::MarklinCan(frame) => {
                if frame.command == CanCommand::AccessoryControl && frame.response && frame.dlc >= 5 {
                    let address = u32::from_be_bytes([frame.data[0], frame.data[1], frame.data[2], frame.data[3]]);
                    let value = frame.data[4] != 0;
                    self.output_echo(0, address, value);
                }
            }
        }
    }
}

impl DecoderController for Interface {
    fn decoder_base(&self) -> &DecoderControllerBase {
        &self.decoders
    }

    fn decoder_changed(&self, decoder: &Arc<Decoder>, changes: DecoderChangeFlags, function_number: u32) {
        self.send_command(KernelCommand::DecoderChanged(decoder.clone(), changes, function_number));
    }
}

impl InputController for Interface {
    fn input_base(&self) -> &InputControllerBase {
        &self.inputs
    }
}

impl OutputController for Interface {
    fn output_base(&self) -> &OutputControllerBase {
        &self.outputs
    }

    fn set_output_value(&self, channel: u32, address: u32, value: bool) -> bool {
        if self.outputs.get_output(channel, address).is_none() {
            return false;
        }
        self.send_command(KernelCommand::SetOutput(channel, address, value));
        true
    }
}

impl IdObject for Interface {
    fn id(&self) -> Arc<str> {
        self.base.id()
    }

    fn interface_items(&self) -> traintastic_core::InterfaceItems {
        self.base.interface_items()
    }

    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }

    /// Detaches every bound decoder/input/output before marking this
    /// object destroyed (§4.8 teardown ordering). A kernel still online
    /// at this point is stopped on the executor in the background — an
    /// `IdObject::destroy` call is synchronous and cannot await the
    /// transport's shutdown, so `interfaces_online` is decremented
    /// immediately rather than once the stop completes.
    fn destroy(&self) {
        if self.base.is_destroyed() {
            return;
        }
        self.decoders.destroying();
        self.inputs.destroying();
        self.outputs.destroying();
        if let Some(sub) = self.config_subscription.lock().take() {
            sub.disconnect();
        }
        if let Some(running) = self.running.lock().take() {
            drop(running.command_tx);
            tokio::spawn(async move {
                let _ = running.task.await;
            });
            if let Some(world) = self.world.upgrade() {
                world.note_interface_offline();
            }
        }
        self.base.destroy();
    }

    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traintastic_hardware::{Decoder as DecoderObj, DecoderProtocol, Input, Output};

    fn simulation_interface(world: &Arc<World>, protocol: InterfaceProtocol) -> Arc<Interface> {
        let interface = Interface::new(world, "cs1", protocol);
        interface.transport_kind.set(TransportKind::Simulation).unwrap();
        interface
    }

    #[tokio::test]
    async fn going_online_disables_transport_settings_and_registers_with_world() {
        let world = Arc::new(World::new());
        let interface = simulation_interface(&world, InterfaceProtocol::MarklinCan);

        interface.set_online(true).await.unwrap();
        assert!(interface.is_online());
        assert_eq!(world.interfaces_online(), 1);

        interface.set_online(false).await.unwrap();
        assert!(!interface.is_online());
        assert_eq!(world.interfaces_online(), 0);
    }

    #[tokio::test]
    async fn going_online_is_blocked_while_world_is_editing() {
        let world = Arc::new(World::new());
        world.set_edit_enabled(true).unwrap();
        let interface = simulation_interface(&world, InterfaceProtocol::TraintasticDiy);
        assert!(interface.set_online(true).await.is_err());
    }

    #[tokio::test]
    async fn set_output_value_routes_through_kernel_once_online() {
        let world = Arc::new(World::new());
        let interface = simulation_interface(&world, InterfaceProtocol::MarklinCan);
        interface.set_online(true).await.unwrap();

        let output = Output::new("o1");
        output.set_interface(Some(interface.clone())).unwrap();
        assert!(output.set_value(true).is_ok());

        interface.set_online(false).await.unwrap();
    }

    #[tokio::test]
    async fn unbound_output_address_is_rejected() {
        let world = Arc::new(World::new());
        let interface = simulation_interface(&world, InterfaceProtocol::TraintasticDiy);
        interface.set_online(true).await.unwrap();
        assert!(!interface.set_output_value(0, 99, true));
        interface.set_online(false).await.unwrap();
    }

    #[tokio::test]
    async fn destroying_detaches_bound_decoders_inputs_and_outputs() {
        let world = Arc::new(World::new());
        let interface = simulation_interface(&world, InterfaceProtocol::MarklinCan);

        let decoder = DecoderObj::new(&world, "loco1");
        decoder.protocol.set(DecoderProtocol::Dcc).unwrap();
        decoder.set_interface(Some(interface.clone())).unwrap();

        let input = Input::new("in1");
        input.set_interface(Some(interface.clone())).unwrap();

        interface.destroy();
        assert!(interface.is_destroyed());
        assert!(decoder.interface.get().is_none());
        assert!(input.interface.get().is_none());
    }
}
