//! Mixins a hardware interface composes to become a
//! `DecoderController`/`InputController`/`OutputController` — grounded on
//! the reference runtime's `decodercontroller.cpp` and the analogous
//! input/output controller classes.
//!
//! These are plain structs embedded by value, not traits-with-state,
//! because Rust has no multiple inheritance: a concrete interface type in
//! `traintastic-net` holds one `DecoderControllerBase` (etc.) per mixin it
//! needs and implements the corresponding trait by delegating to it.

use crate::decoder::{Decoder, DecoderChangeFlags, DecoderProtocol};
use crate::input::Input;
use crate::output::Output;
use std::sync::Arc;
use traintastic_core::{Error, IdObject, ObjectList, Result};

/// DCC short addresses top out at 127; everything above requires a long
/// (14-bit) address. Motorola and Selectrix have their own, narrower,
/// single ranges (§4.8).
pub fn decoder_address_min_max(protocol: DecoderProtocol, long_address: bool) -> (u16, u16) {
    match protocol {
        DecoderProtocol::Dcc if long_address => (1, 10239),
        DecoderProtocol::Dcc => (1, 127),
        DecoderProtocol::Motorola => (1, 80),
        DecoderProtocol::Selectrix => (1, 112),
        DecoderProtocol::None => (0, 0),
    }
}

/// The speed-step counts a protocol supports, most permissive last so
/// callers that just want "the default" can take the last entry.
pub fn decoder_speed_steps(protocol: DecoderProtocol) -> &'static [u8] {
    match protocol {
        DecoderProtocol::Dcc => &[14, 27, 28, 128],
        DecoderProtocol::Motorola => &[14, 27, 28],
        DecoderProtocol::Selectrix => &[32],
        DecoderProtocol::None => &[],
    }
}

pub struct DecoderControllerBase {
    pub decoders: ObjectList<Decoder>,
}

impl Default for DecoderControllerBase {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderControllerBase {
    pub fn new() -> Self {
        DecoderControllerBase { decoders: ObjectList::new() }
    }

    pub fn get_decoder(&self, protocol: DecoderProtocol, address: u16) -> Option<Arc<Decoder>> {
        self.decoders
            .to_vec()
            .into_iter()
            .find(|d| d.protocol.get() == protocol && d.address.get() == address)
    }

    /// Appends `decoder`, rejecting it if another decoder already
    /// occupies the same `(protocol, address)` pair on this controller.
    pub fn add_decoder(&self, decoder: Arc<Decoder>) -> Result<()> {
        if self.get_decoder(decoder.protocol.get(), decoder.address.get()).is_some() {
            return Err(Error::DuplicateAddress);
        }
        self.decoders.append(decoder);
        Ok(())
    }

    pub fn remove_decoder(&self, decoder: &Decoder) -> bool {
        self.decoders.remove_by_id(&decoder.id())
    }

    /// Called once an interface comes online: re-sends the throttle of
    /// every decoder that wasn't emergency-stopped and wasn't already at
    /// zero, so a running train keeps moving across a reconnect.
    pub fn restore_decoder_speed(&self, controller: &dyn DecoderController) {
        for d in self.decoders.to_vec() {
            if !d.emergency_stop.get() && d.throttle.get() != 0.0 {
                controller.decoder_changed(&d, DecoderChangeFlags::THROTTLE, 0);
            }
        }
    }

    /// Drains the decoder list front to back, detaching each decoder from
    /// this controller — called from the owning interface's own
    /// `destroy()`, mirroring [`ObjectList::destroy_all`]'s ordering
    /// guarantee but routed through `Decoder::set_interface` so the
    /// cross-reference clears on both sides.
    pub fn destroying(&self) {
        loop {
            let front = match self.decoders.to_vec().into_iter().next() {
                Some(d) => d,
                None => break,
            };
            let _ = front.set_interface(None);
        }
    }
}

pub trait DecoderController: IdObject {
    fn decoder_base(&self) -> &DecoderControllerBase;

    /// Forwards a property change on `decoder` to the command station.
    /// Implemented by the concrete interface in `traintastic-net`, which
    /// hands it to its kernel.
    fn decoder_changed(&self, decoder: &Arc<Decoder>, changes: DecoderChangeFlags, function_number: u32);
}

pub struct InputControllerBase {
    pub inputs: ObjectList<Input>,
}

impl Default for InputControllerBase {
    fn default() -> Self {
        Self::new()
    }
}

impl InputControllerBase {
    pub fn new() -> Self {
        InputControllerBase { inputs: ObjectList::new() }
    }

    pub fn get_input(&self, channel: u32, address: u32) -> Option<Arc<Input>> {
        self.inputs
            .to_vec()
            .into_iter()
            .find(|i| i.channel.get() == channel && i.address.get() == address)
    }

    pub fn add_input(&self, input: Arc<Input>) -> Result<()> {
        if self.get_input(input.channel.get(), input.address.get()).is_some() {
            return Err(Error::DuplicateAddress);
        }
        self.inputs.append(input);
        Ok(())
    }

    pub fn remove_input(&self, input: &Input) -> bool {
        self.inputs.remove_by_id(&input.id())
    }

    pub fn destroying(&self) {
        loop {
            let front = match self.inputs.to_vec().into_iter().next() {
                Some(i) => i,
                None => break,
            };
            let _ = front.set_interface(None);
        }
    }
}

pub trait InputController: IdObject {
    fn input_base(&self) -> &InputControllerBase;

    fn input_address_min_max(&self, channel: u32) -> (u32, u32);

    /// Called by a kernel when the hardware reports a changed input
    /// state (§4.8: `InputController::inputChanged`). Routed through
    /// the input's own debounce so a flickering sensor doesn't spam
    /// observers with transient states.
    fn input_changed(&self, channel: u32, address: u32, value: bool) {
        if let Some(input) = self.input_base().get_input(channel, address) {
            input.report_hardware_value(value);
        }
    }

    /// Debug/simulation helper: flips an input as if the hardware had.
    fn simulate_input_change(&self, channel: u32, address: u32) {
        if let Some(input) = self.input_base().get_input(channel, address) {
            let _ = input.value.set_internal(!input.value.get());
        }
    }
}

pub struct OutputControllerBase {
    pub outputs: ObjectList<Output>,
}

impl Default for OutputControllerBase {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputControllerBase {
    pub fn new() -> Self {
        OutputControllerBase { outputs: ObjectList::new() }
    }

    pub fn get_output(&self, channel: u32, address: u32) -> Option<Arc<Output>> {
        self.outputs
            .to_vec()
            .into_iter()
            .find(|o| o.channel.get() == channel && o.address.get() == address)
    }

    pub fn add_output(&self, output: Arc<Output>) -> Result<()> {
        if self.get_output(output.channel.get(), output.address.get()).is_some() {
            return Err(Error::DuplicateAddress);
        }
        self.outputs.append(output);
        Ok(())
    }

    pub fn remove_output(&self, output: &Output) -> bool {
        self.outputs.remove_by_id(&output.id())
    }

    pub fn destroying(&self) {
        loop {
            let front = match self.outputs.to_vec().into_iter().next() {
                Some(o) => o,
                None => break,
            };
            let _ = front.set_interface(None);
        }
    }
}

pub trait OutputController: IdObject {
    fn output_base(&self) -> &OutputControllerBase;

    fn output_address_min_max(&self, channel: u32) -> (u32, u32);

    /// Sends a requested output state to the command station. Returns
    /// `false` if no output is registered at `(channel, address)`; the
    /// output's own `value` is only updated once the kernel echoes the
    /// state back via [`OutputController::output_echo`].
    fn set_output_value(&self, channel: u32, address: u32, value: bool) -> bool;

    /// Reflects a state the command station confirmed back onto the
    /// matching `Output`.
    fn output_echo(&self, channel: u32, address: u32, value: bool) {
        if let Some(output) = self.output_base().get_output(channel, address) {
            let _ = output.value.set_internal(value);
        }
    }
}
