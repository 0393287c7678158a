//! Decoders, inputs, outputs, rail vehicles and trains, plus the
//! controller mixins that bind them to a hardware interface.

pub mod controller;
pub mod decoder;
pub mod decoder_function;
pub mod input;
pub mod output;
pub mod railvehicle;
pub mod train;

pub use controller::{
    decoder_address_min_max, decoder_speed_steps, DecoderController, DecoderControllerBase, InputController,
    InputControllerBase, OutputController, OutputControllerBase,
};
pub use decoder::{Decoder, DecoderChangeFlags, DecoderProtocol, Direction};
pub use decoder_function::{DecoderFunction, DecoderFunctionFunction, DecoderFunctions};
pub use input::Input;
pub use output::Output;
pub use railvehicle::RailVehicle;
pub use train::Train;
