//! depthsnap-hw: Hardware boundary for multi-channel depth-camera rigs.
//!
//! Defines the sensor driver traits (device session, frame reader and the
//! transient bundle/sub-frame handles), the owned frame buffer model,
//! per-channel conversion, and an in-memory simulated sensor.

pub mod channel;
pub mod convert;
pub mod device;
pub mod frame;
pub mod sim;

pub use channel::{ChannelKind, ChannelSelection};
pub use convert::{ChannelConverter, ConvertError};
pub use device::{
    Bundle, DeviceError, DeviceOp, DeviceSession, FrameDescription, FrameReader, SubFrame,
    SubFrameReference,
};
pub use frame::{FrameBuffer, FrameError, PixelFormat};
