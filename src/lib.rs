//! Asynchronous, serialized command dispatch for tethered camera control.
//!
//! `camkit` sits between application code and a vendor camera SDK. Device
//! sessions are not safely reentrant, so every device-touching operation is
//! expressed as a [`Command`] and executed on the session's single
//! serialized execution context, while callers submit from any thread and
//! observe results through a [`CommandHandle`], blocking or `async` as they
//! choose.
//!
//! The layers, bottom up:
//!
//! - [`sdk`]: the [`DeviceSdk`] boundary trait plus the in-memory
//!   [`MockSdk`] used by tests and the demo binary;
//! - [`catalog`]: read-only capability descriptors mapping symbolic names
//!   to device-native codes;
//! - [`command`]: commands, operation descriptors, typed result handles,
//!   and decorator chains (timeout, retry, audit);
//! - [`dispatcher`]: the per-session serialized execution contexts;
//! - [`camera`]: the per-session facade that constructs typed commands and
//!   applies target binding, default timeouts, and reusable decoration;
//! - [`config`]: TOML-loadable facade defaults.
//!
//! ```no_run
//! use std::sync::Arc;
//! use camkit::{Camera, CommandDispatcher, MockSdk};
//!
//! fn main() -> camkit::CamResult<()> {
//!     let sdk = Arc::new(MockSdk::new());
//!     let dispatcher = Arc::new(CommandDispatcher::new(sdk)?);
//!     let camera = Camera::open(&dispatcher)?;
//!
//!     let name = camera.property().product_name()?;
//!     let files = camera.shoot().shoot()?;
//!     println!("{name} captured {} file(s)", files.len());
//!
//!     camera.close()?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod catalog;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod sdk;

pub use camera::{Camera, LiveView, Property, Shoot};
pub use catalog::{CameraControl, CapabilityDescriptor, PropertyCode, StatusInquiry};
pub use command::decorator::{DecoratorStep, ReusableChain, ReusableChainBuilder, RetryPolicy};
pub use command::{
    Command, CommandHandle, CommandOutput, FromOutput, LiveViewOp, OperationDescriptor,
    PropertyValue, SaveTarget, ShootOptions,
};
pub use config::{CameraConfig, RetryConfig};
pub use dispatcher::CommandDispatcher;
pub use error::{CamError, CamResult, DeviceErrorKind};
pub use sdk::{mock::MockSdk, DeviceSdk, SessionId};
