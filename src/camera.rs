//! The per-session camera facade.
//!
//! [`Camera`] is the public entry point for driving one device session. It
//! binds a session handle, an optional default timeout, and an optional
//! reusable decorator chain, and exposes typed command constructors grouped
//! by concern: [`shoot`](Camera::shoot), [`live_view`](Camera::live_view),
//! [`property`](Camera::property), plus generic/control/status senders on
//! the facade itself.
//!
//! Every constructor funnels through [`Camera::dispatch`], which injects
//! the target session when absent, injects the default timeout when the
//! command carries none, applies the reusable chain snapshot, and hands the
//! command to the dispatcher. The returned [`CommandHandle`] supports async
//! (`join`) and blocking (`wait`) observation; synchronous convenience
//! methods exist only for the most common operations and are strictly
//! "construct, dispatch, block on the result".

use crate::catalog::{CameraControl, PropertyCode, StatusInquiry};
use crate::command::decorator::ReusableChain;
use crate::command::{
    Command, CommandHandle, CommandOutput, FromOutput, LiveViewOp, PropertyValue, ShootOptions,
};
use crate::config::CameraConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::CamResult;
use crate::sdk::{DeviceSdk, SessionId};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Default)]
struct CameraDefaults {
    timeout: Option<Duration>,
    chain: Option<Arc<ReusableChain>>,
}

/// Facade over one open device session.
///
/// The facade owns its session: dropping the `Camera` does not close the
/// device session; call [`close`](Self::close) explicitly so outstanding
/// commands drain deterministically.
pub struct Camera {
    session: SessionId,
    dispatcher: Arc<CommandDispatcher>,
    defaults: RwLock<CameraDefaults>,
}

impl Camera {
    /// Opens a device session through the dispatcher.
    pub fn open(dispatcher: &Arc<CommandDispatcher>) -> CamResult<Self> {
        let session = dispatcher.open_session()?;
        Ok(Self {
            session,
            dispatcher: Arc::clone(dispatcher),
            defaults: RwLock::new(CameraDefaults::default()),
        })
    }

    /// Closes the underlying session. Queued commands resolve to
    /// [`CamError::SessionClosed`](crate::CamError::SessionClosed).
    pub fn close(&self) -> CamResult<()> {
        self.dispatcher.close_session(self.session)
    }

    /// The session handle this facade is bound to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Whether the underlying session is still open.
    pub fn is_open(&self) -> bool {
        self.dispatcher.is_open(self.session)
    }

    fn defaults(&self) -> CameraDefaults {
        self.defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The default timeout injected into commands that carry none.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.defaults().timeout
    }

    /// Sets (or clears) the default timeout for subsequent dispatches.
    pub fn set_default_timeout(&self, timeout: Option<Duration>) {
        self.defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .timeout = timeout;
    }

    /// The reusable decorator chain applied to every dispatch, if any.
    pub fn reusable_chain(&self) -> Option<Arc<ReusableChain>> {
        self.defaults().chain
    }

    /// Sets (or clears) the reusable decorator chain.
    ///
    /// The chain is stored as an immutable snapshot; a dispatch in flight
    /// keeps the snapshot it already read, so reconfiguring never produces
    /// a half-applied chain.
    pub fn set_reusable_chain(&self, chain: Option<ReusableChain>) {
        self.defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .chain = chain.map(Arc::new);
    }

    /// Applies a deserialized configuration: default timeout plus the
    /// configured decorator chain.
    pub fn apply_config(&self, config: &CameraConfig) -> CamResult<()> {
        let chain = config.reusable_chain()?;
        let mut defaults = self
            .defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        defaults.timeout = config.default_timeout;
        defaults.chain = chain.map(Arc::new);
        Ok(())
    }

    /// Dispatches a command with this camera as the owner, applying target
    /// binding, the default timeout, and the reusable chain.
    ///
    /// A chain application error resolves the returned handle with
    /// [`CamError::Composition`](crate::CamError::Composition); the command
    /// is not scheduled.
    pub fn dispatch<T: FromOutput>(&self, mut command: Command) -> CommandHandle<T> {
        if command.target().is_none() {
            command.set_target(self.session);
        }
        let defaults = self.defaults();
        if command.timeout().is_none() {
            if let Some(timeout) = defaults.timeout {
                command.set_timeout(timeout);
            }
        }
        let handle = command.handle::<T>();
        let command = match defaults.chain {
            Some(chain) => {
                let slot = command.slot();
                match chain.apply(command) {
                    Ok(command) => command,
                    Err(err) => {
                        debug!(session = %self.session, error = %err, "decorator chain rejected command");
                        let _ = slot.complete(Err(err));
                        return handle;
                    }
                }
            }
            None => command,
        };
        self.dispatcher.schedule(self.session, command);
        handle
    }

    /// Dispatches a generic passthrough command.
    pub fn send_custom<T, F>(&self, label: impl Into<String>, call: F) -> CommandHandle<T>
    where
        T: FromOutput,
        F: Fn(&dyn DeviceSdk, SessionId) -> CamResult<CommandOutput> + Send + Sync + 'static,
    {
        self.dispatch(Command::custom(label, call))
    }

    /// Dispatches a camera-level control command.
    pub fn send_control(&self, code: CameraControl) -> CommandHandle<()> {
        self.dispatch(Command::control(code))
    }

    /// Dispatches a camera-level control command with a numeric parameter.
    pub fn send_control_with(&self, code: CameraControl, param: i64) -> CommandHandle<()> {
        self.dispatch(Command::control_with(code, param))
    }

    /// Dispatches a control command named by its catalog symbol.
    ///
    /// # Errors
    ///
    /// `UnsupportedCapability` when the symbol does not name a control;
    /// nothing is scheduled.
    pub fn send_control_symbolic(&self, symbol: &str) -> CamResult<CommandHandle<()>> {
        let code = CameraControl::from_symbol(symbol)?;
        Ok(self.send_control(code))
    }

    /// Dispatches a status inquiry.
    pub fn send_status(&self, inquiry: StatusInquiry) -> CommandHandle<()> {
        self.dispatch(Command::status(inquiry))
    }

    /// Shooting commands.
    pub fn shoot(&self) -> Shoot<'_> {
        Shoot { camera: self }
    }

    /// Live-view commands.
    pub fn live_view(&self) -> LiveView<'_> {
        LiveView { camera: self }
    }

    /// Property get/describe/set commands.
    pub fn property(&self) -> Property<'_> {
        Property { camera: self }
    }
}

/// Shooting command constructors for one [`Camera`].
pub struct Shoot<'a> {
    camera: &'a Camera,
}

impl Shoot<'_> {
    /// Takes a shot with default options and blocks until the produced
    /// files are known.
    pub fn shoot(&self) -> CamResult<Vec<PathBuf>> {
        self.shoot_async().wait()
    }

    /// Takes a shot with default options.
    pub fn shoot_async(&self) -> CommandHandle<Vec<PathBuf>> {
        self.camera.dispatch(Command::shoot(ShootOptions::default()))
    }

    /// Takes a shot with explicit options and blocks until the produced
    /// files are known.
    pub fn shoot_with(&self, options: ShootOptions) -> CamResult<Vec<PathBuf>> {
        self.shoot_with_async(options).wait()
    }

    /// Takes a shot with explicit options.
    pub fn shoot_with_async(&self, options: ShootOptions) -> CommandHandle<Vec<PathBuf>> {
        self.camera.dispatch(Command::shoot(options))
    }
}

/// Live-view command constructors for one [`Camera`].
pub struct LiveView<'a> {
    camera: &'a Camera,
}

impl LiveView<'_> {
    /// Starts the live-view stream.
    pub fn begin_async(&self) -> CommandHandle<()> {
        self.camera.dispatch(Command::live_view(LiveViewOp::Begin))
    }

    /// Stops the live-view stream.
    pub fn end_async(&self) -> CommandHandle<()> {
        self.camera.dispatch(Command::live_view(LiveViewOp::End))
    }

    /// Downloads the current frame into a file.
    pub fn download_frame_async(&self, dest: impl Into<PathBuf>) -> CommandHandle<Vec<PathBuf>> {
        self.camera.dispatch(Command::live_view(LiveViewOp::DownloadFrame {
            dest: dest.into(),
        }))
    }

    /// Downloads the current frame into memory.
    pub fn download_frame_buffer_async(&self) -> CommandHandle<Vec<u8>> {
        self.camera
            .dispatch(Command::live_view(LiveViewOp::DownloadFrameBuffer))
    }

    /// Whether live view is enabled on the device.
    pub fn is_enabled_async(&self) -> CommandHandle<bool> {
        self.camera.dispatch(Command::live_view(LiveViewOp::IsEnabled))
    }

    /// Whether the live-view stream is currently active.
    pub fn is_active_async(&self) -> CommandHandle<bool> {
        self.camera.dispatch(Command::live_view(LiveViewOp::IsActive))
    }
}

/// Property command constructors for one [`Camera`].
pub struct Property<'a> {
    camera: &'a Camera,
}

macro_rules! describe_property_methods {
    ($( $(#[$meta:meta])* $fn_name:ident => $code:ident; )+) => {
        $(
            $(#[$meta])*
            pub fn $fn_name(&self) -> CommandHandle<Vec<i64>> {
                self.camera
                    .dispatch(Command::describe_property(PropertyCode::$code))
            }
        )+
    };
}

impl Property<'_> {
    /// Reads the product name and blocks until it is known.
    pub fn product_name(&self) -> CamResult<String> {
        self.product_name_async().wait()
    }

    /// Reads the product name.
    pub fn product_name_async(&self) -> CommandHandle<String> {
        self.camera
            .dispatch(Command::get_property(PropertyCode::ProductName))
    }

    describe_property_methods! {
        /// Values the device currently allows for the aperture.
        available_aperture_async => Aperture;
        /// Values the device currently allows for the color temperature.
        available_color_temperature_async => ColorTemperature;
        /// Values the device currently allows for the drive mode.
        available_drive_mode_async => DriveMode;
        /// Values the device currently allows for exposure compensation.
        available_exposure_compensation_async => ExposureCompensation;
        /// Values the device currently allows for the image quality.
        available_image_quality_async => ImageQuality;
        /// Values the device currently allows for the ISO speed.
        available_iso_speed_async => IsoSpeed;
        /// Values the device currently allows for the metering mode.
        available_metering_mode_async => MeteringMode;
        /// Values the device currently allows for the picture style.
        available_picture_style_async => PictureStyle;
        /// Values the device currently allows for the shutter speed.
        available_shutter_speed_async => ShutterSpeed;
        /// Values the device currently allows for the live-view AF mode.
        available_live_view_af_mode_async => LiveViewAfMode;
        /// Values the device currently allows for the live-view color temperature.
        available_live_view_color_temperature_async => LiveViewColorTemperature;
        /// Values the device currently allows for the live-view white balance.
        available_live_view_white_balance_async => LiveViewWhiteBalance;
    }

    /// Reads a property's current raw value.
    pub fn get_async(&self, code: PropertyCode) -> CommandHandle<CommandOutput> {
        self.camera.dispatch(Command::get_property(code))
    }

    /// Writes a property value.
    pub fn set_async(
        &self,
        code: PropertyCode,
        value: impl Into<PropertyValue>,
    ) -> CommandHandle<()> {
        self.camera.dispatch(Command::set_property(code, value))
    }

    /// Writes the ISO speed.
    pub fn set_iso_speed_async(&self, value: i64) -> CommandHandle<()> {
        self.set_async(PropertyCode::IsoSpeed, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CamError;
    use crate::sdk::mock::MockSdk;

    fn open_camera() -> (Camera, Arc<CommandDispatcher>) {
        let sdk = Arc::new(MockSdk::new());
        let dispatcher = Arc::new(CommandDispatcher::new(sdk).unwrap());
        let camera = Camera::open(&dispatcher).unwrap();
        (camera, dispatcher)
    }

    #[test]
    fn unknown_control_symbol_is_rejected_without_scheduling() {
        let (camera, _dispatcher) = open_camera();
        let err = camera.send_control_symbolic("warp-drive").unwrap_err();
        assert!(matches!(err, CamError::UnsupportedCapability { .. }));
        camera.close().unwrap();
    }

    #[test]
    fn default_timeout_is_a_facade_setting() {
        let (camera, _dispatcher) = open_camera();
        assert_eq!(camera.default_timeout(), None);
        camera.set_default_timeout(Some(Duration::from_millis(300)));
        assert_eq!(camera.default_timeout(), Some(Duration::from_millis(300)));
        camera.set_default_timeout(None);
        assert_eq!(camera.default_timeout(), None);
        camera.close().unwrap();
    }
}
