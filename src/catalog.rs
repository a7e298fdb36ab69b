//! Capability descriptor catalog.
//!
//! Read-only tables mapping symbolic capability names to the device's native
//! numeric codes and human-readable descriptions. The tables are built once,
//! at first use, from the closed enums below; commands consume them when
//! translating a symbolic option into the code the device understands.
//!
//! Resolving an unknown symbol is an error
//! ([`CamError::UnsupportedCapability`](crate::CamError)); the catalog never
//! substitutes a default code.

use crate::error::{CamError, CamResult};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// One catalog entry: a symbolic name, the device-native code it maps to,
/// and a description for logs and UIs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    /// Symbolic name, unique across the whole catalog (kebab-case).
    pub symbol: &'static str,
    /// The numeric code the device expects on the wire.
    pub native_code: u32,
    /// Human-readable description.
    pub description: &'static str,
}

macro_rules! native_enum {
    (
        $(#[$outer:meta])*
        $name:ident {
            $( $(#[$var_meta:meta])* $variant:ident = $code:literal, $symbol:literal, $desc:literal; )+
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$var_meta])* $variant, )+
        }

        impl $name {
            /// Every variant, in catalog order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )+ ];

            /// The device-native numeric code for this variant.
            pub fn native_code(self) -> u32 {
                match self {
                    $( Self::$variant => $code, )+
                }
            }

            /// The symbolic catalog name for this variant.
            pub fn symbol(self) -> &'static str {
                match self {
                    $( Self::$variant => $symbol, )+
                }
            }

            /// Human-readable description.
            pub fn description(self) -> &'static str {
                match self {
                    $( Self::$variant => $desc, )+
                }
            }

            /// Resolves a native code back to a variant.
            pub fn from_native(code: u32) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Resolves a symbolic name to a variant, failing with
            /// `UnsupportedCapability` for unknown symbols.
            pub fn from_symbol(symbol: &str) -> CamResult<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.symbol() == symbol)
                    .ok_or_else(|| CamError::UnsupportedCapability {
                        symbol: symbol.to_string(),
                    })
            }

            /// This variant's catalog entry.
            pub fn descriptor(self) -> CapabilityDescriptor {
                CapabilityDescriptor {
                    symbol: self.symbol(),
                    native_code: self.native_code(),
                    description: self.description(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.symbol())
            }
        }
    };
}

native_enum! {
    /// Device properties addressable through get/describe/set commands.
    PropertyCode {
        /// Model name reported by the device.
        ProductName = 0x0000_0002, "product-name", "Product name";
        /// Still image quality / format selection.
        ImageQuality = 0x0000_0100, "image-quality", "Image quality";
        /// White balance color temperature in kelvin.
        ColorTemperature = 0x0000_0107, "color-temperature", "Color temperature";
        /// Picture style preset.
        PictureStyle = 0x0000_0114, "picture-style", "Picture style";
        /// Single, continuous, or timer drive mode.
        DriveMode = 0x0000_0401, "drive-mode", "Drive mode";
        /// Sensor sensitivity.
        IsoSpeed = 0x0000_0402, "iso-speed", "ISO speed";
        /// Light metering mode.
        MeteringMode = 0x0000_0403, "metering-mode", "Metering mode";
        /// Aperture value (Av).
        Aperture = 0x0000_0405, "aperture", "Aperture value";
        /// Shutter speed (Tv).
        ShutterSpeed = 0x0000_0406, "shutter-speed", "Shutter speed";
        /// Exposure compensation in 1/3 EV steps.
        ExposureCompensation = 0x0000_0407, "exposure-compensation", "Exposure compensation";
        /// White balance applied to the live-view stream.
        LiveViewWhiteBalance = 0x0000_0502, "live-view-white-balance", "Live view white balance";
        /// Color temperature applied to the live-view stream.
        LiveViewColorTemperature = 0x0000_0503, "live-view-color-temperature", "Live view color temperature";
        /// Autofocus mode used while live view is running.
        LiveViewAfMode = 0x0000_050E, "live-view-af-mode", "Live view autofocus mode";
    }
}

native_enum! {
    /// Camera-level control codes sent with a control command.
    CameraControl {
        /// Trigger the shutter for a single exposure.
        TakePicture = 0x0000_0000, "take-picture", "Release the shutter";
        /// Reset the device auto-shutdown timer.
        ExtendShutdownTimer = 0x0000_0001, "extend-shutdown-timer", "Extend the auto power-off timer";
        /// Open the shutter for a bulb exposure.
        BulbStart = 0x0000_0002, "bulb-start", "Start a bulb exposure";
        /// Close the shutter ending a bulb exposure.
        BulbEnd = 0x0000_0003, "bulb-end", "End a bulb exposure";
        /// Press the shutter button to a given depth (parameter).
        PressShutterButton = 0x0000_0004, "press-shutter-button", "Press the shutter button";
        /// Run autofocus on the live-view image.
        DoLiveViewAf = 0x0000_0102, "do-live-view-af", "Autofocus in live view";
        /// Drive the lens focus motor during live view (parameter).
        DriveLensLiveView = 0x0000_0103, "drive-lens-live-view", "Drive the lens in live view";
        /// White-balance on a clicked live-view point (parameter).
        ClickWhiteBalanceLiveView = 0x0000_0104, "click-white-balance-live-view", "Click white balance in live view";
    }
}

native_enum! {
    /// Status inquiries and UI lock transitions.
    StatusInquiry {
        /// Lock the device UI against local operation.
        UiLock = 0x0000_0000, "ui-lock", "Lock the camera UI";
        /// Release a UI lock.
        UiUnlock = 0x0000_0001, "ui-unlock", "Unlock the camera UI";
        /// Enter direct-transfer mode.
        EnterDirectTransfer = 0x0000_0002, "enter-direct-transfer", "Enter direct transfer mode";
        /// Leave direct-transfer mode.
        ExitDirectTransfer = 0x0000_0003, "exit-direct-transfer", "Exit direct transfer mode";
    }
}

static CATALOG: Lazy<BTreeMap<&'static str, CapabilityDescriptor>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    for p in PropertyCode::ALL {
        map.insert(p.symbol(), p.descriptor());
    }
    for c in CameraControl::ALL {
        map.insert(c.symbol(), c.descriptor());
    }
    for s in StatusInquiry::ALL {
        // Status symbols share a code space with controls but not names;
        // first insert wins would hide a collision, so assert uniqueness.
        debug_assert!(!map.contains_key(s.symbol()));
        map.insert(s.symbol(), s.descriptor());
    }
    map
});

/// Resolves a symbolic capability name to its catalog entry.
///
/// # Errors
///
/// Returns [`CamError::UnsupportedCapability`] when the symbol is not
/// registered. There is no default.
pub fn lookup(symbol: &str) -> CamResult<CapabilityDescriptor> {
    CATALOG
        .get(symbol)
        .copied()
        .ok_or_else(|| CamError::UnsupportedCapability {
            symbol: symbol.to_string(),
        })
}

/// All registered capability descriptors, ordered by symbol.
pub fn all() -> impl Iterator<Item = CapabilityDescriptor> {
    CATALOG.values().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_symbols() {
        let iso = lookup("iso-speed").unwrap();
        assert_eq!(iso.native_code, PropertyCode::IsoSpeed.native_code());
        assert_eq!(iso.description, "ISO speed");

        let shot = lookup("take-picture").unwrap();
        assert_eq!(shot.native_code, 0x0000_0000);
    }

    #[test]
    fn lookup_unknown_symbol_is_an_error() {
        let err = lookup("flux-capacitor").unwrap_err();
        match err {
            CamError::UnsupportedCapability { symbol } => {
                assert_eq!(symbol, "flux-capacitor");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn native_round_trip() {
        for p in PropertyCode::ALL {
            assert_eq!(PropertyCode::from_native(p.native_code()), Some(*p));
            assert_eq!(PropertyCode::from_symbol(p.symbol()).unwrap(), *p);
        }
        assert_eq!(PropertyCode::from_native(0xdead_beef), None);
    }

    #[test]
    fn catalog_covers_every_enum() {
        let total = PropertyCode::ALL.len() + CameraControl::ALL.len() + StatusInquiry::ALL.len();
        assert_eq!(all().count(), total);
    }
}
