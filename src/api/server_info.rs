use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// One entry of the `/management/v1/configureddevices` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredDevice {
    /// Device name.
    #[serde(rename = "DeviceName")]
    pub name: String,
    /// Device type as reported by the device (e.g. `Dome`).
    #[serde(rename = "DeviceType")]
    pub ty: String,
    /// Device number within its type.
    #[serde(rename = "DeviceNumber")]
    pub number: usize,
    /// Unique device ID.
    #[serde(rename = "UniqueID")]
    pub unique_id: String,
}

/// General information about the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    /// Server name.
    pub server_name: Cow<'static, str>,
    /// Manufacturer name.
    pub manufacturer: Cow<'static, str>,
    /// Manufacturer version.
    pub manufacturer_version: Cow<'static, str>,
    /// Server location.
    pub location: Cow<'static, str>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        CargoServerInfo!()
    }
}

// Using macro namespacing hack from https://users.rust-lang.org/t/how-to-namespace-a-macro-rules-macro-within-a-module-or-macro-export-it-without-polluting-the-top-level-namespace/63779/5?u=rreverser.
#[doc(hidden)]
#[macro_export]
macro_rules! CargoServerInfo_4f2d1c7e_93a1_4c55_8a0e_2f6bd3e1c0a9 {
    () => {
        const {
            use std::borrow::Cow;

            $crate::api::ServerInfo {
                server_name: Cow::Borrowed(env!("CARGO_PKG_NAME")),
                manufacturer: Cow::Borrowed(env!("CARGO_PKG_AUTHORS")),
                manufacturer_version: Cow::Borrowed(env!("CARGO_PKG_VERSION")),
                location: {
                    let homepage = env!("CARGO_PKG_HOMEPAGE");
                    Cow::Borrowed(if homepage.is_empty() {
                        "Unknown"
                    } else {
                        homepage
                    })
                },
            }
        }
    };
}

/// A helper that constructs a [`ServerInfo`](crate::api::ServerInfo) instance populated with metadata from `Cargo.toml`.
#[doc(inline)]
pub use CargoServerInfo_4f2d1c7e_93a1_4c55_8a0e_2f6bd3e1c0a9 as CargoServerInfo;
