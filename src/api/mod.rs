/*!
ASCOM Alpaca Device API v1

Alpaca device URLs are of the form `/api/v1/{device_type}/{device_number}/{method}`, all in lower case.
Parameter names are not case sensitive for GET requests; GET parameters live in the query string
and PUT parameters in the form-encoded body.

Every response carries the client's and the server's transaction numbers together with
an error number and message; a successful transaction has `ErrorNumber` zero and an empty `ErrorMessage`.

A `200` status means the request reached the device's handler, not that it succeeded.
`400` means the request could not be interpreted (missing or malformed parameters),
`404` means an unknown device or method, and `500` an unexpected internal failure.
*/

#![expect(clippy::doc_markdown)]

mod bool_param;
pub(crate) use bool_param::BoolParam;

mod server_info;
pub use server_info::*;

/// Types related to the general [`Device`] trait.
pub mod device;
pub use device::{Device, DeviceStateItem};

/// Types related to the [`Dome`] trait.
pub mod dome;
pub use dome::{Dome, ShutterState};

use crate::server;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

/// A tagged enum wrapper for a type-erased instance of a device.
#[derive(Clone, Debug)]
pub enum TypedDevice {
    /// A dome.
    Dome(Arc<dyn Dome>),
    /// A device that only implements the common [`Device`] methods.
    Generic(Arc<dyn Device>),
}

impl TypedDevice {
    /// Access the common device methods regardless of the capability set.
    pub fn as_device(&self) -> &dyn Device {
        // With trait upcasting, we can get any device as dyn Device directly
        match self {
            Self::Dome(device) => &**device,
            Self::Generic(device) => &**device,
        }
    }

    pub(crate) fn to_configured_device(&self) -> ConfiguredDevice {
        let device = self.as_device();

        ConfiguredDevice {
            name: device.static_name().to_owned(),
            ty: device.device_type().to_owned(),
            number: device.device_number(),
            unique_id: device.unique_id().to_owned(),
        }
    }
}

/// A trait for devices that can be registered in a `Devices` storage.
///
/// DynTrait is unused here, it's only necessary to cheat the type system
/// and allow "overlapping" blanket impls of RegistrableDevice for different
/// kinds of devices so that `devices.register(device)` "just works".
pub(crate) trait RegistrableDevice<DynTrait: ?Sized> {
    fn into_typed(self) -> TypedDevice;
}

impl RegistrableDevice<dyn Dome> for Arc<dyn Dome> {
    fn into_typed(self) -> TypedDevice {
        TypedDevice::Dome(self)
    }
}

impl<T: 'static + Dome> RegistrableDevice<dyn Dome> for T {
    fn into_typed(self) -> TypedDevice {
        TypedDevice::Dome(Arc::new(self))
    }
}

impl RegistrableDevice<dyn Device> for TypedDevice {
    fn into_typed(self) -> TypedDevice {
        self
    }
}

/// Registry key: lower-cased reported device type plus the reported device number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DeviceKey {
    ty: String,
    number: usize,
}

impl DeviceKey {
    fn of(device: &dyn Device) -> Self {
        Self {
            ty: device.device_type().to_ascii_lowercase(),
            number: device.device_number(),
        }
    }
}

/// Devices collection.
///
/// Devices are addressed by the type and number they report themselves and are kept in registration order.
#[derive(Clone, Default)]
pub struct Devices {
    entries: IndexMap<DeviceKey, TypedDevice>,
}

impl Debug for Devices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.values()).finish()
    }
}

// we use internal interfaces to get type inference magic to work with polymorphic device types
#[expect(private_bounds)]
impl Devices {
    /// Register a device in the storage.
    ///
    /// `device` can be an instance of [`Dome`], an `Arc<dyn Dome>` or a [`TypedDevice`].
    ///
    /// Fails if another device already occupies the same type and number.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn register<DynTrait: ?Sized>(
        &mut self,
        device: impl RegistrableDevice<DynTrait> + Debug,
    ) -> eyre::Result<()> {
        let device = device.into_typed();
        let key = DeviceKey::of(device.as_device());

        if let TypedDevice::Generic(device) = &device {
            tracing::warn!(
                ty = device.device_type(),
                "Device implements no known capability set, only common methods will be served"
            );
        }

        match self.entries.entry(key) {
            Entry::Occupied(entry) => eyre::bail!(
                "Device {}/{} is already registered",
                entry.key().ty,
                entry.key().number
            ),
            Entry::Vacant(entry) => {
                _ = entry.insert(device);
                Ok(())
            }
        }
    }

    /// Iterate over all registered devices in registration order.
    pub fn iter_all(&self) -> impl '_ + ExactSizeIterator<Item = &TypedDevice> {
        self.entries.values()
    }

    /// Retrieve a device by its lower-cased type and number.
    pub fn get(&self, device_type: &str, device_number: usize) -> Option<&TypedDevice> {
        self.entries.get(&DeviceKey {
            ty: device_type.to_ascii_lowercase(),
            number: device_number,
        })
    }

    pub(crate) fn configured_devices(&self) -> Vec<ConfiguredDevice> {
        self.iter_all()
            .map(TypedDevice::to_configured_device)
            .collect()
    }

    pub(crate) async fn handle_action(
        &self,
        device_type: &str,
        device_number: usize,
        action: &str,
        mut params: server::ActionParams,
    ) -> server::Result<TypedResponse> {
        let device = self
            .get(device_type, device_number)
            .ok_or_else(|| server::Error::UnknownDevice {
                ty: device_type.to_owned(),
                device_number,
            })?;

        let action = TypedDeviceAction::from_parts(device, action, &mut params)?;

        params.finish_extraction();

        Ok(match action {
            TypedDeviceAction::Dome(action, device) => {
                TypedResponse::Dome(action.handle(device).await?)
            }
            TypedDeviceAction::Device(action, device) => {
                TypedResponse::Device(action.handle(device).await?)
            }
        })
    }
}

enum TypedDeviceAction<'device> {
    Device(device::Action, &'device dyn Device),
    Dome(dome::Action, &'device dyn Dome),
}

#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum TypedResponse {
    Device(device::Response),
    Dome(dome::Response),
}

impl<'device> TypedDeviceAction<'device> {
    fn from_parts(
        device: &'device TypedDevice,
        action: &str,
        params: &mut server::ActionParams,
    ) -> server::Result<Self> {
        if let TypedDevice::Dome(dome) = device
            && let Some(action) = dome::Action::from_parts(action, params)?
        {
            return Ok(Self::Dome(action, &**dome));
        }

        // Fallback to generic device actions.
        let device = device.as_device();

        device::Action::from_parts(action, params)?
            .map(|action| Self::Device(action, device))
            .ok_or_else(|| server::Error::UnknownAction {
                ty: device.device_type().to_owned(),
                action: action.to_owned(),
            })
    }
}
