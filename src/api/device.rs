use super::BoolParam;
use crate::macros::rpc_trait;
use crate::{ASCOMError, ASCOMResult};
use macro_rules_attribute::apply;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// ASCOM Methods Common To All Devices.
#[apply(rpc_trait)]
pub trait Device: Debug + Send + Sync {
    /// Invokes the specified device-specific custom action.
    ///
    /// This method should return an error message and NotImplementedException error number (0x400) if the driver just implements the standard ASCOM device methods and has no bespoke, unique, functionality.
    #[http("action", method = Put)]
    async fn action(
        &self,

        #[http("Action")] action: String,

        #[http("Parameters")] parameters: String,
    ) -> ASCOMResult<String> {
        Err(ASCOMError::ACTION_NOT_IMPLEMENTED)
    }

    /// Retrieves the connected state of the device.
    #[http("connected", method = Get)]
    async fn connected(&self) -> ASCOMResult<bool> {
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// Sets the connected state of the device.
    #[http("connected", method = Put)]
    async fn set_connected(&self, #[http("Connected", via = BoolParam)] connected: bool) -> ASCOMResult {
        if connected {
            self.connect().await
        } else {
            self.disconnect().await
        }
    }

    /// Returns true while the device is connecting or disconnecting.
    #[http("connecting", method = Get)]
    async fn connecting(&self) -> ASCOMResult<bool> {
        Ok(false)
    }

    /// Connect to the device.
    #[http("connect", method = Put)]
    async fn connect(&self) -> ASCOMResult {
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// Disconnect from the device.
    #[http("disconnect", method = Put)]
    async fn disconnect(&self) -> ASCOMResult {
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// The description of the device.
    #[http("description", method = Get)]
    async fn description(&self) -> ASCOMResult<String> {
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// Devices must return all operational values that are definitively known but can omit entries where values are unknown.
    ///
    /// An empty list must be returned if no values are known.
    #[http("devicestate", method = Get)]
    async fn device_state(&self) -> ASCOMResult<Vec<DeviceStateItem>> {
        Ok(vec![])
    }

    /// The description of the driver.
    #[http("driverinfo", method = Get)]
    async fn driver_info(&self) -> ASCOMResult<String> {
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// A string containing only the major and minor version of the driver.
    ///
    /// This must be in the form "n.n".
    #[http("driverversion", method = Get)]
    async fn driver_version(&self) -> ASCOMResult<String> {
        Err(ASCOMError::NOT_IMPLEMENTED)
    }

    /// This method returns the version of the ASCOM device interface contract to which this device complies.
    #[http("interfaceversion", method = Get)]
    async fn interface_version(&self) -> ASCOMResult<i32> {
        Ok(1_i32)
    }

    /// The name of the device.
    #[http("name", method = Get)]
    async fn name(&self) -> ASCOMResult<String> {
        Ok(self.static_name().to_owned())
    }

    /// Returns the list of action names supported by this driver.
    #[http("supportedactions", method = Get)]
    async fn supported_actions(&self) -> ASCOMResult<Vec<String>> {
        Ok(vec![])
    }
}

/// A DeviceState object representing an operational property of this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceStateItem {
    /// The property name.
    ///
    /// The name casing must match the casing in the relevant interface definition.
    pub name: String,

    /// The corresponding value of the named operational property.
    pub value: serde_json::Value,
}

impl DeviceStateItem {
    /// Create a new state item from any serializable value.
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
