mod logging_env;

use crate::api::{Device, Dome};
use crate::{ASCOMError, ASCOMResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory dome for exercising the registry and the REST layer.
#[derive(Debug)]
pub(crate) struct TestDome {
    number: usize,
    unique_id: String,
    connected: AtomicBool,
    azimuth: Mutex<f64>,
}

impl TestDome {
    pub(crate) fn new(number: usize) -> Self {
        Self {
            number,
            unique_id: format!("test-dome-{number}"),
            connected: AtomicBool::new(false),
            azimuth: Mutex::new(0.0),
        }
    }

    fn ensure_connected(&self) -> ASCOMResult {
        if self.connected.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(ASCOMError::NOT_CONNECTED)
        }
    }
}

#[async_trait::async_trait]
impl Device for TestDome {
    fn static_name(&self) -> &str {
        "Test Dome"
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn device_type(&self) -> &str {
        "Dome"
    }

    fn device_number(&self) -> usize {
        self.number
    }

    async fn connected(&self) -> ASCOMResult<bool> {
        Ok(self.connected.load(Ordering::Relaxed))
    }

    async fn connect(&self) -> ASCOMResult {
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> ASCOMResult {
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Dome for TestDome {
    async fn azimuth(&self) -> ASCOMResult<f64> {
        self.ensure_connected()?;
        Ok(*self.azimuth.lock())
    }

    async fn can_find_home(&self) -> ASCOMResult<bool> {
        Ok(true)
    }

    async fn find_home(&self) -> ASCOMResult {
        Err(ASCOMError::unspecified(
            "failed to read /var/lib/zro/secret.json",
        ))
    }

    async fn slew_to_azimuth(&self, azimuth: f64) -> ASCOMResult {
        self.ensure_connected()?;
        if !(0.0..360.0).contains(&azimuth) {
            return Err(ASCOMError::invalid_value(format_args!(
                "azimuth {azimuth} is out of range"
            )));
        }
        *self.azimuth.lock() = azimuth;
        Ok(())
    }
}

/// Device that implements only the common methods.
#[derive(Debug)]
pub(crate) struct PlainDevice;

#[async_trait::async_trait]
impl Device for PlainDevice {
    fn static_name(&self) -> &str {
        "Plain Switch"
    }

    fn unique_id(&self) -> &str {
        "plain-switch-0"
    }

    fn device_type(&self) -> &str {
        "Switch"
    }

    fn device_number(&self) -> usize {
        0
    }

    async fn description(&self) -> ASCOMResult<String> {
        Ok("A device without a dedicated interface".to_owned())
    }
}
