use super::angle::AngleConverter;
use super::codec::{BatteryReport, TelemetryReport};
use super::config::Config;
use crate::api::{DeviceStateItem, ShutterState};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Shutter phase as reported by the controller firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ShutterPhase {
    /// Fully closed.
    #[default]
    Closed = 0,
    /// Opening.
    Opening = 1,
    /// Fully open.
    Open = 2,
    /// Closing.
    Closing = 3,
    /// Motion was interrupted.
    Aborted = 4,
    /// The shutter controller reported a fault.
    Error = 5,
}

impl From<ShutterPhase> for ShutterState {
    fn from(phase: ShutterPhase) -> Self {
        match phase {
            ShutterPhase::Closed => Self::Closed,
            ShutterPhase::Opening => Self::Opening,
            ShutterPhase::Open => Self::Open,
            ShutterPhase::Closing => Self::Closing,
            ShutterPhase::Aborted | ShutterPhase::Error => Self::Error,
        }
    }
}

/// Last known state of the controller, as assembled from telemetry and command responses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HardwareStatus {
    /// Position in ticks.
    pub position: i32,
    /// Target of the current motion in ticks.
    pub target: i32,
    /// Home sensor is active.
    pub at_home: bool,
    /// Direction of the last motion (`0` clockwise).
    pub direction: u8,
    /// Azimuth motor is moving.
    pub slewing: bool,
    /// Link quality to the shutter controller.
    pub link: i32,
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Shutter battery voltage.
    pub battery_voltage: f32,
    /// Shutter battery current.
    pub battery_current: f32,
    /// Firmware version, without the surrounding parentheses.
    pub firmware: Option<String>,
    /// Shutter phase.
    pub shutter: ShutterPhase,
    /// The shutter controller acknowledged the connect handshake.
    pub shutter_connected: bool,
    /// Set by a successful park, cleared by any other motion.
    pub parked: bool,
}

impl HardwareStatus {
    pub(crate) fn apply_telemetry(&mut self, report: &TelemetryReport) {
        self.position = report.position;
        self.target = report.target;
        self.at_home = report.home == 1;
        self.direction = report.direction;
        self.slewing = report.is_slewing();
        self.link = report.link;
        self.temperature = report.temperature;
        self.humidity = report.humidity;

        if let Some(raw) = report.shutter_state {
            match ShutterPhase::try_from(raw) {
                Ok(phase) => self.shutter = phase,
                Err(err) => tracing::warn!(%err, "Ignoring unknown shutter phase"),
            }
        }
    }

    pub(crate) const fn apply_battery(&mut self, report: &BatteryReport) {
        self.battery_voltage = report.voltage;
        self.battery_current = report.current;
    }
}

/// Dome state in the terms of the Alpaca dome interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomeStatus {
    /// Azimuth in degrees, within `[0, 360)`.
    pub azimuth: f64,
    /// At the home sensor.
    pub at_home: bool,
    /// Parked and standing still.
    pub at_park: bool,
    /// Moving.
    pub slewing: bool,
    /// Slaved to a telescope.
    pub slaved: bool,
    /// Always zero; the dome has no altitude axis.
    pub altitude: f64,
    /// Shutter state.
    pub shutter: ShutterState,
}

impl DomeStatus {
    pub(crate) fn derive(hardware: &HardwareStatus, angles: &AngleConverter, slaved: bool) -> Self {
        Self {
            azimuth: angles.ticks_to_degrees(hardware.position),
            at_home: hardware.at_home,
            at_park: hardware.parked && !hardware.slewing,
            slewing: hardware.slewing,
            slaved,
            altitude: 0.0,
            shutter: hardware.shutter.into(),
        }
    }

    /// Operational properties in the form reported by `devicestate`.
    pub fn state_items(&self) -> Vec<DeviceStateItem> {
        vec![
            DeviceStateItem::new("Altitude", self.altitude),
            DeviceStateItem::new("AtHome", self.at_home),
            DeviceStateItem::new("AtPark", self.at_park),
            DeviceStateItem::new("Azimuth", self.azimuth),
            DeviceStateItem::new("ShutterStatus", i32::from(self.shutter)),
            DeviceStateItem::new("Slewing", self.slewing),
        ]
    }
}

/// What the dome can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[expect(clippy::struct_excessive_bools)]
#[allow(missing_docs)]
pub struct DomeCapabilities {
    pub can_find_home: bool,
    pub can_park: bool,
    pub can_set_altitude: bool,
    pub can_set_azimuth: bool,
    pub can_set_park: bool,
    pub can_set_shutter: bool,
    pub can_slave: bool,
    pub can_sync_azimuth: bool,
}

impl DomeCapabilities {
    pub(crate) const fn for_config(config: &Config) -> Self {
        Self {
            can_find_home: true,
            can_park: true,
            can_set_altitude: false,
            can_set_azimuth: true,
            can_set_park: true,
            can_set_shutter: config.use_shutter,
            can_slave: true,
            can_sync_azimuth: false,
        }
    }
}

/// Connection lifecycle of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum ConnectionState {
    /// No broker session.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Ready for commands.
    Connected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(az_state: i32, shutter_state: Option<u8>) -> TelemetryReport {
        TelemetryReport {
            azimuth_state: az_state,
            shutter_state,
            position: 2619,
            home: 0,
            direction: 1,
            target: 5238,
            link: 90,
            temperature: 11.5,
            humidity: 70.0,
        }
    }

    #[test]
    fn telemetry_updates_snapshot() {
        let mut status = HardwareStatus::default();
        status.apply_telemetry(&telemetry(2, Some(2)));

        assert_eq!(status.position, 2619);
        assert_eq!(status.target, 5238);
        assert!(status.slewing);
        assert!(!status.at_home);
        assert_eq!(status.shutter, ShutterPhase::Open);

        status.apply_telemetry(&telemetry(5, None));
        assert!(!status.slewing);
        // Older firmware doesn't report the shutter; keep what we know.
        assert_eq!(status.shutter, ShutterPhase::Open);

        status.apply_telemetry(&telemetry(0, Some(42)));
        assert_eq!(status.shutter, ShutterPhase::Open);
    }

    #[test]
    fn shutter_phases_map_to_alpaca_states() {
        for (phase, state) in [
            (ShutterPhase::Closed, ShutterState::Closed),
            (ShutterPhase::Opening, ShutterState::Opening),
            (ShutterPhase::Open, ShutterState::Open),
            (ShutterPhase::Closing, ShutterState::Closing),
            (ShutterPhase::Aborted, ShutterState::Error),
            (ShutterPhase::Error, ShutterState::Error),
        ] {
            assert_eq!(ShutterState::from(phase), state);
        }
    }

    #[test]
    fn at_park_requires_standing_still() {
        let angles = AngleConverter::new(10_476, 0.0);
        let mut hardware = HardwareStatus {
            parked: true,
            ..HardwareStatus::default()
        };
        assert!(DomeStatus::derive(&hardware, &angles, false).at_park);

        hardware.slewing = true;
        let status = DomeStatus::derive(&hardware, &angles, true);
        assert!(!status.at_park);
        assert!(status.slaved);
    }

    #[test]
    fn azimuth_comes_from_ticks() {
        let hardware = HardwareStatus {
            position: 2619,
            ..HardwareStatus::default()
        };
        let status = DomeStatus::derive(&hardware, &AngleConverter::new(10_476, 90.0), false);
        assert!((status.azimuth - 180.0).abs() < 1e-9);
        assert!(status.altitude.abs() < f64::EPSILON);
    }

    #[test]
    fn shutter_capability_follows_config() {
        let config = Config {
            use_shutter: false,
            ..Config::default()
        };
        let capabilities = DomeCapabilities::for_config(&config);
        assert!(!capabilities.can_set_shutter);
        assert!(capabilities.can_set_park);
        assert!(!capabilities.can_sync_azimuth);
        assert!(DomeCapabilities::for_config(&Config::default()).can_set_shutter);
    }
}
