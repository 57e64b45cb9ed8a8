//! Wire format of the ZRO dome controller.
//!
//! Commands travel as `_<CODE>[<KEY>=<VALUE>];`, responses as `_ACK_<CODE>[=<VALUE>];`
//! or `_NACK_<CODE>;`, and periodic reports as small JSON objects.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Deserialize;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Single-letter command codes understood by the controller firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandCode {
    /// Load a configuration parameter (`_L<KEY>=<VALUE>;`).
    Load = b'L',
    /// Set the park position.
    SetPark = b'P',
    /// Ticks per turn.
    Ticks = b'T',
    /// Connect the shutter controller.
    ConnectShutter = b'X',
    /// Disconnect the shutter controller.
    DisconnectShutter = b'Z',
    /// Open the shutter.
    OpenShutter = b'O',
    /// Close the shutter.
    CloseShutter = b'C',
    /// Raw shutter command.
    Shutter = b'U',
    /// Abort any motion.
    Abort = b'A',
    /// Move.
    Move = b'M',
    /// Find home.
    Home = b'H',
    /// Go to a position in ticks.
    Goto = b'G',
    /// Park.
    Park = b'K',
    /// Request a telemetry report.
    Status = b'S',
    /// Firmware version.
    Version = b'V',
    /// Request a battery report.
    Battery = b'B',
    /// Temperature.
    Temperature = b't',
    /// Humidity.
    Humidity = b'u',
    /// Help.
    Help = b'h',
}

impl CommandCode {
    /// The character this code is sent and echoed as.
    pub fn as_char(self) -> char {
        char::from(u8::from(self))
    }
}

impl Display for CommandCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// An outbound command.
///
/// Carries at most one argument; multiple parameters are sent as separate commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    code: CommandCode,
    arg: Option<(&'static str, i32)>,
}

impl Command {
    /// A bare command such as `_S;`.
    pub const fn new(code: CommandCode) -> Self {
        Self { code, arg: None }
    }

    /// A command with an unnamed value such as `_G=1234;`.
    pub const fn with_value(code: CommandCode, value: i32) -> Self {
        Self {
            code,
            arg: Some(("", value)),
        }
    }

    /// A command with a named parameter such as `_LTICK=10476;`.
    pub const fn with_param(code: CommandCode, key: &'static str, value: i32) -> Self {
        Self {
            code,
            arg: Some((key, value)),
        }
    }

    /// The command code.
    pub const fn code(&self) -> CommandCode {
        self.code
    }

    /// Wire representation of this command.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.code)?;
        if let Some((key, value)) = self.arg {
            write!(f, "{key}={value}")?;
        }
        f.write_str(";")
    }
}

/// A decoded controller response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Echoed command code.
    pub code: char,
    /// Optional value after `=`.
    pub value: Option<String>,
    /// Whether the controller rejected the command (NACK).
    pub error: bool,
}

/// Failure to decode an inbound message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message is not valid UTF-8.
    #[error("message is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    /// Wrong number of `_`-separated segments, or no trailing `;`.
    #[error("malformed response framing in {0:?}")]
    Framing(String),
    /// Second segment is neither `ACK` nor `NACK`.
    #[error("unknown acknowledgement token {token:?} in {message:?}")]
    AckToken {
        /// The offending token.
        token: String,
        /// The whole message.
        message: String,
    },
    /// Nothing before `=`.
    #[error("missing response code in {0:?}")]
    MissingCode(String),
    /// More than one `=` in the body.
    #[error("more than one value in {0:?}")]
    ExtraValue(String),
    /// A JSON report that doesn't match the expected shape.
    #[error("invalid report payload: {0}")]
    Report(#[from] serde_json::Error),
}

/// Decode a response message such as `_ACK_V=(1.2.3);` or `_NACK_G;`.
pub fn decode_response(message: &str) -> Result<Response, DecodeError> {
    let segments = message.split('_').collect::<Vec<_>>();

    let [_, ack, body] = segments.as_slice() else {
        return Err(DecodeError::Framing(message.to_owned()));
    };

    let Some(body) = body.strip_suffix(';') else {
        return Err(DecodeError::Framing(message.to_owned()));
    };

    let error = match *ack {
        "ACK" => false,
        "NACK" => true,
        token => {
            return Err(DecodeError::AckToken {
                token: token.to_owned(),
                message: message.to_owned(),
            });
        }
    };

    let mut parts = body.split('=');

    let code = parts
        .next()
        .and_then(|code| code.chars().next())
        .ok_or_else(|| DecodeError::MissingCode(message.to_owned()))?;

    let value = parts.next().map(str::to_owned);

    if parts.next().is_some() {
        return Err(DecodeError::ExtraValue(message.to_owned()));
    }

    Ok(Response { code, value, error })
}

/// Decode a raw response payload as received from the transport.
pub fn decode_response_bytes(payload: &[u8]) -> Result<Response, DecodeError> {
    decode_response(std::str::from_utf8(payload)?)
}

/// Periodic azimuth telemetry published by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TelemetryReport {
    /// Azimuth motor state; `1..=4` means the dome is moving.
    #[serde(rename = "az_state")]
    pub azimuth_state: i32,
    /// Shutter phase, reported by newer firmware only.
    #[serde(rename = "sh_state", default)]
    pub shutter_state: Option<u8>,
    /// Current position in ticks.
    #[serde(rename = "pos")]
    pub position: i32,
    /// Home sensor (`1` at home).
    pub home: u8,
    /// Direction of the last motion (`0` clockwise).
    #[serde(rename = "dir")]
    pub direction: u8,
    /// Target position in ticks.
    pub target: i32,
    /// Link quality to the shutter controller.
    pub link: i32,
    /// Temperature in degrees Celsius.
    #[serde(rename = "temp")]
    pub temperature: f32,
    /// Relative humidity in percent.
    #[serde(rename = "hum")]
    pub humidity: f32,
}

impl TelemetryReport {
    /// Whether the azimuth motor is moving.
    pub const fn is_slewing(&self) -> bool {
        self.azimuth_state > 0 && self.azimuth_state < 5
    }
}

/// Battery report of the shutter controller.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BatteryReport {
    /// Voltage in volts.
    #[serde(rename = "batt_voltage")]
    pub voltage: f32,
    /// Current in amperes.
    #[serde(rename = "batt_current")]
    pub current: f32,
}

/// Decode a telemetry payload.
pub fn decode_telemetry(payload: &[u8]) -> Result<TelemetryReport, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Decode a battery payload.
pub fn decode_battery(payload: &[u8]) -> Result<BatteryReport, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}
