//! Single-axis Copley servo drive.
//!
//! [`MotorController`] is the unit-aware layer over [`RegisterProtocol`].
//! Physical values are converted to device counts with the configured
//! [`ScaleFactor`] before they are written, and read back the same way.
//!
//! # Error policy
//!
//! Commands and reads fail differently:
//!
//! - **Set and trigger operations** return [`ProtocolResult`]. The caller must
//!   know when enabling, disabling or starting a move failed.
//! - **Get operations** return `Option`. A failed or unparseable read is
//!   logged at error level and yields `None`, so a single bad telemetry poll
//!   never aborts a control loop.
//!
//! # Example
//!
//! ```no_run
//! use copley::{Direction, DriveConfig, MotorController};
//!
//! let mut drive = MotorController::open(&DriveConfig::new("/dev/ttyUSB0"))?;
//! drive.set_profile_velocity(500.0)?;
//! drive.set_mode_relative_move()?;
//! drive.enable_drive()?;
//! drive.set_relative_move(10.0, Direction::Forward)?;
//! drive.trigger_trajectory()?;
//! println!("Position: {:?}", drive.get_motor_position());
//! drive.disable_drive()?;
//! # Ok::<(), copley::ProtocolError>(())
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serialport::SerialPort;
use tracing::{error, info};

use crate::config::{DriveConfig, ScaleFactor};
use crate::error::{ProtocolError, ProtocolResult};
use crate::event::EventStatus;
use crate::protocol::RegisterProtocol;
use crate::register::Register;
use crate::transport::{LineTransport, SerialTransport};

/// Profile type value selecting relative moves.
const PROFILE_RELATIVE_MOVE: i64 = 256;

/// Programmed position mode selector value.
const PROGRAMMED_POSITION: i64 = 21;

/// Desired state: position loop driven by the trajectory generator.
const STATE_ENABLED: i64 = 21;

/// Desired state: drive disabled.
const STATE_DISABLED: i64 = 0;

/// Travel direction of a relative move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// `+1` or `-1`.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.sign())
    }
}

/// Position readings taken together for the operator log.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    pub motor_position: Option<f64>,
    pub load_position: Option<f64>,
    pub following_error: Option<f64>,
}

/// Unit-aware driver for one Copley axis.
///
/// Owns the link for its whole lifetime; dropping the controller closes the
/// port.
pub struct MotorController<T> {
    protocol: RegisterProtocol<T>,
    scale: ScaleFactor,
    settle_delay: Duration,
}

impl MotorController<SerialTransport<Box<dyn SerialPort>>> {
    /// Open the serial port named in `config` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Connection`] if the port cannot be opened.
    pub fn open(config: &DriveConfig) -> ProtocolResult<Self> {
        let transport = SerialTransport::open(config)?;
        info!("Connected to drive on {}", config.port);
        Ok(Self::new(transport, config))
    }
}

impl<T: LineTransport> MotorController<T> {
    /// Wrap an existing transport, taking scaling and timing from `config`.
    pub fn new(transport: T, config: &DriveConfig) -> Self {
        Self {
            protocol: RegisterProtocol::new(transport),
            scale: config.scale,
            settle_delay: config.settle_delay,
        }
    }

    /// Borrow the protocol layer.
    pub fn protocol(&self) -> &RegisterProtocol<T> {
        &self.protocol
    }

    /// Delay applied after mode changes and after disabling.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    // ==================== Mode Selection ====================

    /// Select relative-move trajectory profiles.
    pub fn set_mode_relative_move(&mut self) -> ProtocolResult<()> {
        info!("Set mode relative move");
        self.protocol
            .set_register(Register::ProfileMode, PROFILE_RELATIVE_MOVE)
    }

    /// Select programmed position mode.
    pub fn set_mode_programmed_position(&mut self) -> ProtocolResult<()> {
        info!("Set mode programmed position");
        self.protocol
            .set_register(Register::ProgrammedPositionMode, PROGRAMMED_POSITION)
    }

    // ==================== Motion Profile ====================

    /// Load the distance of the next relative move.
    ///
    /// The direction sign is applied after converting `distance` to counts.
    pub fn set_relative_move(&mut self, distance: f64, direction: Direction) -> ProtocolResult<()> {
        let counts = self.scale.to_raw(distance) * direction.sign();
        self.protocol
            .set_register(Register::TrajectoryDistance, counts)
    }

    pub fn set_profile_velocity(&mut self, velocity: f64) -> ProtocolResult<()> {
        self.set_scaled(Register::ProfileVelocity, velocity)
    }

    pub fn set_profile_acceleration(&mut self, acceleration: f64) -> ProtocolResult<()> {
        self.set_scaled(Register::ProfileAcceleration, acceleration)
    }

    pub fn set_profile_deceleration(&mut self, deceleration: f64) -> ProtocolResult<()> {
        self.set_scaled(Register::ProfileDeceleration, deceleration)
    }

    fn set_scaled(&mut self, register: Register, value: f64) -> ProtocolResult<()> {
        let raw = self.scale.to_raw(value);
        self.protocol.set_register(register, raw).map_err(|e| {
            error!("Failed to set {register}: {e}");
            e
        })
    }

    /// Start the loaded move. A failure here means the move did not happen.
    pub fn trigger_trajectory(&mut self) -> ProtocolResult<()> {
        self.protocol.trigger()
    }

    // ==================== Drive State ====================

    /// Enable the output stage under trajectory control.
    pub fn enable_drive(&mut self) -> ProtocolResult<()> {
        info!("Enable drive");
        match self
            .protocol
            .set_register(Register::DesiredState, STATE_ENABLED)
        {
            Ok(()) => {
                info!("Motor enabled");
                Ok(())
            }
            Err(e) => {
                error!("Failed to enable drive: {e}");
                Err(e)
            }
        }
    }

    /// Disable the output stage, then wait for the settle delay.
    pub fn disable_drive(&mut self) -> ProtocolResult<()> {
        info!("Disabling drive");
        self.protocol
            .set_register(Register::DesiredState, STATE_DISABLED)
            .map_err(|e| {
                error!("Failed to disable drive: {e}");
                e
            })?;
        std::thread::sleep(self.settle_delay);
        Ok(())
    }

    // ==================== Telemetry ====================

    /// Motor encoder position in physical units.
    pub fn get_motor_position(&mut self) -> Option<f64> {
        let value = self.read_scaled(Register::MotorPosition, "motor position")?;
        info!("Motor position: {value:.5}");
        Some(value)
    }

    /// Load encoder position in physical units.
    pub fn get_load_position(&mut self) -> Option<f64> {
        let value = self.read_scaled(Register::LoadPosition, "load position")?;
        info!("Load position: {value:.5}");
        Some(value)
    }

    /// Following error in physical units.
    pub fn get_following_error(&mut self) -> Option<f64> {
        let value = self.read_scaled(Register::FollowingError, "following error")?;
        info!("Following error: {value:.5}");
        Some(value)
    }

    /// Raw event status register.
    pub fn get_event_register(&mut self) -> Option<i64> {
        let value: i64 = self.read_logged(Register::EventStatus, "event register")?;
        let status = EventStatus::from_raw(value);
        if status.is_faulted() {
            error!("Event register: {value:#x} ({status:?})");
        } else {
            info!("Event register: {value:#x} ({status:?})");
        }
        Some(value)
    }

    /// Raw trajectory generator status register.
    pub fn get_trajectory_status(&mut self) -> Option<i64> {
        let value: i64 = self.read_logged(Register::TrajectoryStatus, "trajectory status")?;
        info!("Trajectory status register: {value:#x}");
        Some(value)
    }

    /// Motor position, load position and following error in one pass.
    pub fn telemetry(&mut self) -> Telemetry {
        Telemetry {
            motor_position: self.get_motor_position(),
            load_position: self.get_load_position(),
            following_error: self.get_following_error(),
        }
    }

    fn read_scaled(&mut self, register: Register, name: &str) -> Option<f64> {
        let raw: f64 = self.read_logged(register, name)?;
        Some(self.scale.to_physical(raw))
    }

    fn read_logged<V: FromStr>(&mut self, register: Register, name: &str) -> Option<V> {
        match self.read(register) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Error getting {name}: {e}");
                None
            }
        }
    }

    fn read<V: FromStr>(&mut self, register: Register) -> ProtocolResult<V> {
        let value = self.protocol.get_register(register)?;
        value.parse().map_err(|_| ProtocolError::InvalidValue {
            register: register.token(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use approx::assert_relative_eq;

    fn drive(transport: ScriptedTransport) -> MotorController<ScriptedTransport> {
        let config = DriveConfig::default().with_settle_delay(Duration::ZERO);
        MotorController::new(transport, &config)
    }

    fn sent(drive: &MotorController<ScriptedTransport>) -> &[String] {
        drive.protocol().transport().sent()
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::Forward.sign(), 1);
        assert_eq!(Direction::Reverse.sign(), -1);
        assert_eq!(Direction::Forward.reversed(), Direction::Reverse);
        assert_eq!(Direction::Reverse.to_string(), "-1");
    }

    #[test]
    fn test_mode_and_state_payloads() {
        let mut d = drive(
            ScriptedTransport::new()
                .reply("ok")
                .reply("ok")
                .reply("ok")
                .reply("ok"),
        );
        d.set_mode_relative_move().unwrap();
        d.set_mode_programmed_position().unwrap();
        d.enable_drive().unwrap();
        d.disable_drive().unwrap();
        assert_eq!(
            sent(&d),
            ["s r0xC8 256", "s r0xC4 21", "s r0x24 21", "s r0x24 0"]
        );
    }

    #[test]
    fn test_profile_values_are_scaled() {
        let mut d = drive(
            ScriptedTransport::new()
                .reply("ok")
                .reply("ok")
                .reply("ok"),
        );
        d.set_profile_velocity(5.0).unwrap();
        d.set_profile_acceleration(0.5).unwrap();
        d.set_profile_deceleration(0.25).unwrap();
        assert_eq!(sent(&d), ["s r0xCB 800", "s r0xCC 80", "s r0xCD 40"]);
    }

    #[test]
    fn test_relative_move_applies_direction() {
        let mut d = drive(ScriptedTransport::new().reply("ok").reply("ok"));
        d.set_relative_move(10.0, Direction::Forward).unwrap();
        d.set_relative_move(10.0, Direction::Reverse).unwrap();
        assert_eq!(sent(&d), ["s r0xCA 1600", "s r0xCA -1600"]);
    }

    #[test]
    fn test_relative_move_rounds() {
        let mut d = drive(ScriptedTransport::new().reply("ok"));
        // 0.01 / 0.00625 = 1.6, rounds up rather than truncating
        d.set_relative_move(0.01, Direction::Reverse).unwrap();
        assert_eq!(sent(&d), ["s r0xCA -2"]);
    }

    #[test]
    fn test_set_failures_propagate() {
        let mut d = drive(ScriptedTransport::new().reply("e 3").timeout());
        assert!(matches!(
            d.enable_drive(),
            Err(ProtocolError::UnexpectedResponse { .. })
        ));
        assert!(matches!(
            d.set_profile_velocity(1.0),
            Err(ProtocolError::Timeout)
        ));
    }

    #[test]
    fn test_trigger() {
        let mut d = drive(ScriptedTransport::new().reply("ok").reply("e 1"));
        d.trigger_trajectory().unwrap();
        assert!(d.trigger_trajectory().is_err());
        assert_eq!(sent(&d), ["t 1", "t 1"]);
    }

    #[test]
    fn test_disable_failure_propagates() {
        let mut d = drive(ScriptedTransport::new().reply("e 9"));
        assert!(d.disable_drive().is_err());
    }

    #[test]
    fn test_position_reads_are_scaled() {
        let mut d = drive(
            ScriptedTransport::new()
                .reply("v 1600")
                .reply("v -320")
                .reply("v 16"),
        );
        assert_relative_eq!(d.get_motor_position().unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(d.get_load_position().unwrap(), -2.0, epsilon = 1e-9);
        assert_relative_eq!(d.get_following_error().unwrap(), 0.1, epsilon = 1e-9);
        assert_eq!(sent(&d), ["g r0x32", "g r0x17", "g r0x35"]);
    }

    #[test]
    fn test_integer_registers() {
        let mut d = drive(ScriptedTransport::new().reply("v 4096").reply("v 32768"));
        assert_eq!(d.get_event_register(), Some(4096));
        assert_eq!(d.get_trajectory_status(), Some(32768));
        assert_eq!(sent(&d), ["g r0xA0", "g r0xC9"]);
    }

    #[test]
    fn test_reads_degrade_to_none() {
        let mut d = drive(
            ScriptedTransport::new()
                .timeout()
                .reply("e 5")
                .reply("v abc")
                .reply("v 1.5")
                .reply(""),
        );
        assert_eq!(d.get_motor_position(), None);
        assert_eq!(d.get_load_position(), None);
        assert_eq!(d.get_following_error(), None);
        // Integer registers reject fractional values
        assert_eq!(d.get_event_register(), None);
        assert_eq!(d.get_trajectory_status(), None);
    }

    #[test]
    fn test_read_after_failed_read_still_works() {
        let mut d = drive(ScriptedTransport::new().timeout().reply("v 160"));
        assert_eq!(d.get_motor_position(), None);
        assert_relative_eq!(d.get_motor_position().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_telemetry_snapshot() {
        let mut d = drive(
            ScriptedTransport::new()
                .reply("v 160")
                .timeout()
                .reply("v 0"),
        );
        let t = d.telemetry();
        assert_relative_eq!(t.motor_position.unwrap(), 1.0, epsilon = 1e-9);
        assert_eq!(t.load_position, None);
        assert_eq!(t.following_error, Some(0.0));
    }
}
