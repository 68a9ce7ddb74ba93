//! Event status register (0xA0) decoding.

use bitflags::bitflags;

bitflags! {
    /// Latched drive events reported by register 0xA0.
    ///
    /// Read for diagnostics only; nothing in the motion sequence gates on
    /// these bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventStatus: u32 {
        const SHORT_CIRCUIT = 1 << 0;
        const DRIVE_OVER_TEMPERATURE = 1 << 1;
        const OVER_VOLTAGE = 1 << 2;
        const UNDER_VOLTAGE = 1 << 3;
        const MOTOR_OVER_TEMPERATURE = 1 << 4;
        const ENCODER_POWER_ERROR = 1 << 5;
        const PHASING_ERROR = 1 << 6;
        const CURRENT_LIMITED = 1 << 7;
        const VOLTAGE_LIMITED = 1 << 8;
        const POSITIVE_LIMIT_SWITCH = 1 << 9;
        const NEGATIVE_LIMIT_SWITCH = 1 << 10;
        const ENABLE_INPUT_INACTIVE = 1 << 11;
        const SOFTWARE_DISABLED = 1 << 12;
        const STOPPING = 1 << 13;
        const BRAKE_ACTIVE = 1 << 14;
        const PWM_DISABLED = 1 << 15;
        const POSITIVE_SOFTWARE_LIMIT = 1 << 16;
        const NEGATIVE_SOFTWARE_LIMIT = 1 << 17;
        const TRACKING_ERROR = 1 << 18;
        const TRACKING_WARNING = 1 << 19;
        const IN_RESET = 1 << 20;
        const POSITION_WRAPPED = 1 << 21;
        const DRIVE_FAULT = 1 << 22;
        const VELOCITY_LIMITED = 1 << 23;
        const ACCELERATION_LIMITED = 1 << 24;
        const OUTSIDE_TRACKING_WINDOW = 1 << 25;
        const HOME_SWITCH = 1 << 26;
        const IN_MOTION = 1 << 27;
        const OUTSIDE_VELOCITY_WINDOW = 1 << 28;
        const PHASE_NOT_INITIALIZED = 1 << 29;
        const COMMAND_FAULT = 1 << 30;
    }
}

impl EventStatus {
    /// Decode a raw register value. Unknown bits are kept.
    pub fn from_raw(raw: i64) -> Self {
        Self::from_bits_retain(raw as u32)
    }

    /// Any of the bits that keep the drive from producing torque.
    pub fn is_faulted(self) -> bool {
        self.intersects(
            Self::SHORT_CIRCUIT
                | Self::DRIVE_OVER_TEMPERATURE
                | Self::OVER_VOLTAGE
                | Self::UNDER_VOLTAGE
                | Self::MOTOR_OVER_TEMPERATURE
                | Self::ENCODER_POWER_ERROR
                | Self::PHASING_ERROR
                | Self::TRACKING_ERROR
                | Self::DRIVE_FAULT
                | Self::COMMAND_FAULT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bits() {
        let status = EventStatus::from_raw((1 << 12) | (1 << 27));
        assert!(status.contains(EventStatus::SOFTWARE_DISABLED));
        assert!(status.contains(EventStatus::IN_MOTION));
        assert!(!status.is_faulted());
    }

    #[test]
    fn test_fault_bits() {
        assert!(EventStatus::from_raw(1 << 3).is_faulted());
        assert!(EventStatus::from_raw(1 << 22).is_faulted());
        assert!(!EventStatus::from_raw(0).is_faulted());
    }

    #[test]
    fn test_unknown_bits_retained() {
        let status = EventStatus::from_raw(1 << 31);
        assert_eq!(status.bits(), 1 << 31);
        assert!(!status.is_faulted());
    }
}
