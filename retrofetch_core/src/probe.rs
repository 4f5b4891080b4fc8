use std::fmt;

use crate::hal::ServiceError;

/// Outcome of a single probe. Every probe returns one of these under all
/// inputs; firmware errors are folded into `Indeterminate` at the probe
/// boundary and never propagate further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult<T> {
    Value(T),
    /// Hardware or feature confirmed absent.
    NotPresent,
    /// The question could not be answered.
    Indeterminate(Reason),
}

impl<T> ProbeResult<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            ProbeResult::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<ServiceError> for ProbeResult<T> {
    fn from(err: ServiceError) -> Self {
        ProbeResult::Indeterminate(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Firmware refused or does not implement the service.
    Declined { service: u8, status: u8 },
    /// The service returned its reserved error value (for 21h/36h: drive
    /// invalid or not ready).
    Sentinel { service: u8, value: u16 },
    /// The tick source never reached the calibration threshold.
    ClockStalled,
    /// Calibration finished with zero elapsed ticks.
    NoElapsedTime,
    /// Probe disabled by configuration or backend policy.
    Suppressed,
    /// The backend cannot read physical memory.
    MemoryUnavailable,
}

impl From<ServiceError> for Reason {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Declined { service, status } => Reason::Declined { service, status },
            ServiceError::Sentinel { service, value } => Reason::Sentinel { service, value },
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Declined { service, .. } => write!(f, "unsupported (service {:#04x})", service),
            Reason::Sentinel { service, value } => {
                write!(f, "error {:#06x} from service {:#04x}", value, service)
            }
            Reason::ClockStalled => write!(f, "clock stalled"),
            Reason::NoElapsedTime => write!(f, "no elapsed time"),
            Reason::Suppressed => write!(f, "suppressed"),
            Reason::MemoryUnavailable => write!(f, "physical memory not readable"),
        }
    }
}
