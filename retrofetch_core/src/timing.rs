// CPU clock estimate by busy-wait calibration against the BIOS tick counter.
//
// The result is an estimate: it depends on what else the machine does while the
// loop spins, and on how many cycles one loop iteration really costs.

use std::fmt;
use std::time::Instant;

use log::{debug, info, trace};

use crate::hal::{Hardware, RegisterFrame, ServiceError};
use crate::probe::{ProbeResult, Reason};

/// BIOS time-of-day service (read tick count: AH=0, CX:DX = ticks since midnight).
pub const CLOCK_SERVICE: u8 = 0x1A;

/// 8253/8254 PIT input clock.
pub const PIT_HZ: u64 = 1_193_182;
/// PIT counter 0 reload value used by the BIOS; one tick every 65536 PIT clocks (~18.2065 Hz).
pub const TICK_DIVISOR: u64 = 65_536;

/// Source of a monotonically increasing tick count.
pub trait TickSource {
    fn ticks(&mut self) -> Result<u32, ServiceError>;
}

/// Tick counter read through firmware service 1Ah.
///
/// The count is recombined from two 16-bit halves with no latch between them,
/// so a read that straddles a low-word rollover can be off by 0x10000. Elapsed
/// time is taken with wrapping arithmetic and the occasional skewed sample is
/// accepted as a property of the tick source.
pub struct FirmwareClock<H> {
    hw: H,
}

impl<H: Hardware> FirmwareClock<H> {
    pub fn new(hw: H) -> Self {
        Self { hw }
    }
}

impl<H: Hardware> TickSource for FirmwareClock<H> {
    fn ticks(&mut self) -> Result<u32, ServiceError> {
        // Polled once per calibration iteration, so this skips the frame dump in
        // `call_service` and checks CF itself.
        let out = self.hw.firmware_call(CLOCK_SERVICE, RegisterFrame::with_ah(0x00));
        trace!("tick counter cx={:#06x} dx={:#06x}", out.cx, out.dx);
        if out.carry() {
            return Err(ServiceError::Declined { service: CLOCK_SERVICE, status: out.ah() });
        }
        Ok(((out.cx as u32) << 16) | out.dx as u32)
    }
}

/// Synthesised 18.2 Hz ticks from the host's monotonic clock, for backends that
/// cannot reach the firmware tick counter.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for MonotonicClock {
    fn ticks(&mut self) -> Result<u32, ServiceError> {
        let nanos = self.origin.elapsed().as_nanos();
        Ok((nanos * PIT_HZ as u128 / (TICK_DIVISOR as u128 * 1_000_000_000)) as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Ticks to spin for; 18 is roughly one second.
    pub threshold_ticks: u32,
    /// Assumed CPU cycles spent per loop iteration.
    pub cycles_per_iteration: u32,
    /// Give up after this many iterations if the clock never reaches the threshold.
    pub iteration_limit: u64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            threshold_ticks: 18,
            cycles_per_iteration: 40,
            iteration_limit: 1 << 28,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEstimate {
    pub iterations: u64,
    pub elapsed_ticks: u32,
    /// Estimated clock rate in kHz.
    pub khz: u32,
}

impl fmt::Display for ClockEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} MHz", self.khz / 1000, (self.khz % 1000) / 10)
    }
}

#[inline]
fn elapsed(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Spin until `threshold_ticks` have elapsed on `clock`, then derive the clock
/// rate as iterations per tick scaled by the cycle cost of one iteration.
pub fn cpu_speed<T: TickSource + ?Sized>(
    clock: &mut T,
    calibration: &Calibration,
) -> ProbeResult<ClockEstimate> {
    // A zero threshold would let the loop exit before any tick elapsed.
    let threshold = calibration.threshold_ticks.max(1);

    let start = match clock.ticks() {
        Ok(t) => t,
        Err(e) => return e.into(),
    };

    let mut now = start;
    let mut iterations = 0u64;
    while elapsed(start, now) < threshold {
        iterations += 1;
        if iterations > calibration.iteration_limit {
            debug!("tick counter stuck at {:#010x} after {} iterations", now, iterations);
            return ProbeResult::Indeterminate(Reason::ClockStalled);
        }
        now = match clock.ticks() {
            Ok(t) => t,
            Err(e) => return e.into(),
        };
    }

    let elapsed_ticks = elapsed(start, now);
    if elapsed_ticks == 0 {
        return ProbeResult::Indeterminate(Reason::NoElapsedTime);
    }

    let hz = iterations as u128 * calibration.cycles_per_iteration as u128 * PIT_HZ as u128
        / (elapsed_ticks as u128 * TICK_DIVISOR as u128);
    let khz = u32::try_from(hz / 1000).unwrap_or(u32::MAX);
    let estimate = ClockEstimate { iterations, elapsed_ticks, khz };

    info!("calibration: {} iterations over {} ticks, ~{}", iterations, elapsed_ticks, estimate);

    ProbeResult::Value(estimate)
}
