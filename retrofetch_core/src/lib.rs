//! Hardware probes for early x86 PCs: memory, disks, DOS identity, equipment
//! flags, CPU class and speed, Tandy 1000 identification and the PSG sound chip.
//!
//! Every probe takes a [`Hardware`] capability, so the same detection logic
//! runs on the host ([`HostMachine`]) or against a [`ScriptedMachine`].

pub mod config;
pub mod hal;
pub mod hardware;
pub mod machine;
pub mod platform;
pub mod probe;
pub mod report;
pub mod timing;

pub use config::{load_config, parse_config, ConfigError, ProbeConfig, ProbeKind};
pub use hal::{Hardware, RegisterFrame, ServiceError};
pub use machine::ScriptedMachine;
pub use platform::HostMachine;
pub use probe::{ProbeResult, Reason};
pub use report::SystemReport;
pub use timing::{Calibration, ClockEstimate, FirmwareClock, MonotonicClock, TickSource};
