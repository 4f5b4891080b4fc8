use std::fmt;

use log::{debug, info};

use crate::config::{ProbeConfig, ProbeKind};
use crate::hal::Hardware;
use crate::hardware::{
    base_memory, cpu_class, disk_usage, extended_memory, floppy_drives, fpu_present, os_identity,
    platform_identity, sound_chip, CpuClass, DiskUsage, OsIdentity, PlatformIdentity,
};
use crate::probe::{ProbeResult, Reason};
use crate::timing::{cpu_speed, ClockEstimate, FirmwareClock, TickSource};

/// Results of one pass over every enabled probe. `None` marks a probe skipped
/// by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemReport {
    pub os: Option<ProbeResult<OsIdentity>>,
    pub shell: Option<Option<String>>,
    pub floppy_drives: Option<ProbeResult<u8>>,
    pub disk: Option<ProbeResult<DiskUsage>>,
    pub base_memory_kb: Option<ProbeResult<u16>>,
    pub extended_memory_kb: Option<ProbeResult<u32>>,
    pub fpu: Option<ProbeResult<bool>>,
    pub cpu_model: Option<ProbeResult<CpuClass>>,
    pub cpu_speed: Option<ProbeResult<ClockEstimate>>,
    pub platform: Option<ProbeResult<PlatformIdentity>>,
    pub sound: Option<ProbeResult<&'static str>>,
}

fn shell_from_env() -> Option<String> {
    std::env::var("COMSPEC").or_else(|_| std::env::var("SHELL")).ok()
}

impl SystemReport {
    /// Run the enabled probes in display order. The CPU speed probe uses
    /// `clock` if given, otherwise the firmware tick counter of `hw`.
    pub fn collect<H: Hardware + ?Sized>(
        hw: &mut H,
        mut clock: Option<&mut dyn TickSource>,
        config: &ProbeConfig,
    ) -> Self {
        info!("collecting system report");
        let mut report = SystemReport::default();

        for kind in ProbeKind::ALL {
            if !config.enabled(kind) {
                debug!("{:?}: skipped", kind);
                continue;
            }
            match kind {
                ProbeKind::Os => report.os = Some(os_identity(hw)),
                ProbeKind::Shell => report.shell = Some(shell_from_env()),
                ProbeKind::Floppy => report.floppy_drives = Some(floppy_drives(hw)),
                ProbeKind::Disk => report.disk = Some(disk_usage(hw, config.disk_drive)),
                ProbeKind::BaseMemory => report.base_memory_kb = Some(base_memory(hw)),
                ProbeKind::ExtendedMemory => report.extended_memory_kb = Some(extended_memory(hw)),
                ProbeKind::Fpu => report.fpu = Some(fpu_present(hw)),
                ProbeKind::CpuModel => report.cpu_model = Some(cpu_class(hw)),
                ProbeKind::CpuSpeed => {
                    report.cpu_speed = Some(match clock.as_deref_mut() {
                        Some(c) => cpu_speed(c, &config.calibration),
                        None => cpu_speed(&mut FirmwareClock::new(&mut *hw), &config.calibration),
                    })
                }
                ProbeKind::Platform => report.platform = Some(platform_identity(hw)),
                ProbeKind::Sound => report.sound = Some(sound_chip(hw, &config.sound_ports)),
            }
        }

        report
    }
}

fn write_line<T>(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    result: &Option<ProbeResult<T>>,
    absent: &str,
    value: impl FnOnce(&T) -> String,
) -> fmt::Result {
    let text = match result {
        None => return Ok(()),
        Some(ProbeResult::Value(v)) => value(v),
        Some(ProbeResult::NotPresent) => absent.to_string(),
        Some(ProbeResult::Indeterminate(reason)) => format!("unknown ({})", reason),
    };
    writeln!(f, "{:<22}{}", format!("{}:", label), text)
}

impl fmt::Display for SystemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(f, "OS", &self.os, "none", |os| os.to_string())?;
        if let Some(shell) = &self.shell {
            writeln!(f, "{:<22}{}", "Shell:", shell.as_deref().unwrap_or("unknown"))?;
        }
        write_line(f, "Floppy drives", &self.floppy_drives, "0", |n| n.to_string())?;
        match &self.disk {
            Some(ProbeResult::Indeterminate(Reason::Sentinel { .. })) => {
                writeln!(f, "{:<22}{}", "Disk:", "Error reading disk")?
            }
            other => write_line(f, "Disk", other, "none", |d| d.to_string())?,
        }
        write_line(f, "Base Memory", &self.base_memory_kb, "none", |kb| format!("{} KB", kb))?;
        write_line(f, "Ext. Memory", &self.extended_memory_kb, "none", |kb| {
            format!("{} KB", kb)
        })?;
        write_line(f, "Floating Point Unit", &self.fpu, "no", |&yes| {
            (if yes { "YES" } else { "no" }).to_string()
        })?;
        write_line(f, "CPU", &self.cpu_model, "unknown", |c| c.label().to_string())?;
        write_line(f, "CPU Speed", &self.cpu_speed, "unknown", |est| {
            format!("{} (estimate)", est)
        })?;
        write_line(f, "Computer Type", &self.platform, "unknown", |p| p.to_string())?;
        write_line(f, "Sound Chip", &self.sound, "not detected", |name| name.to_string())?;
        Ok(())
    }
}
