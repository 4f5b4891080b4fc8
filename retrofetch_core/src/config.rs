use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use crate::hal::PortAddressSet;
use crate::hardware::{default_sound_ports, DEFAULT_SOUND_BASE, DEFAULT_SOUND_PATTERN};
use crate::timing::Calibration;

/// Probes in the order they are collected and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProbeKind {
    Os,
    Shell,
    Floppy,
    Disk,
    BaseMemory,
    ExtendedMemory,
    Fpu,
    CpuModel,
    CpuSpeed,
    Platform,
    Sound,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 11] = [
        ProbeKind::Os,
        ProbeKind::Shell,
        ProbeKind::Floppy,
        ProbeKind::Disk,
        ProbeKind::BaseMemory,
        ProbeKind::ExtendedMemory,
        ProbeKind::Fpu,
        ProbeKind::CpuModel,
        ProbeKind::CpuSpeed,
        ProbeKind::Platform,
        ProbeKind::Sound,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name {
            "os" => ProbeKind::Os,
            "shell" => ProbeKind::Shell,
            "floppy" => ProbeKind::Floppy,
            "disk" => ProbeKind::Disk,
            "base_memory" => ProbeKind::BaseMemory,
            "extended_memory" => ProbeKind::ExtendedMemory,
            "fpu" => ProbeKind::Fpu,
            "cpu_model" => ProbeKind::CpuModel,
            "cpu_speed" => ProbeKind::CpuSpeed,
            "platform" => ProbeKind::Platform,
            "sound" => ProbeKind::Sound,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown probe '{name}' on line {line}")]
    UnknownProbe { name: String, line: usize },
    #[error("unknown token '{token}' for {probe:?} on line {line}")]
    UnknownToken { token: String, probe: ProbeKind, line: usize },
    #[error("invalid value '{value}' for '{key}' on line {line}")]
    InvalidValue { key: String, value: String, line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub skipped: BTreeSet<ProbeKind>,
    /// DOS drive number for the disk probe (0 = default drive).
    pub disk_drive: u8,
    pub calibration: Calibration,
    pub sound_ports: PortAddressSet,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            skipped: BTreeSet::new(),
            disk_drive: 0,
            calibration: Calibration::default(),
            sound_ports: default_sound_ports(),
        }
    }
}

impl ProbeConfig {
    pub fn enabled(&self, kind: ProbeKind) -> bool {
        !self.skipped.contains(&kind)
    }
}

fn parse_number<T: TryFrom<u64>>(key: &str, value: &str, line: usize) -> Result<T, ConfigError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse::<u64>().ok(),
    };
    parsed.and_then(|v| T::try_from(v).ok()).ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        line,
    })
}

pub fn parse_config(text: &str) -> Result<ProbeConfig, ConfigError> {
    let mut config = ProbeConfig::default();
    let mut sound_base = DEFAULT_SOUND_BASE;
    let mut sound_pattern = DEFAULT_SOUND_PATTERN;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        }
        .trim();

        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else { continue };
        let probe = ProbeKind::parse(name).ok_or_else(|| ConfigError::UnknownProbe {
            name: name.to_string(),
            line: line_no,
        })?;

        for token in parts {
            if token == "skip" {
                config.skipped.insert(probe);
                continue;
            }
            let unknown = || ConfigError::UnknownToken {
                token: token.to_string(),
                probe,
                line: line_no,
            };
            let (key, value) = token.split_once('=').ok_or_else(unknown)?;

            match (probe, key) {
                (ProbeKind::Disk, "drive") => {
                    config.disk_drive = parse_number(key, value, line_no)?
                }
                (ProbeKind::CpuSpeed, "ticks") => {
                    config.calibration.threshold_ticks = parse_number(key, value, line_no)?
                }
                (ProbeKind::CpuSpeed, "cycles") => {
                    config.calibration.cycles_per_iteration = parse_number(key, value, line_no)?
                }
                (ProbeKind::CpuSpeed, "limit") => {
                    config.calibration.iteration_limit = parse_number(key, value, line_no)?
                }
                (ProbeKind::Sound, "base") => sound_base = parse_number(key, value, line_no)?,
                (ProbeKind::Sound, "pattern") => sound_pattern = parse_number(key, value, line_no)?,
                _ => return Err(unknown()),
            }
        }
    }

    let name = config.sound_ports.name;
    config.sound_ports = PortAddressSet::consecutive(name, sound_base, 4, sound_pattern);
    Ok(config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<ProbeConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}
