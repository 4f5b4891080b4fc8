// Detection routines. Each one asks the machine a single question through the
// `Hardware` capability and folds every firmware-level failure into a
// `ProbeResult`; none of them can fail outright.

use std::fmt;

use log::debug;

use crate::hal::{
    call_service, call_service_checked, FarPointer, FarPointerProbe, Hardware, PortAddressSet,
    RegisterFrame, ServiceError,
};
use crate::probe::{ProbeResult, Reason};

pub const EQUIPMENT_SERVICE: u8 = 0x11;
pub const MEMORY_SIZE_SERVICE: u8 = 0x12;
pub const SYSTEM_SERVICE: u8 = 0x15;
pub const DOS_SERVICE: u8 = 0x21;

const FN_EXTENDED_SIZE: u8 = 0x88;
const FN_EXTENDED_SIZE_E801: u16 = 0xE801;
const FN_SYSTEM_CONFIG: u8 = 0xC0;
const FN_DOS_VERSION: u16 = 0x3000;
const FN_TRUE_VERSION: u16 = 0x3306;
const FN_DISK_FREE: u8 = 0x36;

// CMOS bytes holding extended memory size (KB) as recorded at POST
const CMOS_EXT_MEM_LOW: u8 = 0x17;
const CMOS_EXT_MEM_HIGH: u8 = 0x18;

const DISK_FREE_INVALID_DRIVE: u16 = 0xFFFF;

const EQUIP_FLOPPY_PRESENT: u8 = 0x01;
const EQUIP_FPU_PRESENT: u8 = 0x02;

/// ROM model byte: 0xFF on PC-family machines.
pub const PC_MODEL_MARKER: FarPointerProbe = FarPointerProbe::new(0xFFFF, 0x000E, 0xFF);
/// Byte at the start of the Tandy 1000 ROM.
pub const TANDY_MARKER: FarPointerProbe = FarPointerProbe::new(0xFC00, 0x0000, 0x21);
/// Model byte in the system configuration table identifying the 1000 SL/TL.
const SL_TL_MODEL: u8 = 0xFF;

pub const DEFAULT_SOUND_BASE: u16 = 0xC0;
pub const DEFAULT_SOUND_PATTERN: u8 = 0xAA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsVendor {
    IbmDos,
    DrDos,
    FreeDos,
    MsDos,
    Unknown(u8),
}

impl OsVendor {
    pub fn from_oem(code: u8) -> Self {
        match code {
            0x00 => OsVendor::IbmDos,
            0xEE => OsVendor::DrDos,
            0xFD => OsVendor::FreeDos,
            0xFF => OsVendor::MsDos,
            other => OsVendor::Unknown(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OsVendor::IbmDos => "IBM DOS",
            OsVendor::DrDos => "DR DOS",
            OsVendor::FreeDos => "FreeDOS",
            OsVendor::MsDos => "MS DOS",
            OsVendor::Unknown(_) => "Unknown DOS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsIdentity {
    pub vendor: OsVendor,
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for OsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.vendor.label(), self.major, self.minor)
    }
}

/// OEM vendor from 21h/3000h, version from 21h/3306h. DOS before 5.0 has no
/// 3306h and returns AL=FFh, in which case the 3000h version is used.
pub fn os_identity<H: Hardware + ?Sized>(hw: &mut H) -> ProbeResult<OsIdentity> {
    let basic = match call_service(hw, DOS_SERVICE, RegisterFrame::with_ax(FN_DOS_VERSION)) {
        Ok(out) => out,
        Err(e) => return e.into(),
    };
    let vendor = OsVendor::from_oem(basic.bh());

    let true_version = call_service(hw, DOS_SERVICE, RegisterFrame::with_ax(FN_TRUE_VERSION));
    let (major, minor) = match true_version {
        Ok(out) if out.al() != 0xFF => (out.bl(), out.bh()),
        _ => {
            debug!("true version unavailable, using reported version");
            (basic.al(), basic.ah())
        }
    };

    ProbeResult::Value(OsIdentity { vendor, major, minor })
}

/// Conventional memory in KB (service 12h, AX).
pub fn base_memory<H: Hardware + ?Sized>(hw: &mut H) -> ProbeResult<u16> {
    match call_service(hw, MEMORY_SIZE_SERVICE, RegisterFrame::default()) {
        Ok(out) => ProbeResult::Value(out.ax),
        Err(e) => e.into(),
    }
}

/// Extended memory in KB.
///
/// 1. 15h/88h declined: report none. On PC/XT-class BIOSes that lack the
///    function this is a false negative, and it is left that way.
/// 2. 15h/E801h: CX = KB between 1 MB and 16 MB, DX = 64 KB blocks above 16 MB.
/// 3. E801h declined: CMOS 17h/18h, low and high byte of the KB count.
pub fn extended_memory<H: Hardware + ?Sized>(hw: &mut H) -> ProbeResult<u32> {
    if let Err(e) = call_service(hw, SYSTEM_SERVICE, RegisterFrame::with_ah(FN_EXTENDED_SIZE)) {
        debug!("extended memory: {}, reporting none", e);
        return ProbeResult::NotPresent;
    }

    match call_service(hw, SYSTEM_SERVICE, RegisterFrame::with_ax(FN_EXTENDED_SIZE_E801)) {
        Ok(out) => {
            debug!("extended memory from E801: cx={} dx={}", out.cx, out.dx);
            ProbeResult::Value(out.cx as u32 + 64 * out.dx as u32)
        }
        Err(_) => {
            let low = hw.indexed_register_read(CMOS_EXT_MEM_LOW) as u32;
            let high = hw.indexed_register_read(CMOS_EXT_MEM_HIGH) as u32;
            debug!("extended memory from CMOS: low={:#04x} high={:#04x}", low, high);
            ProbeResult::Value(low + 256 * high)
        }
    }
}

/// Raw geometry returned by 21h/36h.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub sectors_per_cluster: u16,
    pub bytes_per_sector: u16,
    pub free_clusters: u16,
    pub total_clusters: u16,
}

impl DiskUsage {
    pub fn cluster_bytes(&self) -> u64 {
        self.sectors_per_cluster as u64 * self.bytes_per_sector as u64
    }

    pub fn free_bytes(&self) -> u64 {
        self.cluster_bytes() * self.free_clusters as u64
    }

    pub fn total_bytes(&self) -> u64 {
        self.cluster_bytes() * self.total_clusters as u64
    }

    pub fn used_kb(&self) -> u64 {
        self.total_bytes().saturating_sub(self.free_bytes()) / 1024
    }

    pub fn total_kb(&self) -> u64 {
        self.total_bytes() / 1024
    }

    /// `None` for a drive reporting zero capacity.
    pub fn free_percent(&self) -> Option<u8> {
        let total = self.total_bytes();
        if total == 0 {
            return None;
        }
        Some((self.free_bytes() * 100 / total).min(100) as u8)
    }
}

impl fmt::Display for DiskUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} KB", self.used_kb(), self.total_kb())?;
        match self.free_percent() {
            Some(p) => write!(f, " ({}% free)", p),
            None => write!(f, " (n/a)"),
        }
    }
}

/// Free/total space on DOS drive `drive` (0 = default, 1 = A:, ...). AX=FFFFh
/// means the drive is invalid or not ready; nothing else in the frame is valid
/// then, and the result is `Indeterminate(Sentinel)`.
pub fn disk_usage<H: Hardware + ?Sized>(hw: &mut H, drive: u8) -> ProbeResult<DiskUsage> {
    let mut input = RegisterFrame::with_ah(FN_DISK_FREE);
    input.set_dl(drive);

    match call_service_checked(hw, DOS_SERVICE, input, DISK_FREE_INVALID_DRIVE) {
        Ok(out) => ProbeResult::Value(DiskUsage {
            sectors_per_cluster: out.ax,
            free_clusters: out.bx,
            bytes_per_sector: out.cx,
            total_clusters: out.dx,
        }),
        Err(e) => e.into(),
    }
}

fn equipment<H: Hardware + ?Sized>(hw: &mut H) -> Result<RegisterFrame, ServiceError> {
    call_service(hw, EQUIPMENT_SERVICE, RegisterFrame::with_ah(0x00))
}

/// Bit 0 set means at least one drive; bits 6-7 then hold count - 1.
pub fn decode_floppy_count(equipment: u8) -> u8 {
    if equipment & EQUIP_FLOPPY_PRESENT == 0 {
        0
    } else {
        (equipment >> 6) + 1
    }
}

pub fn floppy_drives<H: Hardware + ?Sized>(hw: &mut H) -> ProbeResult<u8> {
    match equipment(hw) {
        Ok(out) => ProbeResult::Value(decode_floppy_count(out.al())),
        Err(e) => e.into(),
    }
}

pub fn fpu_present<H: Hardware + ?Sized>(hw: &mut H) -> ProbeResult<bool> {
    match equipment(hw) {
        Ok(out) => ProbeResult::Value(out.al() & EQUIP_FPU_PRESENT != 0),
        Err(e) => e.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuClass {
    I8088,
    I8086,
    NecV20,
    NecV30,
    I80188,
    I80186,
    I80286,
    Unknown(u8),
}

impl CpuClass {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => CpuClass::I8088,
            1 => CpuClass::I8086,
            2 => CpuClass::NecV20,
            3 => CpuClass::NecV30,
            4 => CpuClass::I80188,
            5 => CpuClass::I80186,
            6 => CpuClass::I80286,
            other => CpuClass::Unknown(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CpuClass::I8088 => "Intel 8088",
            CpuClass::I8086 => "Intel 8086",
            CpuClass::NecV20 => "NEC V20",
            CpuClass::NecV30 => "NEC V30",
            CpuClass::I80188 => "Intel 80188",
            CpuClass::I80186 => "Intel 80186",
            CpuClass::I80286 => "Intel 80286",
            CpuClass::Unknown(_) => "unknown",
        }
    }
}

/// Processor class code from the equipment call (AH=0), returned in CL.
pub fn cpu_class<H: Hardware + ?Sized>(hw: &mut H) -> ProbeResult<CpuClass> {
    match equipment(hw) {
        Ok(out) => ProbeResult::Value(CpuClass::from_code(out.cl())),
        Err(e) => e.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformIdentity {
    NotPcCompatible,
    NotTandy1000,
    Tandy1000,
    Tandy1000SlTl,
}

impl fmt::Display for PlatformIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlatformIdentity::NotPcCompatible => "Not an IBM PC compatible",
            PlatformIdentity::NotTandy1000 => "Not a Tandy 1000 series",
            PlatformIdentity::Tandy1000 => "Tandy 1000 series",
            PlatformIdentity::Tandy1000SlTl => "Tandy 1000 SL/TL",
        };
        f.write_str(s)
    }
}

/// Each stage gates the next; a failed stage is itself the answer. Without
/// readable physical memory the markers would all read as open bus, so no
/// stage runs.
pub fn platform_identity<H: Hardware + ?Sized>(hw: &mut H) -> ProbeResult<PlatformIdentity> {
    if !hw.physical_reads_available() {
        debug!("platform: physical memory not readable");
        return ProbeResult::Indeterminate(Reason::MemoryUnavailable);
    }
    if !PC_MODEL_MARKER.matches(hw) {
        return ProbeResult::Value(PlatformIdentity::NotPcCompatible);
    }
    if !TANDY_MARKER.matches(hw) {
        return ProbeResult::Value(PlatformIdentity::NotTandy1000);
    }

    match call_service(hw, SYSTEM_SERVICE, RegisterFrame::with_ah(FN_SYSTEM_CONFIG)) {
        Ok(out) => {
            // ES:BX -> table; byte 2 is the model
            let model_at = FarPointer::new(out.es, out.bx).displaced(2);
            let model = hw.read_physical(model_at.linear());
            debug!(
                "system config model byte at {:04X}:{:04X} = {:#04x}",
                model_at.segment, model_at.offset, model
            );
            if model == SL_TL_MODEL {
                return ProbeResult::Value(PlatformIdentity::Tandy1000SlTl);
            }
        }
        Err(e) => debug!("system configuration table: {}", e),
    }

    ProbeResult::Value(PlatformIdentity::Tandy1000)
}

pub fn default_sound_ports() -> PortAddressSet {
    PortAddressSet::consecutive("Tandy PSG", DEFAULT_SOUND_BASE, 4, DEFAULT_SOUND_PATTERN)
}

/// Write the pattern to every port, then read each back. Any mismatch means the
/// chip is absent. The writes reach the device under test.
pub fn sound_chip<H: Hardware + ?Sized>(
    hw: &mut H,
    ports: &PortAddressSet,
) -> ProbeResult<&'static str> {
    if ports.ports.is_empty() {
        return ProbeResult::NotPresent;
    }
    if !hw.port_writes_allowed() {
        debug!("{}: port writes suppressed by backend", ports.name);
        return ProbeResult::Indeterminate(Reason::Suppressed);
    }

    for &port in &ports.ports {
        hw.port_write(port, ports.pattern);
    }
    for &port in &ports.ports {
        let got = hw.port_read(port);
        if got != ports.pattern {
            debug!(
                "{}: port {:#06x} read back {:#04x}, wrote {:#04x}",
                ports.name, port, got, ports.pattern
            );
            return ProbeResult::NotPresent;
        }
    }

    ProbeResult::Value(ports.name)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::hal::STATUS_UNSUPPORTED;
    use crate::machine::{Reply, ScriptedMachine};

    fn declined() -> Reply {
        Reply::Decline(STATUS_UNSUPPORTED)
    }

    #[test]
    fn os_vendor_mapping() {
        let cases = [
            (0x00, OsVendor::IbmDos, "IBM DOS"),
            (0xEE, OsVendor::DrDos, "DR DOS"),
            (0xFD, OsVendor::FreeDos, "FreeDOS"),
            (0xFF, OsVendor::MsDos, "MS DOS"),
            (0x42, OsVendor::Unknown(0x42), "Unknown DOS"),
        ];
        for (code, vendor, label) in cases {
            assert_eq!(OsVendor::from_oem(code), vendor);
            assert_eq!(vendor.label(), label);
        }
    }

    #[test]
    fn os_uses_true_version_when_available() {
        let mut m = ScriptedMachine::new()
            .reply(DOS_SERVICE, Some(0x30), Reply::regs(0x0005, 0xFD00, 0, 0))
            .reply(DOS_SERVICE, Some(0x33), Reply::regs(0x3306, 0x0007, 0, 0));
        let os = os_identity(&mut m).value().copied().unwrap();
        assert_eq!(os, OsIdentity { vendor: OsVendor::FreeDos, major: 7, minor: 0 });
        assert_eq!(os.to_string(), "FreeDOS 7.0");
    }

    #[test]
    fn os_falls_back_to_reported_version() {
        let mut m = ScriptedMachine::new()
            .reply(DOS_SERVICE, Some(0x30), Reply::regs(0x1E03, 0x4200, 0, 0))
            .reply(DOS_SERVICE, Some(0x33), Reply::ax(0x33FF));
        let os = os_identity(&mut m).value().copied().unwrap();
        assert_eq!(os, OsIdentity { vendor: OsVendor::Unknown(0x42), major: 3, minor: 30 });
        assert_eq!(os.to_string(), "Unknown DOS 3.30");
    }

    #[test]
    fn os_declined_is_indeterminate() {
        let mut m = ScriptedMachine::new();
        assert!(matches!(
            os_identity(&mut m),
            ProbeResult::Indeterminate(Reason::Declined { service: DOS_SERVICE, .. })
        ));
    }

    #[test]
    fn base_memory_is_authoritative() {
        let mut m = ScriptedMachine::new().reply(MEMORY_SIZE_SERVICE, None, Reply::ax(0x0280));
        assert_eq!(base_memory(&mut m), ProbeResult::Value(640));
    }

    #[test]
    fn extended_none_when_first_call_fails() {
        // later tiers would both answer; they must not be consulted
        let mut m = ScriptedMachine::new()
            .reply(SYSTEM_SERVICE, Some(0x88), declined())
            .reply(SYSTEM_SERVICE, Some(0xE8), Reply::regs(0, 0, 15360, 100))
            .cmos(0x17, 0x12)
            .cmos(0x18, 0x34);
        assert_eq!(extended_memory(&mut m), ProbeResult::NotPresent);
        assert_eq!(m.calls().len(), 1);
        assert!(m.port_writes().is_empty());
    }

    #[test]
    fn extended_e801_combines_scales() {
        let mut m = ScriptedMachine::new()
            .reply(SYSTEM_SERVICE, Some(0x88), Reply::ax(0xFC00))
            .reply(SYSTEM_SERVICE, Some(0xE8), Reply::regs(0x3C00, 0x0100, 0x3C00, 0x0100));
        assert_eq!(extended_memory(&mut m), ProbeResult::Value(15360 + 64 * 256));
        assert!(m.port_writes().is_empty());
    }

    #[test]
    fn cmos_fallback_reads_17_then_18() {
        let mut m = ScriptedMachine::new()
            .reply(SYSTEM_SERVICE, Some(0x88), Reply::ax(0x3C00))
            .cmos(0x17, 0x00)
            .cmos(0x18, 0x3C);
        assert_eq!(extended_memory(&mut m), ProbeResult::Value(15360));
        assert_eq!(m.port_writes(), &[(0x70, 0x17), (0x70, 0x18)]);
    }

    proptest! {
        #[test]
        fn cmos_fallback_for_any_register_pair(low in any::<u8>(), high in any::<u8>()) {
            let mut m = ScriptedMachine::new()
                .reply(SYSTEM_SERVICE, Some(0x88), Reply::ax(0))
                .reply(SYSTEM_SERVICE, Some(0xE8), declined())
                .cmos(0x17, low)
                .cmos(0x18, high);
            let expected = low as u32 + 256 * high as u32;
            prop_assert_eq!(extended_memory(&mut m), ProbeResult::Value(expected));
        }

        #[test]
        fn e801_for_any_pair(cx in any::<u16>(), dx in any::<u16>()) {
            let mut m = ScriptedMachine::new()
                .reply(SYSTEM_SERVICE, Some(0x88), Reply::ax(0))
                .reply(SYSTEM_SERVICE, Some(0xE8), Reply::regs(0, 0, cx, dx));
            let expected = cx as u32 + 64 * dx as u32;
            prop_assert_eq!(extended_memory(&mut m), ProbeResult::Value(expected));
        }
    }

    #[test]
    fn disk_usage_products() {
        let mut m =
            ScriptedMachine::new().reply(DOS_SERVICE, Some(0x36), Reply::regs(4, 2000, 512, 10405));
        let disk = disk_usage(&mut m, 3).value().copied().unwrap();
        assert_eq!(disk.free_bytes(), 4 * 512 * 2000);
        assert_eq!(disk.total_bytes(), 4 * 512 * 10405);
        assert_eq!(disk.used_kb(), (4 * 512 * (10405 - 2000)) / 1024);
        assert_eq!(disk.free_percent(), Some(19));
        assert_eq!(disk.to_string(), "16810/20810 KB (19% free)");
        assert_eq!(m.calls()[0].1.dx & 0xFF, 3);
    }

    #[test]
    fn disk_sentinel_short_circuits() {
        // every other register zero: any division on them would fault
        let mut m =
            ScriptedMachine::new().reply(DOS_SERVICE, Some(0x36), Reply::regs(0xFFFF, 0, 0, 0));
        assert_eq!(
            disk_usage(&mut m, 0),
            ProbeResult::Indeterminate(Reason::Sentinel { service: DOS_SERVICE, value: 0xFFFF })
        );
    }

    #[test]
    fn disk_zero_capacity_has_no_percentage() {
        let mut m =
            ScriptedMachine::new().reply(DOS_SERVICE, Some(0x36), Reply::regs(1, 0, 512, 0));
        let disk = disk_usage(&mut m, 0).value().copied().unwrap();
        assert_eq!(disk.free_percent(), None);
        assert_eq!(disk.to_string(), "0/0 KB (n/a)");
    }

    #[test]
    fn floppy_decoding() {
        assert_eq!(decode_floppy_count(0x00), 0);
        assert_eq!(decode_floppy_count(0x01), 1);
        assert_eq!(decode_floppy_count(0x41), 2);
        assert_eq!(decode_floppy_count(0x81), 3);
        assert_eq!(decode_floppy_count(0xC1), 4);
        // count bits are meaningless without bit 0
        assert_eq!(decode_floppy_count(0xC0), 0);
    }

    #[test]
    fn equipment_probes_share_one_call_shape() {
        let equipment = Reply::regs(0x0043, 0, 0x0006, 0);
        let mut m = ScriptedMachine::new().reply(EQUIPMENT_SERVICE, None, equipment);
        assert_eq!(floppy_drives(&mut m), ProbeResult::Value(2));
        assert_eq!(fpu_present(&mut m), ProbeResult::Value(true));
        assert_eq!(cpu_class(&mut m), ProbeResult::Value(CpuClass::I80286));

        let mut m = ScriptedMachine::new().reply(EQUIPMENT_SERVICE, None, Reply::ax(0x0061));
        assert_eq!(fpu_present(&mut m), ProbeResult::Value(false));
    }

    #[test]
    fn cpu_class_codes() {
        let labels: Vec<_> = (0u8..=6).map(|c| CpuClass::from_code(c).label()).collect();
        assert_eq!(
            labels,
            [
                "Intel 8088",
                "Intel 8086",
                "NEC V20",
                "NEC V30",
                "Intel 80188",
                "Intel 80186",
                "Intel 80286"
            ]
        );
        for code in [7u8, 8, 0x80, 0xFF] {
            assert_eq!(CpuClass::from_code(code), CpuClass::Unknown(code));
            assert_eq!(CpuClass::from_code(code).label(), "unknown");
        }
    }

    fn tandy_base() -> ScriptedMachine {
        ScriptedMachine::new().poke(0xFFFFE, 0xFF).poke(0xFC000, 0x21)
    }

    #[test]
    fn platform_first_marker_gates_everything() {
        for marker in [0x00u8, 0xFC, 0xFE, 0x21] {
            for tandy in [0x21u8, 0x00] {
                let mut m = ScriptedMachine::new()
                    .poke(0xFFFFE, marker)
                    .poke(0xFC000, tandy)
                    .system_config_at(0xF000, 0xE6F5)
                    .poke(0xFE6F7, 0xFF);
                let id = platform_identity(&mut m);
                assert_eq!(id, ProbeResult::Value(PlatformIdentity::NotPcCompatible));
                assert!(m.calls().is_empty());
            }
        }
    }

    #[test]
    fn platform_second_marker_gates_service() {
        let mut m = ScriptedMachine::new().poke(0xFFFFE, 0xFF).poke(0xFC000, 0x20);
        assert_eq!(platform_identity(&mut m), ProbeResult::Value(PlatformIdentity::NotTandy1000));
        assert!(m.calls().is_empty());
    }

    #[test]
    fn platform_sl_tl_from_config_table() {
        let mut m = tandy_base()
            .system_config_at(0xF000, 0xE6F5)
            .poke(0xFE6F7, 0xFF);
        let id = platform_identity(&mut m).value().copied().unwrap();
        assert_eq!(id, PlatformIdentity::Tandy1000SlTl);
        assert_eq!(id.to_string(), "Tandy 1000 SL/TL");
    }

    #[test]
    fn platform_generic_when_service_declined_or_model_differs() {
        let mut m = tandy_base();
        assert_eq!(platform_identity(&mut m), ProbeResult::Value(PlatformIdentity::Tandy1000));

        let mut m = tandy_base().system_config_at(0xF000, 0xE6F5).poke(0xFE6F7, 0xFE);
        assert_eq!(platform_identity(&mut m), ProbeResult::Value(PlatformIdentity::Tandy1000));
    }

    #[test]
    fn platform_model_offset_wraps_in_segment() {
        let mut m = tandy_base().system_config_at(0xF000, 0xFFFF).poke(0xF0001, 0xFF);
        assert_eq!(platform_identity(&mut m), ProbeResult::Value(PlatformIdentity::Tandy1000SlTl));
    }

    fn psg() -> ScriptedMachine {
        ScriptedMachine::new().latch_port(0xC0).latch_port(0xC1).latch_port(0xC2).latch_port(0xC3)
    }

    #[test]
    fn sound_chip_present_when_all_read_back() {
        let mut m = psg();
        assert_eq!(sound_chip(&mut m, &default_sound_ports()), ProbeResult::Value("Tandy PSG"));
        assert_eq!(m.port_writes(), &[(0xC0, 0xAA), (0xC1, 0xAA), (0xC2, 0xAA), (0xC3, 0xAA)]);
    }

    #[test]
    fn sound_chip_any_single_mismatch_is_absent() {
        for bad in 0xC0u16..=0xC3 {
            let mut m = psg().fixed_port(bad, 0xAB);
            let found = sound_chip(&mut m, &default_sound_ports());
            assert_eq!(found, ProbeResult::NotPresent, "port {:#x}", bad);
        }
    }

    #[test]
    fn sound_chip_absent_on_open_bus() {
        let mut m = ScriptedMachine::new();
        assert_eq!(sound_chip(&mut m, &default_sound_ports()), ProbeResult::NotPresent);
    }
}
