// Hardware access capability shared by every probe.
//
// A probe never touches ports, memory or firmware directly; it goes through a
// `Hardware` implementation so the same logic runs against the real host or a
// `ScriptedMachine`.

use log::debug;
use thiserror::Error;

/// CF bit in the FLAGS word.
pub const FLAG_CARRY: u16 = 0x0001;

/// RTC/CMOS index (select) port.
pub const CMOS_SELECT_PORT: u16 = 0x70;
/// RTC/CMOS data port.
pub const CMOS_DATA_PORT: u16 = 0x71;

/// AH status most firmware returns for "function not supported".
pub const STATUS_UNSUPPORTED: u8 = 0x86;

/// Input/output register state for one firmware service invocation.
///
/// Only the registers documented for the service/sub-function are meaningful
/// on return; everything else is whatever the firmware left behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFrame {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub si: u16,
    pub di: u16,
    pub es: u16,
    pub flags: u16,
}

impl RegisterFrame {
    pub fn with_ax(ax: u16) -> Self {
        Self { ax, ..Self::default() }
    }

    pub fn with_ah(ah: u8) -> Self {
        Self::with_ax((ah as u16) << 8)
    }

    #[inline]
    pub fn ah(&self) -> u8 {
        (self.ax >> 8) as u8
    }

    #[inline]
    pub fn al(&self) -> u8 {
        self.ax as u8
    }

    #[inline]
    pub fn bh(&self) -> u8 {
        (self.bx >> 8) as u8
    }

    #[inline]
    pub fn bl(&self) -> u8 {
        self.bx as u8
    }

    #[inline]
    pub fn cl(&self) -> u8 {
        self.cx as u8
    }

    pub fn set_ah(&mut self, value: u8) {
        self.ax = (self.ax & 0x00FF) | ((value as u16) << 8);
    }

    pub fn set_dl(&mut self, value: u8) {
        self.dx = (self.dx & 0xFF00) | value as u16;
    }

    pub fn carry(&self) -> bool {
        self.flags & FLAG_CARRY != 0
    }

    pub fn set_carry(&mut self, set: bool) {
        if set {
            self.flags |= FLAG_CARRY;
        } else {
            self.flags &= !FLAG_CARRY;
        }
    }
}

/// Why a firmware service produced no usable output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Carry flag set on return: the call is unsupported or was refused.
    #[error("firmware service {service:#04x} declined (status {status:#04x})")]
    Declined { service: u8, status: u8 },
    /// The primary output register held the service's reserved error value.
    #[error("firmware service {service:#04x} returned sentinel {value:#06x}")]
    Sentinel { service: u8, value: u16 },
}

pub type ServiceResult = Result<RegisterFrame, ServiceError>;

/// Raw access to the I/O port space, physical memory and numbered firmware
/// services of the machine being probed.
///
/// Implementations assume they own the hardware for the life of the process;
/// nothing here arbitrates against other users of the same ports.
pub trait Hardware {
    fn port_read(&mut self, port: u16) -> u8;

    fn port_write(&mut self, port: u16, value: u8);

    /// Read one byte of physical memory (20-bit real-mode address space).
    fn read_physical(&mut self, address: u32) -> u8;

    /// Invoke firmware service `service` and return the raw output frame.
    /// Callers should go through [`call_service`] instead, which turns the
    /// carry flag into a [`ServiceError`].
    fn firmware_call(&mut self, service: u8, input: RegisterFrame) -> RegisterFrame;

    /// Two-step indexed read: select `index` on the CMOS select port, then read
    /// the data port.
    fn indexed_register_read(&mut self, index: u8) -> u8 {
        self.port_write(CMOS_SELECT_PORT, index);
        self.port_read(CMOS_DATA_PORT)
    }

    /// Whether `port_write` actually reaches the device. Probes whose answer
    /// depends on a write must not trust a read-back when this is false.
    fn port_writes_allowed(&self) -> bool {
        true
    }

    /// Whether `read_physical` reaches real memory. When false every read is
    /// open bus and says nothing about the machine.
    fn physical_reads_available(&self) -> bool {
        true
    }
}

impl<H: Hardware + ?Sized> Hardware for &mut H {
    fn port_read(&mut self, port: u16) -> u8 {
        (**self).port_read(port)
    }

    fn port_write(&mut self, port: u16, value: u8) {
        (**self).port_write(port, value)
    }

    fn read_physical(&mut self, address: u32) -> u8 {
        (**self).read_physical(address)
    }

    fn firmware_call(&mut self, service: u8, input: RegisterFrame) -> RegisterFrame {
        (**self).firmware_call(service, input)
    }

    fn indexed_register_read(&mut self, index: u8) -> u8 {
        (**self).indexed_register_read(index)
    }

    fn port_writes_allowed(&self) -> bool {
        (**self).port_writes_allowed()
    }

    fn physical_reads_available(&self) -> bool {
        (**self).physical_reads_available()
    }
}

/// Invoke a firmware service, mapping a set carry flag to `Declined`.
pub fn call_service<H: Hardware + ?Sized>(
    hw: &mut H,
    service: u8,
    input: RegisterFrame,
) -> ServiceResult {
    let out = hw.firmware_call(service, input);
    debug!("service {:#04x} in={:04x?} out={:04x?}", service, input, out);
    if out.carry() {
        return Err(ServiceError::Declined { service, status: out.ah() });
    }
    Ok(out)
}

/// Like [`call_service`], but also treats `sentinel` in AX as an error. Used by
/// services that report failure through a reserved value instead of CF.
pub fn call_service_checked<H: Hardware + ?Sized>(
    hw: &mut H,
    service: u8,
    input: RegisterFrame,
    sentinel: u16,
) -> ServiceResult {
    let out = call_service(hw, service, input)?;
    if out.ax == sentinel {
        return Err(ServiceError::Sentinel { service, value: out.ax });
    }
    Ok(out)
}

/// Real-mode segment:offset address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarPointer {
    pub segment: u16,
    pub offset: u16,
}

impl FarPointer {
    pub const fn new(segment: u16, offset: u16) -> Self {
        Self { segment, offset }
    }

    pub const fn linear(&self) -> u32 {
        ((self.segment as u32) << 4) + self.offset as u32
    }

    /// Same segment, offset moved by `by` (wraps inside the 64K segment).
    pub const fn displaced(&self, by: u16) -> Self {
        Self::new(self.segment, self.offset.wrapping_add(by))
    }
}

/// A firmware signature: the byte expected at a fixed far address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarPointerProbe {
    pub pointer: FarPointer,
    pub expected: u8,
}

impl FarPointerProbe {
    pub const fn new(segment: u16, offset: u16, expected: u8) -> Self {
        Self { pointer: FarPointer::new(segment, offset), expected }
    }

    pub fn matches<H: Hardware + ?Sized>(&self, hw: &mut H) -> bool {
        let found = hw.read_physical(self.pointer.linear());
        debug!(
            "marker {:04X}:{:04X} = {:#04x} (want {:#04x})",
            self.pointer.segment, self.pointer.offset, found, self.expected
        );
        found == self.expected
    }
}

/// Ports used for a write/read-back test of a named peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAddressSet {
    pub name: &'static str,
    pub ports: Vec<u16>,
    pub pattern: u8,
}

impl PortAddressSet {
    /// `count` consecutive ports starting at `base`.
    pub fn consecutive(name: &'static str, base: u16, count: u16, pattern: u8) -> Self {
        Self {
            name,
            ports: (0..count).map(|i| base.wrapping_add(i)).collect(),
            pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        last_write: Option<(u16, u8)>,
        frame: RegisterFrame,
    }

    impl Hardware for Echo {
        fn port_read(&mut self, port: u16) -> u8 {
            match self.last_write {
                Some((CMOS_SELECT_PORT, idx)) if port == CMOS_DATA_PORT => idx.wrapping_mul(2),
                _ => 0xFF,
            }
        }

        fn port_write(&mut self, port: u16, value: u8) {
            self.last_write = Some((port, value));
        }

        fn read_physical(&mut self, address: u32) -> u8 {
            address as u8
        }

        fn firmware_call(&mut self, _service: u8, _input: RegisterFrame) -> RegisterFrame {
            self.frame
        }
    }

    #[test]
    fn byte_halves() {
        let mut f = RegisterFrame::with_ax(0x1234);
        assert_eq!(f.ah(), 0x12);
        assert_eq!(f.al(), 0x34);
        f.set_ah(0xC0);
        assert_eq!(f.ax, 0xC034);
        f.dx = 0xABCD;
        f.set_dl(0x03);
        assert_eq!(f.dx, 0xAB03);
    }

    #[test]
    fn indexed_read_selects_then_reads() {
        let mut hw = Echo { last_write: None, frame: RegisterFrame::default() };
        assert_eq!(hw.indexed_register_read(0x17), 0x2E);
        assert_eq!(hw.last_write, Some((CMOS_SELECT_PORT, 0x17)));
    }

    #[test]
    fn carry_becomes_declined() {
        let mut out = RegisterFrame::with_ah(STATUS_UNSUPPORTED);
        out.set_carry(true);
        let mut hw = Echo { last_write: None, frame: out };
        assert_eq!(
            call_service(&mut hw, 0x15, RegisterFrame::with_ah(0x88)),
            Err(ServiceError::Declined { service: 0x15, status: STATUS_UNSUPPORTED })
        );
    }

    #[test]
    fn sentinel_checked_after_carry() {
        let mut hw = Echo { last_write: None, frame: RegisterFrame::with_ax(0xFFFF) };
        assert_eq!(
            call_service_checked(&mut hw, 0x21, RegisterFrame::with_ah(0x36), 0xFFFF),
            Err(ServiceError::Sentinel { service: 0x21, value: 0xFFFF })
        );
        hw.frame.ax = 4;
        let out = call_service_checked(&mut hw, 0x21, RegisterFrame::default(), 0xFFFF);
        assert_eq!(out.map(|f| f.ax), Ok(4));
    }

    #[test]
    fn far_pointer_linear_and_wrap() {
        assert_eq!(FarPointer::new(0xFFFF, 0x000E).linear(), 0xFFFFE);
        assert_eq!(FarPointer::new(0xFC00, 0).linear(), 0xFC000);
        let p = FarPointer::new(0xF000, 0xFFFF).displaced(2);
        assert_eq!(p, FarPointer::new(0xF000, 0x0001));
    }

    #[test]
    fn consecutive_ports() {
        let set = PortAddressSet::consecutive("psg", 0xC0, 4, 0xAA);
        assert_eq!(set.ports, vec![0xC0, 0xC1, 0xC2, 0xC3]);
    }
}
