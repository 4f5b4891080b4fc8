// Simulated machine used by the unit tests and the `--simulate` profiles.
//
// Firmware services answer from a reply table keyed by (service, AH), falling
// back to a service-wide entry. Unscripted services decline with CF set and
// AH=86h, the way a BIOS reports an unsupported function.

use std::collections::HashMap;

use log::trace;

use crate::hal::{Hardware, RegisterFrame, CMOS_DATA_PORT, CMOS_SELECT_PORT, STATUS_UNSUPPORTED};
use crate::timing::{CLOCK_SERVICE, PIT_HZ, TICK_DIVISOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Return these registers with CF clear.
    Frame(RegisterFrame),
    /// Return with CF set and AH = status.
    Decline(u8),
}

impl Reply {
    pub fn ax(ax: u16) -> Self {
        Reply::Frame(RegisterFrame::with_ax(ax))
    }

    pub fn regs(ax: u16, bx: u16, cx: u16, dx: u16) -> Self {
        Reply::Frame(RegisterFrame { ax, bx, cx, dx, ..RegisterFrame::default() })
    }
}

#[derive(Debug, Clone, Copy)]
enum Port {
    /// Reads return the last value written.
    Latch(u8),
    /// Reads always return this value; writes are dropped.
    Fixed(u8),
}

#[derive(Debug, Clone, Copy)]
struct SimClock {
    cpu_hz: u64,
    cycles_per_read: u64,
    cycles: u64,
    base: u32,
}

impl SimClock {
    fn ticks(&self) -> u32 {
        let elapsed =
            self.cycles as u128 * PIT_HZ as u128 / (self.cpu_hz as u128 * TICK_DIVISOR as u128);
        self.base.wrapping_add(elapsed as u32)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedMachine {
    memory: HashMap<u32, u8>,
    ports: HashMap<u16, Port>,
    cmos: [u8; 128],
    cmos_index: u8,
    services: HashMap<(u8, Option<u8>), Reply>,
    clock: Option<SimClock>,
    calls: Vec<(u8, RegisterFrame)>,
    clock_reads: u64,
    port_writes: Vec<(u16, u8)>,
}

impl ScriptedMachine {
    pub fn new() -> Self {
        Self {
            memory: HashMap::new(),
            ports: HashMap::new(),
            cmos: [0; 128],
            cmos_index: 0,
            services: HashMap::new(),
            clock: None,
            calls: Vec::new(),
            clock_reads: 0,
            port_writes: Vec::new(),
        }
    }

    /// Reply for `service` when AH matches `ah`, or for every AH when `ah` is `None`.
    pub fn reply(mut self, service: u8, ah: Option<u8>, reply: Reply) -> Self {
        self.set_reply(service, ah, reply);
        self
    }

    pub fn set_reply(&mut self, service: u8, ah: Option<u8>, reply: Reply) {
        self.services.insert((service, ah), reply);
    }

    pub fn poke(mut self, address: u32, value: u8) -> Self {
        self.memory.insert(address, value);
        self
    }

    pub fn cmos(mut self, index: u8, value: u8) -> Self {
        self.cmos[(index & 0x7F) as usize] = value;
        self
    }

    pub fn latch_port(mut self, port: u16) -> Self {
        self.ports.insert(port, Port::Latch(0));
        self
    }

    pub fn fixed_port(mut self, port: u16, value: u8) -> Self {
        self.ports.insert(port, Port::Fixed(value));
        self
    }

    /// Install a BIOS tick counter (service 1Ah, AH=0) driven by a CPU running
    /// at `cpu_hz`, where every counter read costs `cycles_per_read` cycles.
    pub fn clock(mut self, cpu_hz: u64, cycles_per_read: u64) -> Self {
        self.clock = Some(SimClock { cpu_hz: cpu_hz.max(1), cycles_per_read, cycles: 0, base: 0 });
        self
    }

    /// Start the tick counter at `base` instead of zero.
    pub fn clock_base(mut self, base: u32) -> Self {
        if let Some(clock) = self.clock.as_mut() {
            clock.base = base;
        }
        self
    }

    /// Every firmware call made so far, with its input frame. Tick counter
    /// reads are only counted, see [`clock_reads`](Self::clock_reads).
    pub fn calls(&self) -> &[(u8, RegisterFrame)] {
        &self.calls
    }

    /// Number of 1Ah/AH=0 tick counter reads.
    pub fn clock_reads(&self) -> u64 {
        self.clock_reads
    }

    pub fn port_writes(&self) -> &[(u16, u8)] {
        &self.port_writes
    }

    fn lookup(&self, service: u8, ah: u8) -> Option<Reply> {
        self.services
            .get(&(service, Some(ah)))
            .or_else(|| self.services.get(&(service, None)))
            .copied()
    }

    fn read_clock(&mut self) -> Option<RegisterFrame> {
        let clock = self.clock.as_mut()?;
        let ticks = clock.ticks();
        clock.cycles += clock.cycles_per_read;
        Some(RegisterFrame {
            cx: (ticks >> 16) as u16,
            dx: ticks as u16,
            ..RegisterFrame::default()
        })
    }

    /// Answer 15h/C0h with the system configuration table at `es:bx`.
    pub fn system_config_at(self, es: u16, bx: u16) -> Self {
        let table = RegisterFrame { es, bx, ..RegisterFrame::default() };
        self.reply(0x15, Some(0xC0), Reply::Frame(table))
    }

    /// Tandy 1000 SL: 8086 at 8 MHz, two floppies, 20 MB hard disk, MS-DOS 3.30
    /// in ROM, SL/TL model byte in the system configuration table.
    pub fn tandy_1000_sl() -> Self {
        Self::new()
            .poke(0xFFFFE, 0xFF)
            .poke(0xFC000, 0x21)
            .system_config_at(0xF000, 0xE6F5)
            .poke(0xFE6F7, 0xFF)
            .reply(0x15, Some(0x88), Reply::Decline(STATUS_UNSUPPORTED))
            .reply(0x12, None, Reply::ax(640))
            .reply(0x11, None, Reply::regs(0x0061, 0, 0x0001, 0))
            .reply(0x21, Some(0x30), Reply::regs(0x1E03, 0xFF00, 0, 0))
            .reply(0x21, Some(0x33), Reply::ax(0x33FF))
            .reply(0x21, Some(0x36), Reply::regs(4, 2000, 512, 10405))
            .latch_port(0xC0)
            .latch_port(0xC1)
            .latch_port(0xC2)
            .latch_port(0xC3)
            .clock(8_000_000, 40)
    }

    /// Tandy 1000 HX: 8088 at 7.16 MHz, one floppy, no hard disk, older BIOS
    /// without the system configuration service.
    pub fn tandy_1000() -> Self {
        Self::new()
            .poke(0xFFFFE, 0xFF)
            .poke(0xFC000, 0x21)
            .reply(0x15, Some(0x88), Reply::Decline(STATUS_UNSUPPORTED))
            .reply(0x12, None, Reply::ax(640))
            .reply(0x11, None, Reply::regs(0x0021, 0, 0x0000, 0))
            .reply(0x21, Some(0x30), Reply::regs(0x0B02, 0xFF00, 0, 0))
            .reply(0x21, Some(0x33), Reply::ax(0x33FF))
            .reply(0x21, Some(0x36), Reply::ax(0xFFFF))
            .latch_port(0xC0)
            .latch_port(0xC1)
            .latch_port(0xC2)
            .latch_port(0xC3)
            .clock(7_159_090, 40)
    }

    /// IBM PC/AT: 80286 with a math coprocessor, 15 MB extended memory known only
    /// to CMOS, IBM DOS 5.0, no PSG on the sound ports.
    pub fn ibm_pc_at() -> Self {
        Self::new()
            .poke(0xFFFFE, 0xFC)
            .system_config_at(0xF000, 0xE6F5)
            .poke(0xFE6F7, 0xFC)
            .reply(0x15, Some(0x88), Reply::ax(0x3C00))
            .reply(0x15, Some(0xE8), Reply::Decline(STATUS_UNSUPPORTED))
            .cmos(0x17, 0x00)
            .cmos(0x18, 0x3C)
            .reply(0x12, None, Reply::ax(640))
            .reply(0x11, None, Reply::regs(0x0043, 0, 0x0006, 0))
            .reply(0x21, Some(0x30), Reply::regs(0x0005, 0x0000, 0, 0))
            .reply(0x21, Some(0x33), Reply::regs(0x3306, 0x0005, 0, 0))
            .reply(0x21, Some(0x36), Reply::regs(4, 5000, 512, 16000))
            .clock(8_000_000, 40)
    }
}

impl Hardware for ScriptedMachine {
    fn port_read(&mut self, port: u16) -> u8 {
        if port == CMOS_DATA_PORT {
            return self.cmos[self.cmos_index as usize];
        }
        match self.ports.get(&port) {
            Some(Port::Latch(v)) | Some(Port::Fixed(v)) => *v,
            None => 0xFF,
        }
    }

    fn port_write(&mut self, port: u16, value: u8) {
        trace!("out {:#06x}, {:#04x}", port, value);
        self.port_writes.push((port, value));
        if port == CMOS_SELECT_PORT {
            // bit 7 is the NMI mask, not part of the index
            self.cmos_index = value & 0x7F;
            return;
        }
        if let Some(Port::Latch(v)) = self.ports.get_mut(&port) {
            *v = value;
        }
    }

    fn read_physical(&mut self, address: u32) -> u8 {
        self.memory.get(&(address & 0xFFFFF)).copied().unwrap_or(0xFF)
    }

    fn firmware_call(&mut self, service: u8, input: RegisterFrame) -> RegisterFrame {
        let ah = input.ah();
        if service == CLOCK_SERVICE && ah == 0 {
            self.clock_reads += 1;
        } else {
            self.calls.push((service, input));
        }

        let reply = match self.lookup(service, ah) {
            Some(reply) => reply,
            None if service == CLOCK_SERVICE && ah == 0 => match self.read_clock() {
                Some(frame) => Reply::Frame(frame),
                None => Reply::Decline(STATUS_UNSUPPORTED),
            },
            None => Reply::Decline(STATUS_UNSUPPORTED),
        };

        match reply {
            Reply::Frame(mut out) => {
                out.set_carry(false);
                out
            }
            Reply::Decline(status) => {
                let mut out = input;
                out.set_ah(status);
                out.set_carry(true);
                out
            }
        }
    }
}
