// Host backend: the machine this process is actually running on.
//
// A protected-mode process cannot reach real-mode firmware, so every service
// call declines and the probes degrade to their "unsupported" outcomes. Port and
// physical memory access go through the OS device files where they exist.
//
// Unlike the single-tasking environment these probes were designed for, a modern
// OS has drivers that own the same ports. Port writes are therefore suppressed
// unless explicitly allowed; there is no arbitration with those drivers.

use log::warn;

use crate::hal::{Hardware, RegisterFrame, STATUS_UNSUPPORTED};

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod sys {
            use std::fs::{File, OpenOptions};
            use std::os::unix::io::AsRawFd;

            use log::{debug, warn};

            pub struct RawAccess {
                port: Option<File>,
                port_writable: bool,
                mem: Option<File>,
            }

            fn pread_byte(file: &File, offset: u64) -> Option<u8> {
                let mut byte = 0u8;
                let n = unsafe {
                    libc::pread(
                        file.as_raw_fd(),
                        &mut byte as *mut u8 as *mut libc::c_void,
                        1,
                        offset as libc::off_t,
                    )
                };
                if n == 1 { Some(byte) } else { None }
            }

            fn pwrite_byte(file: &File, offset: u64, value: u8) -> bool {
                let n = unsafe {
                    libc::pwrite(
                        file.as_raw_fd(),
                        &value as *const u8 as *const libc::c_void,
                        1,
                        offset as libc::off_t,
                    )
                };
                n == 1
            }

            impl RawAccess {
                pub fn open() -> Self {
                    let rw = OpenOptions::new().read(true).write(true).open("/dev/port");
                    let (port, port_writable) = match rw {
                        Ok(f) => (Some(f), true),
                        Err(_) => match File::open("/dev/port") {
                            Ok(f) => (Some(f), false),
                            Err(e) => {
                                warn!("cannot open /dev/port: {} (try root)", e);
                                (None, false)
                            }
                        },
                    };
                    let mem = match File::open("/dev/mem") {
                        Ok(f) => Some(f),
                        Err(e) => {
                            warn!("cannot open /dev/mem: {} (try root)", e);
                            None
                        }
                    };
                    debug!(
                        "host access: port={} writable={} mem={}",
                        port.is_some(),
                        port_writable,
                        mem.is_some()
                    );
                    Self { port, port_writable, mem }
                }

                #[cfg(test)]
                pub fn closed() -> Self {
                    Self { port: None, port_writable: false, mem: None }
                }

                pub fn port_read(&self, port: u16) -> Option<u8> {
                    pread_byte(self.port.as_ref()?, port as u64)
                }

                pub fn port_write(&self, port: u16, value: u8) -> bool {
                    match self.port.as_ref() {
                        Some(f) if self.port_writable => pwrite_byte(f, port as u64, value),
                        _ => false,
                    }
                }

                pub fn can_write_ports(&self) -> bool {
                    self.port.is_some() && self.port_writable
                }

                pub fn can_read_memory(&self) -> bool {
                    self.mem.is_some()
                }

                pub fn mem_read(&self, address: u32) -> Option<u8> {
                    pread_byte(self.mem.as_ref()?, address as u64)
                }
            }
        }
    } else {
        mod sys {
            /// No raw device access on this target; everything reads as open bus.
            pub struct RawAccess;

            impl RawAccess {
                pub fn open() -> Self {
                    log::warn!("no raw port or memory access on this platform");
                    RawAccess
                }

                #[cfg(test)]
                pub fn closed() -> Self {
                    RawAccess
                }

                pub fn port_read(&self, _port: u16) -> Option<u8> {
                    None
                }

                pub fn port_write(&self, _port: u16, _value: u8) -> bool {
                    false
                }

                pub fn can_write_ports(&self) -> bool {
                    false
                }

                pub fn can_read_memory(&self) -> bool {
                    false
                }

                pub fn mem_read(&self, _address: u32) -> Option<u8> {
                    None
                }
            }
        }
    }
}

/// Value read from an unmapped port or unreadable memory.
const OPEN_BUS: u8 = 0xFF;

pub struct HostMachine {
    raw: sys::RawAccess,
    allow_port_writes: bool,
    warned: bool,
}

impl HostMachine {
    /// Open the host's raw access paths. Port writes are dropped unless
    /// `allow_port_writes` is set and the process can actually perform them.
    pub fn open(allow_port_writes: bool) -> Self {
        Self { raw: sys::RawAccess::open(), allow_port_writes, warned: false }
    }
}

impl Hardware for HostMachine {
    fn port_read(&mut self, port: u16) -> u8 {
        self.raw.port_read(port).unwrap_or(OPEN_BUS)
    }

    fn port_write(&mut self, port: u16, value: u8) {
        if !self.port_writes_allowed() {
            if !self.warned {
                warn!("port writes suppressed (first: {:#06x} <- {:#04x})", port, value);
                self.warned = true;
            }
            return;
        }
        if !self.raw.port_write(port, value) {
            warn!("port write {:#06x} <- {:#04x} failed", port, value);
        }
    }

    fn read_physical(&mut self, address: u32) -> u8 {
        self.raw.mem_read(address & 0xFFFFF).unwrap_or(OPEN_BUS)
    }

    fn firmware_call(&mut self, _service: u8, input: RegisterFrame) -> RegisterFrame {
        let mut out = input;
        out.set_ah(STATUS_UNSUPPORTED);
        out.set_carry(true);
        out
    }

    fn port_writes_allowed(&self) -> bool {
        self.allow_port_writes && self.raw.can_write_ports()
    }

    fn physical_reads_available(&self) -> bool {
        self.raw.can_read_memory()
    }
}
