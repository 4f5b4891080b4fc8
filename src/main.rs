use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::info;

use retrofetch_core::{
    load_config, HostMachine, MonotonicClock, ProbeConfig, ScriptedMachine, SystemReport,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    /// Tandy 1000 SL (8086, 8 MHz)
    Tandy1000sl,
    /// Tandy 1000 HX (8088, 7.16 MHz)
    Tandy1000,
    /// IBM PC/AT (80286)
    IbmAt,
}

#[derive(Parser, Debug)]
#[command(name = "retrofetch", about = "System information for early x86 PCs")]
struct Cli {
    /// Probe configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run against a simulated machine instead of the host
    #[arg(long, value_enum)]
    simulate: Option<Profile>,
    /// DOS drive number for the disk probe (0 = default, 3 = C:)
    #[arg(long)]
    drive: Option<u8>,
    /// Let probes write to host I/O ports (needs root; may disturb devices owned by the OS)
    #[arg(long)]
    allow_port_writes: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ProbeConfig::default(),
    };
    if let Some(drive) = cli.drive {
        config.disk_drive = drive;
    }

    let report = match cli.simulate {
        Some(profile) => {
            info!("simulating {:?}", profile);
            let mut machine = match profile {
                Profile::Tandy1000sl => ScriptedMachine::tandy_1000_sl(),
                Profile::Tandy1000 => ScriptedMachine::tandy_1000(),
                Profile::IbmAt => ScriptedMachine::ibm_pc_at(),
            };
            SystemReport::collect(&mut machine, None, &config)
        }
        None => {
            let mut host = HostMachine::open(cli.allow_port_writes);
            let mut clock = MonotonicClock::new();
            SystemReport::collect(&mut host, Some(&mut clock), &config)
        }
    };

    print!("{}", report);
}
