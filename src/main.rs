use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::Result;
use num_traits::ToPrimitive;
use qubes_pure::{
    actions::{
        check::{CheckAction, CheckArgs},
        fix::{FixAction, FixArgs},
        Action,
    },
    blockdev::BlockDevice,
    disk::Disk,
    error::FixError,
    image::Image,
    pt::SectorSize,
};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

/// Check or repair a GPT after a logical sector size change (512 <-> 4096).
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct GptfixArgs {
    /// Do not refuse a protective MBR that carries a FAT boot parameter block
    #[arg(long)]
    unsafe_skip_bpb_check: bool,

    /// Log every step and dump the GPT
    #[arg(short, long)]
    verbose: bool,

    /// Treat DEVICE as a disk image file with this logical sector size
    #[arg(long, value_parser = parse_sector_size)]
    image_sector_size: Option<u64>,

    mode: Mode,

    device: String,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum Mode {
    /// Exit with status 7 if the GPT needs to be fixed
    Check,
    /// Rewrite the GPT for the current sector size
    Fix,
}

fn parse_sector_size(value: &str) -> Result<u64, String> {
    parse_size::parse_size(value).map_err(|e| format!("sector size parsing failed: {}", e))
}

fn open_disk(args: &GptfixArgs) -> Result<Box<dyn Disk>, FixError> {
    Ok(match args.image_sector_size {
        Some(bytes) => {
            let sector_size = SectorSize::new(bytes).ok_or(FixError::UnsupportedSectorSize(bytes))?;
            Box::new(Image::open(&args.device, sector_size)?)
        }
        None => Box::new(BlockDevice::open(&args.device)?),
    })
}

fn run(args: &GptfixArgs) -> Result<(), FixError> {
    let mut disk = open_disk(args)?;
    let skip_bpb_check = args.unsafe_skip_bpb_check;
    match args.mode {
        Mode::Check => CheckAction::invoke(disk.as_mut(), CheckArgs { skip_bpb_check }),
        Mode::Fix => FixAction::invoke(disk.as_mut(), FixArgs { skip_bpb_check }),
    }
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let args = match GptfixArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print()?;
            return Ok(ExitCode::from(code));
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "warn" }));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    Ok(match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_status().to_u8().unwrap_or(1))
        }
    })
}
