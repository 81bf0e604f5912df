use tracing::{info, warn};

use crate::disk::Disk;
use crate::error::FixError;
use crate::pt::migrate::Migration;

use super::{inspect, Action};

pub struct FixArgs {
    pub skip_bpb_check: bool,
}

/// Rewrites a GPT found at the old sector size for the current one.
pub struct FixAction {}

impl Action<FixArgs, FixError> for FixAction {
    fn invoke(disk: &mut dyn Disk, args: FixArgs) -> Result<(), FixError> {
        let inspection = inspect(disk, args.skip_bpb_check)?;
        if !inspection.needs_migration {
            info!("GPT matches the current sector size, nothing to do");
            return Ok(());
        }

        disk.prepare_for_writing()?;
        warn!("Found GPT with different sector size, altering");
        Migration::new(inspection.gpt, inspection.location, inspection.mbr).run(disk)?;
        disk.reload_partition_table()
    }
}
