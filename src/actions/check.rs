use crate::disk::Disk;
use crate::error::FixError;

use super::{inspect, Action};

pub struct CheckArgs {
    pub skip_bpb_check: bool,
}

/// Verifies the disk has a GPT valid for its current sector size.
pub struct CheckAction {}

impl Action<CheckArgs, FixError> for CheckAction {
    fn invoke(disk: &mut dyn Disk, args: CheckArgs) -> Result<(), FixError> {
        let inspection = inspect(disk, args.skip_bpb_check)?;
        if inspection.needs_migration {
            return Err(FixError::NeedsFix);
        }
        inspection.gpt.dump();
        Ok(())
    }
}
