//! Orphans command - find payload files no record points at

use crate::cli::args::OrphansArgs;
use crate::config::Config;
use crate::error::NarkeepResult;
use crate::store::local::NarStore;

/// Execute the orphans command
pub async fn execute(store: &NarStore, args: OrphansArgs, config: &Config) -> NarkeepResult<()> {
    let nar_dir = args.nardir.as_deref().unwrap_or(&config.store.nar_dir);

    let index = store.enumerate()?;
    for path in store.find_orphaned_nars(&index, nar_dir)? {
        println!("{}", path.display());
    }

    Ok(())
}
