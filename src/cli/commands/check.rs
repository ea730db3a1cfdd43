//! Check command - find records whose payload is missing

use crate::cli::args::CheckArgs;
use crate::cli::commands::closure_or_store;
use crate::error::NarkeepResult;
use crate::store::local::NarStore;

/// Execute the check command
pub async fn execute(store: &NarStore, args: CheckArgs) -> NarkeepResult<()> {
    let closure = closure_or_store(store, args.hash.as_deref())?;

    for path in store.find_orphaned_narinfos(&closure) {
        println!("{}", path.display());
    }

    Ok(())
}
