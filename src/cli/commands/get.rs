//! Get command - list closure members or their files

use crate::cli::args::GetArgs;
use crate::cli::commands::closure_or_store;
use crate::error::NarkeepResult;
use crate::store::local::NarStore;

/// Execute the get command
pub async fn execute(store: &NarStore, args: GetArgs) -> NarkeepResult<()> {
    let closure = closure_or_store(store, args.hash.as_deref())?;

    if args.listhashes {
        for hash in closure.hashes() {
            println!("{hash}");
        }
    } else {
        for path in store.closure_files(&closure, args.relative) {
            println!("{}", path.display());
        }
    }

    Ok(())
}
