//! Drvs command - list producer references of a closure

use crate::cli::args::DrvsArgs;
use crate::cli::commands::closure_or_store;
use crate::error::NarkeepResult;
use crate::store::hash::StoreHash;
use crate::store::local::NarStore;
use std::collections::HashSet;
use tracing::warn;

/// Execute the drvs command
pub async fn execute(store: &NarStore, args: DrvsArgs) -> NarkeepResult<()> {
    let closure = closure_or_store(store, args.hash.as_deref())?;

    let mut printed = HashSet::new();
    for (_, info) in closure.iter() {
        let Some(deriver) = &info.deriver else {
            continue;
        };
        if args.listhashes {
            match StoreHash::from_name(deriver) {
                Ok(hash) => {
                    if printed.insert(hash.to_string()) {
                        println!("{hash}");
                    }
                }
                Err(err) => warn!("unusable deriver {deriver}: {err}"),
            }
        } else if printed.insert(deriver.clone()) {
            println!("{deriver}");
        }
    }

    Ok(())
}
