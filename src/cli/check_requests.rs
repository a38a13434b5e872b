use super::{error, Result};
use crate::requests::RequestSet;
use argh::FromArgs;
use snafu::ResultExt;
use std::path::PathBuf;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "check-requests")]
/// Parse and validate a requests file without touching any guest
pub(crate) struct CheckRequestsArgs {
    #[argh(positional)]
    /// requests file to check
    requests: PathBuf,
}

pub(crate) fn run(args: CheckRequestsArgs) -> Result<()> {
    let set = RequestSet::from_path(&args.requests).context(error::RequestsLoadSnafu)?;

    println!(
        "'{}' is valid: {} request(s)",
        args.requests.display(),
        set.requests.len()
    );
    for request in &set.requests {
        match (&request.mac_address, request.slot) {
            (Some(mac), _) => println!("  {:?} by MAC {}", request.kind, mac),
            (None, Some(slot)) => println!("  {:?} in slot {}", request.kind, slot),
            // `RequestSet` validation guarantees one of the two is present
            (None, None) => {}
        }
    }
    Ok(())
}
