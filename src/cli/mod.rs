pub(crate) mod check_requests;
pub(crate) mod configure;

pub(crate) use check_requests::CheckRequestsArgs;
pub(crate) use configure::ConfigureArgs;

use serde::Serialize;
use snafu::ResultExt;

/// Where a guest keeps its per-interface config files unless the caller says otherwise.
pub(crate) const DEFAULT_SCRIPTS_DIR: &str = "/etc/sysconfig/network-scripts";

/// Helper function that serializes the input to pretty JSON and prints it
fn print_json<S>(value: &S) -> Result<()>
where
    S: Serialize,
{
    let output = serde_json::to_string_pretty(value).context(error::JsonSerializeSnafu)?;
    println!("{}", output);
    Ok(())
}

/// Potential errors during a herddog run
mod error {
    use crate::{comm, devices, entry, render, requests};
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    #[allow(clippy::enum_variant_names)]
    pub(crate) enum Error {
        #[snafu(display("Unable to load requests: {}", source))]
        RequestsLoad { source: requests::Error },

        #[snafu(display("Unable to build the guest transport: {}", source))]
        Transport { source: comm::Error },

        #[snafu(display("Unable to build the entry renderer: {}", source))]
        RendererBuild { source: render::Error },

        #[snafu(display("Unable to probe the guest's device naming: {}", source))]
        Probe { source: devices::Error },

        #[snafu(display("Unable to enumerate the guest's interfaces: {}", source))]
        Enumerate { source: devices::Error },

        #[snafu(display("Unable to build entry context: {}", source))]
        EntryContext { source: render::Error },

        #[snafu(display("Unable to render entry for '{}': {}", interface, source))]
        EntryRender {
            interface: String,
            source: render::Error,
        },

        #[snafu(display("Unable to stage entry for '{}': {}", interface, source))]
        Stage {
            interface: String,
            source: entry::Error,
        },

        #[snafu(display("Activation failed for: {}", interfaces))]
        Activation { interfaces: String },

        #[snafu(display("Error serializing to JSON: {}", source))]
        JsonSerialize { source: serde_json::Error },
    }
}

pub(crate) use error::Error;
pub(crate) type Result<T> = std::result::Result<T, error::Error>;
