/*!
# Introduction

herddog is a small provisioning helper that herds a remote guest machine's physical network
interfaces into the assignments a caller asked for.  Given a requests file that names networks
by slot position or by MAC address, it:

* probes whether the guest uses virtualized or persistent device naming,
* enumerates the guest's physical interfaces and their hardware addresses,
* matches each request to exactly one interface (MAC first, slot second, never the same
  interface twice),
* rewrites that interface's persisted configuration entry idempotently, and
* cycles exactly the interfaces it touched, with bounded retry, so the interface carrying the
  control channel is never taken down.

All guest access goes through a pluggable command transport (for example
`ssh admin@guest sudo sh`) and a pluggable upload command; herddog holds no state of its own
between runs beyond what lands in the guest's configuration files.

# Usage

```text
herddog configure \
    --requests networks.toml \
    --execute-via 'ssh admin@guest sudo sh' \
    --upload-via 'scp {local} admin@guest:{remote}'
```

The subcommand `check-requests` validates a requests file locally.
*/

#![deny(rust_2018_idioms)]

mod activation;
mod cli;
mod comm;
mod devices;
mod entry;
mod interface_id;
mod matching;
mod render;
mod requests;
mod retry;

use argh::FromArgs;
use log::error;
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};
use snafu::ResultExt;
use std::process;

/// Stores user-supplied arguments.
#[derive(FromArgs, Debug)]
struct Args {
    #[argh(option, default = "LevelFilter::Info", short = 'l')]
    /// log-level trace|debug|info|warn|error
    log_level: LevelFilter,

    #[argh(subcommand)]
    subcommand: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Configure(cli::ConfigureArgs),
    CheckRequests(cli::CheckRequestsArgs),
}

async fn run() -> Result<()> {
    let args: Args = argh::from_env();

    // SimpleLogger will send errors to stderr and anything less to stdout.
    SimpleLogger::init(args.log_level, LogConfig::default()).context(error::LoggerSnafu)?;

    match args.subcommand {
        SubCommand::Configure(args) => cli::configure::run(args).await.context(error::CommandSnafu),
        SubCommand::CheckRequests(args) => {
            cli::check_requests::run(args).context(error::CommandSnafu)
        }
    }
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        process::exit(1);
    }
}

mod error {
    use crate::cli;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: log::SetLoggerError },

        #[snafu(display("{}", source))]
        Command { source: cli::Error },
    }
}

type Result<T> = std::result::Result<T, error::Error>;
