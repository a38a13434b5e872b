//! The comm module defines the interface to the remote command channel: a `Communicator` runs
//! shell scripts on the guest and uploads files to it.  The provisioning logic only ever sees
//! this trait; the process-spawning transport lives in `comm::shell`.
pub(crate) mod shell;

use async_trait::async_trait;
use std::path::Path;

/// Whether a non-zero exit status from the guest is surfaced as an error or handed back to the
/// caller in the `CommandOutput`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ErrorCheck {
    Enforce,
    Ignore,
}

/// What the guest said back: collected stdout and the command's exit status.
#[derive(Clone, Debug)]
pub(crate) struct CommandOutput {
    pub(crate) stdout: String,
    pub(crate) exit_status: i32,
}

impl CommandOutput {
    pub(crate) fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// A command channel to one guest machine.  Commands are issued one at a time and block until
/// the guest responds; a multi-line script body runs as a single remote shell invocation.
#[async_trait]
pub(crate) trait Communicator {
    async fn execute(&self, script: &str, error_check: ErrorCheck) -> Result<CommandOutput>;

    async fn upload(&self, local: &Path, remote: &Path) -> Result<()>;
}

mod error {
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to start transport command '{}': {}", command, source))]
        SpawnFailed { command: String, source: io::Error },

        #[snafu(display("Failed to send script to the transport: {}", source))]
        ScriptSend { source: io::Error },

        #[snafu(display("Failed reading transport output: {}", source))]
        OutputRead { source: io::Error },

        #[snafu(display("Remote command exited {}: {}", exit_status, stderr))]
        CommandFailed { exit_status: i32, stderr: String },

        #[snafu(display("Failed to upload to '{}': {}", remote.display(), stderr))]
        UploadFailed { remote: PathBuf, stderr: String },

        #[snafu(display("Invalid transport command '{}': {}", command, reason))]
        BadTransportCommand { command: String, reason: String },

        #[snafu(display("Failed to parse transport command '{}': {}", command, source))]
        TransportParse {
            command: String,
            source: shell_words::ParseError,
        },
    }

    impl Error {
        /// The class of failures worth retrying: the guest (or the channel to it) misbehaved.
        /// A malformed transport configuration will not get better by trying again.
        pub(crate) fn is_transient(&self) -> bool {
            matches!(
                self,
                Error::SpawnFailed { .. }
                    | Error::ScriptSend { .. }
                    | Error::OutputRead { .. }
                    | Error::CommandFailed { .. }
                    | Error::UploadFailed { .. }
            )
        }
    }
}

pub(crate) use error::Error;
pub(crate) type Result<T> = std::result::Result<T, error::Error>;
