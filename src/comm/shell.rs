//! The shell module provides the process-spawning transport: scripts are piped to a
//! caller-supplied command that runs a POSIX shell on the guest (for example
//! `ssh admin@guest sudo sh`), and uploads go through a copy command with `{local}` and
//! `{remote}` placeholders (for example `scp {local} admin@guest:{remote}`).
use super::{error, CommandOutput, Communicator, ErrorCheck, Result};
use async_trait::async_trait;
use snafu::{ensure, ResultExt};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const LOCAL_PLACEHOLDER: &str = "{local}";
const REMOTE_PLACEHOLDER: &str = "{remote}";

#[derive(Debug)]
pub(crate) struct ShellTransport {
    exec: Vec<String>,
    copy: Vec<String>,
}

impl ShellTransport {
    /// Build a transport from an execute command and a copy command.  The execute command must
    /// start a shell that reads the script from stdin; the copy command must contain the
    /// `{local}` and `{remote}` placeholders.
    pub(crate) fn new(execute_via: &str, upload_via: &str) -> Result<Self> {
        let exec = shell_words::split(execute_via).context(error::TransportParseSnafu {
            command: execute_via,
        })?;
        ensure!(
            !exec.is_empty(),
            error::BadTransportCommandSnafu {
                command: execute_via,
                reason: "empty command",
            }
        );

        let copy = shell_words::split(upload_via).context(error::TransportParseSnafu {
            command: upload_via,
        })?;
        ensure!(
            !copy.is_empty(),
            error::BadTransportCommandSnafu {
                command: upload_via,
                reason: "empty command",
            }
        );
        for placeholder in [LOCAL_PLACEHOLDER, REMOTE_PLACEHOLDER] {
            ensure!(
                copy.iter().any(|arg| arg.contains(placeholder)),
                error::BadTransportCommandSnafu {
                    command: upload_via,
                    reason: format!("missing the {} placeholder", placeholder),
                }
            );
        }

        Ok(Self { exec, copy })
    }

    async fn run(&self, argv: &[String], stdin: Option<&str>) -> Result<std::process::Output> {
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().context(error::SpawnFailedSnafu {
            command: argv.join(" "),
        })?;

        if let Some(body) = stdin {
            // Dropping the handle closes the pipe so the remote shell sees EOF.
            let mut handle = child.stdin.take().expect("child stdin was piped");
            handle
                .write_all(body.as_bytes())
                .await
                .context(error::ScriptSendSnafu)?;
        } else {
            drop(child.stdin.take());
        }

        child
            .wait_with_output()
            .await
            .context(error::OutputReadSnafu)
    }
}

#[async_trait]
impl Communicator for ShellTransport {
    async fn execute(&self, script: &str, error_check: ErrorCheck) -> Result<CommandOutput> {
        let output = self.run(&self.exec, Some(script)).await?;
        let exit_status = output.status.code().unwrap_or(-1);

        if error_check == ErrorCheck::Enforce {
            ensure!(
                output.status.success(),
                error::CommandFailedSnafu {
                    exit_status,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            );
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_status,
        })
    }

    async fn upload(&self, local: &Path, remote: &Path) -> Result<()> {
        let argv: Vec<String> = self
            .copy
            .iter()
            .map(|arg| {
                arg.replace(LOCAL_PLACEHOLDER, &local.display().to_string())
                    .replace(REMOTE_PLACEHOLDER, &remote.display().to_string())
            })
            .collect();

        let output = self.run(&argv, None).await?;
        ensure!(
            output.status.success(),
            error::UploadFailedSnafu {
                remote,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        );
        Ok(())
    }
}
