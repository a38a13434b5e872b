//! The entry module owns this program's block inside a guest's per-interface configuration
//! file.  The block is delimited by a pair of sentinel marker lines; everything between them
//! (markers included) belongs to us, everything outside them belongs to the guest's
//! administrator and is preserved byte for byte.
//!
//! Staging works in two steps so activation stays atomic: the config file is rewritten with
//! our previous block removed, and the freshly rendered entry is parked at a deterministic
//! staging path.  The activation script appends the staged entry and cleans up.
use crate::comm::{Communicator, ErrorCheck};
use crate::interface_id::InterfaceName;
use snafu::ResultExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub(crate) const BLOCK_BEGIN: &str = "#HERDDOG-BEGIN";
pub(crate) const BLOCK_END: &str = "#HERDDOG-END";

/// Where an interface's rendered entry waits between staging and activation.
pub(crate) fn staging_path(interface: &InterfaceName) -> String {
    format!("/tmp/herddog-network-entry_{}", interface)
}

/// The interface's persisted configuration file under the guest's network scripts directory.
pub(crate) fn config_path(scripts_dir: &Path, interface: &InterfaceName) -> PathBuf {
    scripts_dir.join(format!("ifcfg-{}", interface))
}

/// Remove every sentinel-delimited block from a config file's contents.  Missing markers are
/// a no-op; a dangling begin marker swallows everything after it, like the `sed` range
/// expression this mirrors.
pub(crate) fn strip_marked_block(contents: &str) -> String {
    let mut kept = String::with_capacity(contents.len());
    let mut inside_block = false;

    for line in contents.lines() {
        if inside_block {
            if line.starts_with(BLOCK_END) {
                inside_block = false;
            }
            continue;
        }
        if line.starts_with(BLOCK_BEGIN) {
            inside_block = true;
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }
    kept
}

/// Prepare one interface for activation: make sure its config file exists, drop any block a
/// previous run left behind, and park the rendered entry at the staging path.  Safe to run
/// any number of times; each run leaves at most one staged entry and zero owned blocks in
/// the file.
pub(crate) async fn stage<C>(
    comm: &C,
    entry: &str,
    interface: &InterfaceName,
    scripts_dir: &Path,
) -> Result<()>
where
    C: Communicator,
{
    let config = config_path(scripts_dir, interface);
    let config = config.display();

    comm.execute(&format!("touch {}", config), ErrorCheck::Enforce)
        .await
        .context(error::EnsureConfigSnafu { interface: &**interface })?;

    let current = comm
        .execute(&format!("cat {}", config), ErrorCheck::Enforce)
        .await
        .context(error::ReadConfigSnafu { interface: &**interface })?;

    // Rewrite through a scratch file and `cat` into place so the config file keeps its
    // ownership and mode.
    let stripped = strip_marked_block(&current.stdout);
    let scratch = format!("/tmp/herddog-ifcfg-{}", interface);
    upload_bytes(comm, stripped.as_bytes(), Path::new(&scratch)).await?;
    comm.execute(
        &format!("cat {} > {} && rm -f {}", scratch, config, scratch),
        ErrorCheck::Enforce,
    )
    .await
    .context(error::WriteConfigSnafu { interface: &**interface })?;

    upload_bytes(comm, entry.as_bytes(), Path::new(&staging_path(interface))).await
}

/// Upload bytes to the guest through a host-side temporary file.
async fn upload_bytes<C>(comm: &C, content: &[u8], remote: &Path) -> Result<()>
where
    C: Communicator,
{
    let mut staged = NamedTempFile::new().context(error::ScratchFileSnafu)?;
    staged.write_all(content).context(error::ScratchFileSnafu)?;
    staged.flush().context(error::ScratchFileSnafu)?;

    comm.upload(staged.path(), remote)
        .await
        .context(error::UploadSnafu { remote })
}

mod error {
    use crate::comm;
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to ensure config file for '{}' exists: {}", interface, source))]
        EnsureConfig {
            interface: String,
            source: comm::Error,
        },

        #[snafu(display("Failed to read config file for '{}': {}", interface, source))]
        ReadConfig {
            interface: String,
            source: comm::Error,
        },

        #[snafu(display("Failed to write config file for '{}': {}", interface, source))]
        WriteConfig {
            interface: String,
            source: comm::Error,
        },

        #[snafu(display("Failed to create scratch file: {}", source))]
        ScratchFile { source: io::Error },

        #[snafu(display("Failed to upload to '{}': {}", remote.display(), source))]
        Upload {
            remote: PathBuf,
            source: comm::Error,
        },
    }
}

pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
