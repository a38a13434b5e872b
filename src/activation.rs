//! The activation module brings a reconfigured interface up.  Each touched interface gets
//! exactly one remote script: append the staged entry to the config file, ask NetworkManager
//! to reload the connection if such a manager is present and active, cycle the interface,
//! and discard the staged entry.  One script per interface is the contract that keeps the
//! control channel alive; nothing outside the touched set is ever cycled.
//!
//! Guests are routinely mid-boot or otherwise busy when we get here, so the script runs
//! under the retry policy and only transient command failures earn another attempt.
use crate::comm::{self, Communicator, ErrorCheck};
use crate::entry;
use crate::interface_id::InterfaceName;
use crate::retry::RetryPolicy;
use handlebars::Handlebars;
use lazy_static::lazy_static;
use serde_json::json;
use snafu::ResultExt;
use std::path::Path;

const ACTIVATE_TEMPLATE: &str = include_str!("../templates/activate_interface.sh.hbs");

lazy_static! {
    static ref SCRIPTS: Handlebars<'static> = {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("activate_interface", ACTIVATE_TEMPLATE)
            .expect("invalid embedded activation template");
        registry
    };
}

/// Cycle one interface through its freshly staged configuration, retrying per `policy` on
/// transient failures.  The last failure is fatal for this interface.
pub(crate) async fn activate<C>(
    comm: &C,
    interface: &InterfaceName,
    scripts_dir: &Path,
    policy: &RetryPolicy,
) -> Result<()>
where
    C: Communicator,
{
    let script = SCRIPTS
        .render(
            "activate_interface",
            &json!({
                "device": interface.to_string(),
                "config_path": entry::config_path(scripts_dir, interface).display().to_string(),
                "staged_entry": entry::staging_path(interface),
            }),
        )
        .context(error::ScriptRenderSnafu { interface: &**interface })?;

    policy
        .run(
            || comm.execute(&script, ErrorCheck::Enforce),
            comm::Error::is_transient,
        )
        .await
        .map(|_| ())
        .context(error::CycleSnafu { interface: &**interface })
}

mod error {
    use crate::comm;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to render activation script for '{}': {}", interface, source))]
        ScriptRender {
            interface: String,
            source: handlebars::RenderError,
        },

        #[snafu(display("Failed to activate '{}': {}", interface, source))]
        Cycle {
            interface: String,
            source: comm::Error,
        },
    }
}

pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::mock::{ok, FakeGuest, ScriptedCommunicator};
    use crate::comm::CommandOutput;
    use std::convert::TryFrom;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn eth1() -> InterfaceName {
        InterfaceName::try_from("eth1").unwrap()
    }

    fn scripts_dir() -> &'static Path {
        Path::new("/etc/sysconfig/network-scripts")
    }

    fn failure() -> comm::Error {
        comm::Error::CommandFailed {
            exit_status: 1,
            stderr: "ifup: could not bring up interface".to_string(),
        }
    }

    #[tokio::test]
    async fn appends_staged_entry_and_cleans_up() {
        let guest = FakeGuest::new(&[]);
        guest.write_file(
            "/etc/sysconfig/network-scripts/ifcfg-eth1",
            "# existing\n",
        );
        guest.write_file(
            "/tmp/herddog-network-entry_eth1",
            "#HERDDOG-BEGIN\nDEVICE=eth1\n#HERDDOG-END\n",
        );

        activate(&guest, &eth1(), scripts_dir(), &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(
            guest
                .read_file("/etc/sysconfig/network-scripts/ifcfg-eth1")
                .as_deref(),
            Some("# existing\n#HERDDOG-BEGIN\nDEVICE=eth1\n#HERDDOG-END\n")
        );
        assert_eq!(guest.read_file("/tmp/herddog-network-entry_eth1"), None);

        // one remote invocation, naming only this interface
        let executed = guest.executed();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].contains("/sbin/ifdown eth1"));
        assert!(executed[0].contains("/sbin/ifup eth1"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_to_success() {
        let calls = AtomicUsize::new(0);
        let comm = ScriptedCommunicator::new(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(failure())
            } else {
                Ok(ok(""))
            }
        });
        let started = Instant::now();

        activate(&comm, &eth1(), scripts_dir(), &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(comm.executed().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_fatal() {
        let comm = ScriptedCommunicator::new(|_| Err(failure()));

        let result = activate(&comm, &eth1(), scripts_dir(), &RetryPolicy::default()).await;

        assert!(result.is_err());
        assert_eq!(comm.executed().len(), 3);
    }

    #[tokio::test]
    async fn non_transient_failures_are_not_retried() {
        let comm = ScriptedCommunicator::new(|_| {
            Err(comm::Error::BadTransportCommand {
                command: "ssh".to_string(),
                reason: "broken".to_string(),
            })
        });

        let result = activate(&comm, &eth1(), scripts_dir(), &RetryPolicy::default()).await;

        assert!(result.is_err());
        assert_eq!(comm.executed().len(), 1);
    }

    #[tokio::test]
    async fn script_mentions_no_other_interface() {
        let comm = ScriptedCommunicator::new(|_| Ok::<CommandOutput, comm::Error>(ok("")));
        activate(&comm, &eth1(), scripts_dir(), &RetryPolicy::default())
            .await
            .unwrap();

        for script in comm.executed() {
            assert!(!script.contains("eth0"));
            assert!(!script.contains("p7p"));
        }
    }
}
