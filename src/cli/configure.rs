use super::{error, print_json, Result, DEFAULT_SCRIPTS_DIR};
use crate::comm::shell::ShellTransport;
use crate::comm::Communicator;
use crate::interface_id::{InterfaceName, MacAddress};
use crate::render::{self, EntryRenderer, TemplateRenderer};
use crate::requests::{EntryKind, NetworkRequest, RequestSet};
use crate::retry::{self, RetryPolicy};
use crate::{activation, devices, entry, matching};
use argh::FromArgs;
use log::{debug, error, info, warn};
use serde::Serialize;
use snafu::{ensure, ResultExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "configure")]
/// Assign requested networks to the guest's interfaces and bring them up
pub(crate) struct ConfigureArgs {
    #[argh(option, short = 'r')]
    /// path to the TOML requests file
    requests: PathBuf,

    #[argh(option)]
    /// command that runs a shell on the guest reading a script from stdin,
    /// e.g. "ssh admin@guest sudo sh"
    execute_via: String,

    #[argh(option)]
    /// copy command with {local} and {remote} placeholders,
    /// e.g. "scp {local} admin@guest:{remote}"
    upload_via: String,

    #[argh(option, default = "PathBuf::from(DEFAULT_SCRIPTS_DIR)")]
    /// directory on the guest holding per-interface config files
    scripts_dir: PathBuf,

    #[argh(option, default = "retry::DEFAULT_ATTEMPTS")]
    /// activation attempts per interface
    activation_attempts: usize,

    #[argh(option, default = "retry::DEFAULT_DELAY.as_secs()")]
    /// seconds between activation attempts
    activation_delay: u64,
}

/// One line of the run summary: the request as given, plus the interface it landed on (or
/// null if it was inapplicable on this guest).
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ResolvedRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    slot: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mac_address: Option<&'a MacAddress>,
    kind: EntryKind,
    device: Option<&'a InterfaceName>,
}

impl<'a> From<&'a NetworkRequest> for ResolvedRequest<'a> {
    fn from(request: &'a NetworkRequest) -> Self {
        Self {
            slot: request.slot,
            mac_address: request.mac_address.as_ref(),
            kind: request.kind,
            device: request.device.as_ref(),
        }
    }
}

pub(crate) async fn run(args: ConfigureArgs) -> Result<()> {
    let mut set = RequestSet::from_path(&args.requests).context(error::RequestsLoadSnafu)?;
    let transport =
        ShellTransport::new(&args.execute_via, &args.upload_via).context(error::TransportSnafu)?;
    let renderer = TemplateRenderer::new().context(error::RendererBuildSnafu)?;
    let policy = RetryPolicy {
        attempts: args.activation_attempts,
        delay: Duration::from_secs(args.activation_delay),
    };

    configure(&transport, &renderer, &mut set, &args.scripts_dir, &policy).await?;

    let summary: Vec<ResolvedRequest<'_>> = set.requests.iter().map(Into::into).collect();
    print_json(&summary)
}

/// The provisioning pipeline: probe the guest's naming scheme, enumerate its interfaces,
/// match requests to devices, stage each matched entry, then activate exactly the touched
/// interfaces.
///
/// A request whose staging fails is dropped and the run continues.  Activation failures are
/// collected and reported together after every touched interface has been attempted; nothing
/// is rolled back.
pub(crate) async fn configure<C, R>(
    comm: &C,
    renderer: &R,
    set: &mut RequestSet,
    scripts_dir: &Path,
    policy: &RetryPolicy,
) -> Result<()>
where
    C: Communicator,
    R: EntryRenderer,
{
    let mode = devices::probe_naming_mode(comm).await.context(error::ProbeSnafu)?;
    debug!("guest device naming classified as {:?}", mode);

    let interfaces = devices::enumerate(comm, mode).await.context(error::EnumerateSnafu)?;
    info!("guest has {} manageable interfaces", interfaces.len());

    let mut touched = matching::assign(&mut set.requests, &interfaces, mode);
    info!(
        "matched {} of {} requests",
        touched.len(),
        set.requests.len()
    );

    for index in 0..set.requests.len() {
        let device = match &set.requests[index].device {
            Some(device) => device.clone(),
            None => continue,
        };

        if let Err(e) =
            stage_request(comm, renderer, &set.requests[index], &device, scripts_dir).await
        {
            warn!("dropping request for '{}': {}", device, e);
            set.requests[index].device = None;

            // Leave the interface eligible for activation only if another request still
            // holds it.
            let still_held = set
                .requests
                .iter()
                .any(|r| r.device.as_ref() == Some(&device));
            if !still_held {
                touched.retain(|name| name != &device);
            }
        }
    }

    let mut failed = Vec::new();
    for interface in &touched {
        match activation::activate(comm, interface, scripts_dir, policy).await {
            Ok(()) => info!("activated '{}'", interface),
            Err(e) => {
                error!("{}", e);
                failed.push(interface.to_string());
            }
        }
    }
    ensure!(
        failed.is_empty(),
        error::ActivationSnafu {
            interfaces: failed.join(", "),
        }
    );

    Ok(())
}

async fn stage_request<C, R>(
    comm: &C,
    renderer: &R,
    request: &NetworkRequest,
    interface: &InterfaceName,
    scripts_dir: &Path,
) -> Result<()>
where
    C: Communicator,
    R: EntryRenderer,
{
    let context = render::entry_context(request).context(error::EntryContextSnafu)?;
    let entry_text = renderer
        .render(request.kind.template_key(), &context)
        .context(error::EntryRenderSnafu { interface: &**interface })?;

    entry::stage(comm, &entry_text, interface, scripts_dir)
        .await
        .context(error::StageSnafu { interface: &**interface })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::mock::FakeGuest;

    const SCRIPTS_DIR: &str = "/etc/sysconfig/network-scripts";
    const PROBE: &str = "/usr/sbin/biosdevname >/dev/null 2>&1; echo $?";
    const LIST_KERNEL: &str = "ls -v /sys/class/net | egrep -v 'lo|docker'";

    fn virtual_guest(listing: &str) -> FakeGuest {
        FakeGuest::new(&[(PROBE, "127\n"), (LIST_KERNEL, listing)])
    }

    fn set(toml: &str) -> RequestSet {
        toml.parse().unwrap()
    }

    async fn run_configure(guest: &FakeGuest, set: &mut RequestSet) -> Result<()> {
        let renderer = TemplateRenderer::new().unwrap();
        configure(
            guest,
            &renderer,
            set,
            Path::new(SCRIPTS_DIR),
            &RetryPolicy::default(),
        )
        .await
    }

    #[tokio::test]
    async fn full_run_configures_and_activates_matched_interfaces() {
        let guest = virtual_guest("eth0\neth1\n");
        guest.write_file("/sys/class/net/eth0/address", "aa:00:00:00:00:01\n");
        guest.write_file("/sys/class/net/eth1/address", "bb:00:00:00:00:02\n");

        let mut set = set(r#"
            [[request]]
            slot = 1
            kind = "dhcp"

            [[request]]
            mac-address = "bb:00:00:00:00:02"
            kind = "static"
            [request.options]
            ip = "192.168.50.10"
            netmask = "255.255.255.0"
        "#);

        run_configure(&guest, &mut set).await.unwrap();

        assert_eq!(&**set.requests[0].device.as_ref().unwrap(), "eth0");
        assert_eq!(&**set.requests[1].device.as_ref().unwrap(), "eth1");

        let eth0_config = guest
            .read_file("/etc/sysconfig/network-scripts/ifcfg-eth0")
            .unwrap();
        assert!(eth0_config.contains("BOOTPROTO=dhcp"));
        assert!(eth0_config.contains("DEVICE=eth0"));

        let eth1_config = guest
            .read_file("/etc/sysconfig/network-scripts/ifcfg-eth1")
            .unwrap();
        assert!(eth1_config.contains("IPADDR=192.168.50.10"));

        // staged entries were consumed
        assert_eq!(guest.read_file("/tmp/herddog-network-entry_eth0"), None);
        assert_eq!(guest.read_file("/tmp/herddog-network-entry_eth1"), None);
    }

    #[tokio::test]
    async fn repeated_runs_leave_a_single_owned_block() {
        let guest = virtual_guest("eth0\n");
        guest.write_file("/sys/class/net/eth0/address", "aa:00:00:00:00:01\n");
        guest.write_file(
            "/etc/sysconfig/network-scripts/ifcfg-eth0",
            "# admin note\nMTU=9000\n",
        );

        for _ in 0..2 {
            let mut requests = set(r#"
                [[request]]
                slot = 1
                kind = "dhcp"
            "#);
            run_configure(&guest, &mut requests).await.unwrap();
        }

        let config = guest
            .read_file("/etc/sysconfig/network-scripts/ifcfg-eth0")
            .unwrap();
        assert_eq!(config.matches(crate::entry::BLOCK_BEGIN).count(), 1);
        assert_eq!(config.matches(crate::entry::BLOCK_END).count(), 1);
        assert!(config.contains("# admin note"));
        assert!(config.contains("MTU=9000"));
    }

    #[tokio::test]
    async fn unmatched_requests_touch_nothing() {
        let guest = virtual_guest("eth0\n");
        guest.write_file("/sys/class/net/eth0/address", "aa:00:00:00:00:01\n");

        let mut requests = set(r#"
            [[request]]
            mac-address = "cc:00:00:00:00:09"
            kind = "dhcp"
        "#);

        run_configure(&guest, &mut requests).await.unwrap();

        assert!(requests.requests[0].device.is_none());
        assert_eq!(guest.read_file("/etc/sysconfig/network-scripts/ifcfg-eth0"), None);
        // no activation script ran: every executed command was probe/listing/address reads
        for script in guest.executed() {
            assert!(!script.contains("ifup"), "unexpected: {}", script);
        }
    }

    #[tokio::test]
    async fn control_channel_interface_is_never_cycled() {
        // p7p1 is the NAT interface carrying our control channel; the whitelist keeps it
        // out of the enumeration entirely
        let guest = virtual_guest("eth0\np7p1\n");
        guest.write_file("/sys/class/net/eth0/address", "aa:00:00:00:00:01\n");

        let mut requests = set(r#"
            [[request]]
            slot = 1
            kind = "dhcp"
        "#);

        run_configure(&guest, &mut requests).await.unwrap();

        for script in guest.executed() {
            assert!(!script.contains("p7p1"), "control channel touched: {}", script);
        }
    }
}
