//! The devices module discovers a guest's physical network interfaces: it probes which device
//! naming scheme the guest uses, lists the interfaces in canonical order, and reads each one's
//! hardware address.
//!
//! Guests fall into two naming worlds.  Virtual machines (or machines without the naming tool)
//! keep the kernel's own device order.  Bare metal machines run the naming tool's persistent
//! policy, which can reorder devices between boots; for those we also capture the `ethN` name
//! the tool reports for the previous session so the matcher can prune devices the caller did
//! not ask about.
use crate::comm::{Communicator, ErrorCheck};
use crate::interface_id::{InterfaceName, MacAddress};
use lazy_static::lazy_static;
use regex::Regex;
use snafu::ResultExt;
use std::convert::TryFrom;

const NAMING_TOOL: &str = "/usr/sbin/biosdevname";
const SYS_CLASS_NET: &str = "/sys/class/net";

// biosdevname exit codes from its man page: 4 means it detected a virtual machine and declined
// to run; 127 is the shell telling us the tool does not exist.
const CHASSIS_IS_VIRTUAL: &str = "4";
const TOOL_IS_MISSING: &str = "127";

lazy_static! {
    static ref PHYSICAL_NAMES: NamePatterns = NamePatterns::new(&[
        r"^en\w\d", r"^sl\w\d", r"^wl\w\d", r"^ww\w\d", r"^em\w\d", r"^p\w\d", r"^eth\d",
    ]);
}

/// The whitelist of device name shapes we treat as physical interfaces.  Lines from a guest
/// that match nothing here are dropped, not rejected: listings routinely contain loopbacks,
/// bridges, and other devices this program has no business configuring.
pub(crate) struct NamePatterns {
    patterns: Vec<Regex>,
}

impl NamePatterns {
    fn new(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("invalid device name pattern"))
                .collect(),
        }
    }

    pub(crate) fn physical() -> &'static Self {
        &PHYSICAL_NAMES
    }

    pub(crate) fn matches(&self, line: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(line))
    }

    /// The whitelist-matching lines of a listing, in the listing's order.
    pub(crate) fn filter_lines<'a>(&'a self, output: &'a str) -> impl Iterator<Item = &'a str> {
        output
            .lines()
            .map(str::trim)
            .filter(move |line| self.matches(line))
    }
}

/// Which enumeration strategy applies to this guest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum NamingMode {
    /// Kernel device order, as on virtual machines or machines without the naming tool.
    Virtual,
    /// The naming tool's persistent policy order.
    Persistent,
}

/// One physical interface as enumerated from the guest.  Rebuilt fresh on every run; the
/// enumeration order is the containing vector's order.
#[derive(Clone, Debug)]
pub(crate) struct PhysicalInterface {
    pub(crate) name: InterfaceName,
    pub(crate) mac: MacAddress,
    /// The `ethN`-style name the naming tool reports for this device from the previous
    /// session.  Only populated on the persistent path, and only when the tool's answer looks
    /// like a device name.
    pub(crate) prior_ethn: Option<InterfaceName>,
}

/// Classify the guest's device naming behavior by running the naming tool and reading its exit
/// status.
pub(crate) async fn probe_naming_mode<C>(comm: &C) -> Result<NamingMode>
where
    C: Communicator,
{
    let script = format!("{} >/dev/null 2>&1; echo $?", NAMING_TOOL);
    let output = comm
        .execute(&script, ErrorCheck::Enforce)
        .await
        .context(error::ProbeSnafu)?;

    Ok(match output.trimmed() {
        CHASSIS_IS_VIRTUAL | TOOL_IS_MISSING => NamingMode::Virtual,
        _ => NamingMode::Persistent,
    })
}

/// List the guest's physical interfaces in canonical order, with hardware addresses.
pub(crate) async fn enumerate<C>(comm: &C, mode: NamingMode) -> Result<Vec<PhysicalInterface>>
where
    C: Communicator,
{
    let names = match mode {
        NamingMode::Virtual => list_kernel_order(comm).await?,
        NamingMode::Persistent => list_tool_order(comm).await?,
    };

    let mut interfaces = Vec::with_capacity(names.len());
    for (name, prior_ethn) in names {
        let mac = read_mac(comm, &name).await?;
        interfaces.push(PhysicalInterface {
            name,
            mac,
            prior_ethn,
        });
    }
    Ok(interfaces)
}

/// Virtual path: version-sorted kernel device listing, minus the loopback and container bridge
/// devices, filtered through the whitelist.
async fn list_kernel_order<C>(comm: &C) -> Result<Vec<(InterfaceName, Option<InterfaceName>)>>
where
    C: Communicator,
{
    let script = format!("ls -v {} | egrep -v 'lo|docker'", SYS_CLASS_NET);
    let output = comm
        .execute(&script, ErrorCheck::Enforce)
        .await
        .context(error::ListSnafu)?;

    parse_names(&output.stdout).map(|names| names.into_iter().map(|n| (n, None)).collect())
}

/// Persistent path: the naming tool's kernel-name mapping in tool order, plus each device's
/// previous-session `ethN` policy name.
async fn list_tool_order<C>(comm: &C) -> Result<Vec<(InterfaceName, Option<InterfaceName>)>>
where
    C: Communicator,
{
    let script = format!(
        "{} -d | grep Kernel | cut -f2 -d: | sed -e 's/ //;'",
        NAMING_TOOL
    );
    let output = comm
        .execute(&script, ErrorCheck::Enforce)
        .await
        .context(error::ListSnafu)?;
    let names = parse_names(&output.stdout)?;

    let mut pairs = Vec::with_capacity(names.len());
    for name in names {
        let script = format!("{} --policy=all_ethN -i {}", NAMING_TOOL, name);
        let output = comm
            .execute(&script, ErrorCheck::Enforce)
            .await
            .context(error::PriorNameSnafu { interface: &*name })?;

        // An answer that doesn't look like a device name leaves the prior name unknown; the
        // matcher keeps such interfaces in the slot table.
        let prior = NamePatterns::physical()
            .filter_lines(&output.stdout)
            .next()
            .map(InterfaceName::try_from)
            .transpose()
            .context(error::BadDeviceNameSnafu)?;
        pairs.push((name, prior));
    }
    Ok(pairs)
}

fn parse_names(listing: &str) -> Result<Vec<InterfaceName>> {
    NamePatterns::physical()
        .filter_lines(listing)
        .map(|line| InterfaceName::try_from(line).context(error::BadDeviceNameSnafu))
        .collect()
}

/// Read one interface's hardware address from the guest's per-device address file.
async fn read_mac<C>(comm: &C, name: &InterfaceName) -> Result<MacAddress>
where
    C: Communicator,
{
    let script = format!("cat {}/{}/address", SYS_CLASS_NET, name);
    let output = comm
        .execute(&script, ErrorCheck::Enforce)
        .await
        .context(error::MacReadSnafu { interface: &**name })?;

    MacAddress::try_from(output.trimmed()).context(error::BadMacSnafu { interface: &**name })
}

mod error {
    use crate::{comm, interface_id};
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to probe the guest's device naming tool: {}", source))]
        Probe { source: comm::Error },

        #[snafu(display("Failed to list the guest's network devices: {}", source))]
        List { source: comm::Error },

        #[snafu(display("Failed to query previous name for '{}': {}", interface, source))]
        PriorName {
            interface: String,
            source: comm::Error,
        },

        #[snafu(display("Device listing produced an unusable name: {}", source))]
        BadDeviceName { source: interface_id::Error },

        #[snafu(display("Failed to read hardware address of '{}': {}", interface, source))]
        MacRead {
            interface: String,
            source: comm::Error,
        },

        #[snafu(display("Guest reported an unusable hardware address for '{}': {}", interface, source))]
        BadMac {
            interface: String,
            source: interface_id::Error,
        },
    }
}

pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
