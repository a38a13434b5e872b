//! The requests module contains the structures needed to deserialize a requests file: the
//! caller's declaration of which networks to put on which guest interfaces.
//!
//! A request addresses an interface either by 1-based slot or by hardware address; the MAC
//! wins when both are present.  Everything under `options` is an opaque bag handed to the
//! entry renderer.
use crate::interface_id::{InterfaceName, MacAddress};
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Which configuration entry template a request uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum EntryKind {
    Dhcp,
    Static,
    Static6,
}

impl EntryKind {
    pub(crate) fn template_key(&self) -> &'static str {
        match self {
            EntryKind::Dhcp => "network_dhcp",
            EntryKind::Static => "network_static",
            EntryKind::Static6 => "network_static6",
        }
    }
}

/// One logical network a caller wants on the guest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct NetworkRequest {
    /// 1-based positional index into the guest's slot table.
    pub(crate) slot: Option<u32>,
    /// Hardware address of the wanted interface; takes precedence over `slot`.
    pub(crate) mac_address: Option<MacAddress>,
    pub(crate) kind: EntryKind,
    /// Opaque renderer context (addresses, netmasks, whatever the templates consume).
    #[serde(default)]
    pub(crate) options: toml::Table,
    /// The physical interface this request resolved to, filled in by the matcher.
    #[serde(skip)]
    pub(crate) device: Option<InterfaceName>,
}

/// The parsed requests file.
#[derive(Debug, Deserialize)]
pub(crate) struct RequestSet {
    #[serde(rename = "request", default)]
    pub(crate) requests: Vec<NetworkRequest>,
}

impl RequestSet {
    pub(crate) fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let requests_str = fs::read_to_string(path).context(error::ReadSnafu { path })?;
        requests_str.parse()
    }

    fn validate(&self) -> Result<()> {
        let mut slots = HashSet::new();
        let mut macs = HashSet::new();

        for (index, request) in self.requests.iter().enumerate() {
            ensure!(
                request.slot.is_some() || request.mac_address.is_some(),
                error::UnaddressedSnafu { index }
            );
            if let Some(slot) = request.slot {
                ensure!(slot >= 1, error::BadSlotSnafu { index, slot });
                ensure!(slots.insert(slot), error::DuplicateSlotSnafu { slot });
            }
            if let Some(mac) = &request.mac_address {
                ensure!(
                    macs.insert(mac.clone()),
                    error::DuplicateMacSnafu { mac: &**mac }
                );
            }
        }
        Ok(())
    }
}

impl FromStr for RequestSet {
    type Err = error::Error;

    fn from_str(requests_str: &str) -> Result<Self> {
        let set: RequestSet = toml::from_str(requests_str).context(error::ParseSnafu)?;
        set.validate()?;
        Ok(set)
    }
}

mod error {
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Failed to read requests file '{}': {}", path.display(), source))]
        Read { path: PathBuf, source: io::Error },

        #[snafu(display("Failed to parse requests file: {}", source))]
        Parse { source: toml::de::Error },

        #[snafu(display("Request {} has neither a slot nor a MAC address", index))]
        Unaddressed { index: usize },

        #[snafu(display("Request {} has slot {}; slots are numbered from 1", index, slot))]
        BadSlot { index: usize, slot: u32 },

        #[snafu(display("More than one request for slot {}", slot))]
        DuplicateSlot { slot: u32 },

        #[snafu(display("More than one request for MAC address '{}'", mac))]
        DuplicateMac { mac: String },
    }
}

pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slot_and_mac_requests() {
        let set: RequestSet = r#"
            [[request]]
            slot = 1
            kind = "static"
            [request.options]
            ip = "192.168.50.10"
            netmask = "255.255.255.0"

            [[request]]
            mac-address = "52:54:00:AA:BB:CC"
            kind = "dhcp"
        "#
        .parse()
        .unwrap();

        assert_eq!(set.requests.len(), 2);
        assert_eq!(set.requests[0].slot, Some(1));
        assert_eq!(set.requests[0].kind, EntryKind::Static);
        assert_eq!(
            set.requests[0].options.get("ip").and_then(|v| v.as_str()),
            Some("192.168.50.10")
        );
        assert_eq!(
            &**set.requests[1].mac_address.as_ref().unwrap(),
            "52:54:00:aa:bb:cc"
        );
    }

    #[test]
    fn empty_file_is_an_empty_set() {
        let set: RequestSet = "".parse().unwrap();
        assert!(set.requests.is_empty());
    }

    #[test]
    fn rejects_unaddressed_requests() {
        let result: Result<RequestSet> = r#"
            [[request]]
            kind = "dhcp"
        "#
        .parse();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_slot_zero() {
        let result: Result<RequestSet> = r#"
            [[request]]
            slot = 0
            kind = "dhcp"
        "#
        .parse();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_duplicate_slots_and_macs() {
        let dup_slot: Result<RequestSet> = r#"
            [[request]]
            slot = 2
            kind = "dhcp"
            [[request]]
            slot = 2
            kind = "static"
        "#
        .parse();
        assert!(dup_slot.is_err());

        // separator and case differences still collide
        let dup_mac: Result<RequestSet> = r#"
            [[request]]
            mac-address = "52:54:00:aa:bb:cc"
            kind = "dhcp"
            [[request]]
            mac-address = "52-54-00-AA-BB-CC"
            kind = "dhcp"
        "#
        .parse();
        assert!(dup_mac.is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<RequestSet> = r#"
            [[request]]
            slot = 1
            kind = "dhcp"
            interface = "eth0"
        "#
        .parse();
        assert!(result.is_err());
    }
}
