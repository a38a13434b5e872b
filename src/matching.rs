//! The matching module maps each network request to exactly one enumerated interface: by
//! hardware address when the request names one, by slot position otherwise.
//!
//! Slot positions index into a slot table derived from the enumeration.  With kernel-order
//! naming the table is the enumeration itself.  With a persistent naming tool the table is
//! pruned first: a device whose previous-session `ethN` name is not implied by any requested
//! slot is one the caller has no opinion about, and reconfiguring it would fight the tool's
//! own renaming across boots.
use crate::devices::{NamingMode, PhysicalInterface};
use crate::interface_id::InterfaceName;
use crate::requests::NetworkRequest;
use log::debug;
use std::collections::HashSet;

/// Resolve requests against the enumerated interfaces, in input order.  Returns the touched
/// set: the interface names that received an assignment this run, in claim order.  Each
/// resolved request gets its `device` filled in.
///
/// A request that cannot be resolved (its MAC is not on this guest, or its slot's interface
/// is already claimed or beyond the table) is skipped, not failed; hardware the caller asked
/// about may simply not be attached here.
pub(crate) fn assign(
    requests: &mut [NetworkRequest],
    interfaces: &[PhysicalInterface],
    mode: NamingMode,
) -> Vec<InterfaceName> {
    let by_slot = slot_table(requests, interfaces, mode);
    let mut touched: Vec<InterfaceName> = Vec::new();

    for request in requests.iter_mut() {
        let interface = if let Some(mac) = &request.mac_address {
            // MAC lookups search the full enumeration, not the slot table, and may re-claim
            // an interface; the touched set stays deduplicated below.
            match interfaces.iter().find(|i| &i.mac == mac) {
                Some(found) => found.name.clone(),
                None => {
                    debug!("no interface with MAC '{}' on this guest, skipping", mac);
                    continue;
                }
            }
        } else {
            let slot = match request.slot {
                Some(slot) => slot,
                None => continue,
            };
            match (slot as usize)
                .checked_sub(1)
                .and_then(|index| by_slot.get(index))
            {
                Some(name) if touched.contains(name) => {
                    // A MAC-based claim on this interface wins over a positional one.
                    debug!("slot {} resolves to already-claimed '{}', skipping", slot, name);
                    continue;
                }
                Some(name) => name.clone(),
                None => {
                    debug!("slot {} is beyond the guest's slot table, skipping", slot);
                    continue;
                }
            }
        };

        if !touched.contains(&interface) {
            touched.push(interface.clone());
        }
        request.device = Some(interface);
    }

    touched
}

/// The interface name each slot position refers to, in order.
fn slot_table(
    requests: &[NetworkRequest],
    interfaces: &[PhysicalInterface],
    mode: NamingMode,
) -> Vec<InterfaceName> {
    match mode {
        NamingMode::Virtual => interfaces.iter().map(|i| i.name.clone()).collect(),
        NamingMode::Persistent => {
            let requested_ethns: HashSet<InterfaceName> = requests
                .iter()
                .filter_map(|r| r.slot)
                .map(InterfaceName::ethn_for_slot)
                .collect();

            interfaces
                .iter()
                .filter(|i| match &i.prior_ethn {
                    Some(prior) => requested_ethns.contains(prior),
                    // No usable previous name means no evidence against managing it.
                    None => true,
                })
                .map(|i| i.name.clone())
                .collect()
        }
    }
}
