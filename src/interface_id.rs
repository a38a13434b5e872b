//! The interface_id module defines the validated identifiers this program exchanges with a guest:
//! kernel network interface names and hardware (MAC) addresses.
//!
//! The kernel's rules for a valid interface name:
//! https://elixir.bootlin.com/linux/v5.10.102/source/net/core/dev.c#L1138
use serde::{Deserialize, Serialize, Serializer};
use snafu::ensure;
use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;

/// A network interface name as the kernel would accept it: 1-15 characters, no whitespace, no
/// `.` or `/`, no line terminators.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub(crate) struct InterfaceName {
    inner: String,
}

impl InterfaceName {
    /// The `ethN`-style name a given 1-based request slot implies, used when reconciling a
    /// persistent naming tool's previous-session names with the slots a caller asked for.
    pub(crate) fn ethn_for_slot(slot: u32) -> Self {
        // "eth" plus a decimal fits the kernel length rule for any u32
        Self {
            inner: format!("eth{}", slot),
        }
    }
}

impl TryFrom<String> for InterfaceName {
    type Error = error::Error;

    fn try_from(input: String) -> Result<Self> {
        // `str::lines` does not split on all Unicode line terminators, so check the set
        // explicitly.  https://en.wikipedia.org/wiki/Newline#Unicode
        const LINE_TERMINATORS: [char; 7] = [
            '\n', '\r', '\u{000B}', '\u{000C}', '\u{0085}', '\u{2028}', '\u{2029}',
        ];

        ensure!(
            !input.is_empty() && input.len() <= 15,
            error::BadInterfaceNameSnafu {
                input,
                reason: "must be 1 to 15 characters long",
            }
        );
        ensure!(
            !input.contains(&LINE_TERMINATORS[..]),
            error::BadInterfaceNameSnafu {
                input,
                reason: "contains a line terminator",
            }
        );
        ensure!(
            !input.contains('.') && !input.contains('/') && !input.contains(char::is_whitespace),
            error::BadInterfaceNameSnafu {
                input,
                reason: "contains '.', '/', or whitespace",
            }
        );

        Ok(Self { inner: input })
    }
}

impl TryFrom<&str> for InterfaceName {
    type Error = error::Error;

    fn try_from(input: &str) -> Result<Self> {
        Self::try_from(input.to_string())
    }
}

impl Deref for InterfaceName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Serialize for InterfaceName {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.inner)
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A hardware address, stored lowercase and colon-separated so addresses read from a guest and
/// addresses supplied by a caller compare equal regardless of case or separator.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub(crate) struct MacAddress {
    inner: String,
}

impl TryFrom<String> for MacAddress {
    type Error = error::Error;

    fn try_from(input: String) -> Result<Self> {
        let octets: Vec<&str> = input.split(|c| c == '-' || c == ':').collect();

        ensure!(
            octets.len() == 6,
            error::BadMacAddressSnafu {
                input,
                reason: "must have 6 octets",
            }
        );
        for octet in &octets {
            ensure!(
                octet.len() == 2 && u8::from_str_radix(octet, 16).is_ok(),
                error::BadMacAddressSnafu {
                    input,
                    reason: "octets must be 2 hex digits",
                }
            );
        }

        Ok(Self {
            inner: octets.join(":").to_lowercase(),
        })
    }
}

impl TryFrom<&str> for MacAddress {
    type Error = error::Error;

    fn try_from(input: &str) -> Result<Self> {
        Self::try_from(input.to_string())
    }
}

impl Deref for MacAddress {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Serialize for MacAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.inner)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("Invalid interface name '{}': {}", input, reason))]
        BadInterfaceName { input: String, reason: String },

        #[snafu(display("Invalid MAC address '{}': {}", input, reason))]
        BadMacAddress { input: String, reason: String },
    }
}

pub(crate) use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
