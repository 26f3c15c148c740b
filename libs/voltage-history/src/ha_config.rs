//! "HA Configuration" sub-structure of a historized variable
//!
//! The set of readable attributes is fixed by [`HaConfigurationAttribute`].
//! Values are computed from the archive at read time.

use std::fmt;
use std::str::FromStr;

use crate::error::{HistoryError, Result};
use crate::variant::Variant;

pub const HA_CONFIGURATION_BROWSE_NAME: &str = "HA Configuration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HaConfigurationAttribute {
    /// Source timestamp of the oldest record held online
    StartOfOnlineArchive,
    /// Oldest record in any archive; equal to the online start here
    StartOfArchive,
    /// Whether values are stepped rather than interpolated
    Stepped,
    /// Online archive capacity
    MaxOnlineValues,
}

impl HaConfigurationAttribute {
    pub const ALL: [HaConfigurationAttribute; 4] = [
        HaConfigurationAttribute::StartOfOnlineArchive,
        HaConfigurationAttribute::StartOfArchive,
        HaConfigurationAttribute::Stepped,
        HaConfigurationAttribute::MaxOnlineValues,
    ];

    pub fn browse_name(self) -> &'static str {
        match self {
            HaConfigurationAttribute::StartOfOnlineArchive => "StartOfOnlineArchive",
            HaConfigurationAttribute::StartOfArchive => "StartOfArchive",
            HaConfigurationAttribute::Stepped => "Stepped",
            HaConfigurationAttribute::MaxOnlineValues => "MaxOnlineValues",
        }
    }
}

impl fmt::Display for HaConfigurationAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.browse_name())
    }
}

impl FromStr for HaConfigurationAttribute {
    type Err = HistoryError;

    /// Accepts the browse name (`StartOfOnlineArchive`) or its
    /// lower-camel property form (`startOfOnlineArchive`)
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| {
                let name = attr.browse_name();
                s == name || (s.len() == name.len() && lower_camel_eq(s, name))
            })
            .ok_or_else(|| HistoryError::UnknownAttribute(s.to_string()))
    }
}

fn lower_camel_eq(candidate: &str, browse_name: &str) -> bool {
    let mut c = candidate.chars();
    let mut b = browse_name.chars();
    match (c.next(), b.next()) {
        (Some(first_c), Some(first_b)) => {
            first_c == first_b.to_ascii_lowercase() && c.as_str() == b.as_str()
        },
        _ => false,
    }
}

/// Read access to the HA Configuration of a historized node
pub trait HaConfigurationSource {
    fn read_attribute(&self, attribute: HaConfigurationAttribute) -> Variant;

    fn read_attribute_by_name(&self, name: &str) -> Result<Variant> {
        Ok(self.read_attribute(name.parse()?))
    }

    fn browse_name(&self) -> &'static str {
        HA_CONFIGURATION_BROWSE_NAME
    }
}
