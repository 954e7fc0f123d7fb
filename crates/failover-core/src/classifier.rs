//! Subnet classification
//!
//! Maps an observed external address onto the uplink it most likely
//! belongs to, given the configured primary and/or secondary ranges.
//!
//! ## Modes
//!
//! - **Both ranges**: membership decides; an address in neither range is
//!   [`Classification::Ambiguous`].
//! - **Primary only**: outside the primary range counts as secondary.
//! - **Secondary only**: outside the secondary range counts as primary.

use std::net::Ipv4Addr;

pub use ipnet::Ipv4Net;

use crate::error::{Error, Result};

/// Which uplink an observed address points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Traffic leaves through the primary uplink
    InPrimary,
    /// Traffic leaves through the secondary uplink
    InSecondary,
    /// The address matched neither configured range
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeMode {
    PrimaryOnly(Ipv4Net),
    SecondaryOnly(Ipv4Net),
    Both { primary: Ipv4Net, secondary: Ipv4Net },
}

/// Pure classifier over the configured address ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetClassifier {
    mode: RangeMode,
}

impl SubnetClassifier {
    /// Build a classifier; at least one range is required
    pub fn new(primary: Option<Ipv4Net>, secondary: Option<Ipv4Net>) -> Result<Self> {
        let mode = match (primary, secondary) {
            (Some(primary), Some(secondary)) => RangeMode::Both { primary, secondary },
            (Some(primary), None) => RangeMode::PrimaryOnly(primary),
            (None, Some(secondary)) => RangeMode::SecondaryOnly(secondary),
            (None, None) => {
                return Err(Error::config(
                    "At least one of the primary or secondary address ranges must be set",
                ));
            }
        };

        Ok(Self { mode })
    }

    /// The configured primary range, if any
    pub fn primary(&self) -> Option<Ipv4Net> {
        match self.mode {
            RangeMode::PrimaryOnly(primary) | RangeMode::Both { primary, .. } => Some(primary),
            RangeMode::SecondaryOnly(_) => None,
        }
    }

    /// The configured secondary range, if any
    pub fn secondary(&self) -> Option<Ipv4Net> {
        match self.mode {
            RangeMode::SecondaryOnly(secondary) | RangeMode::Both { secondary, .. } => {
                Some(secondary)
            }
            RangeMode::PrimaryOnly(_) => None,
        }
    }

    /// Classify an observed address
    pub fn classify(&self, addr: Ipv4Addr) -> Classification {
        match self.mode {
            RangeMode::PrimaryOnly(primary) => {
                if primary.contains(&addr) {
                    Classification::InPrimary
                } else {
                    Classification::InSecondary
                }
            }
            RangeMode::SecondaryOnly(secondary) => {
                if secondary.contains(&addr) {
                    Classification::InSecondary
                } else {
                    Classification::InPrimary
                }
            }
            // Primary wins when the ranges overlap.
            RangeMode::Both { primary, secondary } => {
                if primary.contains(&addr) {
                    Classification::InPrimary
                } else if secondary.contains(&addr) {
                    Classification::InSecondary
                } else {
                    Classification::Ambiguous
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_contains() {
        let range = net("88.42.1.0/24");
        assert_eq!(range.network(), ip("88.42.1.0"));
        assert_eq!(range.prefix_len(), 24);
        assert!(range.contains(&ip("88.42.1.0")));
        assert!(range.contains(&ip("88.42.1.255")));
        assert!(!range.contains(&ip("88.42.2.1")));
        assert_eq!(range.to_string(), "88.42.1.0/24");
    }

    #[test]
    fn test_edge_prefixes() {
        let everything = net("0.0.0.0/0");
        assert!(everything.contains(&ip("203.0.113.7")));

        let single = net("203.0.113.7/32");
        assert!(single.contains(&ip("203.0.113.7")));
        assert!(!single.contains(&ip("203.0.113.8")));
    }

    #[test]
    fn test_rejects_malformed_ranges() {
        assert!("88.42.1.0".parse::<Ipv4Net>().is_err());
        assert!("88.42.1.0/33".parse::<Ipv4Net>().is_err());
        assert!("no/24".parse::<Ipv4Net>().is_err());
        assert!("2001:db8::/32".parse::<Ipv4Net>().is_err());
    }

    #[test]
    fn test_host_bits_survive_parsing() {
        // Rejected later by UplinkConfig::validate
        let range = net("88.42.1.1/24");
        assert_ne!(range, range.trunc());
        assert_eq!(range.trunc(), net("88.42.1.0/24"));
    }

    #[test]
    fn test_serde_as_string() {
        let range: Ipv4Net = serde_json::from_str("\"10.0.0.0/8\"").unwrap();
        assert_eq!(range, net("10.0.0.0/8"));
        assert_eq!(serde_json::to_string(&range).unwrap(), "\"10.0.0.0/8\"");
        assert!(serde_json::from_str::<Ipv4Net>("\"10.0.0.0\"").is_err());
    }

    #[test]
    fn test_both_ranges() {
        let classifier =
            SubnetClassifier::new(Some(net("88.42.1.0/24")), Some(net("10.64.0.0/10"))).unwrap();

        assert_eq!(classifier.classify(ip("88.42.1.17")), Classification::InPrimary);
        assert_eq!(classifier.classify(ip("10.100.3.4")), Classification::InSecondary);
        assert_eq!(classifier.classify(ip("192.0.2.1")), Classification::Ambiguous);
    }

    #[test]
    fn test_overlapping_ranges_prefer_primary() {
        let classifier =
            SubnetClassifier::new(Some(net("10.1.0.0/16")), Some(net("10.0.0.0/8"))).unwrap();

        assert_eq!(classifier.classify(ip("10.1.2.3")), Classification::InPrimary);
        assert_eq!(classifier.classify(ip("10.2.2.3")), Classification::InSecondary);
    }

    #[test]
    fn test_primary_only_has_no_ambiguity() {
        let classifier = SubnetClassifier::new(Some(net("88.42.1.0/24")), None).unwrap();

        assert_eq!(classifier.classify(ip("88.42.1.17")), Classification::InPrimary);
        assert_eq!(classifier.classify(ip("192.0.2.1")), Classification::InSecondary);
        assert_eq!(classifier.secondary(), None);
    }

    #[test]
    fn test_secondary_only_has_no_ambiguity() {
        let classifier = SubnetClassifier::new(None, Some(net("10.64.0.0/10"))).unwrap();

        assert_eq!(classifier.classify(ip("10.100.3.4")), Classification::InSecondary);
        assert_eq!(classifier.classify(ip("192.0.2.1")), Classification::InPrimary);
        assert_eq!(classifier.primary(), None);
    }

    #[test]
    fn test_no_ranges_is_a_config_error() {
        let err = SubnetClassifier::new(None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
