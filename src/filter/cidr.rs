//! CIDR block parsing and membership.
//!
//! Blocks are normalised at construction: host bits below the prefix are
//! masked off, so `192.168.1.7/24` and `192.168.1.0/24` are the same block.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

/// Why a CIDR string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrParseError {
    #[error("missing '/' prefix length")]
    MissingPrefix,

    #[error("invalid network address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("invalid prefix length {0:?}")]
    PrefixLength(String),
}

/// A contiguous IPv4 or IPv6 address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CidrBlock {
    V4 { network: u32, prefix: u8 },
    V6 { network: u128, prefix: u8 },
}

impl CidrBlock {
    /// Returns true if `ip` falls within this block.
    ///
    /// Addresses of the other family never match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self, ip) {
            (CidrBlock::V4 { network, prefix }, IpAddr::V4(addr)) => {
                u32::from(addr) & v4_mask(*prefix) == *network
            }
            (CidrBlock::V6 { network, prefix }, IpAddr::V6(addr)) => {
                u128::from(addr) & v6_mask(*prefix) == *network
            }
            _ => false,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        match self {
            CidrBlock::V4 { prefix, .. } | CidrBlock::V6 { prefix, .. } => *prefix,
        }
    }
}

fn v4_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn v6_mask(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl FromStr for CidrBlock {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.trim().split_once('/').ok_or(CidrParseError::MissingPrefix)?;
        let addr: IpAddr = addr.parse()?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| CidrParseError::PrefixLength(prefix.to_string()))?;

        match addr {
            IpAddr::V4(v4) => {
                if prefix > 32 {
                    return Err(CidrParseError::PrefixLength(prefix.to_string()));
                }
                Ok(CidrBlock::V4 {
                    network: u32::from(v4) & v4_mask(prefix),
                    prefix,
                })
            }
            IpAddr::V6(v6) => {
                if prefix > 128 {
                    return Err(CidrParseError::PrefixLength(prefix.to_string()));
                }
                Ok(CidrBlock::V6 {
                    network: u128::from(v6) & v6_mask(prefix),
                    prefix,
                })
            }
        }
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CidrBlock::V4 { network, prefix } => {
                write!(f, "{}/{}", Ipv4Addr::from(*network), prefix)
            }
            CidrBlock::V6 { network, prefix } => {
                write!(f, "{}/{}", Ipv6Addr::from(*network), prefix)
            }
        }
    }
}
