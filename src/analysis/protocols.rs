use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Transport-level classification of an observed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolLabel {
    Tcp,
    Udp,
    Icmp,
    /// IP packet carrying some other next-level protocol (raw IP protocol number).
    IpOther(Option<u8>),
    NonIp,
}

impl fmt::Display for ProtocolLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolLabel::Tcp => write!(f, "TCP"),
            ProtocolLabel::Udp => write!(f, "UDP"),
            ProtocolLabel::Icmp => write!(f, "ICMP"),
            ProtocolLabel::IpOther(Some(number)) => write!(f, "IP_OTHER({})", number),
            ProtocolLabel::IpOther(None) => write!(f, "IP_OTHER(?)"),
            ProtocolLabel::NonIp => write!(f, "NON_IP"),
        }
    }
}

// Serialized as its display form so counter maps get string keys.
impl Serialize for ProtocolLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Header presence flags for the transport layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportFlags {
    pub tcp: bool,
    pub udp: bool,
    pub icmp: bool,
}

/// Maps header presence to a label. First match wins:
/// no IP, then TCP, UDP, ICMP, and finally `IpOther`.
pub fn classify(
    has_ip: bool,
    ip_protocol: Option<u8>,
    has_tcp: bool,
    has_udp: bool,
    has_icmp: bool,
) -> ProtocolLabel {
    if !has_ip {
        ProtocolLabel::NonIp
    } else if has_tcp {
        ProtocolLabel::Tcp
    } else if has_udp {
        ProtocolLabel::Udp
    } else if has_icmp {
        ProtocolLabel::Icmp
    } else {
        ProtocolLabel::IpOther(ip_protocol)
    }
}

pub fn classify_flags(has_ip: bool, ip_protocol: Option<u8>, flags: TransportFlags) -> ProtocolLabel {
    classify(has_ip, ip_protocol, flags.tcp, flags.udp, flags.icmp)
}
