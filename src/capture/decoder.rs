use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::icmpv6::Icmpv6Packet;
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use crate::analysis::TransportFlags;
use crate::capture::DecodedPacket;

/// Decodes an Ethernet frame into the fields the engine consumes.
///
/// Never fails: frames that are not IPv4/IPv6, or are too short to hold an
/// IP header, come back with `has_ip == false`. A transport flag is only set
/// when the transport header is actually present in the payload.
pub fn decode_frame(data: &[u8], timestamp: f64) -> DecodedPacket {
    let mut decoded = DecodedPacket {
        byte_length: data.len() as u64,
        timestamp,
        ..DecodedPacket::default()
    };

    let Some(ethernet) = EthernetPacket::new(data) else {
        return decoded;
    };

    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 => {
            if let Some(ipv4) = Ipv4Packet::new(ethernet.payload()) {
                let protocol = ipv4.get_next_level_protocol();
                decoded.has_ip = true;
                decoded.source_addr = Some(ipv4.get_source().to_string());
                decoded.dest_addr = Some(ipv4.get_destination().to_string());
                decoded.ip_protocol = Some(protocol.0);
                decoded.transport = transport_flags(protocol, ipv4.payload());
            }
        }
        EtherTypes::Ipv6 => {
            if let Some(ipv6) = Ipv6Packet::new(ethernet.payload()) {
                let protocol = ipv6.get_next_header();
                decoded.has_ip = true;
                decoded.source_addr = Some(ipv6.get_source().to_string());
                decoded.dest_addr = Some(ipv6.get_destination().to_string());
                decoded.ip_protocol = Some(protocol.0);
                decoded.transport = transport_flags(protocol, ipv6.payload());
            }
        }
        _ => {}
    }

    decoded
}

fn transport_flags(protocol: IpNextHeaderProtocol, payload: &[u8]) -> TransportFlags {
    let mut flags = TransportFlags::default();
    match protocol {
        IpNextHeaderProtocols::Tcp => flags.tcp = TcpPacket::new(payload).is_some(),
        IpNextHeaderProtocols::Udp => flags.udp = UdpPacket::new(payload).is_some(),
        IpNextHeaderProtocols::Icmp => flags.icmp = IcmpPacket::new(payload).is_some(),
        IpNextHeaderProtocols::Icmpv6 => flags.icmp = Icmpv6Packet::new(payload).is_some(),
        _ => {}
    }
    flags
}
