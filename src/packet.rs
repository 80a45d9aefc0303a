use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
    Other,
}

/// What the aggregator needs to know about one captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketDescriptor {
    pub has_ip_layer: bool,
    pub source_port: Option<u16>,
    /// Length of the whole captured frame, link header included.
    pub byte_length: usize,
    pub transport: Option<Transport>,
}

impl PacketDescriptor {
    pub fn non_ip(byte_length: usize) -> Self {
        PacketDescriptor {
            has_ip_layer: false,
            source_port: None,
            byte_length,
            transport: None,
        }
    }

    pub fn tcp(source_port: u16, byte_length: usize) -> Self {
        PacketDescriptor {
            has_ip_layer: true,
            source_port: Some(source_port),
            byte_length,
            transport: Some(Transport::Tcp),
        }
    }

    pub fn udp(source_port: u16, byte_length: usize) -> Self {
        PacketDescriptor {
            has_ip_layer: true,
            source_port: Some(source_port),
            byte_length,
            transport: Some(Transport::Udp),
        }
    }

    /// IP packet whose transport carries no port (ICMP, GRE, ...).
    pub fn portless(byte_length: usize) -> Self {
        PacketDescriptor {
            has_ip_layer: true,
            source_port: None,
            byte_length,
            transport: Some(Transport::Other),
        }
    }

    pub fn is_tcp(&self) -> bool {
        self.transport == Some(Transport::Tcp)
    }

    /// Decode an Ethernet frame as delivered by the datalink channel.
    /// Only IPv4, bare or under one VLAN tag, counts as an IP layer; anything
    /// else is reported as non-IP.
    pub fn from_ethernet_frame(frame: &[u8]) -> Self {
        let byte_length = frame.len();

        let ethernet = match EthernetPacket::new(frame) {
            Some(ethernet) => ethernet,
            None => return Self::non_ip(byte_length),
        };
        let mut ethertype = ethernet.get_ethertype();
        let mut ip_offset = EthernetPacket::minimum_packet_size();

        // Look through a single 802.1Q tag.
        if ethertype == EtherTypes::Vlan {
            match VlanPacket::new(ethernet.payload()) {
                Some(vlan) => {
                    ethertype = vlan.get_ethertype();
                    ip_offset += VlanPacket::minimum_packet_size();
                }
                None => return Self::non_ip(byte_length),
            }
        }
        if ethertype != EtherTypes::Ipv4 {
            return Self::non_ip(byte_length);
        }
        let ipv4 = match Ipv4Packet::new(&frame[ip_offset..]) {
            Some(ipv4) => ipv4,
            None => return Self::non_ip(byte_length),
        };

        match ipv4.get_next_level_protocol() {
            IpNextHeaderProtocols::Tcp => PacketDescriptor {
                has_ip_layer: true,
                source_port: TcpPacket::new(ipv4.payload()).map(|tcp| tcp.get_source()),
                byte_length,
                transport: Some(Transport::Tcp),
            },
            IpNextHeaderProtocols::Udp => PacketDescriptor {
                has_ip_layer: true,
                source_port: UdpPacket::new(ipv4.payload()).map(|udp| udp.get_source()),
                byte_length,
                transport: Some(Transport::Udp),
            },
            _ => Self::portless(byte_length),
        }
    }
}

#[cfg(test)]
pub(crate) mod frames {
    /// Ethernet + IPv4 frame with a 20 byte transport header carrying `src_port`.
    pub fn ipv4_frame(protocol: u8, src_port: u16, payload_len: usize) -> Vec<u8> {
        let transport_len = 20 + payload_len;
        let total_len = (20 + transport_len) as u16;

        let mut frame = vec![0u8; 14];
        frame[12] = 0x08;
        frame[13] = 0x00;

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&total_len.to_be_bytes());
        ip[8] = 64;
        ip[9] = protocol;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);
        frame.extend_from_slice(&ip);

        let mut transport = vec![0u8; transport_len];
        transport[0..2].copy_from_slice(&src_port.to_be_bytes());
        transport[2..4].copy_from_slice(&80u16.to_be_bytes());
        if protocol == 6 {
            transport[12] = 0x50;
        }
        frame.extend_from_slice(&transport);
        frame
    }
}
