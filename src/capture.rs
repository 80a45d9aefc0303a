use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};
use pnet::datalink::{self, Channel::Ethernet, DataLinkReceiver, NetworkInterface};

use crate::error::{MonitorError, Result};
use crate::packet::PacketDescriptor;

// How long one blocking read may wait before the window deadline is rechecked.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Something that yields packets for a bounded capture window.
pub trait PacketSource {
    /// Blocks for at most `window`, handing every packet to `on_packet` as it
    /// arrives. Returns how many packets were delivered.
    fn capture_window(
        &mut self,
        window: Duration,
        on_packet: &mut dyn FnMut(&PacketDescriptor),
    ) -> Result<usize>;
}

/// Live capture on one network interface.
pub struct InterfaceCapture {
    name: String,
    rx: Box<dyn DataLinkReceiver>,
    running: Arc<AtomicBool>,
}

impl InterfaceCapture {
    pub fn open(interface: &NetworkInterface, running: Arc<AtomicBool>) -> Result<Self> {
        let config = datalink::Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Default::default()
        };

        let rx = match datalink::channel(interface, config) {
            Ok(Ethernet(_, rx)) => rx,
            Ok(_) => {
                return Err(MonitorError::NetworkError(format!(
                    "unsupported channel type on {}",
                    interface.name
                )))
            }
            Err(e) => {
                return Err(MonitorError::NetworkError(format!(
                    "failed to open channel on {}: {}",
                    interface.name, e
                )))
            }
        };

        info!("Capturing on {}", interface.name);
        Ok(InterfaceCapture {
            name: interface.name.clone(),
            rx,
            running,
        })
    }
}

impl PacketSource for InterfaceCapture {
    fn capture_window(
        &mut self,
        window: Duration,
        on_packet: &mut dyn FnMut(&PacketDescriptor),
    ) -> Result<usize> {
        let deadline = Instant::now() + window;
        let mut delivered = 0;

        while Instant::now() < deadline && self.running.load(Ordering::SeqCst) {
            match self.rx.next() {
                Ok(frame) => {
                    on_packet(&PacketDescriptor::from_ethernet_frame(frame));
                    delivered += 1;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(e) => {
                    warn!("Error reading packet on {}: {}", self.name, e);
                    continue;
                }
            }
        }

        Ok(delivered)
    }
}

/// Replays prepared windows of packets, one window per call.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    windows: VecDeque<Vec<PacketDescriptor>>,
}

impl ScriptedSource {
    pub fn new(windows: Vec<Vec<PacketDescriptor>>) -> Self {
        ScriptedSource {
            windows: windows.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.windows.len()
    }
}

impl PacketSource for ScriptedSource {
    fn capture_window(
        &mut self,
        _window: Duration,
        on_packet: &mut dyn FnMut(&PacketDescriptor),
    ) -> Result<usize> {
        let packets = self.windows.pop_front().unwrap_or_default();
        for packet in &packets {
            on_packet(packet);
        }
        Ok(packets.len())
    }
}

/// `name - IPs: a, b` for every interface, as shown to the operator.
pub fn describe_interfaces(interfaces: &[NetworkInterface]) -> Vec<String> {
    interfaces
        .iter()
        .map(|iface| {
            let ips: Vec<String> = iface
                .ips
                .iter()
                .filter_map(|ip_network| match ip_network.ip() {
                    IpAddr::V4(ipv4) => Some(ipv4.to_string()),
                    IpAddr::V6(_) => None,
                })
                .collect();
            if ips.is_empty() {
                format!("{} - IPs: No IPv4 assigned", iface.name)
            } else {
                format!("{} - IPs: {}", iface.name, ips.join(", "))
            }
        })
        .collect()
}

pub fn find_interface(name: &str) -> Result<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| MonitorError::NetworkError(format!("no interface named {}", name)))
}

/// Lists the interfaces on stdout and reads the chosen index from `input`.
pub fn prompt_for_interface<R: BufRead>(input: &mut R) -> Result<NetworkInterface> {
    let interfaces = datalink::interfaces();
    if interfaces.is_empty() {
        return Err(MonitorError::NetworkError("no network interfaces found".to_string()));
    }

    println!("Available Network Interfaces:");
    for (i, line) in describe_interfaces(&interfaces).iter().enumerate() {
        println!("[{}] {}", i, line);
    }
    print!("Enter interface index to capture on: ");
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let index: usize = line.trim().parse()?;

    interfaces
        .into_iter()
        .nth(index)
        .ok_or_else(|| format!("invalid interface index {}", index).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_yields_one_window_per_call() {
        let mut source = ScriptedSource::new(vec![
            vec![PacketDescriptor::tcp(443, 100), PacketDescriptor::tcp(443, 200)],
            vec![],
            vec![PacketDescriptor::udp(53, 70)],
        ]);

        let mut seen = Vec::new();
        let n = source
            .capture_window(Duration::from_secs(1), &mut |p| seen.push(p.clone()))
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen.len(), 2);

        let n = source
            .capture_window(Duration::from_secs(1), &mut |_| panic!("empty window"))
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(source.remaining(), 1);
    }

    fn interface(name: &str, ips: &[&str]) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            description: String::new(),
            index: 1,
            mac: None,
            ips: ips.iter().map(|ip| ip.parse().unwrap()).collect(),
            flags: 0,
        }
    }

    #[test]
    fn test_describe_interfaces() {
        let interfaces = vec![
            interface("eth0", &["192.168.1.20/24", "fe80::1/64", "10.0.0.5/8"]),
            interface("lo6", &["::1/128"]),
            interface("dummy0", &[]),
        ];

        assert_eq!(
            describe_interfaces(&interfaces),
            vec![
                "eth0 - IPs: 192.168.1.20, 10.0.0.5",
                "lo6 - IPs: No IPv4 assigned",
                "dummy0 - IPs: No IPv4 assigned",
            ]
        );
    }

    #[test]
    fn test_exhausted_source_is_quiet() {
        let mut source = ScriptedSource::default();
        let n = source
            .capture_window(Duration::from_secs(1), &mut |_| {})
            .unwrap();
        assert_eq!(n, 0);
    }
}
