//! UDP-backed [`PacketLink`] for the gateway daemon. Addresses are the raw
//! 6-byte `SocketAddrV4` encoding (4-byte IP + 2-byte port).

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use mqttsn_core::PacketLink;

pub struct UdpLink {
    socket: UdpSocket,
    recv_buf: [u8; 256],
    broadcast_addr: Vec<u8>,
}

impl UdpLink {
    pub fn bind(local_addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local_addr)?;
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;
        let port = socket.local_addr()?.port();
        Ok(Self {
            socket,
            recv_buf: [0u8; 256],
            broadcast_addr: encode_addr(SocketAddrV4::new(Ipv4Addr::new(255, 255, 255, 255), port)),
        })
    }
}

pub fn encode_addr(addr: SocketAddrV4) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&addr.ip().octets());
    out.extend_from_slice(&addr.port().to_be_bytes());
    out
}

pub fn decode_addr(bytes: &[u8]) -> Option<SocketAddrV4> {
    if bytes.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = u16::from_be_bytes([bytes[4], bytes[5]]);
    Some(SocketAddrV4::new(ip, port))
}

impl PacketLink for UdpLink {
    fn payload_width(&self) -> u8 {
        mqttsn_core::frame::MAX_FRAME_LEN as u8
    }

    fn address_len(&self) -> u8 {
        6
    }

    fn broadcast_address(&self) -> &[u8] {
        &self.broadcast_addr
    }

    fn send(&mut self, dest_addr: &[u8], frame: &[u8]) -> bool {
        match decode_addr(dest_addr) {
            Some(addr) => self.socket.send_to(frame, addr).is_ok(),
            None => false,
        }
    }

    fn poll_received(&mut self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        loop {
            match self.socket.recv_from(&mut self.recv_buf) {
                Ok((n, from)) => {
                    if let std::net::SocketAddr::V4(v4) = from {
                        out.push((encode_addr(v4), self.recv_buf[..n].to_vec()));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
        out
    }

    fn shutdown(&mut self) {}
}
