//! OSC mixer client (Behringer X-Air / X32 addressing)
//!
//! Messages are fire-and-forget UDP datagrams; a successful send only means
//! the datagram left this machine.

use anyhow::Context;
use async_trait::async_trait;
use rosc::{OscMessage, OscPacket, OscType};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::debug;

use super::MixerClient;
use crate::actions::MixerChannel;
use crate::error::{DeskError, DeskResult};

pub struct OscMixer {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscMixer {
    /// Bind an ephemeral local socket for talking to the mixer at `target`
    pub async fn connect(target: SocketAddr) -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .context("Failed to bind UDP socket for mixer")?;

        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

/// Encode the mix-on message for a channel
pub fn encode_mix_on(channel: MixerChannel, on: bool) -> Result<Vec<u8>, rosc::OscError> {
    let packet = OscPacket::Message(OscMessage {
        addr: channel.mix_on_address(),
        args: vec![OscType::Int(if on { 1 } else { 0 })],
    });
    rosc::encoder::encode(&packet)
}

#[async_trait]
impl MixerClient for OscMixer {
    async fn set_channel_on(&self, channel: MixerChannel, on: bool) -> DeskResult<()> {
        if on {
            debug!("Setting channel {} as on", channel);
        } else {
            debug!("Setting channel {} on mute", channel);
        }

        let bytes = encode_mix_on(channel, on)
            .map_err(|e| DeskError::mixer(anyhow::anyhow!("OSC encode failed: {:?}", e)))?;

        self.socket
            .send_to(&bytes, self.target)
            .await
            .map_err(DeskError::mixer)?;

        Ok(())
    }
}
