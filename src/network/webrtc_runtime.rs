// WebRTC peer runtime using str0m Sans-I/O implementation
// One async task per controller session: offer a data channel, apply the
// phone's answer, then pump UDP <-> str0m until the channel dies.

use super::interfaces;
use crate::config::RtcConfig;
use crate::network::protocol::InputFrame;
use crate::relay::{ControllerTicket, PeerCommand, PeerEvent, PeerHandle, PeerSpawner, RelayEvent};
use crate::error::{RelayError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use str0m::change::SdpAnswer;
use str0m::channel::{ChannelConfig, Reliability};
use str0m::net::{Protocol, Receive};
use str0m::{Candidate, Event, IceConnectionState, Input, Output, Rtc};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Label of the data channel phones send input frames on
pub const INPUT_CHANNEL_LABEL: &str = "input";

/// Starts a str0m peer for each new controller session
#[derive(Debug, Clone)]
pub struct Str0mSpawner {
    config: RtcConfig,
}

impl Str0mSpawner {
    pub fn new(config: RtcConfig) -> Self {
        Self { config }
    }
}

impl PeerSpawner for Str0mSpawner {
    fn spawn(&self, ticket: ControllerTicket, events: mpsc::UnboundedSender<RelayEvent>) -> PeerHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let emitter = PeerEmitter { ticket, events };
            if let Err(e) = run_peer(&config, &emitter, cmd_rx).await {
                debug!(id = %ticket.id, error = %e, "WebRTC peer ended");
                emitter.emit(PeerEvent::Failed(e.to_string()));
            }
        });

        PeerHandle::new(cmd_tx, Some(task))
    }
}

struct PeerEmitter {
    ticket: ControllerTicket,
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl PeerEmitter {
    fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(RelayEvent::Peer {
            ticket: self.ticket,
            event,
        });
    }
}

fn rtc_error(context: &str, e: impl fmt::Display) -> RelayError {
    RelayError::Rtc(format!("{}: {}", context, e))
}

/// Media id of the first m-line, which is where the data channel lives
pub fn sdp_mid(sdp: &str) -> Option<String> {
    sdp.lines()
        .find_map(|line| line.trim().strip_prefix("a=mid:"))
        .map(|mid| mid.trim().to_string())
}

/// Query STUN server to discover our public address.
/// Must use the same socket that will carry ICE, or the NAT mapping differs.
async fn query_stun_server(
    socket: &std::net::UdpSocket,
    stun_server: &str,
    timeout: Duration,
) -> Result<SocketAddr> {
    let stun_addr = tokio::net::lookup_host(stun_server)
        .await?
        .find(|addr| addr.is_ipv4())
        .ok_or_else(|| RelayError::Rtc("STUN server has no IPv4 address".to_string()))?;

    let socket = socket.try_clone()?;
    let mut client = stunclient::StunClient::new(stun_addr);
    client.set_timeout(timeout);

    tokio::task::spawn_blocking(move || client.query_external_address(&socket))
        .await
        .map_err(|e| rtc_error("STUN task failed", e))?
        .map_err(|e| rtc_error("STUN query failed", e))
}

async fn run_peer(
    config: &RtcConfig,
    emitter: &PeerEmitter,
    mut commands: mpsc::UnboundedReceiver<PeerCommand>,
) -> Result<()> {
    let id = emitter.ticket.id;

    // Bind to a specific LAN address (not 0.0.0.0) so local_addr() matches
    // the host candidate str0m checks incoming packets against
    let local_ip = config
        .host_ip
        .or_else(|| interfaces::lan_ipv4().map(IpAddr::V4))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let std_socket = std::net::UdpSocket::bind(SocketAddr::new(local_ip, 0))?;
    let host_addr = std_socket.local_addr()?;

    let mut rtc = Rtc::builder()
        .set_rtp_mode(false) // Data channels only, no RTP media
        .build();

    let mut local_candidates = Vec::new();
    let host = Candidate::host(host_addr, "udp")
        .map_err(|e| rtc_error("Failed to create host candidate", e))?;
    if rtc.add_local_candidate(host.clone()).is_some() {
        local_candidates.push(host);
    }

    if !config.stun_server.is_empty() {
        let timeout = Duration::from_millis(config.stun_timeout_ms);
        match query_stun_server(&std_socket, &config.stun_server, timeout).await {
            Ok(public_addr) if public_addr != host_addr => {
                match Candidate::server_reflexive(public_addr, host_addr, "udp") {
                    Ok(srflx) => {
                        if rtc.add_local_candidate(srflx.clone()).is_some() {
                            local_candidates.push(srflx);
                        }
                    }
                    Err(e) => debug!(%id, error = %e, "bad server reflexive candidate"),
                }
            }
            Ok(_) => {}
            Err(e) => debug!(%id, error = %e, "STUN unavailable, host candidate only"),
        }
    }

    std_socket.set_nonblocking(true)?;
    let socket = UdpSocket::from_std(std_socket)?;

    // Unordered, no retransmits: a late input frame is worthless
    let mut change = rtc.sdp_api();
    change.add_channel_with_config(ChannelConfig {
        label: INPUT_CHANNEL_LABEL.to_string(),
        ordered: false,
        reliability: Reliability::MaxRetransmits { retransmits: 0 },
        negotiated: None,
        protocol: String::new(),
    });
    let (offer, pending) = change
        .apply()
        .ok_or_else(|| RelayError::Rtc("Failed to apply SDP changes".to_string()))?;

    let offer_sdp = offer.to_sdp_string();
    let mid = sdp_mid(&offer_sdp);
    emitter.emit(PeerEvent::LocalOffer { sdp: offer_sdp });
    for candidate in &local_candidates {
        emitter.emit(PeerEvent::LocalCandidate {
            candidate: candidate.to_sdp_string(),
            mid: mid.clone(),
        });
    }
    debug!(%id, %host_addr, "offer created");

    let mut pending = Some(pending);
    let mut buf = vec![0u8; 2048];

    loop {
        // Phase 1: drain str0m outputs until it asks to be woken later
        let deadline = loop {
            match rtc.poll_output().map_err(|e| rtc_error("poll failed", e))? {
                Output::Transmit(transmit) => {
                    if let Err(e) = socket.send_to(&transmit.contents, transmit.destination).await {
                        trace!(%id, error = %e, "UDP send failed");
                    }
                }
                Output::Timeout(deadline) => break deadline,
                Output::Event(event) => {
                    if !handle_str0m_event(event, emitter) {
                        rtc.disconnect();
                        return Ok(());
                    }
                }
            }
        };

        if !rtc.is_alive() {
            emitter.emit(PeerEvent::Lost);
            return Ok(());
        }

        // Phase 2: wait for a packet, the str0m deadline, or a relay command
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (n, source) = received?;
                let receive = Receive {
                    proto: Protocol::Udp,
                    source,
                    destination: host_addr,
                    contents: buf[..n]
                        .try_into()
                        .map_err(|e| rtc_error("bad datagram", e))?,
                };
                rtc.handle_input(Input::Receive(Instant::now(), receive))
                    .map_err(|e| rtc_error("receive failed", e))?;
            }
            _ = tokio::time::sleep_until(deadline.into()) => {
                rtc.handle_input(Input::Timeout(Instant::now()))
                    .map_err(|e| rtc_error("timeout handling failed", e))?;
            }
            command = commands.recv() => match command {
                Some(PeerCommand::ApplyAnswer { sdp }) => {
                    let Some(pending) = pending.take() else {
                        continue;
                    };
                    let answer = SdpAnswer::from_sdp_string(&sdp)
                        .map_err(|e| rtc_error("Failed to parse answer SDP", e))?;
                    rtc.sdp_api()
                        .accept_answer(pending, answer)
                        .map_err(|e| rtc_error("Failed to accept answer", e))?;
                    debug!(%id, "answer applied");
                }
                Some(PeerCommand::AddCandidate { candidate, .. }) => {
                    // Empty candidate marks end-of-candidates
                    if candidate.trim().is_empty() {
                        continue;
                    }
                    match Candidate::from_sdp_string(&candidate) {
                        Ok(remote) => rtc.add_remote_candidate(remote),
                        Err(e) => debug!(%id, error = %e, "unparseable remote candidate"),
                    }
                }
                Some(PeerCommand::Close) | None => {
                    rtc.disconnect();
                    return Ok(());
                }
            }
        }
    }
}

/// Forward one str0m event to the relay. Returns false when the peer is done.
fn handle_str0m_event(event: Event, emitter: &PeerEmitter) -> bool {
    match event {
        Event::ChannelOpen(_, label) => {
            info!("📡 Data channel '{}' open for controller {}", label, emitter.ticket.id);
            emitter.emit(PeerEvent::ChannelOpen);
        }
        Event::ChannelData(data) => match InputFrame::from_bytes(&data.data) {
            Some(frame) => emitter.emit(PeerEvent::Input(frame)),
            None => trace!(id = %emitter.ticket.id, "malformed data channel frame dropped"),
        },
        Event::ChannelClose(_) => {
            emitter.emit(PeerEvent::Lost);
            return false;
        }
        Event::IceConnectionStateChange(IceConnectionState::Disconnected) => {
            emitter.emit(PeerEvent::Lost);
            return false;
        }
        Event::IceConnectionStateChange(state) => {
            trace!(id = %emitter.ticket.id, ?state, "ICE state");
        }
        _ => {}
    }
    true
}
