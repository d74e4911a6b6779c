//! Low-latency Opus streaming over WebRTC
//!
//! SDP negotiation happens over a single POST; once connected, a per-peer
//! task pulls frames from the broadcaster, encodes them with Opus, and
//! writes 20 ms samples onto the outgoing audio track.

use crate::audio::{Frame, CHANNELS, FRAME_DURATION, SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::stream::broadcaster::{Broadcaster, ListenerGuard};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Opus payload scratch size; comfortably above any 20 ms packet.
const OPUS_BUFFER: usize = 4000;

/// Target Opus bitrate in bits per second.
const OPUS_BITRATE: i32 = 128_000;

/// Accepts SDP offers and streams Opus audio to connected peers.
pub struct WebRtcHandler {
    broadcaster: Arc<Broadcaster>,
    peers: Mutex<Vec<(u64, Arc<RTCPeerConnection>)>>,
    next_peer_id: AtomicU64,
}

impl WebRtcHandler {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            broadcaster,
            peers: Mutex::new(Vec::new()),
            next_peer_id: AtomicU64::new(1),
        }
    }

    /// Number of active WebRTC peers.
    pub fn peer_count(&self) -> usize {
        self.peers.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Negotiate one peer connection: apply the remote offer, return the
    /// local answer once ICE gathering completes, and start streaming.
    pub async fn handle_offer(
        self: &Arc<Self>,
        offer: RTCSessionDescription,
    ) -> Result<RTCSessionDescription> {
        let rtc = |e: webrtc::Error| Error::Protocol(format!("webrtc: {e}"));

        let mut media = MediaEngine::default();
        media.register_default_codecs().map_err(rtc)?;
        let registry = register_default_interceptors(Registry::new(), &mut media).map_err(rtc)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .map_err(rtc)?,
        );

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: SAMPLE_RATE,
                channels: CHANNELS as u16,
                ..Default::default()
            },
            "audio".to_owned(),
            "everwave".to_owned(),
        ));

        pc.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(rtc)?;

        pc.set_remote_description(offer).await.map_err(rtc)?;
        let answer = pc.create_answer(None).await.map_err(rtc)?;

        // Wait for ICE gathering so the answer carries all candidates.
        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(answer).await.map_err(rtc)?;
        let _ = gather_complete.recv().await;

        let peer_id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut peers) = self.peers.lock() {
            peers.push((peer_id, pc.clone()));
        }
        info!("webrtc peer connected (total: {})", self.peer_count());

        // Stream audio in the background for this peer's lifetime.
        let broadcaster = self.broadcaster.clone();
        tokio::spawn(async move {
            stream_to_peer(broadcaster, track).await;
        });

        // Tear the peer down once the connection dies.
        let handler = Arc::clone(self);
        let pc_for_cleanup = pc.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let handler = handler.clone();
            let pc = pc_for_cleanup.clone();
            Box::pin(async move {
                if matches!(
                    state,
                    RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Closed
                        | RTCPeerConnectionState::Disconnected
                ) {
                    handler.remove_peer(peer_id);
                    let _ = pc.close().await;
                    info!(
                        "webrtc peer disconnected (remaining: {})",
                        handler.peer_count()
                    );
                }
            })
        }));

        pc.local_description()
            .await
            .ok_or_else(|| Error::Protocol("no local description after gathering".to_string()))
    }

    fn remove_peer(&self, peer_id: u64) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.retain(|(id, _)| *id != peer_id);
        }
    }
}

/// Encode broadcaster frames as Opus and feed them to the peer's track.
async fn stream_to_peer(broadcaster: Arc<Broadcaster>, track: Arc<TrackLocalStaticSample>) {
    let mut listener = broadcaster.subscribe();
    let _guard = ListenerGuard::new(broadcaster.clone(), &listener);

    let mut encoder = match opus::Encoder::new(
        SAMPLE_RATE,
        opus::Channels::Stereo,
        opus::Application::Audio,
    ) {
        Ok(encoder) => encoder,
        Err(e) => {
            warn!("opus encoder init failed: {e}");
            return;
        }
    };
    if let Err(e) = encoder.set_bitrate(opus::Bitrate::Bits(OPUS_BITRATE)) {
        warn!("opus bitrate not applied: {e}");
    }

    let mut payload = vec![0u8; OPUS_BUFFER];

    loop {
        let frame: Frame = tokio::select! {
            _ = listener.cancelled.cancelled() => return,
            next = listener.frames.recv() => match next {
                Some(frame) => frame,
                None => return,
            },
        };

        let written = match encoder.encode(&frame, &mut payload) {
            Ok(written) => written,
            Err(e) => {
                warn!("opus encode error: {e}");
                continue;
            }
        };

        let sample = Sample {
            data: Bytes::copy_from_slice(&payload[..written]),
            duration: FRAME_DURATION,
            ..Default::default()
        };
        if track.write_sample(&sample).await.is_err() {
            return; // peer went away
        }
    }
}
