//! Tokio TCP transport.
//!
//! One [`TcpTransport`] owns a connected stream through two spawned tasks: a
//! writer draining an unbounded frame queue and a reader delivering inbound
//! payloads to the host's event channel. The session side stays synchronous;
//! [`Transport`] calls only flip atomics or queue frames.
//!
//! Frame layout on the wire, outermost first: a little-endian u16 length
//! prefix, then a u32 sequence number (high bit marks a compressed frame) or
//! a u32 adler-32 checksum when only checksums are negotiated, then the
//! payload. The payload is XTEA-enciphered once a stream key is installed,
//! carrying its own u16 length under the cipher so padding strips cleanly.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ProtocolError, Result};
use crate::session::timers::{Scheduler, TimerHandle, TimerKind};
use crate::session::SessionEvent;
use crate::transport::Transport;

/// Compressed-frame marker in the sequence word.
const SEQUENCE_COMPRESSION_BIT: u32 = 0x8000_0000;

/// Length-prefixed framing: a little-endian u16 counting everything after
/// itself.
struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        if src.len() < 2 {
            return Ok(None);
        }
        let length = u16::from_le_bytes([src[0], src[1]]) as usize;
        if src.len() < 2 + length {
            src.reserve(2 + length - src.len());
            return Ok(None);
        }
        src.advance(2);
        Ok(Some(src.split_to(length)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        if frame.len() > u16::MAX as usize {
            return Err(ProtocolError::ProtocolLimit(format!(
                "frame of {} bytes exceeds the u16 length prefix",
                frame.len()
            )));
        }
        dst.reserve(2 + frame.len());
        dst.put_u16_le(frame.len() as u16);
        dst.put_slice(&frame);
        Ok(())
    }
}

/// Mode switches shared between the session side and the worker tasks.
/// All switch exactly once, right after the login frame is queued.
#[derive(Default)]
struct StreamModes {
    checksum: AtomicBool,
    compression: AtomicBool,
    sequencing: AtomicBool,
    key: Mutex<Option<[u32; 4]>>,
}

impl StreamModes {
    fn key(&self) -> Option<[u32; 4]> {
        *self.key.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Tokio-backed [`Transport`].
///
/// Inbound payloads arrive on the `inbound` channel handed to
/// [`connect`](Self::connect), already unsealed; the host decodes them and
/// feeds the session. The channel closing is the disconnect signal: the
/// host should inject [`SessionEvent::TransportClosed`] when it observes it.
pub struct TcpTransport {
    outbound: mpsc::UnboundedSender<Bytes>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    modes: Arc<StreamModes>,
}

impl TcpTransport {
    /// Connect to a world server and spawn the reader and writer tasks.
    #[instrument(skip(inbound))]
    pub async fn connect(
        host: &str,
        port: u16,
        inbound: mpsc::UnboundedSender<Bytes>,
    ) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        info!(host, port, "connected to world server");

        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        let connected = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());
        let modes = Arc::new(StreamModes::default());

        tokio::spawn(write_loop(
            FramedWrite::new(write_half, FrameCodec),
            outbound_rx,
            connected.clone(),
            shutdown.clone(),
            modes.clone(),
        ));
        tokio::spawn(read_loop(
            FramedRead::new(read_half, FrameCodec),
            inbound,
            connected.clone(),
            shutdown.clone(),
            modes.clone(),
        ));

        Ok(Self {
            outbound: outbound_tx,
            connected,
            shutdown,
            modes,
        })
    }
}

impl Transport for TcpTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, frame: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.outbound
            .send(frame)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn enable_checksum(&self) {
        self.modes.checksum.store(true, Ordering::Release);
    }

    fn enable_encryption(&self, key: [u32; 4]) {
        *self
            .modes
            .key
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(key);
    }

    fn enable_compression(&self) {
        self.modes.compression.store(true, Ordering::Release);
    }

    fn enable_sequencing(&self) {
        self.modes.sequencing.store(true, Ordering::Release);
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            info!("disconnecting from world server");
            self.shutdown.notify_waiters();
        }
    }
}

async fn write_loop(
    mut sink: FramedWrite<tokio::net::tcp::OwnedWriteHalf, FrameCodec>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    modes: Arc<StreamModes>,
) {
    let mut sequence: u32 = 0;
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let sealed = seal_frame(&frame, &modes, &mut sequence);
                if let Err(error) = sink.send(sealed).await {
                    error!(%error, "write failed, closing connection");
                    break;
                }
            }
        }
    }
    connected.store(false, Ordering::Release);
}

async fn read_loop(
    mut source: FramedRead<tokio::net::tcp::OwnedReadHalf, FrameCodec>,
    inbound: mpsc::UnboundedSender<Bytes>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    modes: Arc<StreamModes>,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            frame = source.next() => {
                let Some(frame) = frame else {
                    debug!("world server closed the connection");
                    break;
                };
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(error) => {
                        error!(%error, "read failed, closing connection");
                        break;
                    }
                };
                match unseal_frame(frame, &modes) {
                    Ok(payload) => {
                        if inbound.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        error!(%error, "corrupt inbound frame, closing connection");
                        break;
                    }
                }
            }
        }
    }
    connected.store(false, Ordering::Release);
    shutdown.notify_waiters();
    // dropping `inbound` closes the channel, which is the host's signal
}

/// Apply the active stream modes to one outbound payload.
fn seal_frame(payload: &Bytes, modes: &StreamModes, sequence: &mut u32) -> Bytes {
    let mut body: Vec<u8>;
    let compressed = modes.compression.load(Ordering::Acquire);
    if compressed {
        body = lz4_flex::compress_prepend_size(payload);
    } else {
        body = payload.to_vec();
    }

    if let Some(key) = modes.key() {
        body = encipher(&body, key);
    }

    let mut frame = BytesMut::with_capacity(4 + body.len());
    if modes.sequencing.load(Ordering::Acquire) {
        let mut word = *sequence;
        *sequence = sequence.wrapping_add(1);
        if compressed {
            word |= SEQUENCE_COMPRESSION_BIT;
        }
        frame.put_u32_le(word);
    } else if modes.checksum.load(Ordering::Acquire) {
        frame.put_u32_le(adler32(&body));
    }
    frame.put_slice(&body);
    frame.freeze()
}

/// Invert [`seal_frame`] on one inbound frame.
fn unseal_frame(mut frame: BytesMut, modes: &StreamModes) -> Result<Bytes> {
    let mut compressed = modes.compression.load(Ordering::Acquire);
    if modes.sequencing.load(Ordering::Acquire) {
        if frame.len() < 4 {
            return Err(ProtocolError::MalformedMessage(
                "frame too short for a sequence word".into(),
            ));
        }
        let word = frame.get_u32_le();
        compressed = word & SEQUENCE_COMPRESSION_BIT != 0;
    } else if modes.checksum.load(Ordering::Acquire) {
        if frame.len() < 4 {
            return Err(ProtocolError::MalformedMessage(
                "frame too short for a checksum".into(),
            ));
        }
        let expected = frame.get_u32_le();
        let actual = adler32(&frame);
        if expected != actual {
            return Err(ProtocolError::MalformedMessage(format!(
                "checksum mismatch: expected {expected:#010x}, computed {actual:#010x}"
            )));
        }
    }

    let mut body = frame.to_vec();
    if let Some(key) = modes.key() {
        body = decipher(&body, key)?;
    }

    if compressed {
        body = lz4_flex::decompress_size_prepended(&body)
            .map_err(|e| ProtocolError::MalformedMessage(format!("decompression failed: {e}")))?;
    }
    Ok(Bytes::from(body))
}

/// Plain adler-32 over the frame body.
fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(5552) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

const XTEA_DELTA: u32 = 0x9E37_79B9;
const XTEA_ROUNDS: u32 = 32;

/// XTEA-encipher a payload. The plaintext length travels as a u16 under
/// the cipher so the zero padding to the 8-byte block strips cleanly.
fn encipher(payload: &[u8], key: [u32; 4]) -> Vec<u8> {
    let mut data = Vec::with_capacity((payload.len() + 2 + 7) / 8 * 8);
    data.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    data.extend_from_slice(payload);
    while data.len() % 8 != 0 {
        data.push(0);
    }

    for block in data.chunks_exact_mut(8) {
        let mut v0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let mut v1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let mut sum: u32 = 0;
        for _ in 0..XTEA_ROUNDS {
            v0 = v0.wrapping_add(
                (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1))
                    ^ sum.wrapping_add(key[(sum & 3) as usize]),
            );
            sum = sum.wrapping_add(XTEA_DELTA);
            v1 = v1.wrapping_add(
                (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                    ^ sum.wrapping_add(key[((sum >> 11) & 3) as usize]),
            );
        }
        block[..4].copy_from_slice(&v0.to_le_bytes());
        block[4..].copy_from_slice(&v1.to_le_bytes());
    }
    data
}

fn decipher(data: &[u8], key: [u32; 4]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() % 8 != 0 {
        return Err(ProtocolError::MalformedMessage(format!(
            "enciphered frame of {} bytes is not block-aligned",
            data.len()
        )));
    }
    let mut data = data.to_vec();
    for block in data.chunks_exact_mut(8) {
        let mut v0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let mut v1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let mut sum: u32 = XTEA_DELTA.wrapping_mul(XTEA_ROUNDS);
        for _ in 0..XTEA_ROUNDS {
            v1 = v1.wrapping_sub(
                (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                    ^ sum.wrapping_add(key[((sum >> 11) & 3) as usize]),
            );
            sum = sum.wrapping_sub(XTEA_DELTA);
            v0 = v0.wrapping_sub(
                (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1))
                    ^ sum.wrapping_add(key[(sum & 3) as usize]),
            );
        }
        block[..4].copy_from_slice(&v0.to_le_bytes());
        block[4..].copy_from_slice(&v1.to_le_bytes());
    }

    let length = u16::from_le_bytes([data[0], data[1]]) as usize;
    if length + 2 > data.len() {
        return Err(ProtocolError::MalformedMessage(
            "inner length exceeds the deciphered frame".into(),
        ));
    }
    data.drain(..2);
    data.truncate(length);
    Ok(data)
}

/// Timer facility backed by `tokio::time`, delivering firings as
/// [`SessionEvent`]s on the host's event channel so they reach the session
/// on the same task as everything else.
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl TokioScheduler {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { events }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, kind: TimerKind, interval: Duration) -> TimerHandle {
        let handle = TimerHandle::new();
        let scheduled = handle.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick of an interval completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if scheduled.is_cancelled() {
                    break;
                }
                if events.send(kind.event()).is_err() {
                    warn!(?kind, "event channel closed, stopping timer");
                    break;
                }
            }
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_codec_roundtrip_and_partial_reads() {
        let mut codec = FrameCodec;
        let mut buffer = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"hello"), &mut buffer)
            .unwrap();

        // a partial header or body decodes to nothing
        let mut partial = BytesMut::from(&buffer[..1]);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        let mut partial = BytesMut::from(&buffer[..4]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let decoded = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&decoded[..], b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn adler32_matches_the_reference_value() {
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
        assert_eq!(adler32(b""), 1);
    }

    #[test]
    fn xtea_roundtrip_strips_padding() {
        let key = [0xDEAD_BEEF, 0x0123_4567, 0x89AB_CDEF, 0x0F1E_2D3C];
        let payload = b"a payload that is not block aligned";
        let sealed = encipher(payload, key);
        assert_eq!(sealed.len() % 8, 0);
        assert_ne!(&sealed[..payload.len().min(sealed.len())], &payload[..]);
        let opened = decipher(&sealed, key).unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn sealed_frames_unseal_across_every_mode() {
        let modes = StreamModes::default();
        let payload = Bytes::from_static(b"some game packet payload");
        let mut sequence = 0;

        // plain
        let frame = seal_frame(&payload, &modes, &mut sequence);
        let opened = unseal_frame(BytesMut::from(&frame[..]), &modes).unwrap();
        assert_eq!(opened, payload);

        // checksum
        modes.checksum.store(true, Ordering::Release);
        let frame = seal_frame(&payload, &modes, &mut sequence);
        let opened = unseal_frame(BytesMut::from(&frame[..]), &modes).unwrap();
        assert_eq!(opened, payload);

        // a flipped byte fails the checksum
        let mut corrupt = BytesMut::from(&frame[..]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        assert!(unseal_frame(corrupt, &modes).is_err());

        // cipher, compression and sequencing stacked
        *modes.key.lock().unwrap() = Some([1, 2, 3, 4]);
        modes.compression.store(true, Ordering::Release);
        modes.sequencing.store(true, Ordering::Release);
        let frame = seal_frame(&payload, &modes, &mut sequence);
        let opened = unseal_frame(BytesMut::from(&frame[..]), &modes).unwrap();
        assert_eq!(opened, payload);
        assert_eq!(sequence, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_delivers_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TokioScheduler::new(tx);
        let handle = scheduler.schedule_repeating(TimerKind::Ping, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(rx.try_recv(), Ok(SessionEvent::PingTimer));
        assert_eq!(rx.try_recv(), Ok(SessionEvent::PingTimer));

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        while let Ok(event) = rx.try_recv() {
            // at most one firing could have raced the cancellation
            assert_eq!(event, SessionEvent::PingTimer);
        }
    }
}
