//! Firmware upload reassembly.
//!
//! Uploads arrive as a run of ArtFirmwareMaster blocks from one sender. The
//! first 1060 bytes form a header whose leading 16-bit word is the expected
//! checksum; everything after the header is summed with a 16-bit wrap-add
//! and verified against the header's checksum when the last block lands.

use crate::command::{wrap_add_checksum, BlockType, FirmwareMaster};
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Sessions idle this long are dropped
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Size of the firmware header buffer
pub const HEADER_LEN: usize = 1060;

/// Offset of the secondary data-words count inside the header
pub const DATA_WORDS_OFFSET: usize = 1056;

/// Firmware or UBEA upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Node firmware
    Firmware,
    /// User Bios Extension Area
    Ubea,
}

impl From<BlockType> for TransferKind {
    fn from(block_type: BlockType) -> Self {
        if block_type.is_ubea() {
            TransferKind::Ubea
        } else {
            TransferKind::Firmware
        }
    }
}

/// Why an upload was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareFailure {
    /// A continuation or last block arrived with no open session
    MissingSession,
    /// The block belongs to a different transfer than the session
    TransferMismatch,
    /// The block id broke the modulo-256 sequence
    UnexpectedBlock {
        /// The id the session expected
        expected: u8,
        /// The id the block carried
        got: u8,
    },
    /// More bytes arrived than the advertised length
    LengthOverflow,
    /// The header's data-words count disagrees with the advertised length
    LengthMismatch {
        /// Bytes the ArtFirmwareMaster advertised
        advertised: u64,
        /// Bytes derived from the header fields
        derived: u64,
    },
    /// The final wrap-add checksum did not verify
    ChecksumMismatch {
        /// The checksum the header carried
        expected: u16,
        /// The one's complement of the computed sum
        actual: u16,
    },
}

impl std::fmt::Display for FirmwareFailure {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FirmwareFailure::MissingSession => write!(fmt, "block without an open session"),
            FirmwareFailure::TransferMismatch => write!(fmt, "transfer kind changed mid-session"),
            FirmwareFailure::UnexpectedBlock { expected, got } => {
                write!(fmt, "expected block {}, got {}", expected, got)
            }
            FirmwareFailure::LengthOverflow => write!(fmt, "more data than advertised"),
            FirmwareFailure::LengthMismatch { advertised, derived } => write!(
                fmt,
                "advertised {} bytes but header derives {}",
                advertised, derived
            ),
            FirmwareFailure::ChecksumMismatch { expected, actual } => write!(
                fmt,
                "checksum mismatch, header 0x{:04X}, computed 0x{:04X}",
                expected, actual
            ),
        }
    }
}

/// Final statistics of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareStats {
    /// Firmware or UBEA
    pub kind: TransferKind,
    /// Total bytes the sender advertised
    pub total_bytes: u64,
    /// Bytes actually received
    pub received_bytes: u64,
    /// Number of blocks the upload took
    pub blocks: u32,
    /// The verified checksum
    pub checksum: u16,
}

/// What a successfully handled block produced
#[derive(Debug, Clone, PartialEq)]
pub enum FirmwareProgress {
    /// A non-final block landed intact
    BlockGood {
        /// Bytes received so far
        received_bytes: u64,
        /// Bytes the upload advertises in total
        total_bytes: u64,
    },
    /// The upload is complete and verified
    AllGood(FirmwareStats),
}

#[derive(Debug)]
struct Session {
    kind: TransferKind,
    total_bytes: u64,
    received_bytes: u64,
    blocks: u32,
    expected_block: u8,
    header: Vec<u8>,
    payload_sum: u16,
    #[allow(dead_code)]
    started_at: Instant,
    updated_at: Instant,
}

/// The firmware session table, keyed by sender
#[derive(Debug, Default)]
pub struct FirmwareEngine {
    sessions: HashMap<SocketAddr, Session>,
}

impl FirmwareEngine {
    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle past [SESSION_TIMEOUT]. Returns how many died.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.duration_since(session.updated_at) < SESSION_TIMEOUT);
        before - self.sessions.len()
    }

    /// Fold one block into its sender's session.
    ///
    /// On failure the session is dropped and the caller answers with an
    /// ArtFirmwareReply fail.
    pub fn handle_block(
        &mut self,
        sender: SocketAddr,
        block: &FirmwareMaster,
        now: Instant,
    ) -> Result<FirmwareProgress, FirmwareFailure> {
        let kind = TransferKind::from(block.block_type);

        if block.block_type.is_first() {
            self.sessions.insert(
                sender,
                Session {
                    kind,
                    total_bytes: 2 * u64::from(*block.firmware_length),
                    received_bytes: 0,
                    blocks: 0,
                    expected_block: 0,
                    header: Vec::with_capacity(HEADER_LEN),
                    payload_sum: 0,
                    started_at: now,
                    updated_at: now,
                },
            );
        }

        let result = match self.sessions.get_mut(&sender) {
            None => Err(FirmwareFailure::MissingSession),
            Some(session) => Self::fold_block(session, kind, block, now),
        };

        match result {
            Ok(progress) => {
                if matches!(progress, FirmwareProgress::AllGood(_)) {
                    self.sessions.remove(&sender);
                }
                Ok(progress)
            }
            Err(failure) => {
                self.sessions.remove(&sender);
                Err(failure)
            }
        }
    }

    fn fold_block(
        session: &mut Session,
        kind: TransferKind,
        block: &FirmwareMaster,
        now: Instant,
    ) -> Result<FirmwareProgress, FirmwareFailure> {
        if session.kind != kind || session.total_bytes != 2 * u64::from(*block.firmware_length) {
            return Err(FirmwareFailure::TransferMismatch);
        }
        if block.block_id != session.expected_block {
            return Err(FirmwareFailure::UnexpectedBlock {
                expected: session.expected_block,
                got: block.block_id,
            });
        }

        let payload = &block.data.0;
        if session.received_bytes + payload.len() as u64 > session.total_bytes {
            return Err(FirmwareFailure::LengthOverflow);
        }

        let header_was_complete = session.header.len() >= HEADER_LEN;
        let header_room = HEADER_LEN - session.header.len().min(HEADER_LEN);
        let into_header = header_room.min(payload.len());
        session.header.extend_from_slice(&payload[..into_header]);
        session.payload_sum = session
            .payload_sum
            .wrapping_add(wrap_add_checksum(&payload[into_header..]));

        session.received_bytes += payload.len() as u64;
        session.blocks += 1;
        session.expected_block = session.expected_block.wrapping_add(1);
        session.updated_at = now;

        if !header_was_complete && session.header.len() >= HEADER_LEN {
            let data_words =
                u64::from(BigEndian::read_u32(&session.header[DATA_WORDS_OFFSET..HEADER_LEN]));
            let header_words = (HEADER_LEN / 2) as u64;
            let derived = 2 * (header_words + data_words);
            if derived != session.total_bytes {
                return Err(FirmwareFailure::LengthMismatch {
                    advertised: session.total_bytes,
                    derived,
                });
            }
        }

        if block.block_type.is_last() {
            let expected = BigEndian::read_u16(&session.header[..2]);
            let actual = !session.payload_sum;
            if actual != expected {
                return Err(FirmwareFailure::ChecksumMismatch { expected, actual });
            }
            return Ok(FirmwareProgress::AllGood(FirmwareStats {
                kind: session.kind,
                total_bytes: session.total_bytes,
                received_bytes: session.received_bytes,
                blocks: session.blocks,
                checksum: expected,
            }));
        }

        Ok(FirmwareProgress::BlockGood {
            received_bytes: session.received_bytes,
            total_bytes: session.total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::AlignedData;
    use crate::convert::U32Be;

    fn sender() -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 9], 6454))
    }

    /// Build a valid upload: a 1060 byte header plus `data` payload bytes,
    /// split into chunks of at most 1024 bytes.
    fn build_upload(data: &[u8]) -> (u32, Vec<FirmwareMaster>) {
        assert_eq!(data.len() % 2, 0);
        let mut image = vec![0u8; HEADER_LEN];
        let checksum = !wrap_add_checksum(data);
        BigEndian::write_u16(&mut image[..2], checksum);
        BigEndian::write_u32(
            &mut image[DATA_WORDS_OFFSET..HEADER_LEN],
            (data.len() / 2) as u32,
        );
        image.extend_from_slice(data);

        let words = (image.len() / 2) as u32;
        let chunks: Vec<&[u8]> = image.chunks(1024).collect();
        let packets = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| {
                let block_type = if index == 0 {
                    BlockType::FirmFirst
                } else if index == chunks.len() - 1 {
                    BlockType::FirmLast
                } else {
                    BlockType::FirmCont
                };
                FirmwareMaster {
                    block_type,
                    block_id: index as u8,
                    firmware_length: U32Be(words),
                    data: AlignedData(chunk.to_vec()),
                    ..FirmwareMaster::default()
                }
            })
            .collect();
        (words, packets)
    }

    #[test]
    fn a_clean_upload_ends_all_good() {
        let mut engine = FirmwareEngine::default();
        let now = Instant::now();
        let payload = [0xAAu8, 0xBB, 0xCC, 0xDD];
        let (words, packets) = build_upload(&payload);

        let mut last = None;
        for packet in &packets {
            last = Some(engine.handle_block(sender(), packet, now).unwrap());
        }
        match last.unwrap() {
            FirmwareProgress::AllGood(stats) => {
                assert_eq!(stats.total_bytes, 2 * words as u64);
                assert_eq!(stats.received_bytes, stats.total_bytes);
                assert_eq!(stats.kind, TransferKind::Firmware);
            }
            other => panic!("expected AllGood, got {:?}", other),
        }
        assert_eq!(engine.session_count(), 0);
    }

    #[test]
    fn a_corrupted_payload_fails_the_checksum() {
        let mut engine = FirmwareEngine::default();
        let now = Instant::now();
        let (_, mut packets) = build_upload(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let last_index = packets.len() - 1;
        // flip a byte beyond the header
        let len = packets[last_index].data.0.len();
        packets[last_index].data.0[len - 1] ^= 0xFF;

        let mut result = Ok(FirmwareProgress::BlockGood {
            received_bytes: 0,
            total_bytes: 0,
        });
        for packet in &packets {
            result = engine.handle_block(sender(), packet, now);
        }
        assert!(matches!(
            result,
            Err(FirmwareFailure::ChecksumMismatch { .. })
        ));
        assert_eq!(engine.session_count(), 0);
    }

    #[test]
    fn continuation_without_a_session_is_missing_session() {
        let mut engine = FirmwareEngine::default();
        let block = FirmwareMaster {
            block_type: BlockType::FirmCont,
            block_id: 1,
            ..FirmwareMaster::default()
        };
        assert_eq!(
            engine.handle_block(sender(), &block, Instant::now()),
            Err(FirmwareFailure::MissingSession)
        );
    }

    #[test]
    fn out_of_order_blocks_fail() {
        let mut engine = FirmwareEngine::default();
        let now = Instant::now();
        let (_, packets) = build_upload(&vec![0u8; 2048]);
        engine.handle_block(sender(), &packets[0], now).unwrap();
        // skip block 1, present block 2
        let result = engine.handle_block(sender(), &packets[2], now);
        assert_eq!(
            result,
            Err(FirmwareFailure::UnexpectedBlock { expected: 1, got: 2 })
        );
    }

    #[test]
    fn a_lying_data_words_field_fails_early() {
        let mut engine = FirmwareEngine::default();
        let now = Instant::now();
        let (_, mut packets) = build_upload(&[0xAA, 0xBB]);
        // corrupt the data-words count; header offset 1056 lands in the
        // second 1024-byte chunk
        let offset = DATA_WORDS_OFFSET - 1024;
        BigEndian::write_u32(&mut packets[1].data.0[offset..offset + 4], 9999);
        let mut result = None;
        for packet in &packets {
            result = Some(engine.handle_block(sender(), packet, now));
            if result.as_ref().unwrap().is_err() {
                break;
            }
        }
        assert!(matches!(
            result.unwrap(),
            Err(FirmwareFailure::LengthMismatch { .. })
        ));
    }

    #[test]
    fn idle_sessions_expire() {
        let mut engine = FirmwareEngine::default();
        let t0 = Instant::now();
        let (_, packets) = build_upload(&vec![0u8; 2048]);
        engine.handle_block(sender(), &packets[0], t0).unwrap();
        assert_eq!(engine.session_count(), 1);
        assert_eq!(engine.expire(t0 + Duration::from_secs(31)), 1);
        assert_eq!(engine.session_count(), 0);
    }

    #[test]
    fn overflow_is_rejected() {
        let mut engine = FirmwareEngine::default();
        let now = Instant::now();
        let (_, packets) = build_upload(&[0xAA, 0xBB]);
        // lie about the total: claim fewer words than the upload carries
        let mut first = packets[0].clone();
        first.firmware_length = U32Be(4);
        let result = engine.handle_block(sender(), &first, now);
        assert_eq!(result, Err(FirmwareFailure::LengthOverflow));
    }
}
