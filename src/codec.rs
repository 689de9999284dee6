//! Deterministic wire encoding for frame messages
//!
//! The encoding has a fixed field order and no implicit fields (no send time,
//! no random ids), so equal messages always produce equal bytes. That is what
//! makes the integrity tag reproducible on the receiving side.
//!
//! ## Wire Layout
//!
//! All integers are little-endian.
//!
//! | Offset  | Size | Field                                            |
//! |---------|------|--------------------------------------------------|
//! | 0       | 4    | Magic `b"FWMG"`                                  |
//! | 4       | 1    | Wire version (`1`)                               |
//! | 5       | 1    | Field count (`2`)                                |
//! | 6       | 1    | Field id `1`: image                              |
//! | 7       | 1    | Wire type `0x02`: length-delimited               |
//! | 8       | 4    | Image length `n` (`u32`)                         |
//! | 12      | n    | Image bytes                                      |
//! | 12 + n  | 1    | Field id `2`: timestamp                          |
//! | 13 + n  | 1    | Wire type `0x01`: fixed 64-bit                   |
//! | 14 + n  | 8    | Timestamp, `i64` nanoseconds since the Unix epoch |

use chrono::DateTime;
use tracing::trace;

use crate::{FrameError, FrameMessage, Result};

/// Leading magic bytes of every serialized message
pub const MAGIC: [u8; 4] = *b"FWMG";

/// Current wire version
pub const WIRE_VERSION: u8 = 1;

const FIELD_COUNT: u8 = 2;
const FIELD_IMAGE: u8 = 1;
const FIELD_TIMESTAMP: u8 = 2;
const WIRE_FIXED64: u8 = 0x01;
const WIRE_LEN_DELIMITED: u8 = 0x02;

const PREAMBLE_SIZE: usize = 6;
const FIELD_HEADER_SIZE: usize = 2;
const LENGTH_SIZE: usize = 4;
const TIMESTAMP_SIZE: usize = 8;

/// Size of a serialized message with an empty image
pub const FIXED_OVERHEAD: usize =
    PREAMBLE_SIZE + FIELD_HEADER_SIZE + LENGTH_SIZE + FIELD_HEADER_SIZE + TIMESTAMP_SIZE;

/// Serialize a frame message into its wire form.
///
/// # Errors
///
/// Returns [`FrameError::InvalidFrame`] if the image is larger than a `u32`
/// length prefix can describe.
pub fn serialize(msg: &FrameMessage) -> Result<Vec<u8>> {
    let image = msg.image();
    let image_len = u32::try_from(image.len()).map_err(|_| {
        FrameError::invalid_frame(format!("image of {} bytes exceeds the wire limit", image.len()))
    })?;

    let mut out = Vec::with_capacity(FIXED_OVERHEAD + image.len());
    out.extend_from_slice(&MAGIC);
    out.push(WIRE_VERSION);
    out.push(FIELD_COUNT);

    out.push(FIELD_IMAGE);
    out.push(WIRE_LEN_DELIMITED);
    out.extend_from_slice(&image_len.to_le_bytes());
    out.extend_from_slice(image);

    out.push(FIELD_TIMESTAMP);
    out.push(WIRE_FIXED64);
    out.extend_from_slice(&msg.timestamp_nanos().to_le_bytes());

    trace!("Serialized frame message ({} bytes, image {} bytes)", out.len(), image.len());
    Ok(out)
}

/// Parse a frame message from its wire form.
///
/// # Errors
///
/// Returns [`FrameError::MalformedMessage`] for a wrong magic, unsupported
/// version, wrong field count, unexpected field id or wire type, truncated
/// buffer, trailing bytes, or an empty image.
pub fn deserialize(bytes: &[u8]) -> Result<FrameMessage> {
    let mut reader = WireReader::new(bytes);

    let magic = reader.take(MAGIC.len(), "magic")?;
    if magic != MAGIC {
        return Err(FrameError::malformed(0, format!("bad magic {:02x?}", magic)));
    }

    let version = reader.u8("wire version")?;
    if version != WIRE_VERSION {
        return Err(FrameError::malformed(
            4,
            format!("unsupported wire version {} (expected {})", version, WIRE_VERSION),
        ));
    }

    let field_count = reader.u8("field count")?;
    if field_count != FIELD_COUNT {
        return Err(FrameError::malformed(
            5,
            format!("expected {} fields, found {}", FIELD_COUNT, field_count),
        ));
    }

    reader.field_header(FIELD_IMAGE, WIRE_LEN_DELIMITED)?;
    let length_offset = reader.offset();
    let image_len = u32::from_le_bytes(reader.array("image length")?) as usize;
    let image = reader.take(image_len, "image bytes")?;
    if image.is_empty() {
        return Err(FrameError::malformed(length_offset, "image field is empty"));
    }

    reader.field_header(FIELD_TIMESTAMP, WIRE_FIXED64)?;
    let nanos = i64::from_le_bytes(reader.array("timestamp")?);

    if reader.remaining() != 0 {
        return Err(FrameError::malformed(
            reader.offset(),
            format!("{} trailing bytes after last field", reader.remaining()),
        ));
    }

    FrameMessage::build(image, DateTime::from_timestamp_nanos(nanos))
        .map_err(|e| FrameError::malformed(0, e.to_string()))
}

/// Bounds-checked cursor over a wire buffer
struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(FrameError::malformed(
                self.pos,
                format!("truncated {}: need {} bytes, {} left", what, len, self.remaining()),
            ));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, what)?);
        Ok(buf)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn field_header(&mut self, id: u8, wire_type: u8) -> Result<()> {
        let at = self.pos;
        let [found_id, found_type] = self.array::<2>("field header")?;
        if found_id != id {
            return Err(FrameError::malformed(
                at,
                format!("expected field {}, found field {}", id, found_id),
            ));
        }
        if found_type != wire_type {
            return Err(FrameError::malformed(
                at + 1,
                format!(
                    "field {} has wire type {:#04x}, expected {:#04x}",
                    id, found_type, wire_type
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixture_wall_start;
    use proptest::prelude::*;

    fn sample() -> FrameMessage {
        FrameMessage::build(vec![0xFF, 0xD8, 0xFF, 0xE0], fixture_wall_start()).unwrap()
    }

    #[test]
    fn layout_matches_documentation() {
        let bytes = serialize(&sample()).unwrap();
        assert_eq!(bytes.len(), FIXED_OVERHEAD + 4);
        assert_eq!(&bytes[0..4], b"FWMG");
        assert_eq!(bytes[4], WIRE_VERSION);
        assert_eq!(bytes[5], 2);
        assert_eq!(&bytes[6..8], &[FIELD_IMAGE, WIRE_LEN_DELIMITED]);
        assert_eq!(&bytes[8..12], &4u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(&bytes[16..18], &[FIELD_TIMESTAMP, WIRE_FIXED64]);
        assert_eq!(&bytes[18..26], &1_704_067_200_000_000_000i64.to_le_bytes());
    }

    #[test]
    fn serialization_is_stable_across_calls() {
        let msg = sample();
        assert_eq!(serialize(&msg).unwrap(), serialize(&msg.clone()).unwrap());
    }

    #[test]
    fn rejects_truncated_buffers() {
        let bytes = serialize(&sample()).unwrap();
        for len in 0..bytes.len() {
            let err = deserialize(&bytes[..len]).unwrap_err();
            assert!(matches!(err, FrameError::MalformedMessage { .. }), "len {}: {}", len, err);
        }
    }

    #[test]
    fn rejects_structural_violations() {
        let good = serialize(&sample()).unwrap();

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        let mut bad_version = good.clone();
        bad_version[4] = 9;
        let mut bad_count = good.clone();
        bad_count[5] = 3;
        let mut bad_field = good.clone();
        bad_field[6] = FIELD_TIMESTAMP;
        let mut bad_type = good.clone();
        bad_type[17] = WIRE_LEN_DELIMITED;
        let mut trailing = good.clone();
        trailing.push(0);

        for (name, bytes) in [
            ("magic", bad_magic),
            ("version", bad_version),
            ("count", bad_count),
            ("field id", bad_field),
            ("wire type", bad_type),
            ("trailing", trailing),
        ] {
            let err = deserialize(&bytes).unwrap_err();
            assert!(matches!(err, FrameError::MalformedMessage { .. }), "{}: {}", name, err);
        }
    }

    #[test]
    fn rejects_empty_image_on_the_wire() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&[WIRE_VERSION, FIELD_COUNT, FIELD_IMAGE, WIRE_LEN_DELIMITED]);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&[FIELD_TIMESTAMP, WIRE_FIXED64]);
        bytes.extend_from_slice(&0i64.to_le_bytes());

        assert!(matches!(deserialize(&bytes), Err(FrameError::MalformedMessage { .. })));
    }

    #[test]
    fn oversized_length_prefix_is_truncation_not_panic() {
        let mut bytes = serialize(&sample()).unwrap();
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(deserialize(&bytes), Err(FrameError::MalformedMessage { .. })));
    }

    proptest! {
        #[test]
        fn round_trip_preserves_messages(
            image in prop::collection::vec(any::<u8>(), 1..2048),
            nanos in -4_000_000_000_000_000_000i64..4_000_000_000_000_000_000i64
        ) {
            let msg = FrameMessage::build(image, DateTime::from_timestamp_nanos(nanos)).unwrap();
            let bytes = serialize(&msg).unwrap();
            let decoded = deserialize(&bytes).unwrap();
            prop_assert_eq!(&decoded, &msg);
            prop_assert_eq!(serialize(&decoded).unwrap(), bytes);
        }

        #[test]
        fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = deserialize(&bytes);
        }
    }
}
