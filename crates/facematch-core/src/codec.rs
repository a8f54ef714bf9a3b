//! Binary descriptor encoding for persistence.
//!
//! Each component is stored as its 4 little-endian IEEE-754 bytes, in order.
//! The encoding is bit-exact: signed zeros, subnormals and every mantissa bit
//! survive a round trip.

use thiserror::Error;

use crate::types::Descriptor;

const COMPONENT_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DescriptorCodecError {
    #[error("descriptor blob length {0} is not a multiple of {COMPONENT_BYTES}")]
    InvalidLength(usize),
}

pub fn encode(descriptor: &Descriptor) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(descriptor.values.len() * COMPONENT_BYTES);
    for value in &descriptor.values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode(blob: &[u8]) -> Result<Descriptor, DescriptorCodecError> {
    if blob.len() % COMPONENT_BYTES != 0 {
        return Err(DescriptorCodecError::InvalidLength(blob.len()));
    }
    let values = blob
        .chunks_exact(COMPONENT_BYTES)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Descriptor { values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(d: &Descriptor) -> Vec<u32> {
        d.values.iter().map(|v| v.to_bits()).collect()
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let original = Descriptor::new(vec![
            0.1,
            -0.0,
            0.0,
            f32::MIN_POSITIVE,
            f32::MIN_POSITIVE / 8.0, // subnormal
            f32::MAX,
            f32::MIN,
            f32::EPSILON,
            1.0 / 3.0,
            -123_456.79,
        ]);
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(bits(&decoded), bits(&original));
    }

    #[test]
    fn test_encoded_length() {
        let d = Descriptor::new(vec![0.0; 128]);
        assert_eq!(encode(&d).len(), 512);
    }

    #[test]
    fn test_layout_is_little_endian() {
        let d = Descriptor::new(vec![1.0]);
        assert_eq!(encode(&d), vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        assert_eq!(
            decode(&[0u8; 7]).unwrap_err(),
            DescriptorCodecError::InvalidLength(7)
        );
    }

    #[test]
    fn test_empty_blob_decodes_to_empty_descriptor() {
        assert_eq!(decode(&[]).unwrap().dimension(), 0);
    }
}
