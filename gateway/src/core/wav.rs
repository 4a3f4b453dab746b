//! WAV container framing for streamed PCM audio.
//!
//! The speech service emits raw linear16 PCM. Browsers and most media players
//! will not play headerless PCM, so the relay prefixes each audio burst with a
//! RIFF/WAVE header. The total length of the stream is unknown when the header
//! is emitted, so both size fields are written as zero; players that accept
//! live streams ignore them.

/// Length of a canonical PCM WAV header in bytes.
pub const HEADER_LEN: usize = 44;

/// Sample rate of the audio stream requested from the speech service.
pub const STREAM_SAMPLE_RATE: u32 = 48_000;

/// Highest sample rate accepted for the stream (384 kHz).
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Channel count of the streamed audio.
pub const STREAM_CHANNELS: u16 = 1;

/// Bit depth of the streamed audio (linear16).
pub const STREAM_BITS_PER_SAMPLE: u16 = 16;

/// Build a streaming WAV header for PCM audio.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz (e.g., 48000)
/// * `channels` - Number of channels (1 for mono, 2 for stereo)
/// * `bits_per_sample` - Bits per sample (typically 16)
///
/// # Returns
/// A 44-byte header with zeroed RIFF and data size placeholders. Derived
/// fields that do not fit their on-disk width saturate instead of wrapping.
pub fn build_header(sample_rate: u32, channels: u16, bits_per_sample: u16) -> [u8; HEADER_LEN] {
    let block_align = u32::from(channels) * u32::from(bits_per_sample) / 8;
    let byte_rate = sample_rate.saturating_mul(block_align);
    let block_align = u16::try_from(block_align).unwrap_or(u16::MAX);

    let mut header = [0u8; HEADER_LEN];

    // RIFF chunk descriptor, size left at zero
    header[0..4].copy_from_slice(b"RIFF");
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());

    // data sub-chunk, size left at zero
    header[36..40].copy_from_slice(b"data");

    header
}

/// Header for the fixed stream format: 48 kHz, mono, 16-bit.
#[inline]
pub fn streaming_header() -> [u8; HEADER_LEN] {
    build_header(STREAM_SAMPLE_RATE, STREAM_CHANNELS, STREAM_BITS_PER_SAMPLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_header_matches_reference_bytes() {
        let expected: [u8; HEADER_LEN] = [
            0x52, 0x49, 0x46, 0x46, // "RIFF"
            0x00, 0x00, 0x00, 0x00, // size placeholder
            0x57, 0x41, 0x56, 0x45, // "WAVE"
            0x66, 0x6d, 0x74, 0x20, // "fmt "
            0x10, 0x00, 0x00, 0x00, // fmt chunk size (16)
            0x01, 0x00, // PCM
            0x01, 0x00, // mono
            0x80, 0xbb, 0x00, 0x00, // 48000
            0x00, 0x77, 0x01, 0x00, // 96000
            0x02, 0x00, // block align
            0x10, 0x00, // 16 bits
            0x64, 0x61, 0x74, 0x61, // "data"
            0x00, 0x00, 0x00, 0x00, // data size placeholder
        ];

        assert_eq!(streaming_header(), expected);
    }

    #[test]
    fn test_header_fields() {
        let header = build_header(48_000, 1, 16);

        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");

        let sample_rate = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
        assert_eq!(sample_rate, 48_000);
        let byte_rate = u32::from_le_bytes([header[28], header[29], header[30], header[31]]);
        assert_eq!(byte_rate, 96_000);
        let block_align = u16::from_le_bytes([header[32], header[33]]);
        assert_eq!(block_align, 2);
    }

    #[test]
    fn test_size_placeholders_are_zero() {
        let header = build_header(24_000, 2, 16);
        assert_eq!(&header[4..8], &[0, 0, 0, 0]);
        assert_eq!(&header[40..44], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_stereo_header() {
        let header = build_header(44_100, 2, 16);

        let channels = u16::from_le_bytes([header[22], header[23]]);
        assert_eq!(channels, 2);
        let byte_rate = u32::from_le_bytes([header[28], header[29], header[30], header[31]]);
        assert_eq!(byte_rate, 44_100 * 4);
        let block_align = u16::from_le_bytes([header[32], header[33]]);
        assert_eq!(block_align, 4);
    }

    #[test]
    fn test_oversized_parameters_saturate() {
        let header = build_header(3_000_000_000, 1, 16);
        assert_eq!(&header[24..28], &3_000_000_000u32.to_le_bytes());
        assert_eq!(&header[28..32], &u32::MAX.to_le_bytes());

        let header = build_header(48_000, u16::MAX, u16::MAX);
        assert_eq!(&header[32..34], &u16::MAX.to_le_bytes());
    }
}
