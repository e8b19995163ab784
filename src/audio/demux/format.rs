//! Audio format detection via header byte sniffing.

use crate::common::types::AudioFormat;

/// Sniff the container format from the first bytes of the encoded data.
///
/// WAV is recognised by `"WAVE"` at offset 8 and Ogg by `"OggS"` at offset 0.
/// The WAV parser validates the surrounding RIFF header itself so a damaged
/// header surfaces as a format error rather than an unknown format.
pub fn detect_format(header: &[u8]) -> AudioFormat {
    if header.len() >= 12 && &header[8..12] == b"WAVE" {
        return AudioFormat::Wav;
    }

    if header.starts_with(b"OggS") {
        return AudioFormat::Ogg;
    }

    AudioFormat::Unknown
}
