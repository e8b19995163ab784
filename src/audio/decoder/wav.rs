//! RIFF/WAVE PCM stream: 8- or 16-bit, mono or stereo.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use super::{Decoder, StreamInfo};
use crate::common::{MixerError, MixerResult};

const WAVE_FORMAT_PCM: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WavFormat {
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// Locate a subchunk by id in the RIFF body, returning its payload range.
fn find_subchunk(data: &[u8], id: &[u8; 4]) -> Option<(usize, usize)> {
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let size = LittleEndian::read_u32(&data[pos + 4..pos + 8]) as usize;
        let start = pos + 8;
        if &data[pos..pos + 4] == id {
            // Truncated files keep whatever data is present.
            let end = start.saturating_add(size).min(data.len());
            return Some((start, end));
        }
        // Chunks are word-aligned.
        pos = start.saturating_add(size).saturating_add(size & 1);
    }
    None
}

fn parse_header(data: &[u8]) -> MixerResult<(WavFormat, usize, usize)> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(MixerError::format("bad wav header"));
    }

    let (fmt_start, fmt_end) =
        find_subchunk(data, b"fmt ").ok_or_else(|| MixerError::format("no fmt subchunk"))?;
    let fmt = &data[fmt_start..fmt_end];
    if fmt.len() < 16 {
        return Err(MixerError::format("bad format"));
    }
    if LittleEndian::read_u16(&fmt[0..2]) != WAVE_FORMAT_PCM {
        return Err(MixerError::format("unsupported format"));
    }

    let format = WavFormat {
        channels: LittleEndian::read_u16(&fmt[2..4]),
        sample_rate: LittleEndian::read_u32(&fmt[4..8]),
        bits_per_sample: LittleEndian::read_u16(&fmt[14..16]),
    };
    if format.channels == 0 || format.sample_rate == 0 || format.bits_per_sample == 0 {
        return Err(MixerError::format("bad format"));
    }

    let (data_start, data_end) =
        find_subchunk(data, b"data").ok_or_else(|| MixerError::format("no data subchunk"))?;

    if !matches!(format.bits_per_sample, 8 | 16) || !matches!(format.channels, 1 | 2) {
        return Err(MixerError::format("unsupported wav format"));
    }

    Ok((format, data_start, data_end))
}

pub struct WavStream {
    data: Arc<[u8]>,
    start: usize,
    format: WavFormat,
    length: usize,
    cursor: usize,
}

impl WavStream {
    pub fn open(data: Arc<[u8]>) -> MixerResult<StreamInfo> {
        let (format, start, end) = parse_header(&data)?;
        let bytes_per_sample = (format.bits_per_sample / 8) as usize;
        let length = (end - start) / bytes_per_sample / format.channels as usize;

        let stream = Self {
            data,
            start,
            format,
            length,
            cursor: 0,
        };
        Ok(StreamInfo::new(
            format.sample_rate,
            length as u64,
            Box::new(stream),
        ))
    }

    fn sample(&self, index: usize) -> i16 {
        match self.format.bits_per_sample {
            16 => {
                let at = self.start + index * 2;
                LittleEndian::read_i16(&self.data[at..at + 2])
            }
            _ => ((self.data[self.start + index] as i16) - 128) << 8,
        }
    }

    fn frame(&self, frame: usize) -> (i16, i16) {
        if self.format.channels == 2 {
            (self.sample(frame * 2), self.sample(frame * 2 + 1))
        } else {
            let s = self.sample(frame);
            (s, s)
        }
    }
}

impl Decoder for WavStream {
    fn produce(&mut self, dst: &mut [i16]) {
        if self.length == 0 {
            dst.fill(0);
            return;
        }

        for out in dst.chunks_exact_mut(2) {
            if self.cursor >= self.length {
                self.cursor = 0;
            }
            let (l, r) = self.frame(self.cursor);
            out[0] = l;
            out[1] = r;
            self.cursor += 1;
        }
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}
