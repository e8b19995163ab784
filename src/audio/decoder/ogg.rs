//! Ogg/Vorbis stream backed by symphonia.

use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, Decoder as CodecDecoder, DecoderOptions},
    errors::Error,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
    units::Time,
};
use tracing::{debug, warn};

use super::{Decoder, StreamInfo};
use crate::common::types::AudioFormat;
use crate::common::{MixerError, MixerResult};

struct Reader {
    format: Box<dyn FormatReader>,
    track_id: u32,
    decoder: Box<dyn CodecDecoder>,
    sample_rate: u32,
    n_frames: Option<u64>,
}

impl Reader {
    /// Seek back to the first frame and drop the codec's overlap state.
    fn seek_to_start(&mut self) -> Result<(), Error> {
        let track_id = self.track_id;
        let to_start = || SeekTo::Time {
            time: Time::from(0.0),
            track_id: Some(track_id),
        };

        if let Err(e) = self.format.seek(SeekMode::Accurate, to_start()) {
            debug!("OggStream: accurate seek failed ({}), trying coarse seek", e);
            self.format.seek(SeekMode::Coarse, to_start())?;
        }
        self.decoder.reset();
        Ok(())
    }
}

fn open_reader(data: &Arc<[u8]>) -> Result<Reader, Error> {
    let source = Cursor::new(Arc::clone(data));
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(AudioFormat::Ogg.as_ext());
    if let Some(mime) = AudioFormat::Ogg.as_mime() {
        hint.mime_type(mime);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no audio track found",
            ))
        })?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let n_frames = track.codec_params.n_frames;
    let decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    Ok(Reader {
        format,
        track_id,
        decoder,
        sample_rate,
        n_frames,
    })
}

/// Decodes packets lazily into a small stereo staging buffer and seeks back
/// to the first packet when the stream runs out.
pub struct OggStream {
    data: Arc<[u8]>,
    reader: Option<Reader>,
    sample_buf: Option<SampleBuffer<i16>>,
    pending: Vec<i16>,
    pending_pos: usize,
    /// No packet has been pulled since the last open or seek.
    at_start: bool,
}

impl OggStream {
    pub fn open(data: Arc<[u8]>) -> MixerResult<StreamInfo> {
        let mut stream = Self::new(data)?;
        let (sample_rate, n_frames) = match stream.reader.as_ref() {
            Some(reader) => (reader.sample_rate, reader.n_frames),
            None => return Err(MixerError::format("no audio track")),
        };

        let length = match n_frames {
            Some(n) => n,
            None => {
                let counted = stream.count_frames();
                stream.restart();
                counted
            }
        };

        Ok(StreamInfo::new(sample_rate, length, Box::new(stream)))
    }

    fn new(data: Arc<[u8]>) -> MixerResult<Self> {
        let reader = open_reader(&data)?;
        if reader.sample_rate == 0 {
            return Err(MixerError::format("missing sample rate"));
        }

        Ok(Self {
            data,
            reader: Some(reader),
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            at_start: true,
        })
    }

    fn count_frames(&mut self) -> u64 {
        let mut total = 0u64;
        while self.next_packet() {
            total += (self.pending.len() / 2) as u64;
        }
        debug!("OggStream: counted {} frames", total);
        total
    }

    /// Decode the next packet into `pending`. Returns `false` at end of stream.
    fn next_packet(&mut self) -> bool {
        let Some(reader) = self.reader.as_mut() else {
            return false;
        };
        self.at_start = false;

        loop {
            let packet = match reader.format.next_packet() {
                Ok(p) => p,
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return false;
                }
                Err(e) => {
                    warn!("OggStream: packet read error: {}", e);
                    return false;
                }
            };

            if packet.track_id() != reader.track_id {
                continue;
            }

            match reader.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let spec = *decoded.spec();
                    let channels = spec.channels.count();
                    let needed = decoded.capacity() * channels;

                    if self.sample_buf.as_ref().is_none_or(|b| b.capacity() < needed) {
                        self.sample_buf =
                            Some(SampleBuffer::<i16>::new(decoded.capacity() as u64, spec));
                    }
                    let Some(buf) = self.sample_buf.as_mut() else {
                        continue;
                    };
                    buf.copy_interleaved_ref(decoded);

                    self.pending.clear();
                    for frame in buf.samples().chunks_exact(channels) {
                        let left = frame[0];
                        let right = if channels > 1 { frame[1] } else { left };
                        self.pending.push(left);
                        self.pending.push(right);
                    }
                    self.pending_pos = 0;
                    return true;
                }
                Err(Error::DecodeError(e)) => {
                    warn!("OggStream: decode error (recoverable): {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("OggStream: fatal decode error: {}", e);
                    return false;
                }
            }
        }
    }

    /// Restart decoding from the first packet.
    ///
    /// Seeks the open reader in place; the stream is only reopened when the
    /// container refuses to seek or an earlier reopen failed.
    fn restart(&mut self) {
        self.pending.clear();
        self.pending_pos = 0;

        let seeked = match self.reader.as_mut() {
            Some(_) if self.at_start => true,
            Some(reader) => match reader.seek_to_start() {
                Ok(()) => true,
                Err(e) => {
                    warn!("OggStream: seek to start failed: {}", e);
                    false
                }
            },
            None => false,
        };

        if !seeked {
            self.reader = match open_reader(&self.data) {
                Ok(reader) => Some(reader),
                Err(e) => {
                    warn!("OggStream: failed to reopen stream: {}", e);
                    None
                }
            };
        }
        self.at_start = true;
    }
}

impl Decoder for OggStream {
    fn produce(&mut self, dst: &mut [i16]) {
        let mut written = 0;
        let mut restarted = false;

        while written < dst.len() {
            if self.pending_pos == self.pending.len() {
                if self.next_packet() {
                    restarted = false;
                    continue;
                }
                if restarted {
                    // Nothing decodable even from the start.
                    dst[written..].fill(0);
                    return;
                }
                self.restart();
                restarted = true;
                continue;
            }

            let n = (dst.len() - written).min(self.pending.len() - self.pending_pos);
            dst[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            written += n;
            self.pending_pos += n;
        }
    }

    fn rewind(&mut self) {
        self.restart();
    }
}
