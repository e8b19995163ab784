//! Channel table: allocation, reclamation and per-channel controls.
//!
//! Channel handles are slot indices `0..channels`. Parameter setters go
//! through the slot's shared [`SourceParams`] and never take the structural
//! lock; anything that links, unlinks or frees a source does.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio::{
    decoder::{self, StreamInfo},
    filters::{BiquadCoeffs, FilterSpec},
    sound::Sound,
    source::{PlaybackState, Source, SourceParams},
};
use crate::common::{
    MixerError, MixerResult,
    types::{ChannelId, FinishedCallback},
};

use super::mixer::{MixCore, Mixer};

/// Initial parameters for a new voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub looping: bool,
    pub gain: f64,
    pub pan: f64,
    pub pitch: f64,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            looping: false,
            gain: 1.0,
            pan: 0.0,
            pitch: 1.0,
        }
    }
}

impl PlayOptions {
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn pan(mut self, pan: f64) -> Self {
        self.pan = pan;
        self
    }

    pub fn pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }
}

impl Mixer {
    pub(crate) fn params(&self, channel: ChannelId) -> MixerResult<Arc<SourceParams>> {
        let slot = self
            .shared
            .params
            .get(channel)
            .ok_or(MixerError::InvalidChannel(channel))?;
        slot.read().clone().ok_or(MixerError::EmptyChannel(channel))
    }

    fn check_channel(&self, channel: ChannelId) -> MixerResult<()> {
        if channel < self.channels() {
            Ok(())
        } else {
            Err(MixerError::InvalidChannel(channel))
        }
    }

    /// Empty slot `idx`, destroying its source. Structural lock held by caller.
    fn release_slot(&self, core: &mut MixCore, idx: usize) -> Option<Source> {
        *self.shared.params[idx].write() = None;
        core.take(idx)
    }

    /// First empty slot, or the first whose source has stopped (reclaimed).
    fn find_free_locked(&self, core: &mut MixCore) -> Option<ChannelId> {
        let idx = core.slots.iter().position(|slot| match slot {
            None => true,
            Some(source) => source.params.state() == PlaybackState::Stopped,
        })?;
        if let Some(stale) = self.release_slot(core, idx) {
            debug!("reclaiming channel {} from a stopped source", stale.channel());
        }
        Some(idx)
    }

    /// Reserve a free channel, reclaiming a stopped one if necessary.
    pub fn find_free_channel(&self) -> MixerResult<ChannelId> {
        let mut core = self.lock_core();
        match self.find_free_locked(&mut core) {
            Some(channel) => Ok(channel),
            None => {
                drop(core);
                warn!("no free channels available");
                Err(MixerError::NoFreeChannel)
            }
        }
    }

    /// Start `sound` on a free channel.
    pub fn play(&self, sound: &Sound, options: PlayOptions) -> MixerResult<ChannelId> {
        let info = match decoder::open(Arc::clone(sound.data())) {
            Ok(info) => info,
            Err(e) => {
                warn!("could not open {}: {}", sound.name(), e);
                return self.fail(e);
            }
        };
        self.play_stream(info, options)
    }

    /// Start an already opened stream on a free channel.
    pub fn play_stream(&self, info: StreamInfo, options: PlayOptions) -> MixerResult<ChannelId> {
        if info.sample_rate == 0 {
            return self.fail(MixerError::format("bad sample rate"));
        }
        if info.length == 0 {
            return self.fail(MixerError::format("empty stream"));
        }

        let params = Arc::new(SourceParams::new(
            info.sample_rate,
            self.shared.sample_rate,
            info.length,
        ));
        params.set_looping(options.looping);
        params.set_gain(options.gain);
        params.set_pan(options.pan);
        params.set_pitch(options.pitch);

        let mut core = self.lock_core();
        let Some(channel) = self.find_free_locked(&mut core) else {
            drop(core);
            warn!("no free channels available");
            return self.fail(MixerError::NoFreeChannel);
        };

        let source = match Source::new(channel, Arc::clone(&params), info) {
            Ok(source) => source,
            Err(e) => {
                drop(core);
                return self.fail(e);
            }
        };

        params.set_state(PlaybackState::Playing);
        core.slots[channel] = Some(source);
        *self.shared.params[channel].write() = Some(params);
        core.link(channel);
        drop(core);

        debug!("playing on channel {}", channel);
        Ok(channel)
    }

    pub fn set_gain(&self, channel: ChannelId, gain: f64) -> MixerResult<()> {
        self.params(channel)?.set_gain(gain);
        Ok(())
    }

    pub fn gain(&self, channel: ChannelId) -> MixerResult<f64> {
        Ok(self.params(channel)?.gain())
    }

    /// Pan in [-1, 1]; out-of-range values are clamped.
    pub fn set_pan(&self, channel: ChannelId, pan: f64) -> MixerResult<()> {
        self.params(channel)?.set_pan(pan);
        Ok(())
    }

    pub fn set_pitch(&self, channel: ChannelId, pitch: f64) -> MixerResult<()> {
        self.params(channel)?.set_pitch(pitch);
        Ok(())
    }

    pub fn set_loop(&self, channel: ChannelId, looping: bool) -> MixerResult<()> {
        self.params(channel)?.set_looping(looping);
        Ok(())
    }

    pub fn set_iir(&self, channel: ChannelId, coeffs: BiquadCoeffs) -> MixerResult<()> {
        self.params(channel)?.set_coeffs(coeffs);
        Ok(())
    }

    pub fn iir(&self, channel: ChannelId) -> MixerResult<BiquadCoeffs> {
        Ok(self.params(channel)?.coeffs())
    }

    /// Design a filter with the coefficient provider and apply it to the channel.
    pub fn set_filter(&self, channel: ChannelId, spec: FilterSpec) -> MixerResult<()> {
        let params = self.params(channel)?;
        params.set_coeffs(self.design(spec));
        Ok(())
    }

    /// Move the gain to `target` over `duration` seconds of mixer clock.
    pub fn fade(&self, channel: ChannelId, duration: f64, target: f64) -> MixerResult<()> {
        let params = self.params(channel)?;
        let now = self.shared.clock.read().now();
        params.start_fade(now, duration, target);
        Ok(())
    }

    pub fn pause(&self, channel: ChannelId) -> MixerResult<()> {
        self.params(channel)?.set_state(PlaybackState::Paused);
        Ok(())
    }

    /// Play a paused or stopped channel.
    pub fn resume(&self, channel: ChannelId) -> MixerResult<()> {
        let params = self.params(channel)?;
        let mut core = self.lock_core();
        // The slot may have been reclaimed since the lookup.
        if !core.slots[channel]
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(&s.params, &params))
        {
            return Err(MixerError::EmptyChannel(channel));
        }
        params.set_state(PlaybackState::Playing);
        core.link(channel);
        Ok(())
    }

    /// Stop and rewind; the next play starts from the beginning.
    pub fn stop(&self, channel: ChannelId) -> MixerResult<()> {
        self.params(channel)?.stop();
        Ok(())
    }

    pub fn state(&self, channel: ChannelId) -> MixerResult<PlaybackState> {
        Ok(self.params(channel)?.state())
    }

    /// Seconds into the current play-through.
    pub fn position(&self, channel: ChannelId) -> MixerResult<f64> {
        Ok(self.params(channel)?.position())
    }

    /// Stream length in seconds.
    pub fn length(&self, channel: ChannelId) -> MixerResult<f64> {
        Ok(self.params(channel)?.length())
    }

    pub fn set_finished_callback<F>(&self, channel: ChannelId, callback: F) -> MixerResult<()>
    where
        F: Fn(ChannelId) + Send + Sync + 'static,
    {
        let callback: FinishedCallback = Arc::new(callback);
        self.params(channel)?.set_finished_callback(Some(callback));
        Ok(())
    }

    pub fn clear_finished_callback(&self, channel: ChannelId) -> MixerResult<()> {
        self.params(channel)?.set_finished_callback(None);
        Ok(())
    }

    /// Install `callback` on every occupied channel.
    pub fn set_finished_callback_all<F>(&self, callback: F)
    where
        F: Fn(ChannelId) + Send + Sync + 'static,
    {
        let callback: FinishedCallback = Arc::new(callback);
        for slot in self.shared.params.iter() {
            if let Some(params) = slot.read().as_ref() {
                params.set_finished_callback(Some(Arc::clone(&callback)));
            }
        }
    }

    /// Destroy the channel's source and empty the slot.
    pub fn destroy(&self, channel: ChannelId) -> MixerResult<()> {
        self.check_channel(channel)?;
        let mut core = self.lock_core();
        let source = self.release_slot(&mut core, channel);
        drop(core);
        match source {
            Some(_) => Ok(()),
            None => Err(MixerError::EmptyChannel(channel)),
        }
    }

    /// Destroy every source decoding `sound`. Returns how many were removed.
    pub fn release_sound(&self, sound: &Sound) -> usize {
        let mut core = self.lock_core();
        let mut released = Vec::new();
        for idx in 0..core.slots.len() {
            if core.slots[idx].as_ref().is_some_and(|s| s.uses_data(sound.data())) {
                released.extend(self.release_slot(&mut core, idx));
            }
        }
        drop(core);
        debug!("released {} channel(s) playing {}", released.len(), sound.name());
        released.len()
    }

    /// Destroy every source.
    pub fn close(&self) {
        let mut core = self.lock_core();
        let mut released = Vec::new();
        for idx in 0..core.slots.len() {
            released.extend(self.release_slot(&mut core, idx));
        }
        drop(core);
        debug!("closed mixer, {} channel(s) destroyed", released.len());
    }

    /// Channels currently linked into the active list.
    pub fn active_channels(&self) -> Vec<ChannelId> {
        self.lock_core().active_channels()
    }
}
