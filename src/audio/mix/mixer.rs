//! `audio/mix/mixer.rs`: the mixing engine.
//!
//! Contains:
//! - [`Mixer`]: cloneable handle shared by the control side and the audio callback
//! - `MixCore`: slot arena plus the intrusive active list, guarded by the structural lock
//! - `MasterStage`: accumulation buffer, master filter history and pending callbacks

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::audio::{
    clock::{Clock, MonotonicClock},
    constants::{INT16_MAX_I32, INT16_MIN_I32, MIXER_CHANNELS},
    filters::{BiquadCoeffs, Butterworth, CoefficientProvider, FilterSpec, StereoBiquad},
    fixed::Fixed,
    source::{AtomicCoeffs, PlaybackState, Source, SourceParams},
};
use crate::common::{MixerError, MixerResult, types::ChannelId};
use crate::configs::MixerConfig;

use super::callbacks::CallbackQueue;
use super::lock::{EventGuard, LockEvents};

// ─── MixCore ─────────────────────────────────────────────────────────────────

/// Structural state: who occupies which slot and who is being mixed.
pub(crate) struct MixCore {
    pub(crate) slots: Vec<Option<Source>>,
    /// Head of the active list, threaded through `Source::next`.
    head: Option<usize>,
}

impl MixCore {
    fn new(channels: usize) -> Self {
        Self {
            slots: (0..channels).map(|_| None).collect(),
            head: None,
        }
    }

    /// Push the source in `idx` onto the active list unless already linked.
    pub(crate) fn link(&mut self, idx: usize) {
        let head = self.head;
        if let Some(source) = self.slots[idx].as_mut() {
            if !source.active {
                source.active = true;
                source.next = head;
                self.head = Some(idx);
            }
        }
    }

    /// Remove `idx` from the active list, wherever it sits.
    fn unlink(&mut self, idx: usize) {
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let next = self.slots[current].as_ref().and_then(|s| s.next);
            if current == idx {
                self.set_next(prev, next);
                if let Some(source) = self.slots[idx].as_mut() {
                    source.active = false;
                    source.next = None;
                }
                return;
            }
            prev = Some(current);
            cursor = next;
        }
    }

    fn set_next(&mut self, prev: Option<usize>, next: Option<usize>) {
        match prev {
            None => self.head = next,
            Some(p) => {
                if let Some(source) = self.slots[p].as_mut() {
                    source.next = next;
                }
            }
        }
    }

    /// Take the source out of `idx`, unlinking it first.
    pub(crate) fn take(&mut self, idx: usize) -> Option<Source> {
        if self.slots[idx].as_ref().is_some_and(|s| s.active) {
            self.unlink(idx);
        }
        self.slots[idx].take()
    }

    /// Mix every active source into `mix`; sources that are no longer
    /// playing afterwards leave the list here and nowhere else.
    fn walk(&mut self, mix: &mut [i32], clock: &dyn Clock, queue: &mut CallbackQueue) {
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(idx) = cursor {
            let Some(source) = self.slots[idx].as_mut() else {
                warn!("active list references empty slot {}", idx);
                self.set_next(prev, None);
                break;
            };

            source.process(mix, clock, queue);
            let next = source.next;

            if source.params.state() != PlaybackState::Playing {
                source.active = false;
                source.next = None;
                self.set_next(prev, next);
            } else {
                prev = Some(idx);
            }
            cursor = next;
        }
    }

    /// Channel ids on the active list, head first.
    pub(crate) fn active_channels(&self) -> Vec<ChannelId> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            out.push(idx);
            cursor = self.slots[idx].as_ref().and_then(|s| s.next);
        }
        out
    }
}

// ─── MasterStage ─────────────────────────────────────────────────────────────

/// Producer-only state; never touched by control calls.
struct MasterStage {
    mix: Vec<i32>,
    filter: StereoBiquad,
    queue: CallbackQueue,
}

#[inline]
fn clip(sample: i64) -> i16 {
    sample.clamp(INT16_MIN_I32 as i64, INT16_MAX_I32 as i64) as i16
}

// ─── Mixer ───────────────────────────────────────────────────────────────────

pub(crate) struct Shared {
    pub(crate) sample_rate: u32,
    pub(crate) block_frames: usize,
    pub(crate) core: Mutex<MixCore>,
    master: Mutex<MasterStage>,
    /// Parameter blocks of occupied slots, for setters that skip the structural lock.
    pub(crate) params: Box<[RwLock<Option<Arc<SourceParams>>>]>,
    master_gain: AtomicI64, // Fixed raw
    master_coeffs: AtomicCoeffs,
    pub(crate) clock: RwLock<Arc<dyn Clock>>,
    lock_events: RwLock<Option<Arc<dyn LockEvents>>>,
    pub(crate) provider: RwLock<Arc<dyn CoefficientProvider>>,
    pub(crate) last_error: Mutex<Option<String>>,
}

/// The mixing engine. Clones share one engine.
///
/// The audio callback calls [`Mixer::process`]; every other method is a
/// control call and may run concurrently from any thread.
#[derive(Clone)]
pub struct Mixer {
    pub(crate) shared: Arc<Shared>,
}

impl Mixer {
    pub fn new(config: &MixerConfig) -> MixerResult<Self> {
        config.validate()?;

        let master = MasterStage {
            mix: vec![0i32; config.block_frames * MIXER_CHANNELS],
            filter: StereoBiquad::default(),
            queue: CallbackQueue::new(config.channels),
        };

        let shared = Shared {
            sample_rate: config.sample_rate,
            block_frames: config.block_frames,
            core: Mutex::new(MixCore::new(config.channels)),
            master: Mutex::new(master),
            params: (0..config.channels).map(|_| RwLock::new(None)).collect(),
            master_gain: AtomicI64::new(Fixed::from_f64(config.master_gain).raw()),
            master_coeffs: AtomicCoeffs::default(),
            clock: RwLock::new(Arc::new(MonotonicClock::new())),
            lock_events: RwLock::new(None),
            provider: RwLock::new(Arc::new(Butterworth)),
            last_error: Mutex::new(None),
        };

        info!(
            "mixer ready: {}Hz, {} frames per block, {} channels",
            config.sample_rate, config.block_frames, config.channels
        );
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    pub fn block_frames(&self) -> usize {
        self.shared.block_frames
    }

    pub fn channels(&self) -> usize {
        self.shared.params.len()
    }

    /// Acquire the structural lock, bracketed by the registered lock events.
    pub(crate) fn lock_core(&self) -> EventGuard<'_, MixCore> {
        let events = self.shared.lock_events.read().clone();
        EventGuard::acquire(&self.shared.core, events)
    }

    /// Fill `out` with interleaved stereo samples.
    ///
    /// Requests longer than the block size are mixed block by block. Finished
    /// callbacks run on this thread and must not call `process` themselves.
    pub fn process(&self, out: &mut [i16]) {
        let block = self.shared.block_frames * MIXER_CHANNELS;
        for chunk in out.chunks_mut(block) {
            self.process_block(chunk);
        }
    }

    fn process_block(&self, out: &mut [i16]) {
        let frames = out.len() / MIXER_CHANNELS;
        let mut master = self.shared.master.lock();
        let MasterStage { mix, filter, queue } = &mut *master;

        let mix = &mut mix[..frames * MIXER_CHANNELS];
        mix.fill(0);
        queue.clear();

        let clock = self.shared.clock.read().clone();
        {
            let mut core = self.lock_core();
            core.walk(mix, clock.as_ref(), queue);
        }

        queue.dispatch();

        let gain = Fixed::from_raw(self.shared.master_gain.load(Ordering::Acquire));
        let coeffs = self.shared.master_coeffs.load();
        for (dst, src) in out
            .chunks_exact_mut(MIXER_CHANNELS)
            .zip(mix.chunks_exact(MIXER_CHANNELS))
        {
            let (left, right) = filter.process(src[0] as i64, src[1] as i64, &coeffs);
            dst[0] = clip(gain.scale(left));
            dst[1] = clip(gain.scale(right));
        }

        // Odd trailing sample of a malformed request.
        if out.len() % MIXER_CHANNELS != 0 {
            if let Some(last) = out.last_mut() {
                *last = 0;
            }
        }
    }

    // ── Master controls ──────────────────────────────────────────────────────

    pub fn set_master_gain(&self, gain: f64) {
        self.shared
            .master_gain
            .store(Fixed::from_f64(gain.max(0.0)).raw(), Ordering::Release);
    }

    pub fn master_gain(&self) -> f64 {
        Fixed::from_raw(self.shared.master_gain.load(Ordering::Acquire)).to_f64()
    }

    pub fn set_master_iir(&self, coeffs: BiquadCoeffs) {
        self.shared.master_coeffs.store(coeffs);
    }

    pub fn master_iir(&self) -> BiquadCoeffs {
        self.shared.master_coeffs.load()
    }

    pub fn set_master_filter(&self, spec: FilterSpec) {
        let coeffs = self.design(spec);
        self.set_master_iir(coeffs);
    }

    /// Register (or clear) the handler told about structural lock/unlock.
    pub fn set_lock_handler(&self, handler: Option<Arc<dyn LockEvents>>) {
        *self.shared.lock_events.write() = handler;
    }

    /// Replace the time source used for fades.
    pub fn set_clock(&self, clock: impl Clock + 'static) {
        *self.shared.clock.write() = Arc::new(clock);
    }

    pub fn set_coefficient_provider(&self, provider: impl CoefficientProvider + 'static) {
        *self.shared.provider.write() = Arc::new(provider);
    }

    pub(crate) fn design(&self, spec: FilterSpec) -> BiquadCoeffs {
        self.shared
            .provider
            .read()
            .coefficients(spec, self.shared.sample_rate)
    }

    /// The message of the most recent failed play request, cleared on read.
    pub fn take_last_error(&self) -> Option<String> {
        self.shared.last_error.lock().take()
    }

    pub(crate) fn fail<T>(&self, err: MixerError) -> MixerResult<T> {
        *self.shared.last_error.lock() = Some(err.to_string());
        Err(err)
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("sample_rate", &self.shared.sample_rate)
            .field("block_frames", &self.shared.block_frames)
            .field("channels", &self.shared.params.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::audio::clock::ManualClock;
    use crate::audio::decoder::testing::{Counters, ramp, stream};
    use crate::audio::decoder::wav::tests::build_wav;
    use crate::audio::mix::{PlayOptions, finished_channel};
    use crate::audio::sound::Sound;

    const RATE: u32 = 44_100;

    fn mixer(channels: usize, block_frames: usize) -> Mixer {
        let config = MixerConfig {
            sample_rate: RATE,
            block_frames,
            channels,
            master_gain: 1.0,
        };
        Mixer::new(&config).unwrap()
    }

    fn render(mixer: &Mixer, frames: usize) -> Vec<i16> {
        let mut out = vec![0i16; frames * MIXER_CHANNELS];
        mixer.process(&mut out);
        out
    }

    fn play_frames(
        mixer: &Mixer,
        frames: Vec<(i16, i16)>,
        options: PlayOptions,
    ) -> (ChannelId, Arc<Counters>) {
        let (info, counters) = stream(frames, RATE);
        let channel = mixer.play_stream(info, options).unwrap();
        (channel, counters)
    }

    fn counter() -> (impl Fn(ChannelId) + Send + Sync + 'static, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        (
            move |_: ChannelId| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
            hits,
        )
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MixerConfig {
            block_frames: 0,
            ..MixerConfig::default()
        };
        assert!(matches!(Mixer::new(&config), Err(MixerError::Config(_))));
    }

    #[test]
    fn identity_mixing_reproduces_source() {
        let mixer = mixer(4, 256);
        play_frames(&mixer, ramp(1_000), PlayOptions::default());

        let out = render(&mixer, 1_000);
        for (i, frame) in out.chunks_exact(2).enumerate() {
            assert_eq!(frame, [i as i16, -(i as i16)], "frame {i}");
        }
    }

    #[test]
    fn block_splitting_matches_single_block() {
        let whole = mixer(2, 1_000);
        let split = mixer(2, 64);
        let options = PlayOptions::default().pitch(0.75).gain(0.8).pan(-0.3);
        play_frames(&whole, ramp(900), options);
        play_frames(&split, ramp(900), options);

        assert_eq!(render(&whole, 1_000), render(&split, 1_000));
    }

    #[test]
    fn looping_source_wraps_once_per_length() {
        let mixer = mixer(2, 256);
        let (channel, counters) = play_frames(&mixer, ramp(1_000), PlayOptions::default().looping(true));
        let (callback, hits) = counter();
        mixer.set_finished_callback(channel, callback).unwrap();

        let k = 5;
        render(&mixer, k * 1_000);

        assert_eq!(counters.wraps.load(Ordering::SeqCst), k);
        assert_eq!(counters.rewinds.load(Ordering::SeqCst), 1);
        assert_eq!(mixer.state(channel).unwrap(), PlaybackState::Playing);
        assert_eq!(mixer.position(channel).unwrap(), 0.0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn finished_fires_exactly_once() {
        let mixer = mixer(2, 256);
        let (channel, _) = play_frames(&mixer, ramp(300), PlayOptions::default());
        let (callback, hits) = counter();
        mixer.set_finished_callback(channel, callback).unwrap();

        render(&mixer, 1_024);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(mixer.state(channel).unwrap(), PlaybackState::Stopped);
        assert!(mixer.active_channels().is_empty());

        render(&mixer, 4_096);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_may_reenter_the_mixer() {
        let mixer = mixer(2, 256);
        let (channel, _) = play_frames(&mixer, ramp(100), PlayOptions::default());
        let inner = mixer.clone();
        let reclaimed = Arc::new(AtomicUsize::new(usize::MAX));
        let slot = Arc::clone(&reclaimed);
        mixer
            .set_finished_callback(channel, move |_| {
                if let Ok(ch) = inner.find_free_channel() {
                    slot.store(ch, Ordering::SeqCst);
                }
            })
            .unwrap();

        render(&mixer, 256);
        assert_eq!(reclaimed.load(Ordering::SeqCst), channel);
        // The stopped source was reclaimed from inside the callback.
        mixer.close();
    }

    #[test]
    fn gain_and_pan_law() {
        let mixer = mixer(2, 16);
        let (channel, _) = play_frames(
            &mixer,
            vec![(1_000, 1_000); 4_096],
            PlayOptions::default().looping(true).gain(0.5),
        );

        let out = render(&mixer, 4);
        assert!(out.chunks_exact(2).all(|f| f == [500, 500]));

        mixer.set_pan(channel, 1.0).unwrap();
        let out = render(&mixer, 4);
        assert!(out.chunks_exact(2).all(|f| f == [0, 500]));

        mixer.set_pan(channel, -1.0).unwrap();
        let out = render(&mixer, 4);
        assert!(out.chunks_exact(2).all(|f| f == [500, 0]));
    }

    #[test]
    fn filters_start_as_identity() {
        let mixer = mixer(2, 16);
        let (channel, _) = play_frames(&mixer, ramp(100), PlayOptions::default());
        assert!(mixer.master_iir().is_identity());
        assert!(mixer.iir(channel).unwrap().is_identity());

        mixer
            .set_filter(channel, FilterSpec::Lowpass { order: 2, cutoff: 1_000.0 })
            .unwrap();
        assert!(!mixer.iir(channel).unwrap().is_identity());

        mixer.set_filter(channel, FilterSpec::Bypass).unwrap();
        mixer.set_master_filter(FilterSpec::Bypass);
        assert!(mixer.iir(channel).unwrap().is_identity());
        assert!(mixer.master_iir().is_identity());
    }

    #[test]
    fn master_filter_is_applied() {
        let mixer = mixer(2, 16);
        play_frames(&mixer, vec![(1_000, -1_000); 64], PlayOptions::default());
        mixer.set_master_iir(BiquadCoeffs::new(0.5, 0.5, 0.0, 0.0, 0.0));

        let out = render(&mixer, 3);
        assert_eq!(out, [500, -500, 1_000, -1_000, 1_000, -1_000]);
    }

    #[test]
    fn fade_reaches_target_after_duration() {
        let mixer = mixer(2, 64);
        let clock = Arc::new(ManualClock::new(0.0));
        let shared_clock = Arc::clone(&clock);
        mixer.set_clock(move || shared_clock.now());

        let (channel, _) = play_frames(
            &mixer,
            vec![(1_000, 1_000); 44_100],
            PlayOptions::default().looping(true),
        );
        mixer.fade(channel, 1.0, 0.0).unwrap();

        clock.set(0.5);
        render(&mixer, 64);
        assert!((mixer.gain(channel).unwrap() - 0.5).abs() < 1e-12);

        clock.set(1.0);
        let out = render(&mixer, 64);
        assert_eq!(mixer.gain(channel).unwrap(), 0.0);
        assert!(!mixer.params(channel).unwrap().is_fading());
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn fade_does_not_progress_while_paused() {
        let mixer = mixer(2, 64);
        let clock = Arc::new(ManualClock::new(0.0));
        let shared_clock = Arc::clone(&clock);
        mixer.set_clock(move || shared_clock.now());

        let (channel, _) = play_frames(
            &mixer,
            vec![(1_000, 1_000); 44_100],
            PlayOptions::default().looping(true),
        );
        mixer.pause(channel).unwrap();
        mixer.fade(channel, 1.0, 0.0).unwrap();
        clock.set(2.0);
        render(&mixer, 64);
        assert_eq!(mixer.gain(channel).unwrap(), 1.0);

        mixer.resume(channel).unwrap();
        render(&mixer, 64);
        assert_eq!(mixer.gain(channel).unwrap(), 0.0);
    }

    #[test]
    fn exhaustion_fails_without_disturbing_others() {
        let mixer = mixer(4, 64);
        let channels: Vec<_> = (0..4)
            .map(|_| play_frames(&mixer, ramp(1_000), PlayOptions::default().looping(true)).0)
            .collect();
        assert_eq!(channels, [0, 1, 2, 3]);

        let (info, counters) = stream(ramp(1_000), RATE);
        let err = mixer.play_stream(info, PlayOptions::default()).unwrap_err();
        assert!(matches!(err, MixerError::NoFreeChannel));
        assert!(counters.dropped.load(Ordering::SeqCst));
        assert_eq!(
            mixer.take_last_error().as_deref(),
            Some("no free channels available")
        );
        assert_eq!(mixer.take_last_error(), None);

        for channel in channels {
            assert_eq!(mixer.state(channel).unwrap(), PlaybackState::Playing);
        }
        assert_eq!(mixer.active_channels().len(), 4);
    }

    #[test]
    fn stopped_channels_are_reclaimed() {
        let mixer = mixer(2, 64);
        let (first, first_counters) = play_frames(&mixer, ramp(1_000), PlayOptions::default());
        play_frames(&mixer, ramp(1_000), PlayOptions::default());

        mixer.stop(first).unwrap();
        let (again, _) = play_frames(&mixer, ramp(1_000), PlayOptions::default());
        assert_eq!(again, first);
        assert!(first_counters.dropped.load(Ordering::SeqCst));
        assert_eq!(mixer.active_channels().len(), 2);
    }

    #[test]
    fn paused_source_keeps_its_place() {
        let mixer = mixer(2, 256);
        let (channel, _) = play_frames(&mixer, ramp(1_000), PlayOptions::default());
        render(&mixer, 100);

        mixer.pause(channel).unwrap();
        assert!(render(&mixer, 100).iter().all(|&s| s == 0));
        assert!(mixer.active_channels().is_empty());
        assert_eq!(mixer.state(channel).unwrap(), PlaybackState::Paused);

        mixer.resume(channel).unwrap();
        let out = render(&mixer, 2);
        assert_eq!(out, [100, -100, 101, -101]);
    }

    #[test]
    fn stop_then_resume_restarts() {
        let mixer = mixer(2, 256);
        let (channel, counters) = play_frames(&mixer, ramp(1_000), PlayOptions::default());
        render(&mixer, 50);

        mixer.stop(channel).unwrap();
        render(&mixer, 10);
        mixer.resume(channel).unwrap();
        let out = render(&mixer, 2);
        assert_eq!(out, [0, 0, 1, -1]);
        assert_eq!(counters.rewinds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn master_stage_clips() {
        let mixer = mixer(4, 16);
        for _ in 0..2 {
            play_frames(&mixer, vec![(30_000, -30_000); 64], PlayOptions::default());
        }
        let out = render(&mixer, 4);
        assert!(out.chunks_exact(2).all(|f| f == [i16::MAX, i16::MIN]));

        mixer.set_master_gain(0.25);
        let out = render(&mixer, 4);
        assert!(out.chunks_exact(2).all(|f| f == [15_000, -15_000]));
    }

    #[test]
    fn negative_master_gain_never_inverts() {
        let config = MixerConfig {
            master_gain: -1.0,
            ..MixerConfig::default()
        };
        assert!(matches!(Mixer::new(&config), Err(MixerError::Config(_))));

        let mixer = mixer(2, 16);
        mixer.set_master_gain(-1.0);
        assert_eq!(mixer.master_gain(), 0.0);
        play_frames(&mixer, vec![(1_000, 1_000); 64], PlayOptions::default());
        assert!(render(&mixer, 8).iter().all(|&s| s == 0));
    }

    #[test]
    fn position_and_length_in_seconds() {
        let mixer = mixer(2, 100);
        let (channel, _) = play_frames(&mixer, ramp(44_100 / 2), PlayOptions::default());
        render(&mixer, 4_410);
        assert!((mixer.position(channel).unwrap() - 0.1).abs() < 1e-9);
        assert!((mixer.length(channel).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn channel_errors() {
        let mixer = mixer(2, 16);
        assert!(matches!(mixer.set_gain(7, 1.0), Err(MixerError::InvalidChannel(7))));
        assert!(matches!(mixer.state(1), Err(MixerError::EmptyChannel(1))));
        assert!(matches!(mixer.destroy(1), Err(MixerError::EmptyChannel(1))));
        assert!(matches!(mixer.destroy(9), Err(MixerError::InvalidChannel(9))));
    }

    #[test]
    fn destroy_releases_the_decoder() {
        let mixer = mixer(2, 16);
        let (channel, counters) = play_frames(&mixer, ramp(1_000), PlayOptions::default());
        render(&mixer, 16);

        mixer.destroy(channel).unwrap();
        assert!(counters.dropped.load(Ordering::SeqCst));
        assert!(mixer.active_channels().is_empty());
        assert!(matches!(mixer.state(channel), Err(MixerError::EmptyChannel(_))));
    }

    #[test]
    fn plays_wav_sounds_and_releases_them() {
        let mixer = mixer(4, 64);
        let payload: Vec<u8> = [10i16, -10, 20, -20, 30, -30]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let sound = Sound::from_bytes("blip", build_wav(2, 16, RATE, &payload));

        let first = mixer.play(&sound, PlayOptions::default()).unwrap();
        let second = mixer.play(&sound, PlayOptions::default()).unwrap();
        assert_ne!(first, second);

        let out = render(&mixer, 4);
        assert_eq!(out, [20, -20, 40, -40, 60, -60, 0, 0]);

        assert_eq!(mixer.release_sound(&sound), 2);
        assert!(matches!(mixer.state(first), Err(MixerError::EmptyChannel(_))));
        assert!(matches!(mixer.state(second), Err(MixerError::EmptyChannel(_))));
    }

    #[test]
    fn ogg_sound_plays_through_the_mixer() {
        let mixer = mixer(2, 64);
        let bytes = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/mono_tone.ogg"));
        let sound = Sound::from_bytes("tone", bytes.to_vec());

        let channel = mixer.play(&sound, PlayOptions::default()).unwrap();
        assert!((mixer.length(channel).unwrap() - 0.048).abs() < 1e-9);

        let out = render(&mixer, 512);
        assert!(out.iter().any(|&s| s != 0));
        assert!(out.chunks_exact(2).all(|f| f[0] == f[1]));
    }

    #[test]
    fn unknown_sound_sets_last_error() {
        let mixer = mixer(2, 16);
        let sound = Sound::from_bytes("noise", vec![0u8; 64]);
        assert!(matches!(
            mixer.play(&sound, PlayOptions::default()),
            Err(MixerError::UnknownFormat)
        ));
        assert_eq!(
            mixer.take_last_error().as_deref(),
            Some("unknown format or invalid data")
        );
    }

    #[test]
    fn lock_events_are_balanced() {
        #[derive(Default)]
        struct Counting {
            locks: AtomicUsize,
            unlocks: AtomicUsize,
        }

        impl LockEvents for Counting {
            fn lock(&self) {
                self.locks.fetch_add(1, Ordering::SeqCst);
            }

            fn unlock(&self) {
                self.unlocks.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mixer = mixer(2, 16);
        let events = Arc::new(Counting::default());
        mixer.set_lock_handler(Some(events.clone() as Arc<dyn LockEvents>));

        play_frames(&mixer, ramp(100), PlayOptions::default());
        render(&mixer, 48);

        let locks = events.locks.load(Ordering::SeqCst);
        assert_eq!(locks, 4); // one play, three blocks
        assert_eq!(events.unlocks.load(Ordering::SeqCst), locks);
    }

    #[test]
    fn finished_callback_all_and_flume_forwarding() {
        let mixer = mixer(4, 64);
        let (a, _) = play_frames(&mixer, ramp(50), PlayOptions::default());
        let (b, _) = play_frames(&mixer, ramp(80), PlayOptions::default());
        let (callback, rx) = finished_channel(8);
        mixer.set_finished_callback_all(move |channel| callback(channel));

        render(&mixer, 128);
        let mut finished: Vec<_> = rx.try_iter().collect();
        finished.sort_unstable();
        assert_eq!(finished, [a, b]);
    }

    #[test]
    fn concurrent_play_and_stop_keep_the_list_consistent() {
        let mixer = mixer(8, 64);
        let (callback, rx) = finished_channel(4_096);
        let all_counters = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            let producer = mixer.clone();
            scope.spawn(move || {
                let mut out = vec![0i16; 128 * MIXER_CHANNELS];
                for _ in 0..400 {
                    producer.process(&mut out);
                }
            });

            for worker in 0..2usize {
                let control = mixer.clone();
                let callback = Arc::clone(&callback);
                let all_counters = &all_counters;
                scope.spawn(move || {
                    for i in 0..300usize {
                        let length = 64 + (i * 37 + worker * 11) % 400;
                        let (info, counters) = stream(ramp(length), RATE);
                        all_counters.lock().push(counters);
                        let options = PlayOptions::default().looping(i % 5 == 0);
                        if let Ok(channel) = control.play_stream(info, options) {
                            let cb = Arc::clone(&callback);
                            let _ = control.set_finished_callback(channel, move |ch| cb(ch));
                            match i % 4 {
                                0 => {
                                    let _ = control.stop(channel);
                                }
                                1 => {
                                    let _ = control.pause(channel);
                                    let _ = control.resume(channel);
                                }
                                2 => {
                                    let _ = control.destroy(channel);
                                }
                                _ => {}
                            }
                        }
                        let _ = control.set_gain(i % 8, 0.5);
                    }
                });
            }
        });

        {
            let core = mixer.lock_core();
            let active = core.active_channels();
            let unique: HashSet<_> = active.iter().copied().collect();
            assert_eq!(unique.len(), active.len(), "duplicate list entries");
            for (idx, slot) in core.slots.iter().enumerate() {
                if let Some(source) = slot {
                    assert_eq!(source.active, unique.contains(&idx));
                    assert_eq!(source.channel(), idx);
                } else {
                    assert!(!unique.contains(&idx));
                }
            }
        }

        assert!(rx.try_iter().all(|ch| ch < 8));

        mixer.close();
        assert!(mixer.active_channels().is_empty());
        for counters in all_counters.lock().iter() {
            assert!(counters.dropped.load(Ordering::SeqCst), "leaked a decoder");
        }
    }
}
