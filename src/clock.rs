use crate::ticker::Ticker;
use crate::types::{PlaybackState, SeekPolicy};
use log::{debug, info, trace};

/// Result of delivering one tick to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The cursor moved forward by one sample.
    Advanced,
    /// The cursor was already on the last sample; playback stopped there.
    ReachedEnd,
    /// The tick belonged to a cancelled generation (or playback is stopped)
    /// and was ignored.
    Stale,
}

/// Playback state machine: `Stopped(i)` / `Playing(i)` over `[0, len-1]`.
///
/// The clock keeps no copy of the cursor. Every operation borrows the one
/// authoritative [`PlaybackState`] from its owner along with the current
/// track length. What the clock does own is the tick source and a
/// generation counter: each time the tick stream is armed or disarmed the
/// generation moves on, so a tick that was already in flight when playback
/// paused, restarted, or the track changed is recognised as stale.
pub struct PlaybackClock {
    ticker: Box<dyn Ticker>,
    generation: u64,
    seek_policy: SeekPolicy,
}

impl PlaybackClock {
    pub fn new(ticker: Box<dyn Ticker>) -> Self {
        Self {
            ticker,
            generation: 0,
            seek_policy: SeekPolicy::default(),
        }
    }

    pub fn with_seek_policy(mut self, policy: SeekPolicy) -> Self {
        self.seek_policy = policy;
        self
    }

    pub fn seek_policy(&self) -> SeekPolicy {
        self.seek_policy
    }

    /// Generation that a tick must carry to be applied.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn arm(&mut self) {
        self.generation += 1;
        self.ticker.start(self.generation);
        trace!("Tick stream armed (generation {})", self.generation);
    }

    fn disarm(&mut self) {
        self.generation += 1;
        self.ticker.cancel();
        trace!("Tick stream cancelled (now generation {})", self.generation);
    }

    /// `Stopped(i) → Playing(i)`. Starting at the last sample, on an empty
    /// track, or while already playing does nothing.
    pub fn play(&mut self, state: &mut PlaybackState, len: usize) -> bool {
        if state.playing || len == 0 || state.index >= len - 1 {
            return false;
        }
        state.playing = true;
        self.arm();
        info!("Playing from sample {}", state.index);
        true
    }

    /// `Playing(i) → Stopped(i)`.
    pub fn pause(&mut self, state: &mut PlaybackState) -> bool {
        if !state.playing {
            return false;
        }
        state.playing = false;
        self.disarm();
        info!("Paused at sample {}", state.index);
        true
    }

    pub fn toggle(&mut self, state: &mut PlaybackState, len: usize) -> bool {
        if state.playing {
            self.pause(state)
        } else {
            self.play(state, len)
        }
    }

    /// Apply one tick from the tick source.
    pub fn tick(&mut self, state: &mut PlaybackState, len: usize, generation: u64) -> TickOutcome {
        if generation != self.generation || !state.playing {
            debug!(
                "Dropping stale tick (generation {} vs {}, {})",
                generation, self.generation, state
            );
            return TickOutcome::Stale;
        }
        if len > 0 && state.index + 1 < len {
            state.index += 1;
            return TickOutcome::Advanced;
        }
        state.index = state.index.min(len.saturating_sub(1));
        state.playing = false;
        self.disarm();
        info!("Playback reached the end at sample {}", state.index);
        TickOutcome::ReachedEnd
    }

    /// Move the cursor to `target`, clamped to the track. Whether playback
    /// continues depends on the seek policy.
    pub fn seek(&mut self, state: &mut PlaybackState, len: usize, target: usize) -> bool {
        if len == 0 {
            return false;
        }
        let before = *state;
        state.index = target.min(len - 1);
        if self.seek_policy == SeekPolicy::Pause {
            self.pause(state);
        }
        *state != before
    }

    /// `(*, i) → Stopped(0)`.
    pub fn restart(&mut self, state: &mut PlaybackState) -> bool {
        let before = *state;
        self.pause(state);
        state.index = 0;
        *state != before
    }

    /// `(*, i) → (*, min(i + k, len - 1))`.
    pub fn step(&mut self, state: &mut PlaybackState, len: usize, k: usize) -> bool {
        if len == 0 {
            return false;
        }
        let before = state.index;
        state.index = state.index.saturating_add(k).min(len - 1);
        state.index != before
    }

    /// Cancel any tick stream and return the cursor to `Stopped(0)`. Used
    /// when a new track replaces the old one.
    pub fn reset(&mut self, state: &mut PlaybackState) {
        self.disarm();
        *state = PlaybackState::default();
    }

    /// Cancel the tick stream for teardown.
    pub fn shutdown(&mut self) {
        self.disarm();
    }
}
