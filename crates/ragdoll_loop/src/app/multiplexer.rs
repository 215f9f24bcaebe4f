use tracing::debug;

use super::actions::{Action, ActionQueue};
use super::input::KeyState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Live,
    Scripted,
}

/// Picks each tick's keys from the scripted queue, or from live input once
/// the queue is empty. Scripted and live keys are never merged.
#[derive(Debug, Default)]
pub struct InputMultiplexer {
    queue: ActionQueue,
    last_source: Option<InputSource>,
}

impl InputMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, live_keys: KeyState) -> KeyState {
        let (keys, source) = match self.queue.poll_keys() {
            Some(keys) => (keys, InputSource::Scripted),
            None => (live_keys, InputSource::Live),
        };
        if self.last_source != Some(source) {
            debug!(
                source = ?source,
                remaining_ticks = self.queue.remaining_ticks(),
                "input_source_changed"
            );
        }
        self.last_source = Some(source);
        keys
    }

    pub fn load<I>(&mut self, actions: I)
    where
        I: IntoIterator<Item = Action>,
    {
        self.queue.load(actions);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn is_replaying(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn last_source(&self) -> Option<InputSource> {
        self.last_source
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::app::sequence::{parse_sequence, STRIDE_PATTERN};

    const LIVE: KeyState = KeyState::new(true, true, false, false);

    fn action(n: u32, keys: KeyState) -> Action {
        Action::new(NonZeroU32::new(n).expect("non-zero"), keys)
    }

    #[test]
    fn empty_queue_passes_live_keys_through() {
        let mut mux = InputMultiplexer::new();
        assert_eq!(mux.next(LIVE), LIVE);
        assert_eq!(mux.next(KeyState::NONE), KeyState::NONE);
        assert_eq!(mux.last_source(), Some(InputSource::Live));
    }

    #[test]
    fn scripted_keys_replace_live_keys() {
        let scripted = KeyState::new(false, false, true, true);
        let mut mux = InputMultiplexer::new();
        mux.load([action(2, scripted)]);

        assert!(mux.is_replaying());
        assert_eq!(mux.next(LIVE), scripted);
        assert_eq!(mux.last_source(), Some(InputSource::Scripted));
        assert_eq!(mux.next(LIVE), scripted);
        assert_eq!(mux.next(LIVE), LIVE);
        assert!(!mux.is_replaying());
    }

    #[test]
    fn each_action_is_returned_for_exactly_its_duration() {
        let mut mux = InputMultiplexer::new();
        mux.load(parse_sequence("5,10,5,10").expect("valid"));

        let mut runs: Vec<(KeyState, u32)> = Vec::new();
        while mux.is_replaying() {
            let keys = mux.next(LIVE);
            match runs.last_mut() {
                Some((last, count)) if *last == keys => *count += 1,
                _ => runs.push((keys, 1)),
            }
        }

        assert_eq!(
            runs,
            vec![
                (STRIDE_PATTERN[0], 5),
                (STRIDE_PATTERN[1], 10),
                (STRIDE_PATTERN[2], 5),
                (STRIDE_PATTERN[3], 10),
            ]
        );
    }

    #[test]
    fn sequence_drains_after_sum_of_durations() {
        let mut mux = InputMultiplexer::new();
        mux.load(parse_sequence("5,10,5,10").expect("valid"));
        assert_eq!(mux.queue().actions_in_run().len(), 4);

        for tick in 0..30 {
            assert!(mux.is_replaying(), "tick={tick}");
            mux.next(LIVE);
        }
        assert!(!mux.is_replaying());
        assert_eq!(mux.next(LIVE), LIVE);
    }

    #[test]
    fn clear_drops_in_progress_action() {
        let mut mux = InputMultiplexer::new();
        mux.load([action(8, STRIDE_PATTERN[1])]);
        mux.next(LIVE);
        mux.clear();

        assert!(!mux.is_replaying());
        assert_eq!(mux.queue().active_remaining_ticks(), None);
        assert_eq!(mux.next(LIVE), LIVE);
    }
}
