use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroU32;

use super::input::KeyState;

/// Hold `keys` for `duration_ticks` simulation ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    duration_ticks: NonZeroU32,
    keys: KeyState,
}

impl Action {
    pub const fn new(duration_ticks: NonZeroU32, keys: KeyState) -> Self {
        Self {
            duration_ticks,
            keys,
        }
    }

    pub fn duration_ticks(&self) -> u32 {
        self.duration_ticks.get()
    }

    pub fn keys(&self) -> KeyState {
        self.keys
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.keys, self.duration_ticks)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveAction {
    action: Action,
    remaining_ticks: u32,
}

/// Ordered scripted actions, drained one tick at a time.
///
/// At most one action is active. Its remaining duration drops by one per
/// [`ActionQueue::poll_keys`] and the next action becomes active on the
/// following call once it reaches zero. `actions_in_run` keeps every action
/// loaded since the last [`ActionQueue::clear`] so a run can be replayed.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    pending: VecDeque<Action>,
    active: Option<ActiveAction>,
    actions_in_run: Vec<Action>,
    ticks_polled: u64,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions_in_run.push(action);
        self.pending.push_back(action);
    }

    pub fn extend<I>(&mut self, actions: I)
    where
        I: IntoIterator<Item = Action>,
    {
        for action in actions {
            self.push(action);
        }
    }

    /// Replaces the whole queue; nothing of the previous run survives.
    pub fn load<I>(&mut self, actions: I)
    where
        I: IntoIterator<Item = Action>,
    {
        self.clear();
        self.extend(actions);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.active = None;
        self.actions_in_run.clear();
        self.ticks_polled = 0;
    }

    /// Replays the current run from its first tick.
    pub fn restart(&mut self) {
        let actions = std::mem::take(&mut self.actions_in_run);
        self.load(actions);
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_ticks() == 0
    }

    /// Drains one tick; `None` once every loaded tick has been consumed.
    pub fn poll_keys(&mut self) -> Option<KeyState> {
        if self.active.is_none() {
            let action = self.pending.pop_front()?;
            self.active = Some(ActiveAction {
                action,
                remaining_ticks: action.duration_ticks(),
            });
        }
        let active = self.active.as_mut()?;

        active.remaining_ticks = active.remaining_ticks.saturating_sub(1);
        let keys = active.action.keys();
        if active.remaining_ticks == 0 {
            self.active = None;
        }
        self.ticks_polled = self.ticks_polled.saturating_add(1);
        Some(keys)
    }

    /// Keys the next [`ActionQueue::poll_keys`] would return.
    pub fn peek_keys(&self) -> Option<KeyState> {
        match self.active {
            Some(active) => Some(active.action.keys()),
            None => self.pending.front().map(Action::keys),
        }
    }

    pub fn active_action(&self) -> Option<Action> {
        self.active.map(|active| active.action)
    }

    pub fn active_remaining_ticks(&self) -> Option<u32> {
        self.active.map(|active| active.remaining_ticks)
    }

    /// Index into [`ActionQueue::actions_in_run`] of the action being held.
    pub fn current_action_index(&self) -> Option<usize> {
        self.active
            .map(|_| self.actions_in_run.len() - self.pending.len() - 1)
    }

    pub fn actions_in_run(&self) -> &[Action] {
        &self.actions_in_run
    }

    pub fn total_duration_ticks(&self) -> u64 {
        self.actions_in_run
            .iter()
            .map(|action| u64::from(action.duration_ticks()))
            .sum()
    }

    pub fn ticks_polled(&self) -> u64 {
        self.ticks_polled
    }

    pub fn remaining_ticks(&self) -> u64 {
        let active = self
            .active
            .map_or(0, |active| u64::from(active.remaining_ticks));
        let pending: u64 = self
            .pending
            .iter()
            .map(|action| u64::from(action.duration_ticks()))
            .sum();
        active + pending
    }
}
