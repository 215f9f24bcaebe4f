use std::num::NonZeroU32;

use thiserror::Error;

use super::actions::Action;
use super::input::KeyState;

/// Key combinations cycled through by position in a loaded sequence:
/// idle, forward stride A, idle, forward stride B.
pub const STRIDE_PATTERN: [KeyState; 4] = [
    KeyState::new(false, false, false, false),
    KeyState::new(false, true, true, false),
    KeyState::new(false, false, false, false),
    KeyState::new(true, false, false, true),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("sequence text is empty")]
    Empty,
    #[error("sequence element {index} ('{token}') is not a non-negative integer")]
    InvalidDuration { index: usize, token: String },
    #[error("sequence element {index} has zero duration; durations must be positive")]
    ZeroDuration { index: usize },
}

/// Parses comma-separated hold durations into actions.
///
/// The held keys cycle through [`STRIDE_PATTERN`]. Validation is
/// all-or-nothing: the first bad element rejects the whole text.
pub fn parse_sequence(text: &str) -> Result<Vec<Action>, SequenceError> {
    if text.trim().is_empty() {
        return Err(SequenceError::Empty);
    }

    text.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(index, token)| {
            let duration = parse_duration(index, token)?;
            let keys = STRIDE_PATTERN[index % STRIDE_PATTERN.len()];
            Ok(Action::new(duration, keys))
        })
        .collect()
}

fn parse_duration(index: usize, token: &str) -> Result<NonZeroU32, SequenceError> {
    let invalid = || SequenceError::InvalidDuration {
        index,
        token: token.to_string(),
    };
    if token.is_empty() || !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    let value = token.parse::<u32>().map_err(|_| invalid())?;
    NonZeroU32::new(value).ok_or(SequenceError::ZeroDuration { index })
}
