use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    Q,
    W,
    O,
    P,
}

const KEY_COUNT: usize = 4;

impl ControlKey {
    pub const ALL: [ControlKey; KEY_COUNT] =
        [ControlKey::Q, ControlKey::W, ControlKey::O, ControlKey::P];

    const fn index(self) -> usize {
        match self {
            ControlKey::Q => 0,
            ControlKey::W => 1,
            ControlKey::O => 2,
            ControlKey::P => 3,
        }
    }

    const fn letter(self) -> char {
        match self {
            ControlKey::Q => 'Q',
            ControlKey::W => 'W',
            ControlKey::O => 'O',
            ControlKey::P => 'P',
        }
    }
}

/// The four virtual control inputs handed to the engine each tick.
///
/// Every combination is valid, including all four held at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyState {
    down: [bool; KEY_COUNT],
}

impl KeyState {
    pub const NONE: KeyState = KeyState {
        down: [false; KEY_COUNT],
    };

    pub const fn new(q: bool, w: bool, o: bool, p: bool) -> Self {
        Self { down: [q, w, o, p] }
    }

    pub fn set(&mut self, key: ControlKey, is_down: bool) {
        self.down[key.index()] = is_down;
    }

    pub fn with_key_down(mut self, key: ControlKey, is_down: bool) -> Self {
        self.set(key, is_down);
        self
    }

    pub fn is_down(&self, key: ControlKey) -> bool {
        self.down[key.index()]
    }

    pub fn q(&self) -> bool {
        self.is_down(ControlKey::Q)
    }

    pub fn w(&self) -> bool {
        self.is_down(ControlKey::W)
    }

    pub fn o(&self) -> bool {
        self.is_down(ControlKey::O)
    }

    pub fn p(&self) -> bool {
        self.is_down(ControlKey::P)
    }

    pub fn any_down(&self) -> bool {
        self.down.iter().any(|down| *down)
    }

    pub fn clear(&mut self) {
        self.down = [false; KEY_COUNT];
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.any_down() {
            return f.write_str("-");
        }
        for key in ControlKey::ALL {
            if self.is_down(key) {
                write!(f, "{}", key.letter())?;
            }
        }
        Ok(())
    }
}
