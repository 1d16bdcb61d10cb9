use serde::{Deserialize, Serialize};

/// One tracked player or counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub count: u32,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
        }
    }
}

/// Per-card count button. The only place the zero floor is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountAction {
    Increment,
    Decrement,
    Reset,
}

impl CountAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "increment" => Some(CountAction::Increment),
            "decrement" => Some(CountAction::Decrement),
            "reset" => Some(CountAction::Reset),
            _ => None,
        }
    }

    /// The count after pressing this button on a card showing `current`.
    pub fn apply(self, current: u32) -> u32 {
        match self {
            CountAction::Increment => current.saturating_add(1),
            CountAction::Decrement => current.saturating_sub(1),
            CountAction::Reset => 0,
        }
    }
}
