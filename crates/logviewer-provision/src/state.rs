use std::fmt;
use std::sync::Arc;

use logviewer_platform::Component;

/// Position of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Init,
    Acquiring,
    Extracting,
    Configuring,
    Launching(Component),
    AwaitingReady(Component),
    Activating,
    Done,
    Failed(String),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Acquiring => f.write_str("acquiring"),
            Self::Extracting => f.write_str("extracting"),
            Self::Configuring => f.write_str("configuring"),
            Self::Launching(c) => write!(f, "launching {c}"),
            Self::AwaitingReady(c) => write!(f, "awaiting {c}"),
            Self::Activating => f.write_str("activating"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Called on every state transition, including the terminal one.
pub type StateObserver = Arc<dyn Fn(&State) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(State::Launching(Component::SearchEngine).to_string(), "launching search engine");
        assert_eq!(State::AwaitingReady(Component::Dashboard).to_string(), "awaiting dashboard");
        assert_eq!(State::Failed("boom".into()).to_string(), "failed: boom");
    }

    #[test]
    fn terminal_states() {
        assert!(State::Done.is_terminal());
        assert!(State::Failed(String::new()).is_terminal());
        assert!(!State::Activating.is_terminal());
    }
}
