pub mod engine;
pub mod states;

pub use engine::{DialogueEngine, DialoguePolicy, FlowTransitionError};
pub use states::{DialogueAction, DialogueEvent, TransitionOutcome};
