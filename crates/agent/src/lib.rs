//! Agent runtime: intent resolution and disambiguation for the relay.
//!
//! Each inbound utterance goes through a fixed routing order:
//! 1. **Style command** (`commands`) - literal `configurar estilo:` check, no oracle call
//! 2. **Dialogue continuation** - when a session is mid-disambiguation the flow
//!    engine from `relay-core` handles the utterance (or a cancel keyword ends it)
//! 3. **Classification** (`classifier`) - calendar first, then spreadsheet
//! 4. **Execution** (`executor`) - calls the collaborators in `tools`
//! 5. **Reply** (`responder`) - structured text, or free-form chat over the history
//!
//! # Key Types
//!
//! - `AgentRuntime` - orchestrator holding the per-conversation locks
//! - `LanguageOracle` - pluggable completion backend (HTTP client or scripted stub)
//! - `Clock` - explicit time source for every prompt
//!
//! The oracle only translates text into structured records. Which event is
//! touched, and when a sub-dialogue ends, is decided by the flow engine.

pub mod classifier;
pub mod commands;
pub mod executor;
pub mod llm;
pub mod prompts;
pub mod responder;
pub mod runtime;
pub mod tools;

pub use runtime::{AgentRuntime, RuntimeDeps, RuntimeSettings};
