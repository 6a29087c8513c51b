//! Agent runtime: the cognitive router in front of the CRM decision core.
//!
//! An utterance goes through at most four tiers, cheapest first:
//! 1. **Fast path** (`fast_path`) - canned replies for greetings and filler
//! 2. **Classification** (`classifier`, `llm`) - utterance to [`intent::Intent`]
//! 3. **Tool dispatch** (`tools`, `handlers`) - deterministic handlers over
//!    fresh CRM data, composed in `workflows`
//! 4. **Generation** (`llm`) - free-form text for everything else, given a
//!    portfolio summary from `workflows`
//!
//! # Safety Principle
//!
//! The language model is strictly a translator and a writer. It never
//! computes scores, matches or probabilities; those come from `aura-core`.

pub mod classifier;
pub mod conversation;
pub mod fast_path;
pub mod handlers;
pub mod intent;
pub mod llm;
pub mod router;
pub mod tools;
pub mod workflows;

pub use conversation::{ConversationHistory, Role, Turn};
pub use intent::{Classification, Intent};
pub use router::{CognitiveRouter, Reply, ReplyStatus, Tier};
pub use tools::{ToolOutcome, ToolRegistry};
