//! Node kind implementations for flowgraph
//!
//! This crate provides the concrete node kinds the engine executes:
//!
//! | Kind | Module | Side effect |
//! |------|--------|-------------|
//! | Agent | [`agent`] | Agent-SDK session with tool use |
//! | Command | [`command`] | Child process with timeout |
//! | SlashCommand | [`slash`] | `/<cmd> <args>` interactive session |
//! | Eval | [`eval`] | Pure synchronous context transform |
//! | DynamicAgent | [`dynamic`] | Agent with state-resolved parameters |
//! | DynamicCommand | [`dynamic`] | Command resolved from state |
//! | LLM | [`llm`] | Single completion via provider registry |
//! | HTTP | [`http`] | JSON-in/out fetch |
//! | GitCheckout | [`git`] | Clone/checkout with credential policy |
//!
//! Every node follows the same observability convention: its outcome is
//! written into the run context under a configurable result key
//! ([`result::keys`]), whether or not the node throws. `throw_on_error`
//! decides if a structured failure becomes a thrown `NodeExecutionError`
//! or merely a recorded result.
//!
//! Provider seams (LLM, agent SDK, slash-command runtime) are traits in
//! [`provider`]; `reqwest`-backed clients for Anthropic, OpenAI and Gemini
//! live in [`providers`].

pub mod agent;
pub mod command;
pub mod dynamic;
pub mod eval;
pub mod git;
pub mod http;
pub mod interpolate;
pub mod llm;
pub mod provider;
pub mod providers;
pub mod result;
pub mod shell;
pub mod slash;

pub use agent::AgentNode;
pub use command::{CommandNode, CommandSpec};
pub use dynamic::{DynamicAgentNode, DynamicCommandNode};
pub use eval::{EvalFn, EvalNode};
pub use git::{CheckoutAuth, CredentialResolver, GitCheckoutNode};
pub use http::{BodySpec, HttpNode, UrlSpec};
pub use interpolate::interpolate;
pub use llm::LlmNode;
pub use provider::{
    AgentProvider, AgentRequest, AgentResponse, LlmProvider, LlmRequest, LlmResponse, OutputMode,
    ProviderRegistry, ProviderTag, SlashCommandRunner, SlashCommandResponse, Usage,
};
pub use slash::SlashCommandNode;
