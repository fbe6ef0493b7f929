//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for the planning stages.
//!
//! Template loading chain:
//! 1. `.ask-dbx/prompts/{name}.pmt` (user override)
//! 2. `prompts/{name}.pmt` (repo default)
//! 3. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::PromptLoader;

/// Template names used by the planning loop
pub mod names {
    pub const SYSTEM: &str = "system";
    pub const SUMMARIZE: &str = "summarize";
    pub const FILTER: &str = "filter";
    pub const GENERATE: &str = "generate";
    pub const VERIFY: &str = "verify";
    pub const RATE: &str = "rate";
    pub const DECIDE: &str = "decide";
    pub const DECOMPOSE: &str = "decompose";
}
