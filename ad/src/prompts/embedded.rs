//! Embedded prompts
//!
//! Compiled into the binary from the `.pmt` files under `prompts/`.

use tracing::debug;

pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");
pub const SUMMARIZE: &str = include_str!("../../prompts/summarize.pmt");
pub const FILTER: &str = include_str!("../../prompts/filter.pmt");
pub const GENERATE: &str = include_str!("../../prompts/generate.pmt");
pub const VERIFY: &str = include_str!("../../prompts/verify.pmt");
pub const RATE: &str = include_str!("../../prompts/rate.pmt");
pub const DECIDE: &str = include_str!("../../prompts/decide.pmt");
pub const DECOMPOSE: &str = include_str!("../../prompts/decompose.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "summarize" => Some(SUMMARIZE),
        "filter" => Some(FILTER),
        "generate" => Some(GENERATE),
        "verify" => Some(VERIFY),
        "rate" => Some(RATE),
        "decide" => Some(DECIDE),
        "decompose" => Some(DECOMPOSE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::names;

    #[test]
    fn test_every_stage_template_is_embedded() {
        for name in [
            names::SYSTEM,
            names::SUMMARIZE,
            names::FILTER,
            names::GENERATE,
            names::VERIFY,
            names::RATE,
            names::DECIDE,
            names::DECOMPOSE,
        ] {
            assert!(get_embedded(name).is_some(), "missing embedded template {}", name);
        }
    }

    #[test]
    fn test_templates_reference_their_variables() {
        assert!(SUMMARIZE.contains("{{requirements}}"));
        assert!(FILTER.contains("{{document}}"));
        assert!(GENERATE.contains("{{documentation}}"));
        assert!(VERIFY.contains("{{plan}}"));
        assert!(DECIDE.contains("{{rating}}"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
