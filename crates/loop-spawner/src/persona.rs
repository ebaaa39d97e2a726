//! Intent-to-persona routing table. Part of the external interface —
//! changes here are breaking.

use loop_core::SubAgentType;

/// Maps an intent verb to the SubAgent name that should handle it.
/// Everything not matched falls through to `executor`.
pub fn resolve_persona(verb: &str) -> &'static str {
    match verb {
        "/fix" | "/implement" | "/refactor" | "/create" => "coder",
        "/test" | "/cover" | "/verify" => "tester",
        "/review" | "/audit" | "/check" => "reviewer",
        "/research" | "/learn" | "/document" => "researcher",
        _ => "executor",
    }
}

/// `/system`-category intents spawn `system` SubAgents; everything else is
/// `ephemeral`. Verbs that might suggest a longer-horizon `persistent` agent
/// (e.g. `/research`) are deliberately not special-cased here: persistence
/// is a property of how a caller registers a specialist, not of the verb
/// that happened to trigger this spawn.
pub fn determine_agent_type(category: &str) -> SubAgentType {
    if category == "/system" {
        SubAgentType::System
    } else {
        SubAgentType::Ephemeral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_known_verbs() {
        assert_eq!(resolve_persona("/fix"), "coder");
        assert_eq!(resolve_persona("/test"), "tester");
        assert_eq!(resolve_persona("/review"), "reviewer");
        assert_eq!(resolve_persona("/research"), "researcher");
    }

    #[test]
    fn unknown_verb_falls_back_to_executor() {
        assert_eq!(resolve_persona("/whatever"), "executor");
    }

    #[test]
    fn system_category_routes_to_system_type() {
        assert_eq!(determine_agent_type("/system"), SubAgentType::System);
        assert_eq!(determine_agent_type("general"), SubAgentType::Ephemeral);
        assert_eq!(determine_agent_type("/research"), SubAgentType::Ephemeral);
    }
}
