// ─── Rules ───
// OS/arch applicability rules attached to libraries and arguments.

use std::collections::HashMap;

use serde::Deserialize;

/// The OS/arch pair rules are evaluated against, in launcher-manifest naming
/// (`osx`, `linux`, `windows`; `x64`, `x86`, `arm64`, `arm32`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub os: String,
    pub arch: String,
}

impl Environment {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "x86" => "x86",
            "aarch64" => "arm64",
            "arm" => "arm32",
            other => other,
        };
        Self::new(os, arch)
    }

    /// `64` or `32`, substituted for `${arch}` in native classifiers.
    pub fn bitness(&self) -> &'static str {
        match self.arch.as_str() {
            "x86" | "arm32" => "32",
            _ => "64",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    /// A regex in the upstream format; never evaluated.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: OsRule,
    #[serde(default)]
    pub features: HashMap<String, bool>,
}

impl Rule {
    pub fn applies_for(&self, env: &Environment) -> bool {
        // Feature-gated rules (demo mode, custom resolution) are never enabled.
        if !self.features.is_empty() {
            return false;
        }

        let name = self.os.name.as_deref();
        let arch = self.os.arch.as_deref();
        let version = self.os.version.as_deref();

        match self.action {
            RuleAction::Allow => {
                name.map_or(true, |n| n == env.os)
                    && version.is_none()
                    && arch.map_or(true, |a| a == env.arch)
            }
            RuleAction::Disallow => {
                let name_hit = name.is_some_and(|n| n == env.os);
                let arch_hit = arch.is_some_and(|a| a == env.arch);
                let version_hit = name_hit && version.is_some();
                !(name_hit || arch_hit || version_hit)
            }
            RuleAction::Unknown => true,
        }
    }
}

/// True when every rule applies. An empty list always applies.
pub fn all_apply(rules: &[Rule], env: &Environment) -> bool {
    rules.iter().all(|rule| rule.applies_for(env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(value: serde_json::Value) -> Vec<Rule> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn allow_rule_matches_only_named_os() {
        let rules = rules(json!([{ "action": "allow", "os": { "name": "osx" } }]));
        assert!(!all_apply(&rules, &Environment::new("linux", "x64")));
        assert!(all_apply(&rules, &Environment::new("osx", "arm64")));
    }

    #[test]
    fn empty_rules_always_apply() {
        assert!(all_apply(&[], &Environment::new("windows", "x86")));
    }

    #[test]
    fn disallow_rule_excludes_named_os() {
        let rules = rules(json!([
            { "action": "allow" },
            { "action": "disallow", "os": { "name": "osx" } }
        ]));
        assert!(all_apply(&rules, &Environment::new("linux", "x64")));
        assert!(!all_apply(&rules, &Environment::new("osx", "x64")));
    }

    #[test]
    fn arch_and_version_constraints() {
        let x86_only = rules(json!([{ "action": "allow", "os": { "arch": "x86" } }]));
        assert!(all_apply(&x86_only, &Environment::new("windows", "x86")));
        assert!(!all_apply(&x86_only, &Environment::new("windows", "x64")));

        let versioned = rules(json!([{ "action": "allow", "os": { "name": "osx", "version": "^10\\.5\\.\\d$" } }]));
        assert!(!all_apply(&versioned, &Environment::new("osx", "x64")));
    }

    #[test]
    fn feature_rules_never_apply() {
        let rules = rules(json!([{ "action": "allow", "features": { "is_demo_user": true } }]));
        assert!(!all_apply(&rules, &Environment::new("linux", "x64")));
    }
}
