/*
 * Alex - A Minecraft Launcher SDK
 * Copyright (C) 2024 Alex SDK contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::collections::HashMap;

use crate::env;
use crate::json::{OsProperties, Rule, RuleAction};

/// Host platform and feature state that rules are matched against.
pub struct RulesContext {
    pub os_name: &'static str,
    pub arch: &'static str,
    pub features: HashMap<&'static str, bool>
}

impl RulesContext {
    pub fn host() -> Self {
        RulesContext {
            os_name: env::get_host_os(),
            arch: env::get_host_arch(),
            features: HashMap::new()
        }
    }

    fn feature(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }
}

/// Evaluate an ordered rule list against the context.
///
/// An empty or absent list allows. Otherwise the state starts disallowed
/// and every rule whose os/feature clauses match captures its action; the
/// last matching rule wins. A list where no rule matches stays disallowed.
pub fn rules_allow(rules: &[Rule], ctx: &RulesContext) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut allowed = false;

    for rule in rules {
        if os_matches(rule.os.as_ref(), ctx) && features_match(rule.features.as_ref(), ctx) {
            allowed = rule.action == RuleAction::Allow;
        }
    }

    allowed
}

fn os_matches(os: Option<&OsProperties>, ctx: &RulesContext) -> bool {
    match os {
        Some(os) => {
            os.name.as_ref().map_or(true, |v| v == ctx.os_name) &&
            os.arch.as_ref().map_or(true, |v| v == ctx.arch)
        }
        None => true
    }
}

fn features_match(features: Option<&HashMap<String, bool>>, ctx: &RulesContext) -> bool {
    match features {
        Some(features) => features.iter().all(|(name, required)| ctx.feature(name) == *required),
        None => true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::RuleAction;

    fn ctx(os_name: &'static str, arch: &'static str) -> RulesContext {
        RulesContext {
            os_name,
            arch,
            features: HashMap::new()
        }
    }

    fn allow_os(name: &str) -> Rule {
        Rule {
            action: RuleAction::Allow,
            os: Some(OsProperties {
                name: Some(name.to_string()),
                version: None,
                arch: None
            }),
            features: None
        }
    }

    fn disallow_os(name: &str) -> Rule {
        Rule {
            action: RuleAction::Disallow,
            os: Some(OsProperties {
                name: Some(name.to_string()),
                version: None,
                arch: None
            }),
            features: None
        }
    }

    fn allow_all() -> Rule {
        Rule {
            action: RuleAction::Allow,
            os: None,
            features: None
        }
    }

    #[test]
    fn empty_rules_allow() {
        assert!(rules_allow(&[], &ctx("linux", "x64")));
    }

    #[test]
    fn basic_allow_true() {
        assert!(rules_allow(&[allow_os("linux")], &ctx("linux", "x64")));
    }

    #[test]
    fn basic_allow_false() {
        assert!(!rules_allow(&[allow_os("linux")], &ctx("windows", "x64")));
    }

    #[test]
    fn no_rule_matches_not_applicable() {
        // a present-but-unmatched rule list never flips the default
        assert!(!rules_allow(&[allow_os("osx"), allow_os("windows")], &ctx("linux", "x64")));
    }

    #[test]
    fn disallow_overrides_earlier_allow() {
        let rules = vec![allow_all(), disallow_os("osx")];

        assert!(rules_allow(&rules, &ctx("linux", "x64")));
        assert!(!rules_allow(&rules, &ctx("osx", "x64")));
    }

    #[test]
    fn last_matching_rule_wins() {
        let rules = vec![disallow_os("linux"), allow_os("linux")];
        assert!(rules_allow(&rules, &ctx("linux", "x64")));
    }

    #[test]
    fn arch_mismatch_disqualifies() {
        let rule = Rule {
            action: RuleAction::Allow,
            os: Some(OsProperties {
                name: Some("linux".to_string()),
                version: None,
                arch: Some("x86".to_string())
            }),
            features: None
        };

        assert!(!rules_allow(&[rule], &ctx("linux", "x64")));
    }

    #[test]
    fn features_require_exact_state() {
        let rule = Rule {
            action: RuleAction::Allow,
            os: None,
            features: Some(HashMap::from([("has_custom_resolution".to_string(), true)]))
        };

        let mut with_feature = ctx("linux", "x64");
        with_feature.features.insert("has_custom_resolution", true);

        assert!(rules_allow(&[rule.clone()], &with_feature));
        assert!(!rules_allow(&[rule], &ctx("linux", "x64")));
    }
}
