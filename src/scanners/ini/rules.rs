//! INI validation rule table.
//!
//! Each rule binds a file-name pattern, a section, and a key to a predicate
//! over the value. The built-in table covers the configuration mistakes
//! that show up again and again in crash reports; callers can replace it
//! wholesale via [`crate::scanners::ini::IniScanner::with_rules`].

use crate::core::analyzer::Severity;

/// Tunables for rules whose thresholds are not fixed by the games
/// themselves.
#[derive(Debug, Clone)]
pub struct IniRuleOptions {
    /// Loading-screen FPS caps below this raise an issue.
    pub loading_screen_fps_floor: f64,
}

impl Default for IniRuleOptions {
    fn default() -> Self {
        Self {
            loading_screen_fps_floor: 60.0,
        }
    }
}

/// Which result bucket an issue lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCategory {
    /// Startup console command findings.
    ConsoleCommand,
    /// VSync-forcing findings.
    VSync,
    /// Everything else.
    General,
}

/// Predicate over a setting value.
#[derive(Debug, Clone)]
pub enum RuleCheck {
    /// Fires when the key exists with a non-empty value.
    KeyPresent,
    /// Fires when the value equals the given text (case-insensitive).
    Equals(&'static str),
    /// Fires on truthy values: `1`, `true`, `on`, `yes`.
    Truthy,
    /// Fires when the numeric value exceeds the bound.
    GreaterThan(f64),
    /// Fires when the numeric value is below the bound.
    LessThan(f64),
}

impl RuleCheck {
    /// Evaluate the predicate over a raw value.
    pub fn triggers(&self, value: &str) -> bool {
        let value = value.trim().trim_matches('"');
        match self {
            RuleCheck::KeyPresent => !value.is_empty(),
            RuleCheck::Equals(expected) => value.eq_ignore_ascii_case(expected),
            RuleCheck::Truthy => {
                matches!(
                    value.to_ascii_lowercase().as_str(),
                    "1" | "true" | "on" | "yes"
                )
            }
            RuleCheck::GreaterThan(bound) => {
                value.parse::<f64>().map(|v| v > *bound).unwrap_or(false)
            }
            RuleCheck::LessThan(bound) => {
                value.parse::<f64>().map(|v| v < *bound).unwrap_or(false)
            }
        }
    }
}

/// One validation rule.
#[derive(Debug, Clone)]
pub struct IniRule {
    /// Lowercase file-name pattern; `*` matches any run of characters.
    pub file_pattern: &'static str,
    /// Section the key lives in.
    pub section: &'static str,
    /// Key to inspect.
    pub key: &'static str,
    /// Value predicate.
    pub check: RuleCheck,
    /// Recommended replacement value.
    pub recommended: Option<String>,
    /// Explanation shown in the report.
    pub description: String,
    /// Finding severity.
    pub severity: Severity,
    /// Result bucket.
    pub category: IssueCategory,
}

/// Wildcard match of a lowercase `pattern` against a file name; `*` matches
/// any run of characters, comparison is case-insensitive.
pub fn file_matches(pattern: &str, file_name: &str) -> bool {
    fn matches(pattern: &[u8], name: &[u8]) -> bool {
        match (pattern.first(), name.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                matches(&pattern[1..], name)
                    || (!name.is_empty() && matches(pattern, &name[1..]))
            }
            (Some(p), Some(n)) if p.eq_ignore_ascii_case(n) => {
                matches(&pattern[1..], &name[1..])
            }
            _ => false,
        }
    }
    matches(pattern.as_bytes(), file_name.as_bytes())
}

/// The built-in rule table.
pub fn builtin_rules(options: &IniRuleOptions) -> Vec<IniRule> {
    let fps_floor = options.loading_screen_fps_floor;
    vec![
        IniRule {
            file_pattern: "fallout4*.ini",
            section: "General",
            key: "sStartingConsoleCommand",
            check: RuleCheck::KeyPresent,
            recommended: None,
            description: "a startup console command runs on every launch and \
                          slows game start"
                .to_string(),
            severity: Severity::Warning,
            category: IssueCategory::ConsoleCommand,
        },
        IniRule {
            file_pattern: "*custom.ini",
            section: "General",
            key: "sStartingConsoleCommand",
            check: RuleCheck::KeyPresent,
            recommended: None,
            description: "a startup console command runs on every launch and \
                          slows game start"
                .to_string(),
            severity: Severity::Warning,
            category: IssueCategory::ConsoleCommand,
        },
        IniRule {
            file_pattern: "enblocal.ini",
            section: "ENGINE",
            key: "ForceVSync",
            check: RuleCheck::Truthy,
            recommended: Some("false".to_string()),
            description: "ENB is forcing VSync, which fights the game's own \
                          frame limiter"
                .to_string(),
            severity: Severity::Warning,
            category: IssueCategory::VSync,
        },
        IniRule {
            file_pattern: "highfpsphysicsfix.ini",
            section: "Main",
            key: "EnableVSync",
            check: RuleCheck::Truthy,
            recommended: Some("false".to_string()),
            description: "High FPS Physics Fix is forcing VSync".to_string(),
            severity: Severity::Warning,
            category: IssueCategory::VSync,
        },
        IniRule {
            file_pattern: "highfpsphysicsfix.ini",
            section: "Main",
            key: "LoadingScreenFPS",
            check: RuleCheck::LessThan(fps_floor),
            recommended: Some(format!("{fps_floor:.1}")),
            description: format!(
                "loading-screen FPS caps below {fps_floor:.0} make load \
                 screens crawl"
            ),
            severity: Severity::Info,
            category: IssueCategory::General,
        },
        IniRule {
            file_pattern: "epo.ini",
            section: "Particles",
            key: "iMaxDesired",
            check: RuleCheck::GreaterThan(5000.0),
            recommended: Some("5000".to_string()),
            description: "particle counts above 5000 are a common crash cause"
                .to_string(),
            severity: Severity::Warning,
            category: IssueCategory::General,
        },
        IniRule {
            file_pattern: "f4ee.ini",
            section: "CharGen",
            key: "bUnlockHeadParts",
            check: RuleCheck::Equals("0"),
            recommended: Some("1".to_string()),
            description: "locked head parts break LooksMenu presets".to_string(),
            severity: Severity::Warning,
            category: IssueCategory::General,
        },
        IniRule {
            file_pattern: "f4ee.ini",
            section: "CharGen",
            key: "bUnlockTints",
            check: RuleCheck::Equals("0"),
            recommended: Some("1".to_string()),
            description: "locked face tints break LooksMenu presets".to_string(),
            severity: Severity::Warning,
            category: IssueCategory::General,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_patterns_match_expected_files() {
        assert!(file_matches("fallout4*.ini", "Fallout4.ini"));
        assert!(file_matches("fallout4*.ini", "fallout4custom.ini"));
        assert!(file_matches("*custom.ini", "Fallout4Custom.ini"));
        assert!(!file_matches("fallout4*.ini", "skyrim.ini"));
        assert!(file_matches("enblocal.ini", "ENBLocal.INI"));
        assert!(!file_matches("enblocal.ini", "enblocal.ini.bak"));
    }

    #[test]
    fn checks_evaluate_values() {
        assert!(RuleCheck::KeyPresent.triggers("help"));
        assert!(!RuleCheck::KeyPresent.triggers("  "));
        assert!(RuleCheck::Equals("0").triggers("0"));
        assert!(RuleCheck::Truthy.triggers("TRUE"));
        assert!(RuleCheck::Truthy.triggers("1"));
        assert!(!RuleCheck::Truthy.triggers("0"));
        assert!(RuleCheck::GreaterThan(5000.0).triggers("6000"));
        assert!(!RuleCheck::GreaterThan(5000.0).triggers("5000"));
        assert!(!RuleCheck::GreaterThan(5000.0).triggers("not a number"));
        assert!(RuleCheck::LessThan(60.0).triggers("30"));
    }

    #[test]
    fn threshold_rules_honor_options() {
        let strict = IniRuleOptions {
            loading_screen_fps_floor: 120.0,
        };
        let rules = builtin_rules(&strict);
        let fps_rule = rules
            .iter()
            .find(|r| r.key == "LoadingScreenFPS")
            .expect("rule present");
        assert!(fps_rule.check.triggers("90"));
        assert!(!fps_rule.check.triggers("144"));
    }
}
