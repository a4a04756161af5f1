//! Tolerant INI parsing and rule-based validation.

pub mod parser;
pub mod rules;
pub mod scan;

pub use parser::IniDocument;
pub use rules::{IniRule, IniRuleOptions, IssueCategory, RuleCheck};
pub use scan::{IniParseFailure, IniScanResult, IniScanner};
