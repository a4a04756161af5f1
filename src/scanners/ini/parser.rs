//! Tolerant line-oriented INI parser.
//!
//! Accepts the dialect the game engines actually write: `[section]` headers,
//! `key=value` pairs, comments opened with `;` or `#`, and blank lines.
//! Anything else is ignored rather than rejected. Section and key lookups
//! are case-insensitive; original casing and declaration order are preserved
//! for serialisation.

use indexmap::IndexMap;

/// One parsed section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    /// Section name as written.
    pub name: String,
    entries: IndexMap<String, String>,
}

impl IniSection {
    /// Case-insensitive key lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Iterate `(key, value)` pairs in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the section has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set(&mut self, key: &str, value: &str) {
        let existing = self
            .entries
            .keys()
            .find(|k| k.eq_ignore_ascii_case(key))
            .cloned();
        match existing {
            Some(original) => {
                self.entries.insert(original, value.to_string());
            }
            None => {
                self.entries.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// A parsed INI file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: IndexMap<String, IniSection>,
}

impl IniDocument {
    /// Parse tolerant INI text. Never fails: malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut document = Self::default();
        let mut current = String::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') {
                if let Some(end) = line.find(']') {
                    current = line[1..end].trim().to_string();
                    document.ensure_section(&current);
                }
                continue;
            }

            if let Some(eq) = line.find('=') {
                let key = line[..eq].trim();
                let value = line[eq + 1..].trim();
                if !key.is_empty() {
                    document.set(&current, key, value);
                }
            }
        }

        document
    }

    fn ensure_section(&mut self, name: &str) -> &mut IniSection {
        let existing = self
            .sections
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned();
        let key = existing.unwrap_or_else(|| name.to_string());
        self.sections
            .entry(key.clone())
            .or_insert_with(|| IniSection {
                name: key,
                entries: IndexMap::new(),
            })
    }

    /// Case-insensitive section lookup.
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, section)| section)
    }

    /// Case-insensitive value lookup.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key)
    }

    /// True when the key exists in the section.
    pub fn has(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }

    /// Insert or replace a value, creating the section as needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ensure_section(section).set(key, value);
    }

    /// Iterate sections in declaration order.
    pub fn sections(&self) -> impl Iterator<Item = &IniSection> {
        self.sections.values()
    }

    /// Serialise back to INI text. Declaration order and original casing are
    /// preserved; comments are not.
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        for section in self.sections.values() {
            if !section.name.is_empty() {
                out.push_str(&format!("[{}]\n", section.name));
            }
            for (key, value) in section.entries() {
                out.push_str(&format!("{key}={value}\n"));
            }
            out.push('\n');
        }
        out
    }
}
