//! Declarative field categories for heuristic matching.
//!
//! Each category lists primary words (enough on their own) and secondary
//! words whose effect depends on the category's rule. Categories are
//! consulted in table order and the first match wins.

use quill_core::profile::normalize;
use std::collections::BTreeSet;

/// How a category treats a name that has secondary words but no primary.
#[derive(Debug, Clone, Copy)]
pub enum SecondaryRule {
    /// Secondary words only count next to a primary word.
    RequiresPrimary,
    /// A secondary word classifies the name by itself.
    Standalone,
    /// A secondary word classifies the name unless any listed word is present.
    UnlessAny(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub primary: &'static [&'static str],
    pub secondary: &'static [&'static str],
    pub rule: SecondaryRule,
    /// Words that veto the category outright
    pub excluded_by: &'static [&'static str],
}

const EMAIL_WORDS: &[&str] = &["email", "mail"];

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "email",
        primary: &["email", "mail"],
        secondary: &["address"],
        rule: SecondaryRule::RequiresPrimary,
        excluded_by: &[],
    },
    Category {
        name: "address",
        primary: &["address", "residence", "location"],
        secondary: &["street", "ave", "road", "apartment", "apt", "home"],
        rule: SecondaryRule::UnlessAny(EMAIL_WORDS),
        excluded_by: EMAIL_WORDS,
    },
    Category {
        name: "phone",
        primary: &["phone", "telephone", "mobile", "cell"],
        secondary: &["number"],
        rule: SecondaryRule::Standalone,
        excluded_by: &[],
    },
    Category {
        name: "name",
        primary: &["name"],
        secondary: &["first", "last", "user"],
        rule: SecondaryRule::Standalone,
        excluded_by: &[],
    },
];

/// Words naming someone other than the profile owner. A field qualified by
/// one of these (`employer_address`, `spousePhone`) describes that party, so
/// it belongs to no category.
pub const OTHER_PARTIES: &[&str] = &[
    "employer", "company", "business", "organization", "spouse", "partner",
    "child", "dependent", "parent", "father", "mother", "emergency", "landlord",
    "manager", "supervisor", "reference", "bank", "school", "doctor",
    "physician", "insurer", "beneficiary", "preparer", "payer",
];

/// Split a field name into lowercase words.
///
/// Breaks on non-alphanumerics and camelCase boundaries, and also includes
/// the whole name in normalized form so `e-mail` yields `email`.
pub fn words(name: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush(&mut current, &mut out);
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                flush(&mut current, &mut out);
            }
        }
        current.extend(c.to_lowercase());
    }
    flush(&mut current, &mut out);

    let joined = normalize(name);
    if !joined.is_empty() {
        out.insert(joined);
    }
    out
}

fn flush(current: &mut String, out: &mut BTreeSet<String>) {
    if !current.is_empty() {
        out.insert(std::mem::take(current));
    }
}

impl Category {
    fn has_any(words: &BTreeSet<String>, list: &[&str]) -> bool {
        list.iter().any(|w| words.contains(*w))
    }

    /// Whether a name with these words belongs to this category.
    pub fn matches(&self, words: &BTreeSet<String>) -> bool {
        if Self::has_any(words, self.excluded_by) {
            return false;
        }
        if Self::has_any(words, self.primary) {
            return true;
        }
        if !Self::has_any(words, self.secondary) {
            return false;
        }
        match self.rule {
            SecondaryRule::RequiresPrimary => false,
            SecondaryRule::Standalone => true,
            SecondaryRule::UnlessAny(vetoes) => !Self::has_any(words, vetoes),
        }
    }
}

/// The first category a field name belongs to, if any.
pub fn classify(name: &str) -> Option<&'static Category> {
    let words = words(name);
    if Category::has_any(&words, OTHER_PARTIES) {
        return None;
    }
    CATEGORIES.iter().find(|c| c.matches(&words))
}
