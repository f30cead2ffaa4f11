use std::{collections::HashSet, fmt, str::FromStr, sync::LazyLock};

use serde_with::{DeserializeFromStr, SerializeDisplay};

static LABEL_ALPHABET: LazyLock<HashSet<char>> =
    LazyLock::new(|| ('a'..='z').chain('A'..='Z').chain('0'..='9').chain(['_', '-']).collect());

/// The target of a selector.
#[derive(Clone, Debug, PartialEq)]
enum SelectorTarget {
    /// The target is the token itself.
    Token,

    /// The target is the external context.
    Context,
}

/// A selector that can be applied to a NUC.
///
/// `.foo.bar` walks into the token being evaluated, `$.foo.bar` into the
/// caller-supplied context. A bare `.` (or `$.`) selects the entire target.
#[derive(Clone, Debug, PartialEq, SerializeDisplay, DeserializeFromStr)]
pub struct Selector {
    labels: Vec<String>,
    target: SelectorTarget,
}

impl Selector {
    /// Apply this selector on a token and context and return the selected value.
    ///
    /// A lookup that walks off the object graph returns `None`, which is distinct
    /// from selecting an explicit JSON `null`.
    pub fn apply<'a>(
        &self,
        token: &'a serde_json::Value,
        context: &'a serde_json::Value,
    ) -> Option<&'a serde_json::Value> {
        let mut value = match &self.target {
            SelectorTarget::Token => token,
            SelectorTarget::Context => context,
        };
        for label in &self.labels {
            value = value.get(label)?;
        }
        Some(value)
    }
}

impl FromStr for Selector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Consume the optional $ and pick our target.
        let (target, s) = match s.strip_prefix("$") {
            Some(rest) => (SelectorTarget::Context, rest),
            None => (SelectorTarget::Token, s),
        };
        // At this point it must start with "."
        let Some(s) = s.strip_prefix('.') else {
            return Err(SelectorParseError::MissingPrefix);
        };
        if s.is_empty() {
            return Ok(Self { labels: Vec::new(), target });
        }

        let mut labels = Vec::new();
        for label in s.split(".") {
            if label.is_empty() {
                return Err(SelectorParseError::Empty);
            } else if !label.chars().all(|c| LABEL_ALPHABET.contains(&c)) {
                return Err(SelectorParseError::Alphabet);
            }
            labels.push(label.to_string());
        }

        Ok(Self { labels, target })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let SelectorTarget::Context = &self.target {
            write!(f, "$")?;
        }
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, ".{label}")?;
        }
        Ok(())
    }
}

/// An error encountered when parsing a selector.
#[derive(Debug, thiserror::Error)]
pub enum SelectorParseError {
    #[error("invalid attribute character")]
    Alphabet,

    #[error("empty attribute")]
    Empty,

    #[error("selector must start with '.' or '$.'")]
    MissingPrefix,
}
