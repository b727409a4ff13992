use std::fmt;

use glossa_translator::LanguageCode;

/// A (source, target) language pair. Each distinct pair owns its own
/// pending queue and flush task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub source: LanguageCode,
    pub target: LanguageCode,
}

impl RouteKey {
    pub fn new(source: impl Into<LanguageCode>, target: impl Into<LanguageCode>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Identity routes need no translation at all.
    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}
