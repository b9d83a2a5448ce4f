use std::fmt;

use serde::Serialize;

/// Category of a non-fatal compile diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MalformedAnnotation,
    UnrecognizedUniform,
    UnrecognizedBlendMode,
    SkippedObject,
    SkippedEffect,
    MissingDefaultTexture,
    IgnoredBinding,
    IgnoredCommand,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::MalformedAnnotation => "malformed annotation",
            WarningKind::UnrecognizedUniform => "unrecognized uniform",
            WarningKind::UnrecognizedBlendMode => "unrecognized blend mode",
            WarningKind::SkippedObject => "skipped object",
            WarningKind::SkippedEffect => "skipped effect",
            WarningKind::MissingDefaultTexture => "missing default texture",
            WarningKind::IgnoredBinding => "ignored binding",
            WarningKind::IgnoredCommand => "ignored command",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Collected warnings of one compile session.
///
/// Every warning is also forwarded to the `log` facade, so a binary with a
/// logger installed sees them as they happen.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let warning = Warning {
            kind,
            message: message.into(),
        };
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Move `other`'s warnings behind ours, keeping their order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let mut d = Diagnostics::new();
        d.warn(WarningKind::IgnoredCommand, "copy");
        d.warn(WarningKind::IgnoredCommand, "swap");
        d.warn(WarningKind::SkippedObject, "layer 3");
        assert_eq!(d.count(WarningKind::IgnoredCommand), 2);
        assert_eq!(d.count(WarningKind::SkippedObject), 1);
        assert_eq!(d.len(), 3);
        assert_eq!(d.warnings()[2].to_string(), "skipped object: layer 3");
    }
}
