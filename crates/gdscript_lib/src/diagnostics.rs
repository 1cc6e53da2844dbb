//! Diagnostic records.
//!
//! Every finding the toolkit produces, from the tokenizer up to the
//! project analyzer, is one immutable [`Diagnostic`] with a stable machine
//! code of the form `GDnnnn`. The serialized shape is part of the public
//! contract: `severity` is a number (0 = Error, 1 = Warning, 2 = Info,
//! 3 = Hint) and `source` is either `"validator"` or `"linter"`.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn as_number(&self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
            Severity::Hint => 3,
        }
    }

    pub fn from_number(value: u8) -> Severity {
        match value {
            0 => Severity::Error,
            1 => Severity::Warning,
            2 => Severity::Info,
            _ => Severity::Hint,
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_number())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Severity, D::Error> {
        Ok(Severity::from_number(u8::deserialize(deserializer)?))
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        f.write_str(text)
    }
}

/// The recognized findings and their stable codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    InvalidToken,
    UnterminatedString,
    ExpressionTooDeep,
    UndefinedIdentifier,
    UnknownMember,
    ExtendsCycle,
    UnknownBaseClass,
    ArgumentCountMismatch,
    ArgumentTypeMismatch,
    InconsistentIndentation,
    IndentationJump,
    UnexpectedIndent,
    MissingIndentedBlock,
    DedentMismatch,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::InvalidToken => "GD0001",
            DiagnosticKind::UnterminatedString => "GD0002",
            DiagnosticKind::ExpressionTooDeep => "GD0003",
            DiagnosticKind::UndefinedIdentifier => "GD1001",
            DiagnosticKind::UnknownMember => "GD1002",
            DiagnosticKind::ExtendsCycle => "GD2001",
            DiagnosticKind::UnknownBaseClass => "GD2002",
            DiagnosticKind::ArgumentCountMismatch => "GD3001",
            DiagnosticKind::ArgumentTypeMismatch => "GD3002",
            DiagnosticKind::InconsistentIndentation => "GD6001",
            DiagnosticKind::IndentationJump => "GD6002",
            DiagnosticKind::UnexpectedIndent => "GD6003",
            DiagnosticKind::MissingIndentedBlock => "GD6004",
            DiagnosticKind::DedentMismatch => "GD6005",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::InvalidToken
            | DiagnosticKind::UnterminatedString
            | DiagnosticKind::ExpressionTooDeep
            | DiagnosticKind::ExtendsCycle => Severity::Error,
            DiagnosticKind::UndefinedIdentifier
            | DiagnosticKind::UnknownMember
            | DiagnosticKind::UnknownBaseClass
            | DiagnosticKind::ArgumentCountMismatch
            | DiagnosticKind::ArgumentTypeMismatch
            | DiagnosticKind::InconsistentIndentation
            | DiagnosticKind::IndentationJump
            | DiagnosticKind::UnexpectedIndent
            | DiagnosticKind::MissingIndentedBlock
            | DiagnosticKind::DedentMismatch => Severity::Warning,
        }
    }
}

/// Which stage produced a diagnostic, in the serialized contract vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticSource {
    #[serde(rename = "validator")]
    Validator,
    #[serde(rename = "linter")]
    Linter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub source: DiagnosticSource,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        message: impl Into<String>,
        start: (usize, usize),
        end: (usize, usize),
    ) -> Diagnostic {
        Diagnostic {
            code: kind.code().to_string(),
            message: message.into(),
            severity: kind.default_severity(),
            start_line: start.0,
            start_column: start.1,
            end_line: end.0,
            end_column: end.1,
            source: DiagnosticSource::Validator,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Diagnostic {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: DiagnosticSource) -> Diagnostic {
        self.source = source;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.start_line, self.start_column, self.severity, self.code, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::UndefinedIdentifier,
            "identifier 'speed' is not defined",
            (3, 4),
            (3, 9),
        );

        let json = serde_json::to_value(&diagnostic).expect("serialization failed");
        assert_eq!(json["code"], "GD1001");
        assert_eq!(json["severity"], 1);
        assert_eq!(json["source"], "validator");
        assert_eq!(json["start_line"], 3);
        assert_eq!(json["end_column"], 9);
    }

    #[test]
    fn test_severity_roundtrip() {
        for severity in [
            Severity::Error,
            Severity::Warning,
            Severity::Info,
            Severity::Hint,
        ] {
            assert_eq!(Severity::from_number(severity.as_number()), severity);
        }
    }
}
