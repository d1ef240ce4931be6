use core::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// RW0001: method has no HTTP verb and path; it is skipped.
    NotAnEndpoint,
    /// RW0002: the declarative-API marker could not be resolved.
    MissingMarker,
    /// RW0003: descriptor resolution failed.
    Resolution,
}

impl DiagnosticCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::NotAnEndpoint => "RW0001",
            DiagnosticCode::MissingMarker => "RW0002",
            DiagnosticCode::Resolution => "RW0003",
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            DiagnosticCode::NotAnEndpoint => Severity::Warning,
            DiagnosticCode::MissingMarker | DiagnosticCode::Resolution => Severity::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub interface: Option<String>,
    pub method: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            interface: None,
            method: None,
            message: message.into(),
        }
    }

    #[inline]
    pub fn at(mut self, interface: &str, method: &str) -> Self {
        self.interface = Some(interface.to_string());
        self.method = Some(method.to_string());
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{sev}[{}]", self.code.as_str())?;
        match (&self.interface, &self.method) {
            (Some(i), Some(m)) => write!(f, " {i}::{m}")?,
            (Some(i), None) => write!(f, " {i}")?,
            _ => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Receives diagnostics as resolution proceeds.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    #[inline]
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Discards everything.
pub struct IgnoreDiagnostics;

impl DiagnosticSink for IgnoreDiagnostics {
    #[inline]
    fn report(&mut self, _: Diagnostic) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_code_and_location() {
        let d = Diagnostic::new(DiagnosticCode::NotAnEndpoint, "no verb").at("Users", "helper");
        assert_eq!(d.to_string(), "warning[RW0001] Users::helper: no verb");
        assert!(!d.is_error());
        assert!(Diagnostic::new(DiagnosticCode::MissingMarker, "x").is_error());
    }
}
