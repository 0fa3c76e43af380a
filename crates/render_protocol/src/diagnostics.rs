#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    Notification,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Error,
    DeprecatedBehavior,
    UndefinedBehavior,
    Portability,
    Performance,
    Marker,
    Other,
}

/// Message reported by the graphics driver while the frame loop runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDiagnostic {
    pub severity: DiagnosticSeverity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl BackendDiagnostic {
    pub fn is_reportable(&self) -> bool {
        self.severity != DiagnosticSeverity::Notification && self.kind != DiagnosticKind::Other
    }
}

/// Logs a diagnostic without interrupting the frame. Returns whether it was reported.
pub fn log_backend_diagnostic(diagnostic: &BackendDiagnostic) -> bool {
    if !diagnostic.is_reportable() {
        return false;
    }
    log::warn!(
        "[backend] {:?} {:?}: {}",
        diagnostic.severity,
        diagnostic.kind,
        diagnostic.message
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(severity: DiagnosticSeverity, kind: DiagnosticKind) -> BackendDiagnostic {
        BackendDiagnostic {
            severity,
            kind,
            message: "buffer object 3 will use VIDEO memory".to_owned(),
        }
    }

    #[test]
    fn notifications_and_other_kinds_are_dropped() {
        assert!(!log_backend_diagnostic(&diagnostic(
            DiagnosticSeverity::Notification,
            DiagnosticKind::Performance
        )));
        assert!(!log_backend_diagnostic(&diagnostic(
            DiagnosticSeverity::High,
            DiagnosticKind::Other
        )));
        assert!(log_backend_diagnostic(&diagnostic(
            DiagnosticSeverity::Medium,
            DiagnosticKind::Performance
        )));
        assert!(log_backend_diagnostic(&diagnostic(
            DiagnosticSeverity::Low,
            DiagnosticKind::UndefinedBehavior
        )));
    }
}
