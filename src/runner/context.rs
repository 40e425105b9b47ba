use crate::session::Session;

/// Per-run state threaded through every probe invocation
pub struct RunContext {
    /// The live session; persisted when the run ends
    pub session: Session,

    /// Set by the first failing probe; every later probe is skipped
    pub failed: bool,

    /// Name of the probe that set `failed`
    pub failed_probe: Option<String>,

    /// Probes whose action was invoked, in order
    pub executed: Vec<String>,
}

impl RunContext {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            failed: false,
            failed_probe: None,
            executed: Vec::new(),
        }
    }

    pub fn mark_failed(&mut self, probe: &str) {
        if !self.failed {
            self.failed = true;
            self.failed_probe = Some(probe.to_string());
        }
    }

    /// Reason recorded for probes skipped after a failure
    pub fn skip_reason(&self) -> String {
        match self.failed_probe {
            Some(ref name) => format!("{} failed", name),
            None => "earlier probe failed".to_string(),
        }
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_wins() {
        let mut cx = RunContext::new(Session::fresh());
        assert!(!cx.failed);
        cx.mark_failed("login");
        cx.mark_failed("profile");
        assert!(cx.failed);
        assert_eq!(cx.skip_reason(), "login failed");
    }
}
