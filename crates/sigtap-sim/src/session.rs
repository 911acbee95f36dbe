//! Simulated telephony session.

use sigtap_core::Session;

/// A call with an id and optional caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSession {
    id: String,
    caller_name: Option<String>,
    caller_number: Option<String>,
}

impl SimSession {
    /// Anonymous call.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            caller_name: None,
            caller_number: None,
        }
    }

    /// Attach caller identity.
    pub fn with_caller(mut self, name: impl Into<String>, number: impl Into<String>) -> Self {
        self.caller_name = Some(name.into());
        self.caller_number = Some(number.into());
        self
    }
}

impl Session for SimSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn caller_name(&self) -> Option<&str> {
        self.caller_name.as_deref()
    }

    fn caller_number(&self) -> Option<&str> {
        self.caller_number.as_deref()
    }
}
