//! Journal lisible des messages d'un run
//!
//! Les messages sont destinés au fichier de résultats remis à l'utilisateur ;
//! chaque entrée est aussi émise comme événement `tracing`.

use std::fmt;

use tracing::{error, info, warn};

/// Niveau d'un message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl fmt::Display for RunMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<RunMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.push(MessageLevel::Info, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.push(MessageLevel::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!("{}", text);
        self.push(MessageLevel::Error, text);
    }

    fn push(&mut self, level: MessageLevel, text: String) {
        self.messages.push(RunMessage { level, text });
    }

    pub fn messages(&self) -> &[RunMessage] {
        &self.messages
    }

    pub fn count(&self, level: MessageLevel) -> usize {
        self.messages.iter().filter(|m| m.level == level).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_counted() {
        let mut log = MessageLog::new();
        log.info("SARA Risk Radii created for PATTS #1234");
        log.warning("No features from Daycares intersect the 1-Miles buffer");
        log.warning("Zone 42 skipped");
        log.error("Ring 3 failed");

        assert_eq!(log.count(MessageLevel::Info), 1);
        assert_eq!(log.count(MessageLevel::Warning), 2);
        assert_eq!(log.count(MessageLevel::Error), 1);
        assert_eq!(
            log.messages()[3].to_string(),
            "[ERROR] Ring 3 failed"
        );
    }
}
