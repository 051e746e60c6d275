use rfd::{MessageButtons, MessageDialog, MessageLevel};
use std::fmt::Display;

/// A warning the user has to dismiss before carrying on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Display) -> Self {
        Self {
            title: "TierDeck",
            message: message.to_string(),
        }
    }

    pub fn import_failed(reason: impl Display) -> Self {
        Self {
            title: "Import failed",
            message: format!("Failed to import: {}", reason),
        }
    }

    pub fn export_failed(reason: impl Display) -> Self {
        Self {
            title: "Export failed",
            message: reason.to_string(),
        }
    }

    /// Block on a native warning dialog
    pub fn show(&self) {
        tracing::warn!("⚠️  {}", self.message);
        MessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title(self.title)
            .set_description(self.message.as_str())
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}
