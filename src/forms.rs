use crate::commands::AppCommand;

pub const APP_NAME: &str = "BroadcastMe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Rename,
    Acknowledge,
}

/// A modal dialog as plain data: the GUI renders it, `confirm` interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalForm {
    pub title: String,
    pub prompt: String,
    pub input: Option<String>,
    pub confirm_label: String,
    pub action: FormAction,
}

impl ModalForm {
    pub fn rename(current_file_name: &str) -> Self {
        Self {
            title: "Rename File".to_string(),
            prompt: "Rename to:".to_string(),
            input: Some(current_file_name.to_string()),
            confirm_label: "Rename".to_string(),
            action: FormAction::Rename,
        }
    }

    pub fn about() -> Self {
        Self {
            title: format!("About {}", APP_NAME),
            prompt: format!(
                "{} - A Screen Recording Tool\nVersion {}",
                APP_NAME,
                env!("CARGO_PKG_VERSION")
            ),
            input: None,
            confirm_label: "Close".to_string(),
            action: FormAction::Acknowledge,
        }
    }

    pub fn confirm(self) -> Option<AppCommand> {
        match self.action {
            FormAction::Rename => Some(AppCommand::Rename(self.input.unwrap_or_default())),
            FormAction::Acknowledge => None,
        }
    }
}
