//! utterances comment widget embedded under each post.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::application::richtext::escape_html;

pub const UTTERANCES_CLIENT_URL: &str = "https://utteranc.es/client.js";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentsEmbed {
    pub repo: String,
    pub issue_term: String,
    pub label: Option<String>,
    pub theme: String,
}

/// Mount point for the widget. Only the first attach yields a script.
#[derive(Debug, Default)]
pub struct MountSlot {
    mounted: AtomicBool,
}

impl MountSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }
}

impl CommentsEmbed {
    /// Script tag for `slot`, or `None` when the slot already holds one.
    pub fn attach(&self, slot: &MountSlot) -> Option<String> {
        if slot.mounted.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.script_tag())
    }

    pub fn script_tag(&self) -> String {
        let mut tag = format!(
            "<script src=\"{UTTERANCES_CLIENT_URL}\" repo=\"{}\" issue-term=\"{}\"",
            escape_html(&self.repo),
            escape_html(&self.issue_term),
        );
        if let Some(label) = self.label.as_deref().filter(|label| !label.is_empty()) {
            tag.push_str(&format!(" label=\"{}\"", escape_html(label)));
        }
        tag.push_str(&format!(
            " theme=\"{}\" crossorigin=\"anonymous\" async></script>",
            escape_html(&self.theme)
        ));
        tag
    }
}
