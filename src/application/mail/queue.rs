use std::collections::HashMap;

use bytes::Bytes;

use crate::domain::naming::UniqueNames;

use super::Attachment;

/// Everything one recipient will receive.
#[derive(Debug, Clone)]
pub struct QueuedRecipient {
    pub recipient: String,
    pub attachments: Vec<Attachment>,
    names: UniqueNames,
}

impl QueuedRecipient {
    pub fn filenames(&self) -> Vec<String> {
        self.attachments
            .iter()
            .map(|attachment| attachment.filename.clone())
            .collect()
    }
}

/// Attachments grouped by recipient across all rows, recipients in
/// first-seen order.
#[derive(Debug, Clone, Default)]
pub struct EmailQueue {
    entries: Vec<QueuedRecipient>,
    index: HashMap<String, usize>,
}

impl EmailQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the filename actually used for this recipient.
    pub fn push(&mut self, recipient: &str, filename: &str, content: Bytes) -> String {
        let key = recipient.trim().to_lowercase();
        let position = match self.index.get(&key) {
            Some(position) => *position,
            None => {
                self.entries.push(QueuedRecipient {
                    recipient: recipient.trim().to_string(),
                    attachments: Vec::new(),
                    names: UniqueNames::new(),
                });
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[position];
        let filename = entry.names.claim(filename);
        entry.attachments.push(Attachment {
            filename: filename.clone(),
            content,
        });
        filename
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn attachment_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.attachments.len())
            .sum()
    }

    pub fn entries(&self) -> &[QueuedRecipient] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<QueuedRecipient> {
        self.entries
    }
}
