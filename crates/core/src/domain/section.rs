use std::collections::HashMap;

use serde::Serialize;

use crate::domain::key::QuestionKey;
use crate::domain::row::Row;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FaqEntry {
    pub key: QuestionKey,
    pub question: String,
    pub answer: String,
    pub extra: Vec<String>,
}

/// One inline button: the question as label, its key as callback payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionButton {
    pub label: String,
    pub payload: QuestionKey,
}

/// One FAQ category, backed by one sheet.
///
/// Entries keep first-insertion order; a later row whose question hashes to
/// an existing key replaces that entry in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<FaqEntry>,
    positions: HashMap<QuestionKey, usize>,
    buttons: Vec<QuestionButton>,
}

impl Section {
    pub fn from_rows(name: impl Into<String>, rows: impl IntoIterator<Item = Row>) -> Self {
        let mut entries: Vec<FaqEntry> = Vec::new();
        let mut positions = HashMap::new();

        for row in rows {
            let key = QuestionKey::from_question(&row.question);
            let entry = FaqEntry {
                key: key.clone(),
                question: row.question,
                answer: row.answer,
                extra: row.extra,
            };
            match positions.get(&key) {
                Some(&position) => entries[position] = entry,
                None => {
                    positions.insert(key, entries.len());
                    entries.push(entry);
                }
            }
        }

        let buttons = buttons_for(&entries);
        Self { name: name.into(), entries, positions, buttons }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self, key: &QuestionKey) -> Option<&FaqEntry> {
        self.positions.get(key).map(|&position| &self.entries[position])
    }

    pub fn contains(&self, key: &QuestionKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &QuestionKey> {
        self.entries.iter().map(|entry| &entry.key)
    }

    pub fn buttons(&self) -> &[QuestionButton] {
        &self.buttons
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the given keys, keeping the order of what remains.
    pub(crate) fn remove_keys(&mut self, removed: &[QuestionKey]) {
        if removed.is_empty() {
            return;
        }
        self.entries.retain(|entry| !removed.contains(&entry.key));
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.key.clone(), position))
            .collect();
        self.buttons = buttons_for(&self.entries);
    }
}

fn buttons_for(entries: &[FaqEntry]) -> Vec<QuestionButton> {
    entries
        .iter()
        .map(|entry| QuestionButton { label: entry.question.clone(), payload: entry.key.clone() })
        .collect()
}
