use std::collections::HashMap;

use tracing::warn;

use crate::domain::key::QuestionKey;
use crate::domain::row::Row;
use crate::domain::section::{FaqEntry, Section};
use crate::errors::IndexError;

/// Sheets whose name starts with this prefix hold service data (analytics)
/// and never become FAQ sections.
pub const RESERVED_SHEET_PREFIX: &str = "_";

pub fn is_reserved_sheet(name: &str, reserved_prefix: &str) -> bool {
    !reserved_prefix.is_empty() && name.starts_with(reserved_prefix)
}

/// Raw content of one sheet as returned by the spreadsheet service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetContent {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl SheetContent {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self { name: name.into(), rows }
    }
}

/// Immutable FAQ snapshot: sections in sheet order plus the reverse lookup
/// from question key to owning section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaqIndex {
    sections: Vec<Section>,
    by_name: HashMap<String, usize>,
    owners: HashMap<QuestionKey, String>,
}

impl FaqIndex {
    pub fn build(sheets: Vec<SheetContent>, reserved_prefix: &str) -> Result<Self, IndexError> {
        let mut sections: Vec<Section> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for sheet in sheets {
            if is_reserved_sheet(&sheet.name, reserved_prefix) {
                continue;
            }

            let mut rows = Vec::with_capacity(sheet.rows.len());
            for (offset, cells) in sheet.rows.into_iter().enumerate() {
                // The values API returns a blank separator row as `[]`.
                if cells.is_empty() {
                    warn!(
                        event_name = "faq.index.blank_row_skipped",
                        sheet = %sheet.name,
                        row_number = offset + 1,
                        "skipping empty row"
                    );
                    continue;
                }
                let row = Row::parse(&sheet.name, offset + 1, cells)?;
                if row.is_blank() {
                    warn!(
                        event_name = "faq.index.blank_row_skipped",
                        sheet = %sheet.name,
                        row_number = offset + 1,
                        "skipping row with blank question"
                    );
                    continue;
                }
                rows.push(row);
            }

            let section = Section::from_rows(sheet.name.clone(), rows);
            match by_name.get(&sheet.name) {
                Some(&position) => sections[position] = section,
                None => {
                    by_name.insert(sheet.name, sections.len());
                    sections.push(section);
                }
            }
        }

        // Later sections win a shared key; the losing section drops the entry
        // so every key has exactly one owner.
        let mut owner_positions: HashMap<QuestionKey, usize> = HashMap::new();
        for (position, section) in sections.iter().enumerate() {
            for key in section.keys() {
                if let Some(previous) = owner_positions.insert(key.clone(), position) {
                    if previous != position {
                        warn!(
                            event_name = "faq.index.duplicate_question",
                            question_key = %key,
                            dropped_from = sections[previous].name(),
                            kept_in = section.name(),
                            "question appears in more than one section; keeping the later one"
                        );
                    }
                }
            }
        }

        for (position, section) in sections.iter_mut().enumerate() {
            let lost: Vec<QuestionKey> = section
                .keys()
                .filter(|key| owner_positions.get(*key) != Some(&position))
                .cloned()
                .collect();
            section.remove_keys(&lost);
        }

        let owners = owner_positions
            .into_iter()
            .map(|(key, position)| (key, sections[position].name().to_owned()))
            .collect();

        let index = Self { sections, by_name, owners };
        index.check_consistency()?;
        Ok(index)
    }

    /// Verifies that the reverse lookup and the section contents agree.
    pub fn check_consistency(&self) -> Result<(), IndexError> {
        for section in &self.sections {
            for key in section.keys() {
                if self.owners.get(key).map(String::as_str) != Some(section.name()) {
                    return Err(IndexError::InvariantViolation(format!(
                        "key `{key}` in section `{}` is not owned by it",
                        section.name()
                    )));
                }
            }
        }

        for (key, owner) in &self.owners {
            let owned = self.section(owner).map(|section| section.contains(key)).unwrap_or(false);
            if !owned {
                return Err(IndexError::InvariantViolation(format!(
                    "lookup maps key `{key}` to section `{owner}` which does not contain it"
                )));
            }
        }

        Ok(())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(Section::name)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.by_name.get(name).map(|&position| &self.sections[position])
    }

    pub fn owner_of(&self, key: &QuestionKey) -> Option<&str> {
        self.owners.get(key).map(String::as_str)
    }

    /// Resolves a button payload to its section and entry.
    pub fn resolve(&self, key: &QuestionKey) -> Option<(&Section, &FaqEntry)> {
        let section = self.section(self.owner_of(key)?)?;
        let entry = section.entry(key)?;
        Some((section, entry))
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn question_count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{is_reserved_sheet, FaqIndex, SheetContent, RESERVED_SHEET_PREFIX};
    use crate::domain::key::QuestionKey;

    fn sheet(name: &str, rows: &[&[&str]]) -> SheetContent {
        SheetContent::new(
            name,
            rows.iter().map(|row| row.iter().map(|cell| cell.to_string()).collect()).collect(),
        )
    }

    #[test]
    fn builds_sections_and_skips_reserved_sheets() {
        let index = FaqIndex::build(
            vec![
                sheet("General", &[&["What are hours?", "9-5"]]),
                sheet("_Analytics", &[&["2024-01-01", "alice", "Alice ", "/START"]]),
            ],
            RESERVED_SHEET_PREFIX,
        )
        .expect("index");

        assert_eq!(index.section_names().collect::<Vec<_>>(), vec!["General"]);
        let general = index.section("General").expect("section");
        assert_eq!(general.buttons().len(), 1);
        assert_eq!(general.buttons()[0].label, "What are hours?");
        assert_eq!(general.buttons()[0].payload.as_str(), "d804a6fc748b3c0d");
        assert!(index.section("_Analytics").is_none());
    }

    #[test]
    fn reverse_lookup_resolves_entries() {
        let index = FaqIndex::build(
            vec![
                sheet("General", &[&["What are hours?", "9-5"], &["Where?", "Main st."]]),
                sheet("Billing", &[&["How to pay?", "Card", "internal note"]]),
            ],
            RESERVED_SHEET_PREFIX,
        )
        .expect("index");

        let key = QuestionKey::from_question("How to pay?");
        let (section, entry) = index.resolve(&key).expect("resolved");
        assert_eq!(section.name(), "Billing");
        assert_eq!(entry.answer, "Card");
        assert_eq!(entry.extra, vec!["internal note".to_string()]);
        assert_eq!(index.question_count(), 3);
        assert_eq!(index.section_count(), 2);
        assert!(index.resolve(&QuestionKey::from_question("Unknown?")).is_none());
    }

    #[test]
    fn every_section_key_is_owned_by_its_section() {
        let index = FaqIndex::build(
            vec![
                sheet("A", &[&["one", "1"], &["two", "2"], &["one", "1b"]]),
                sheet("B", &[&["three", "3"], &["two", "2b"]]),
                sheet("C", &[]),
            ],
            RESERVED_SHEET_PREFIX,
        )
        .expect("index");

        index.check_consistency().expect("consistent");
        for section in index.sections() {
            for key in section.keys() {
                assert_eq!(index.owner_of(key), Some(section.name()));
            }
        }
    }

    #[test]
    fn later_section_wins_shared_question() {
        let index = FaqIndex::build(
            vec![
                sheet("A", &[&["shared", "from A"], &["only A", "a"]]),
                sheet("B", &[&["shared", "from B"]]),
            ],
            RESERVED_SHEET_PREFIX,
        )
        .expect("index");

        let key = QuestionKey::from_question("shared");
        assert_eq!(index.owner_of(&key), Some("B"));
        assert_eq!(index.resolve(&key).map(|(_, entry)| entry.answer.as_str()), Some("from B"));
        let a = index.section("A").expect("A");
        assert!(!a.contains(&key));
        assert_eq!(a.buttons().len(), 1);
    }

    #[test]
    fn empty_sheet_still_becomes_a_section() {
        let index =
            FaqIndex::build(vec![sheet("Empty", &[])], RESERVED_SHEET_PREFIX).expect("index");

        assert_eq!(index.section_count(), 1);
        assert!(index.section("Empty").expect("section").is_empty());
    }

    #[test]
    fn empty_separator_rows_are_skipped() {
        let index = FaqIndex::build(
            vec![sheet("General", &[&["Q1", "A1"], &[], &["Q2", "A2"], &[]])],
            RESERVED_SHEET_PREFIX,
        )
        .expect("blank separator rows do not fail the build");

        let general = index.section("General").expect("section");
        let labels: Vec<&str> =
            general.buttons().iter().map(|button| button.label.as_str()).collect();
        assert_eq!(labels, vec!["Q1", "Q2"]);
        index.check_consistency().expect("consistent");
    }

    #[test]
    fn blank_questions_are_skipped() {
        let index = FaqIndex::build(
            vec![sheet("General", &[&["", "orphan"], &["Q", "A"], &["  "]])],
            RESERVED_SHEET_PREFIX,
        )
        .expect("index");

        assert_eq!(index.question_count(), 1);
    }

    #[test]
    fn rebuilding_identical_content_is_idempotent() {
        let content = || {
            vec![
                sheet("General", &[&["What are hours?", "9-5"], &["Where?", "Main st."]]),
                sheet("Billing", &[&["How to pay?", "Card"]]),
                sheet("_Analytics", &[]),
            ]
        };

        let first = FaqIndex::build(content(), RESERVED_SHEET_PREFIX).expect("first");
        let second = FaqIndex::build(content(), RESERVED_SHEET_PREFIX).expect("second");

        assert_eq!(first, second);
    }

    #[test]
    fn reserved_prefix_matching() {
        assert!(is_reserved_sheet("_Analytics", "_"));
        assert!(!is_reserved_sheet("Analytics_", "_"));
        assert!(!is_reserved_sheet("_Analytics", ""));
    }
}
