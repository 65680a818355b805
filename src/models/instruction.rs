//! Instruction types and the persisted collection.
//!
//! The collection serializes as `{ "instructions": [...] }` with camelCase
//! field names, matching the document format shared with the editor plugin.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an instruction.
///
/// Ids are time-derived (Unix milliseconds at creation) and strictly
/// increasing within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionId(u64);

impl InstructionId {
    /// Creates an id from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reusable prompt template with a usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Unique identifier, never reused.
    pub id: InstructionId,
    /// The instruction text sent ahead of the selection.
    pub text: String,
    /// Number of times the instruction has been used.
    #[serde(rename = "usageCount")]
    pub usage_count: u64,
}

impl Instruction {
    /// Creates a first-use instruction (`usage_count = 1`).
    #[must_use]
    pub fn new(id: InstructionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            usage_count: 1,
        }
    }

    /// Returns a copy with the usage count bumped by one.
    #[must_use]
    pub fn with_usage_incremented(&self) -> Self {
        Self {
            usage_count: self.usage_count.saturating_add(1),
            ..self.clone()
        }
    }

    /// Case-insensitive exact text comparison.
    #[must_use]
    pub fn matches_text(&self, text: &str) -> bool {
        self.text.to_lowercase() == text.to_lowercase()
    }
}

/// Ordered instruction history, insertion order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionCollection {
    /// Instructions in insertion order.
    pub instructions: Vec<Instruction>,
}

impl InstructionCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    /// Number of instructions held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// First instruction whose text equals `text`, ignoring case.
    #[must_use]
    pub fn find_by_text(&self, text: &str) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.matches_text(text))
    }

    /// Position of the instruction with the given id.
    #[must_use]
    pub fn position_of(&self, id: InstructionId) -> Option<usize> {
        self.instructions.iter().position(|i| i.id == id)
    }

    /// Picks a fresh id: `now_millis`, or one past the largest id already held
    /// when the clock has not moved past it.
    #[must_use]
    pub fn next_id(&self, now_millis: u64) -> InstructionId {
        let floor = self
            .instructions
            .iter()
            .map(|i| i.id.as_u64())
            .max()
            .map_or(0, |max| max.saturating_add(1));
        InstructionId(now_millis.max(floor))
    }

    /// Instructions whose text contains `query` (case-insensitive), most used
    /// first. Ties keep insertion order. An empty query matches everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Instruction> {
        let needle = query.trim().to_lowercase();
        let mut hits: Vec<&Instruction> = self
            .instructions
            .iter()
            .filter(|i| needle.is_empty() || i.text.to_lowercase().contains(&needle))
            .collect();
        // sort_by is stable, so equal counts stay in insertion order
        hits.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> InstructionCollection {
        InstructionCollection {
            instructions: vec![
                Instruction {
                    id: InstructionId::new(1),
                    text: "Summarize".to_string(),
                    usage_count: 2,
                },
                Instruction {
                    id: InstructionId::new(2),
                    text: "Translate to French".to_string(),
                    usage_count: 5,
                },
                Instruction {
                    id: InstructionId::new(3),
                    text: "Summarize as bullets".to_string(),
                    usage_count: 2,
                },
            ],
        }
    }

    #[test]
    fn test_serializes_camel_case_document() {
        let json = serde_json::to_value(collection()).unwrap();
        let first = &json["instructions"][0];
        assert_eq!(first["id"], 1);
        assert_eq!(first["text"], "Summarize");
        assert_eq!(first["usageCount"], 2);
        assert_eq!(json.as_object().map(serde_json::Map::len), Some(1));
    }

    #[test]
    fn test_find_by_text_is_case_insensitive_exact() {
        let c = collection();
        assert_eq!(
            c.find_by_text("SUMMARIZE").map(|i| i.id),
            Some(InstructionId::new(1))
        );
        assert!(c.find_by_text("summ").is_none());
    }

    #[test]
    fn test_search_ranks_by_usage_then_insertion() {
        let c = collection();
        let hits: Vec<u64> = c.search("").iter().map(|i| i.id.as_u64()).collect();
        assert_eq!(hits, vec![2, 1, 3]);

        let hits: Vec<u64> = c.search("summ").iter().map(|i| i.id.as_u64()).collect();
        assert_eq!(hits, vec![1, 3]);
    }

    #[test]
    fn test_next_id_never_reuses() {
        let c = collection();
        assert_eq!(c.next_id(0), InstructionId::new(4));
        assert_eq!(c.next_id(1_000), InstructionId::new(1_000));
        assert_eq!(InstructionCollection::new().next_id(7), InstructionId::new(7));
    }

    #[test]
    fn test_usage_increment() {
        let i = Instruction::new(InstructionId::new(9), "Fix grammar");
        assert_eq!(i.usage_count, 1);
        let bumped = i.with_usage_incremented();
        assert_eq!(bumped.usage_count, 2);
        assert_eq!(bumped.id, i.id);
    }
}
