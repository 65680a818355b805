//! Property-based tests.
//!
//! Uses proptest to check invariants across random inputs:
//! - Chunk splitting is lossless
//! - Prompts carry the delimiter only when there is a chunk
//! - Fresh ids never collide with existing ones
//! - The history document survives a write/read cycle
//! - Per-line replacements keep chunk order

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use instruct::services::{PROMPT_DELIMITER, assemble_multiple, build_prompt, split_chunks};
use instruct::{
    CompletionOutcome, FileInstructionStore, Instruction, InstructionCollection, InstructionId,
    InstructionStorage,
};
use proptest::prelude::*;

fn instruction_strategy() -> impl Strategy<Value = Instruction> {
    (any::<u64>(), ".{0,40}", 1..1_000_u64).prop_map(|(id, text, usage_count)| Instruction {
        id: InstructionId::new(id),
        text,
        usage_count,
    })
}

proptest! {
    /// Property: joining the chunks with newlines restores the selection.
    #[test]
    fn prop_split_chunks_is_lossless(selection in "[a-z \\n]{0,80}") {
        let chunks = split_chunks(&selection);
        prop_assert_eq!(chunks.join("\n"), selection.clone());
        prop_assert_eq!(chunks.len(), selection.matches('\n').count() + 1);
    }

    /// Property: the prompt is the instruction alone for an empty chunk, and
    /// instruction + delimiter + chunk otherwise.
    #[test]
    fn prop_prompt_delimiter(instruction in "[A-Za-z ]{1,30}", chunk in "[a-z\\n]{0,30}") {
        let prompt = build_prompt(&instruction, &chunk);
        if chunk.is_empty() {
            prop_assert_eq!(prompt, instruction);
        } else {
            prop_assert_eq!(prompt, format!("{instruction}{PROMPT_DELIMITER}{chunk}"));
        }
    }

    /// Property: `next_id` exceeds every id already held and never goes below the clock.
    #[test]
    fn prop_next_id_is_fresh(
        ids in prop::collection::vec(0..u64::MAX / 2, 0..20),
        now in 0..u64::MAX / 2,
    ) {
        let collection = InstructionCollection {
            instructions: ids
                .iter()
                .map(|&id| Instruction::new(InstructionId::new(id), "x"))
                .collect(),
        };
        let next = collection.next_id(now);
        prop_assert!(ids.iter().all(|&id| next.as_u64() > id));
        prop_assert!(next.as_u64() >= now);
    }

    /// Property: one output block per completed chunk, in chunk order.
    #[test]
    fn prop_assemble_multiple_keeps_order(lines in prop::collection::vec("[a-z]{1,8}", 1..10)) {
        let chunks: Vec<&str> = lines.iter().map(String::as_str).collect();
        let outcomes: Vec<CompletionOutcome> =
            lines.iter().map(|l| Ok(Some(l.to_uppercase()))).collect();

        let expected: String = lines
            .iter()
            .map(|l| format!("{l}\n{}\n\n", l.to_uppercase()))
            .collect();
        prop_assert_eq!(assemble_multiple(&chunks, &outcomes), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: whatever is written is read back deep-equal.
    #[test]
    fn prop_document_round_trip(instructions in prop::collection::vec(instruction_strategy(), 0..8)) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileInstructionStore::open(dir.path().join("instructions.json")).unwrap();

        let mut stored = Vec::new();
        for instruction in &instructions {
            stored.push(store.append_instruction(&instruction.text).unwrap());
        }
        for (stored, wanted) in stored.iter_mut().zip(&instructions) {
            stored.usage_count = wanted.usage_count;
            store.update_instruction(stored).unwrap();
        }

        let loaded = store.load_instructions().unwrap();
        prop_assert_eq!(loaded.instructions, stored);
    }
}
