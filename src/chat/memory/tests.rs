use super::*;
use crate::providers::{ChatMessage, Role};

fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

#[test]
fn append_and_read_back_in_order() {
    let mut memory = MemoryBuffer::new(1000);

    memory.append(ChatMessage::user("How old is Alice?"));
    memory.append(ChatMessage::assistant("Alice is 30 years old."));

    let turns = memory.all();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "How old is Alice?");
    assert_eq!(turns[1].role, Role::Assistant);
}

#[test]
fn token_count_never_exceeds_limit() {
    let mut memory = MemoryBuffer::new(300);

    for i in 0..50 {
        memory.append(ChatMessage::user(format!("{} question {i}", words(20))));
        assert!(
            memory.token_count() <= 300,
            "budget violated after append {i}: {}",
            memory.token_count()
        );
    }
    assert!(!memory.is_empty());
}

#[test]
fn eviction_removes_oldest_first() {
    // Each 30-word turn is ~40 estimated tokens; three fit in 130, not four.
    let mut memory = MemoryBuffer::new(130);

    memory.append(ChatMessage::user(format!("first {}", words(29))));
    memory.append(ChatMessage::assistant(format!("second {}", words(29))));
    memory.append(ChatMessage::user(format!("third {}", words(29))));
    memory.append(ChatMessage::assistant(format!("fourth {}", words(29))));

    let turns = memory.all();
    assert!(turns.len() < 4);
    assert!(turns.last().expect("non-empty").content.starts_with("fourth"));
    assert!(!turns.iter().any(|t| t.content.starts_with("first")));
}

#[test]
fn oversized_single_turn_is_dropped() {
    let mut memory = MemoryBuffer::new(256);

    memory.append(ChatMessage::user(words(1000)));

    assert!(memory.is_empty());
    assert_eq!(memory.token_count(), 0);
}

#[test]
fn reset_empties_the_buffer() {
    let mut memory = MemoryBuffer::new(1000);
    memory.append(ChatMessage::user("hello"));
    memory.append(ChatMessage::assistant("hi"));

    memory.reset();

    assert!(memory.is_empty());
    assert_eq!(memory.len(), 0);
    assert_eq!(memory.token_count(), 0);

    // Appends after reset start a fresh sequence.
    memory.append(ChatMessage::user("a new beginning"));
    assert_eq!(memory.len(), 1);
}
