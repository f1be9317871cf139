//! Bounded conversation history.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub prompt: String,
    pub response: String,
}

/// The most recent exchanges, oldest first. Inserting past capacity
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<Exchange>,
    capacity: usize,
}

impl ConversationHistory {
    pub const DEFAULT_CAPACITY: usize = 5;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Exchange {
            prompt: prompt.into(),
            response: response.into(),
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &Exchange> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("Prompt: {}\nResponse: {}", e.prompt, e.response))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The prompt actually sent to the agent: history first, then `prompt`.
    pub fn contextualize(&self, prompt: &str) -> String {
        format!(
            "Here is the relevant history:\n{}\n\nNew prompt: {}",
            self.render(),
            prompt
        )
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_entry_evicts_the_first() {
        let mut history = ConversationHistory::default();
        for i in 1..=6 {
            history.push(format!("p{}", i), format!("r{}", i));
        }
        let prompts: Vec<&str> = history.entries().map(|e| e.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["p2", "p3", "p4", "p5", "p6"]);
    }

    #[test]
    fn contextualize_prepends_history() {
        let mut history = ConversationHistory::new(2);
        history.push("hi", "hello");
        assert_eq!(
            history.contextualize("next"),
            "Here is the relevant history:\nPrompt: hi\nResponse: hello\n\nNew prompt: next"
        );
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = ConversationHistory::new(0);
        history.push("a", "b");
        assert!(history.is_empty());
    }
}
