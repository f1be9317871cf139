//! Conversation loop around a ready agent.
//!
//! A [`Session`] can only be created from an assembled agent, so queries
//! are never accepted before startup has succeeded.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::agent::Agent;
use crate::history::ConversationHistory;

pub const REPL_PROMPT: &str = "Enter a prompt (q to quit): ";
pub const QUIT_SENTINEL: &str = "q";

pub struct Session {
    agent: Box<dyn Agent>,
    history: ConversationHistory,
}

impl Session {
    pub fn new(agent: Box<dyn Agent>, history_capacity: usize) -> Self {
        Self {
            agent,
            history: ConversationHistory::new(history_capacity),
        }
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Ask the agent with recent history prepended.
    ///
    /// A failed query is not distinguished from an answer: its error text
    /// is returned and recorded like any other response.
    pub async fn ask(&mut self, prompt: &str) -> String {
        let full = self.history.contextualize(prompt);
        let response = match self.agent.query(&full).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("query failed: {:#}", e);
                format!("{:#}", e)
            }
        };
        self.history.push(prompt, response.clone());
        response
    }
}

/// Read prompts from `input` until `q` or end of input, writing each
/// answer to `output`.
pub async fn run_repl<R, W>(session: &mut Session, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(output, "{}", REPL_PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(output)?;
            break;
        };
        let prompt = line.trim();
        if prompt == QUIT_SENTINEL {
            break;
        }
        if prompt.is_empty() {
            continue;
        }

        let answer = session.ask(prompt).await;
        writeln!(output, "{}", answer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoAgent {
        tools: ToolRegistry,
        seen: std::sync::Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        async fn query(&self, prompt: &str) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.to_string());
            if prompt.ends_with("New prompt: fail") {
                anyhow::bail!("rate limited");
            }
            Ok(format!("answer #{}", self.seen.lock().unwrap().len()))
        }

        fn tools(&self) -> &ToolRegistry {
            &self.tools
        }
    }

    fn session() -> (Session, std::sync::Arc<Mutex<Vec<String>>>) {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let agent = EchoAgent {
            tools: ToolRegistry::new(),
            seen: seen.clone(),
        };
        (Session::new(Box::new(agent), 5), seen)
    }

    #[tokio::test]
    async fn history_is_prepended_to_each_prompt() {
        let (mut session, seen) = session();
        assert_eq!(session.ask("first").await, "answer #1");
        session.ask("second").await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], "Here is the relevant history:\n\n\nNew prompt: first");
        assert!(seen[1].contains("Prompt: first\nResponse: answer #1"));
        assert!(seen[1].ends_with("New prompt: second"));
    }

    #[tokio::test]
    async fn errors_become_answers() {
        let (mut session, _) = session();
        let answer = session.ask("fail").await;
        assert_eq!(answer, "rate limited");
        let last = session.history().entries().last().unwrap();
        assert_eq!(last.response, "rate limited");
    }

    #[tokio::test]
    async fn repl_stops_at_sentinel() {
        let (mut session, seen) = session();
        let input: &[u8] = b"hello\n\nq\nnever asked\n";
        let mut out = Vec::new();

        run_repl(&mut session, input, &mut out).await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(REPL_PROMPT));
        assert!(text.contains("answer #1\n"));
    }

    #[tokio::test]
    async fn repl_stops_at_eof() {
        let (mut session, _) = session();
        let input: &[u8] = b"one\ntwo";
        let mut out = Vec::new();
        run_repl(&mut session, input, &mut out).await.unwrap();
        assert_eq!(session.history().len(), 2);
    }
}
