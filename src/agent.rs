//! Reasoning agent over the tool catalog.
//!
//! [`ReActAgent`] runs the thought / action / observation loop: the LLM is
//! shown the tools and a scratchpad of previous steps, and replies with
//! either an action (tool name plus JSON input) or a final answer.
//!
//! ```text
//! Thought: I need the population table.
//! Action: tabular_data_1
//! Action Input: {"input": "population of Canada"}
//! Observation: 38,781,291
//! ...
//! Thought: I can answer without using any more tools.
//! Answer: Canada has about 38.8 million people.
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::catalog::ToolRegistry;
use crate::error::FolioError;
use crate::llm::LlmClient;

/// The only object the rest of the application talks to.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String>;

    fn tools(&self) -> &ToolRegistry;
}

/// Build the agent. Tool names must be unique.
pub fn assemble(
    tools: ToolRegistry,
    llm: Arc<dyn LlmClient>,
    context: &str,
    max_iterations: usize,
) -> Result<Box<dyn Agent>> {
    let mut seen = HashSet::new();
    for name in tools.names() {
        if !seen.insert(name) {
            bail!("duplicate tool name in catalog: {}", name);
        }
    }
    if max_iterations == 0 {
        bail!("agent.max_iterations must be > 0");
    }

    tracing::info!(tools = tools.len(), model = llm.model_name(), "agent assembled");
    Ok(Box::new(ReActAgent {
        tools,
        llm,
        context: context.to_string(),
        max_iterations,
    }))
}

pub struct ReActAgent {
    tools: ToolRegistry,
    llm: Arc<dyn LlmClient>,
    context: String,
    max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Action {
        thought: String,
        tool: String,
        input: Value,
    },
    Answer {
        thought: String,
        answer: String,
    },
}

impl ReActAgent {
    fn header(&self) -> String {
        let mut out = String::new();
        if !self.context.trim().is_empty() {
            out.push_str(self.context.trim());
            out.push_str("\n\n");
        }
        out.push_str("You have access to the following tools:\n");
        for tool in self.tools.tools() {
            let _ = writeln!(
                out,
                "> Tool Name: {}\nTool Description: {}\nTool Args: {}\n",
                tool.name(),
                tool.description(),
                tool.parameters_schema()
            );
        }
        let _ = write!(
            out,
            "To answer the question, use the following format:\n\n\
             Thought: what you need to do next\n\
             Action: the tool to use, one of [{}]\n\
             Action Input: the tool input as JSON, e.g. {{\"input\": \"hello world\"}}\n\n\
             You will then receive:\n\
             Observation: the tool result\n\n\
             Repeat Thought/Action/Action Input/Observation as needed. When you can \
             answer without more tools, reply:\n\n\
             Thought: I can answer without using any more tools.\n\
             Answer: your answer\n\n",
            self.tools.names().join(", ")
        );
        out
    }

    async fn observe(&self, tool_name: &str, input: Value) -> String {
        let Some(tool) = self.tools.find(tool_name) else {
            return format!("Error: {}", FolioError::ToolNotFound(tool_name.to_string()));
        };
        match tool.execute(input).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(tool = tool_name, "tool failed: {:#}", e);
                format!("Error: {:#}", e)
            }
        }
    }
}

#[async_trait]
impl Agent for ReActAgent {
    async fn query(&self, prompt: &str) -> Result<String> {
        let header = self.header();
        let mut scratchpad = String::new();

        for iteration in 1..=self.max_iterations {
            let full = format!("{}Question: {}\n{}", header, prompt, scratchpad);
            let reply = self.llm.complete(&full).await?;

            match parse_step(&reply)? {
                Step::Answer { answer, .. } => {
                    tracing::debug!(iteration, "agent answered");
                    return Ok(answer);
                }
                Step::Action {
                    thought,
                    tool,
                    input,
                } => {
                    tracing::debug!(iteration, tool = %tool, "agent action");
                    let observation = self.observe(&tool, input.clone()).await;
                    let _ = write!(
                        scratchpad,
                        "Thought: {}\nAction: {}\nAction Input: {}\nObservation: {}\n",
                        thought, tool, input, observation
                    );
                }
            }
        }

        bail!(
            "Reached max iterations ({}) without an answer",
            self.max_iterations
        )
    }

    fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

/// Parse one LLM reply into a [`Step`].
///
/// Text after a hallucinated `Observation:` is ignored. A reply with
/// neither `Action:` nor `Answer:` is taken as the answer itself.
pub fn parse_step(reply: &str) -> Result<Step> {
    let reply = match reply.find("\nObservation:") {
        Some(pos) => &reply[..pos],
        None => reply,
    };

    let thought = field(reply, "Thought:")
        .map(|t| first_line(t).to_string())
        .unwrap_or_default();
    let action_pos = reply.find("Action:");
    let answer_pos = reply.find("Answer:");

    match (action_pos, answer_pos) {
        (Some(a), answer) if answer.map_or(true, |b| a < b) => {
            let tool = first_line(&reply[a + "Action:".len()..]).trim().to_string();
            if tool.is_empty() {
                bail!("could not parse agent reply: empty Action");
            }
            let raw_input = field(reply, "Action Input:").unwrap_or("").trim();
            Ok(Step::Action {
                thought,
                tool,
                input: parse_input(raw_input),
            })
        }
        (_, Some(b)) => Ok(Step::Answer {
            thought,
            answer: reply[b + "Answer:".len()..].trim().to_string(),
        }),
        _ => Ok(Step::Answer {
            thought,
            answer: reply.trim().to_string(),
        }),
    }
}

fn field<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.find(label).map(|pos| &text[pos + label.len()..])
}

fn first_line(text: &str) -> &str {
    text.trim_start().lines().next().unwrap_or("").trim()
}

// Input runs until the next line that starts a new section.
fn parse_input(raw: &str) -> Value {
    let body: Vec<&str> = raw
        .lines()
        .take_while(|l| !l.starts_with("Thought:") && !l.starts_with("Answer:"))
        .collect();
    let body = body.join("\n");
    let body = body
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Tool;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn parses_action_with_json_input() {
        let step = parse_step(
            "Thought: I need the table.\nAction: tabular_data_1\nAction Input: {\"input\": \"rows?\"}",
        )
        .unwrap();
        assert_eq!(
            step,
            Step::Action {
                thought: "I need the table.".to_string(),
                tool: "tabular_data_1".to_string(),
                input: json!({"input": "rows?"}),
            }
        );
    }

    #[test]
    fn parses_answer() {
        let step = parse_step("Thought: I can answer.\nAnswer: Ottawa.").unwrap();
        assert_eq!(
            step,
            Step::Answer {
                thought: "I can answer.".to_string(),
                answer: "Ottawa.".to_string(),
            }
        );
    }

    #[test]
    fn ignores_hallucinated_observation() {
        let step = parse_step(
            "Thought: t\nAction: note_saver\nAction Input: plain words\nObservation: note saved\nAnswer: done",
        )
        .unwrap();
        match step {
            Step::Action { tool, input, .. } => {
                assert_eq!(tool, "note_saver");
                assert_eq!(input, json!("plain words"));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn bare_reply_is_an_answer() {
        match parse_step("Just text.").unwrap() {
            Step::Answer { answer, .. } => assert_eq!(answer, "Just text."),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn description(&self) -> &str {
            "Upper-cases its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, params: Value) -> Result<String> {
            Ok(params["input"].as_str().unwrap_or("").to_uppercase())
        }
    }

    struct Script {
        replies: Mutex<Vec<&'static str>>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for Script {
        fn model_name(&self) -> &str {
            "script"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Ok("Thought: again\nAction: upper\nAction Input: {\"input\": \"x\"}".into());
            }
            Ok(replies.remove(0).to_string())
        }
    }

    fn registry() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Upper));
        tools
    }

    #[tokio::test]
    async fn loop_feeds_observations_back() {
        let llm = Arc::new(Script {
            replies: Mutex::new(vec![
                "Thought: use tool\nAction: upper\nAction Input: {\"input\": \"abc\"}",
                "Thought: I can answer without using any more tools.\nAnswer: ABC it is",
            ]),
            prompts: Mutex::new(Vec::new()),
        });
        let agent = assemble(registry(), llm.clone(), "Be helpful.", 4).unwrap();

        assert_eq!(agent.query("shout abc").await.unwrap(), "ABC it is");
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].starts_with("Be helpful."));
        assert!(prompts[0].contains("> Tool Name: upper"));
        assert!(prompts[1].contains("Observation: ABC\n"));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_observation() {
        let llm = Arc::new(Script {
            replies: Mutex::new(vec![
                "Thought: t\nAction: missing\nAction Input: {}",
                "Answer: gave up",
            ]),
            prompts: Mutex::new(Vec::new()),
        });
        let agent = assemble(registry(), llm.clone(), "", 4).unwrap();
        assert_eq!(agent.query("q").await.unwrap(), "gave up");
        assert!(llm.prompts.lock().unwrap()[1].contains("Observation: Error: unknown tool: missing"));
    }

    #[tokio::test]
    async fn max_iterations_is_an_error() {
        let llm = Arc::new(Script {
            replies: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        });
        let agent = assemble(registry(), llm, "", 2).unwrap();
        let err = agent.query("loop").await.unwrap_err();
        assert!(err.to_string().contains("max iterations (2)"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut tools = registry();
        tools.register(Arc::new(Upper));
        let llm = Arc::new(Script {
            replies: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        });
        assert!(assemble(tools, llm, "", 2).is_err());
    }
}
