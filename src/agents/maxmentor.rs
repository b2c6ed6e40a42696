use std::sync::Arc;

use serde_json::Value;

use super::{text_arg, FnCapability};
use crate::domains::agent::AgentDefinition;
use crate::error::Result;

pub const ID: &str = "maxmentor";
pub const DISPLAY_NAME: &str = "MaxMentor";

const INSTRUCTIONS: &str = "\
You are MaxMentor, an AI learning mentor.
1. Use `fetch_ai_tools_news` to get trending tools.
2. Use `analyze_trends_in_learning` to understand demand.
3. Use `suggest_learning_paths` to give practical steps.
Present it in Markdown for learners.";

const LEARNING_PATH: &str = "\
**Learning Path Recommendation**

1. Learn prompt engineering basics
2. Explore LangChain tutorials
3. Build mini-projects with an agents SDK
4. Follow model provider guides
5. Stay updated via newsletters like Latent Space or TLDR.ai";

pub fn definition() -> AgentDefinition {
    AgentDefinition {
        id: ID,
        display_name: DISPLAY_NAME,
        instructions: INSTRUCTIONS.to_string(),
        default_prompt: "What's the best way to start learning AI today?".to_string(),
        capabilities: vec![
            Arc::new(FnCapability::new(
                "fetch_ai_tools_news",
                "Fetch latest news about trending AI tools",
                |_| {
                    Ok(Value::String(
                        "LangChain, agent SDKs and frontier chat models are trending tools this week."
                            .to_string(),
                    ))
                },
            )),
            Arc::new(
                FnCapability::new(
                    "analyze_trends_in_learning",
                    "Analyze what's currently trending in the AI learning space",
                    analyze_trends_in_learning,
                )
                .with_text_arg("news", "Tool news from fetch_ai_tools_news"),
            ),
            Arc::new(
                FnCapability::new(
                    "suggest_learning_paths",
                    "Suggest learning paths based on trend analysis",
                    |_| Ok(Value::String(LEARNING_PATH.to_string())),
                )
                .with_text_arg("analysis", "Output of analyze_trends_in_learning"),
            ),
        ],
    }
}

fn analyze_trends_in_learning(args: &Value) -> Result<Value> {
    let news = match text_arg(args, "news").trim() {
        "" => "the current crop of tools",
        news => news,
    };
    Ok(Value::String(format!(
        "Based on tools like {news}, prompt engineering and agent-based development are hot topics."
    )))
}
