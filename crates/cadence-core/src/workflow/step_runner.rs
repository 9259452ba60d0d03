//! Step runner: render a step's prompt, call the executor, shape the result.
//!
//! `StepRunner` builds the final prompt for a step (template parts joined by a
//! blank line, wrapped in the role's system instructions when present), sends
//! it to the configured agent, and extracts structured JSON from the reply
//! when the role or the reply itself calls for it.

use std::sync::LazyLock;

use cadence_types::scope::{StepKind, StepResult, TemplateScope};
use cadence_types::workflow::{RoleDefinition, StepDefinition, WorkflowDefinition};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::template::render;
use crate::executor::{ExecutorError, PromptExecutor};

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("fenced json regex is valid")
});

static BRACE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("brace span regex is valid"));

/// Marker that triggers extraction even without a declared parser.
const FENCE_MARKER: &str = "```json";

// ---------------------------------------------------------------------------
// Prompt assembly
// ---------------------------------------------------------------------------

/// Render a step's prompt against the scope and apply the role envelope.
pub fn build_prompt(step: &StepDefinition, role: Option<&RoleDefinition>, scope: &Value) -> String {
    let prompt = step
        .prompt
        .parts()
        .iter()
        .map(|part| render(part, scope))
        .collect::<Vec<_>>()
        .join("\n\n");

    match role.and_then(|r| r.system_prompt.as_deref()) {
        Some(system) => {
            format!("## System Instructions\n\n{system}\n\n## User Prompt\n\n{prompt}")
        }
        None => prompt,
    }
}

// ---------------------------------------------------------------------------
// JSON extraction
// ---------------------------------------------------------------------------

/// Whether the reply should be parsed as JSON.
fn wants_json(role: Option<&RoleDefinition>, text: &str) -> bool {
    role.is_some_and(|r| r.parser.is_some())
        || text.trim_start().starts_with('{')
        || text.contains(FENCE_MARKER)
}

/// Pull a JSON value out of free text.
///
/// Tries the first ```` ```json ```` block, then the widest `{...}` span,
/// then the whole text.
pub fn extract_json(text: &str) -> Option<Value> {
    let candidate = FENCED_JSON
        .captures(text)
        .and_then(|caps| caps.get(1))
        .or_else(|| BRACE_SPAN.find(text))
        .map_or(text, |m| m.as_str());
    serde_json::from_str(candidate.trim()).ok()
}

/// Build the `parsed` field for a reply.
pub fn parse_output(role: Option<&RoleDefinition>, raw: &str) -> Value {
    if wants_json(role, raw) {
        if let Some(value) = extract_json(raw) {
            return value;
        }
        debug!(len = raw.len(), "reply looked like JSON but did not parse");
    }
    Value::String(raw.to_string())
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Executes single steps through a prompt executor.
pub struct StepRunner<'a, E: PromptExecutor> {
    executor: &'a E,
    default_agent: &'a str,
}

impl<'a, E: PromptExecutor> StepRunner<'a, E> {
    pub fn new(executor: &'a E, default_agent: &'a str) -> Self {
        Self {
            executor,
            default_agent,
        }
    }

    /// Execute one step against the current scope.
    ///
    /// Executor errors propagate unchanged; a reply that fails JSON
    /// extraction is not an error.
    pub async fn run(
        &self,
        step: &StepDefinition,
        scope: &TemplateScope,
        definition: &WorkflowDefinition,
    ) -> Result<StepResult, ExecutorError> {
        let role = definition.roles.get(&step.role);
        let prompt = build_prompt(step, role, &scope.to_value());
        let agent = step.agent.as_deref().unwrap_or(self.default_agent);

        debug!(step = %step.key, role = %step.role, agent, "executing step");
        let raw = self.executor.execute(agent, &prompt).await?;

        Ok(StepResult {
            key: step.key.clone(),
            role: step.role.clone(),
            parsed: parse_output(role, &raw),
            raw,
            kind: StepKind::Agent,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use cadence_types::workflow::PromptTemplate;
    use serde_json::json;

    /// Records calls and answers with a fixed reply.
    struct Recorder {
        reply: String,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Recorder {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PromptExecutor for Recorder {
        async fn execute(&self, agent: &str, prompt: &str) -> Result<String, ExecutorError> {
            self.calls
                .lock()
                .unwrap()
                .push((agent.to_string(), prompt.to_string()));
            Ok(self.reply.clone())
        }
    }

    fn step(prompt: PromptTemplate) -> StepDefinition {
        StepDefinition {
            key: "worker".to_string(),
            role: "worker".to_string(),
            agent: None,
            prompt,
            next: None,
            transitions: vec![],
            exits: vec![],
            state_updates: Default::default(),
        }
    }

    fn definition(role: RoleDefinition) -> WorkflowDefinition {
        serde_json::from_value(json!({
            "roles": { "worker": role },
            "flow": {
                "round": {
                    "steps": [{ "key": "worker", "role": "worker", "prompt": "x" }],
                    "defaultOutcome": { "outcome": "done" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_prompt_parts_rendered_and_joined() {
        let scope = json!({ "user": { "task": "parse" } });
        let s = step(PromptTemplate::Parts(vec![
            "Task: {{user.task}}".to_string(),
            "Go.".to_string(),
        ]));
        assert_eq!(build_prompt(&s, None, &scope), "Task: parse\n\nGo.");
    }

    #[test]
    fn test_system_prompt_envelope() {
        let role = RoleDefinition {
            system_prompt: Some("Be terse. {{not.rendered}}".to_string()),
            ..Default::default()
        };
        let s = step(PromptTemplate::Single("Do {{user.task}}".to_string()));
        let out = build_prompt(&s, Some(&role), &json!({ "user": { "task": "it" } }));
        assert_eq!(
            out,
            "## System Instructions\n\nBe terse. {{not.rendered}}\n\n## User Prompt\n\nDo it"
        );
    }

    #[test]
    fn test_extract_json_sources() {
        assert_eq!(
            extract_json("Here:\n```json\n{\"a\": 1}\n```\ntrailing {junk}"),
            Some(json!({ "a": 1 }))
        );
        assert_eq!(
            extract_json("verdict follows {\"ok\": true} thanks"),
            Some(json!({ "ok": true }))
        );
        assert_eq!(extract_json("[1, 2]"), Some(json!([1, 2])));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_output_rules() {
        // Leading brace triggers extraction.
        assert_eq!(parse_output(None, " {\"v\": 2}"), json!({ "v": 2 }));
        // Prose with embedded JSON stays raw without a parser.
        assert_eq!(
            parse_output(None, "result: {\"v\": 2}"),
            json!("result: {\"v\": 2}")
        );
        // A declared parser forces extraction.
        let role = RoleDefinition {
            parser: Some("json".to_string()),
            ..Default::default()
        };
        assert_eq!(parse_output(Some(&role), "result: {\"v\": 2}"), json!({ "v": 2 }));
        // Broken JSON degrades to the raw text.
        assert_eq!(parse_output(Some(&role), "{ not json"), json!("{ not json"));
    }

    #[tokio::test]
    async fn test_run_uses_default_agent_and_builds_result() {
        let executor = Recorder::new("```json\n{\"work\": \"done\"}\n```");
        let def = definition(RoleDefinition::default());
        let mut scope = TemplateScope::default();
        scope.user.insert("task".to_string(), json!("lint"));

        let runner = StepRunner::new(&executor, "build");
        let s = step(PromptTemplate::Single("Fix {{user.task}}".to_string()));
        let result = runner.run(&s, &scope, &def).await.unwrap();

        assert_eq!(result.key, "worker");
        assert_eq!(result.role, "worker");
        assert_eq!(result.kind, StepKind::Agent);
        assert_eq!(result.parsed, json!({ "work": "done" }));
        assert!(result.raw.starts_with("```json"));

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("build".to_string(), "Fix lint".to_string())]);
    }

    #[tokio::test]
    async fn test_run_honors_step_agent() {
        let executor = Recorder::new("plain");
        let def = definition(RoleDefinition::default());
        let mut s = step(PromptTemplate::Single("hi".to_string()));
        s.agent = Some("plan".to_string());

        let result = StepRunner::new(&executor, "build")
            .run(&s, &TemplateScope::default(), &def)
            .await
            .unwrap();
        assert_eq!(result.parsed, json!("plain"));
        assert_eq!(executor.calls.lock().unwrap()[0].0, "plan");
    }
}
