use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use packline::buildlog::{BuildLog, Severity};
use packline::exec::{
    CancelFlag, CommandSpec, ExecutorBackend, StepResult, StepStatus, classify_line,
};

type Effect = Box<dyn Fn(&CommandSpec) + Send + Sync>;

enum Response {
    Finish(StepResult),
    /// Block until the build is cancelled.
    Hang,
}

struct Rule {
    needle: String,
    responses: VecDeque<Response>,
}

/// A fake executor that:
/// - records every command it was asked to run
/// - answers from per-command scripts, matched by substring of the command
///   line, and succeeds with exit code 0 once a script runs dry
/// - can run side effects (e.g. touching a mock file) when a command succeeds
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    effects: Vec<(String, Effect)>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` get `results`, one per call, in order.
    pub fn respond(self, needle: &str, results: impl IntoIterator<Item = StepResult>) -> Self {
        self.push_rule(needle, results.into_iter().map(Response::Finish).collect())
    }

    /// The next command containing `needle` blocks until cancellation.
    pub fn hang(self, needle: &str) -> Self {
        self.push_rule(needle, VecDeque::from([Response::Hang]))
    }

    /// Run `effect` whenever a command containing `needle` succeeds.
    pub fn on_success(
        mut self,
        needle: &str,
        effect: impl Fn(&CommandSpec) + Send + Sync + 'static,
    ) -> Self {
        self.effects.push((needle.to_string(), Box::new(effect)));
        self
    }

    fn push_rule(self, needle: &str, responses: VecDeque<Response>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            responses,
        });
        self
    }

    /// Shared handle to the recorded calls, usable after the executor was
    /// moved into a runner.
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<CommandSpec>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    fn next_response(&self, command_line: &str) -> Response {
        let mut rules = self.rules.lock().unwrap();
        rules
            .iter_mut()
            .filter(|r| command_line.contains(&r.needle))
            .find_map(|r| r.responses.pop_front())
            .unwrap_or_else(|| Response::Finish(StepResult::exited(0)))
    }
}

impl ExecutorBackend for ScriptedExecutor {
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        cancel: &'a CancelFlag,
        log: &'a BuildLog,
    ) -> Pin<Box<dyn Future<Output = StepResult> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(spec.clone());
            log.info(format!("running: {spec}"));

            if cancel.is_cancelled() {
                return StepResult::new(StepStatus::Cancelled, None, Vec::new());
            }

            let command_line = spec.command_line();
            let result = match self.next_response(&command_line) {
                Response::Finish(result) => result,
                Response::Hang => {
                    cancel.cancelled().await;
                    StepResult::new(StepStatus::Cancelled, None, Vec::new())
                }
            };

            for (severity, line) in &result.lines {
                log.emit(*severity, line.clone());
            }
            if result.succeeded() {
                for (needle, effect) in &self.effects {
                    if command_line.contains(needle.as_str()) {
                        effect(spec);
                    }
                }
            }
            result
        })
    }
}

/// A finished step with the given exit code and output, classified the way
/// the real executor classifies it.
pub fn step_with_output(code: i32, lines: &[&str]) -> StepResult {
    let mut result = StepResult::exited(code);
    result.lines = lines
        .iter()
        .map(|l| (classify_line(l), l.to_string()))
        .collect::<Vec<(Severity, String)>>();
    result
}

pub fn step_ok() -> StepResult {
    StepResult::exited(0)
}

pub fn step_failed(code: i32) -> StepResult {
    StepResult::exited(code)
}

pub fn tool_unavailable() -> StepResult {
    StepResult::new(StepStatus::ToolUnavailable, None, Vec::new())
}
