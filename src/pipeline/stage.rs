// src/pipeline/stage.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::discovery::VerificationRule;
use crate::errors::{PacklineError, Result};
use crate::exec::CommandSpec;

use super::context::PipelineContext;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid placeholder regex"));

/// One way of accomplishing a stage: a command vector plus where and how to
/// run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub optional_args: Vec<OptionalArgs>,
}

/// Arguments appended only when `variable` is known at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalArgs {
    pub variable: String,
    pub args: Vec<String>,
}

impl Attempt {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout: None,
            optional_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn when_known<I, S>(mut self, variable: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_args.push(OptionalArgs {
            variable: variable.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Substitute `{name}` placeholders from `ctx` and append the optional
    /// groups whose variable is known.
    pub fn resolve(&self, ctx: &PipelineContext) -> Result<CommandSpec> {
        let mut args = self
            .args
            .iter()
            .map(|a| substitute(a, ctx))
            .collect::<Result<Vec<_>>>()?;

        for group in &self.optional_args {
            if ctx.lookup(&group.variable).is_some() {
                for a in &group.args {
                    args.push(substitute(a, ctx)?);
                }
            }
        }

        let cwd = PathBuf::from(substitute(&self.cwd.to_string_lossy(), ctx)?);
        let env = self
            .env
            .iter()
            .map(|(k, v)| Ok((k.clone(), substitute(v, ctx)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(CommandSpec {
            program: self.program.clone(),
            args,
            cwd,
            env,
            timeout: self.timeout,
        })
    }
}

fn substitute(template: &str, ctx: &PipelineContext) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = ctx
            .lookup(name.as_str())
            .ok_or_else(|| PacklineError::UnresolvedPlaceholder(name.as_str().to_string()))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// What the runner checks or does around a stage's commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageKind {
    /// Success of an attempt is success of the stage.
    Run,
    /// Store the first output line (leading `v` stripped) as `variable`.
    Probe { variable: String },
    /// Every attempt is a separate tool check and all of them run; then each
    /// of `required_files` must exist.
    Prerequisites { required_files: Vec<PathBuf> },
    /// The compiled `artifact` must be newer than the build start.
    NativeRebuild { artifact: PathBuf },
    /// Locate the packaged app and repair its dependency directory.
    Package(DependencyRepair),
    /// Collect files in `output_dir` matching the glob `pattern`.
    Installer { output_dir: PathBuf, pattern: String },
    /// Internal: remove `dir` if it exists. Runs no commands.
    Clean { dir: PathBuf },
    /// Internal: search the packaged output for an entry matching `rule`.
    /// Failure is always fatal.
    Verify { rule: VerificationRule },
}

impl StageKind {
    /// Internal stages run no external commands.
    pub fn is_internal(&self) -> bool {
        matches!(self, StageKind::Clean { .. } | StageKind::Verify { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRepair {
    /// File marking the application root inside the package.
    pub sentinel: String,
    /// Dependency directory, relative to the application root.
    pub dependency_dir: PathBuf,
    pub marker: String,
    /// Complete dependency tree copied in when the packaged one is not.
    pub source: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub critical: bool,
    /// Signing credentials are injected into this stage's commands.
    pub signed: bool,
    /// Fallback chain, tried in order until one succeeds.
    pub attempts: Vec<Attempt>,
    pub kind: StageKind,
}

impl Stage {
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            critical: false,
            signed: false,
            attempts: Vec::new(),
            kind,
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn attempt(mut self, attempt: Attempt) -> Self {
        self.attempts.push(attempt);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SigningConfig;

    fn ctx() -> PipelineContext {
        PipelineContext::new("/proj", "/proj/dist/win-unpacked", SigningConfig::disabled())
    }

    #[test]
    fn placeholders_are_substituted() {
        let attempt = Attempt::new("npx", "{project_root}/app")
            .args(["electron-builder", "--prepackaged", "{packaged_root}"]);

        let spec = attempt.resolve(&ctx()).unwrap();
        assert_eq!(spec.cwd, PathBuf::from("/proj/app"));
        assert_eq!(spec.args[2], "/proj/dist/win-unpacked");
    }

    #[test]
    fn optional_group_only_when_variable_known() {
        let attempt = Attempt::new("npx", "/proj")
            .args(["@electron/rebuild", "-f"])
            .when_known("electron_version", ["-v", "{electron_version}"]);

        let mut ctx = ctx();
        assert_eq!(attempt.resolve(&ctx).unwrap().args, ["@electron/rebuild", "-f"]);

        ctx.set_variable("electron_version", "31.2.0");
        assert_eq!(
            attempt.resolve(&ctx).unwrap().args,
            ["@electron/rebuild", "-f", "-v", "31.2.0"]
        );
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let attempt = Attempt::new("npx", "/proj").args(["--module-dir", "{app_dir}"]);
        match attempt.resolve(&ctx()) {
            Err(PacklineError::UnresolvedPlaceholder(name)) => assert_eq!(name, "app_dir"),
            other => panic!("expected UnresolvedPlaceholder, got {other:?}"),
        }
    }

    #[test]
    fn non_identifier_braces_are_left_alone() {
        let attempt = Attempt::new("node", "/proj").arg("{\"json\": 1}");
        assert_eq!(attempt.resolve(&ctx()).unwrap().args, ["{\"json\": 1}"]);
    }
}
