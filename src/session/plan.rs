//! Command plans: ordered templates plus their extraction rules.
//!
//! A plan is declared once and executed once per device. The scattered
//! "try this lookup, then that fallback, then refine" control flow of
//! ad hoc scripts becomes an ordered list of steps and extraction rules
//! here.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use super::facts::SessionFacts;
use crate::error::{Error, PlanError, Result, SessionError};
use crate::extract::ExtractRule;

/// A command string containing zero or more `{name}` placeholders
/// resolved from the session fact table.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    text: String,
}

impl CommandTemplate {
    /// Create a template, validating placeholder syntax.
    ///
    /// Unbalanced braces and empty placeholder names are configuration
    /// errors caught here, not at run time.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let mut rest = text.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                return Err(PlanError::InvalidTemplate {
                    message: format!("unclosed placeholder in '{text}'"),
                }
                .into());
            };
            if after[..close].trim().is_empty() {
                return Err(PlanError::InvalidTemplate {
                    message: format!("empty placeholder in '{text}'"),
                }
                .into());
            }
            rest = &after[close + 1..];
        }
        Ok(Self { text })
    }

    /// The raw template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names referenced by this template, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.text.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            // Validated in new(); every '{' has its '}'.
            let Some(close) = after.find('}') else { break };
            names.push(&after[..close]);
            rest = &after[close + 1..];
        }
        names
    }

    /// Substitute placeholders from the fact table.
    pub fn render(&self, facts: &SessionFacts) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(open) = rest.find('{') {
            // Validated in new(); every '{' has its '}'.
            let Some(close) = rest[open + 1..].find('}') else { break };
            out.push_str(&rest[..open]);
            let name = &rest[open + 1..open + 1 + close];
            match facts.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(SessionError::MissingFact {
                        name: name.to_string(),
                        template: self.text.clone(),
                    }
                    .into());
                }
            }
            rest = &rest[open + close + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// How a plan step produces its command text.
#[derive(Clone)]
pub enum StepCommand {
    /// A fixed command.
    Static(String),

    /// A template resolved from the fact table.
    Templated(CommandTemplate),

    /// A template that only runs when `required_fact` has been
    /// discovered; skipped otherwise.
    Conditional {
        required_fact: String,
        template: CommandTemplate,
    },

    /// Command text computed from the fact table; returning `None` skips
    /// the step.
    Derived {
        label: String,
        build: Arc<dyn Fn(&SessionFacts) -> Option<String> + Send + Sync>,
    },
}

impl fmt::Debug for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(command) => f.debug_tuple("Static").field(command).finish(),
            Self::Templated(template) => f.debug_tuple("Templated").field(&template.text).finish(),
            Self::Conditional {
                required_fact,
                template,
            } => f
                .debug_struct("Conditional")
                .field("required_fact", required_fact)
                .field("template", &template.text)
                .finish(),
            Self::Derived { label, .. } => f.debug_tuple("Derived").field(label).finish(),
        }
    }
}

/// One step of a plan: the command plus the extraction rules that run on
/// its output.
#[derive(Debug, Clone)]
pub struct PlanStep {
    command: StepCommand,
    rules: Vec<ExtractRule>,
    timeout: Option<Duration>,
}

impl PlanStep {
    /// A static command step.
    pub fn run(command: impl Into<String>) -> Self {
        Self {
            command: StepCommand::Static(command.into()),
            rules: Vec::new(),
            timeout: None,
        }
    }

    /// A templated command step.
    pub fn templated(template: CommandTemplate) -> Self {
        Self {
            command: StepCommand::Templated(template),
            rules: Vec::new(),
            timeout: None,
        }
    }

    /// A step skipped unless `required_fact` exists when it is reached.
    pub fn conditional(required_fact: impl Into<String>, template: CommandTemplate) -> Self {
        Self {
            command: StepCommand::Conditional {
                required_fact: required_fact.into(),
                template,
            },
            rules: Vec::new(),
            timeout: None,
        }
    }

    /// A step whose command text is computed from discovered facts.
    pub fn derived(
        label: impl Into<String>,
        build: impl Fn(&SessionFacts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            command: StepCommand::Derived {
                label: label.into(),
                build: Arc::new(build),
            },
            rules: Vec::new(),
            timeout: None,
        }
    }

    /// Attach an extraction rule to this step's output.
    pub fn with_rule(mut self, rule: ExtractRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Override the per-command timeout for this step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The extraction rules tagged for this step.
    pub fn rules(&self) -> &[ExtractRule] {
        &self.rules
    }

    /// The step's timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// A short label for logs.
    pub fn label(&self) -> &str {
        match &self.command {
            StepCommand::Static(command) => command,
            StepCommand::Templated(template) => template.text(),
            StepCommand::Conditional { template, .. } => template.text(),
            StepCommand::Derived { label, .. } => label,
        }
    }

    /// Resolve the step against the current fact table.
    ///
    /// `Ok(None)` means the step is skipped: a conditional step whose
    /// required fact is absent, a derived step that declined, or a
    /// template whose placeholder has not been discovered (the skip is
    /// logged; declaring the step conditional is the quiet form).
    pub(crate) fn resolve(&self, facts: &SessionFacts) -> Result<Option<String>> {
        match &self.command {
            StepCommand::Static(command) => Ok(Some(command.clone())),
            StepCommand::Templated(template) => match template.render(facts) {
                Ok(command) => Ok(Some(command)),
                Err(Error::Session(SessionError::MissingFact { name, .. })) => {
                    warn!(
                        "skipping step '{}': fact '{}' was never discovered",
                        template.text(),
                        name
                    );
                    Ok(None)
                }
                Err(other) => Err(other),
            },
            StepCommand::Conditional {
                required_fact,
                template,
            } => {
                if facts.contains(required_fact) {
                    template.render(facts).map(Some)
                } else {
                    Ok(None)
                }
            }
            StepCommand::Derived { build, .. } => Ok(build(facts)),
        }
    }
}

/// An ordered command plan: session setup, the main steps, and teardown,
/// plus the privilege the plan needs to run.
#[derive(Debug, Clone, Default)]
pub struct CommandPlan {
    requires_privileged: bool,
    escalate_command: Option<String>,
    setup_commands: Vec<String>,
    teardown_commands: Vec<String>,
    steps: Vec<PlanStep>,
}

impl CommandPlan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require privileged execution; the session escalates when the
    /// initial prompt is unprivileged.
    pub fn privileged(mut self) -> Self {
        self.requires_privileged = true;
        self
    }

    /// Override the escalation command (default: `enable`).
    pub fn with_escalate_command(mut self, command: impl Into<String>) -> Self {
        self.escalate_command = Some(command.into());
        self
    }

    /// Append a session-setup command, run before the main steps
    /// (typically the pagination disable).
    pub fn with_setup_command(mut self, command: impl Into<String>) -> Self {
        self.setup_commands.push(command.into());
        self
    }

    /// Append a best-effort teardown command, run after the main steps.
    pub fn with_teardown_command(mut self, command: impl Into<String>) -> Self {
        self.teardown_commands.push(command.into());
        self
    }

    /// Append a plan step.
    pub fn with_step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Whether the plan needs a privileged prompt.
    pub fn requires_privileged(&self) -> bool {
        self.requires_privileged
    }

    /// The escalation command.
    pub fn escalate_command(&self) -> &str {
        self.escalate_command.as_deref().unwrap_or("enable")
    }

    /// Session-setup commands.
    pub fn setup_commands(&self) -> &[String] {
        &self.setup_commands
    }

    /// Teardown commands.
    pub fn teardown_commands(&self) -> &[String] {
        &self.teardown_commands
    }

    /// The main steps.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Registration-time consistency check: every placeholder of a
    /// templated (non-conditional) step must be producible, either seeded
    /// by the session or written by an earlier step's extraction rule.
    pub fn validate(&self, seed_facts: &[&str]) -> Result<()> {
        let mut available: Vec<&str> = seed_facts.to_vec();
        for step in &self.steps {
            if let StepCommand::Templated(template) = &step.command {
                for placeholder in template.placeholders() {
                    if !available.contains(&placeholder) {
                        return Err(PlanError::InvalidPlan {
                            message: format!(
                                "step '{}' references fact '{}' that no earlier step produces",
                                template.text(),
                                placeholder
                            ),
                        }
                        .into());
                    }
                }
            }
            for rule in &step.rules {
                available.push(rule.fact());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractRule;

    fn facts_with(entries: &[(&str, &str)]) -> SessionFacts {
        let mut facts = SessionFacts::new();
        for (k, v) in entries {
            facts.insert(*k, *v);
        }
        facts
    }

    #[test]
    fn template_renders_placeholders() {
        let template = CommandTemplate::new("show ip interface brief | include {host}").unwrap();
        let facts = facts_with(&[("host", "10.0.0.1")]);
        assert_eq!(
            template.render(&facts).unwrap(),
            "show ip interface brief | include 10.0.0.1"
        );
        assert_eq!(template.placeholders(), ["host"]);
    }

    #[test]
    fn missing_fact_is_an_error() {
        let template = CommandTemplate::new("show interface {interface_name}").unwrap();
        let err = template.render(&SessionFacts::new()).unwrap_err();
        assert!(err.to_string().contains("interface_name"));
    }

    #[test]
    fn malformed_templates_fail_at_registration() {
        assert!(CommandTemplate::new("show {unclosed").is_err());
        assert!(CommandTemplate::new("show {}").is_err());
        assert!(CommandTemplate::new("show version").is_ok());
    }

    #[test]
    fn static_step_always_resolves() {
        let step = PlanStep::run("show version");
        assert_eq!(
            step.resolve(&SessionFacts::new()).unwrap().as_deref(),
            Some("show version")
        );
    }

    #[test]
    fn conditional_step_skips_without_fact() {
        let step = PlanStep::conditional(
            "interface_name",
            CommandTemplate::new("show interface {interface_name}").unwrap(),
        );
        assert_eq!(step.resolve(&SessionFacts::new()).unwrap(), None);

        let facts = facts_with(&[("interface_name", "Vlan100")]);
        assert_eq!(
            step.resolve(&facts).unwrap().as_deref(),
            Some("show interface Vlan100")
        );
    }

    #[test]
    fn templated_step_skips_when_fact_never_discovered() {
        let step = PlanStep::templated(
            CommandTemplate::new("show interface {interface_name}").unwrap(),
        );
        assert_eq!(step.resolve(&SessionFacts::new()).unwrap(), None);
    }

    #[test]
    fn derived_step_computes_or_declines() {
        let step = PlanStep::derived("describe discovered interface", |facts| {
            facts
                .get("interface_name")
                .map(|name| format!("show interface {name}"))
        });

        assert_eq!(step.resolve(&SessionFacts::new()).unwrap(), None);
        let facts = facts_with(&[("interface_name", "Vlan100")]);
        assert_eq!(
            step.resolve(&facts).unwrap().as_deref(),
            Some("show interface Vlan100")
        );
    }

    #[test]
    fn validate_catches_unproducible_placeholder() {
        let plan = CommandPlan::new().with_step(PlanStep::templated(
            CommandTemplate::new("show interface {interface_name}").unwrap(),
        ));
        assert!(plan.validate(&["host"]).is_err());

        let plan = CommandPlan::new()
            .with_step(
                PlanStep::run("show ip interface brief").with_rule(
                    ExtractRule::new("interface_name", r"(?m)^(\S+)\s+\d+\.").unwrap(),
                ),
            )
            .with_step(PlanStep::templated(
                CommandTemplate::new("show interface {interface_name}").unwrap(),
            ));
        assert!(plan.validate(&["host"]).is_ok());
    }

    #[test]
    fn escalate_command_defaults_to_enable() {
        assert_eq!(CommandPlan::new().escalate_command(), "enable");
        assert_eq!(
            CommandPlan::new()
                .with_escalate_command("enable 15")
                .escalate_command(),
            "enable 15"
        );
    }
}
