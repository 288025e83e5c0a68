use std::sync::LazyLock;

use regex::Regex;

// Extraction pattern shape: tool name, any number of leading flags,
// then the sub-command token. Loose text matching, not shell parsing;
// false positives are accepted by design of the study.
static DOCKER_SUBCOMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdocker(?:\s+--?[\w=.:-]+)*\s+([a-z][a-z-]*)")
        .expect("hardcoded regex is valid")
});
static CML_SUBCOMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcml(?:\s+--?[\w=.:-]+)*\s+([a-z][a-z-]*)")
        .expect("hardcoded regex is valid")
});

/// One inline shell script from a workflow step's `run:` value, with
/// the tool sub-commands extracted from it.
///
/// A tool is "related" whenever its name appears anywhere in the
/// script, independently of whether extraction finds any sub-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    script: String,
    docker_commands: Vec<String>,
    cml_commands: Vec<String>,
    is_docker_related: bool,
    is_cml_related: bool,
}

impl RunCommand {
    pub fn parse(script: &str) -> Self {
        let lowered = script.to_lowercase();
        Self {
            script: script.to_string(),
            docker_commands: extract_subcommands(&DOCKER_SUBCOMMAND, script),
            cml_commands: extract_subcommands(&CML_SUBCOMMAND, script),
            is_docker_related: lowered.contains("docker"),
            is_cml_related: lowered.contains("cml"),
        }
    }

    pub fn docker_commands(&self) -> &[String] {
        &self.docker_commands
    }

    pub fn cml_commands(&self) -> &[String] {
        &self.cml_commands
    }

    pub fn is_docker_related(&self) -> bool {
        self.is_docker_related
    }

    pub fn is_cml_related(&self) -> bool {
        self.is_cml_related
    }

    /// All extracted sub-command tokens in source order.
    pub fn extracted(&self) -> impl Iterator<Item = &str> {
        self.docker_commands
            .iter()
            .chain(self.cml_commands.iter())
            .map(String::as_str)
    }
}

fn extract_subcommands(pattern: &Regex, script: &str) -> Vec<String> {
    pattern
        .captures_iter(script)
        .map(|caps| caps[1].to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_docker_subcommand() {
        let cmd = RunCommand::parse("docker build -t img .");
        assert_eq!(cmd.docker_commands(), ["build"]);
        assert!(cmd.is_docker_related());
        assert!(!cmd.is_cml_related());
    }

    #[test]
    fn extracts_across_lines_in_source_order() {
        let cmd = RunCommand::parse("docker pull alpine:3.18\ndocker run --rm alpine echo hi");
        assert_eq!(cmd.docker_commands(), ["pull", "run"]);
    }

    #[test]
    fn skips_leading_flags() {
        let cmd = RunCommand::parse("docker --log-level=debug push registry/img");
        assert_eq!(cmd.docker_commands(), ["push"]);
    }

    #[test]
    fn related_without_extractable_subcommand() {
        let cmd = RunCommand::parse("echo see Dockerfile for details");
        assert!(cmd.is_docker_related());
        assert!(cmd.docker_commands().is_empty());
    }

    #[test]
    fn cml_commands_are_extracted() {
        let cmd = RunCommand::parse("cml send-comment report.md");
        assert_eq!(cmd.cml_commands(), ["send-comment"]);
        assert!(cmd.is_cml_related());
    }

    #[test]
    fn parsing_is_idempotent() {
        let script = "docker build .\ncml publish plot.png";
        assert_eq!(RunCommand::parse(script), RunCommand::parse(script));
    }

    #[test]
    fn unrelated_script_has_no_flags() {
        let cmd = RunCommand::parse("pip install -r requirements.txt");
        assert!(!cmd.is_docker_related());
        assert!(!cmd.is_cml_related());
        assert_eq!(cmd.extracted().count(), 0);
    }
}
