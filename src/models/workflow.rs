use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::ModelError;
use crate::models::{ActionReference, RepoSlug, RunCommand};

/// Raw YAML schema of one workflow file. Only the fields the study
/// cares about are declared; everything else is ignored.
#[derive(Debug, Deserialize)]
struct WorkflowFile {
    name: Option<String>,
    #[serde(default)]
    on: TriggerSpec,
    jobs: Option<serde_yaml::Mapping>,
}

/// The three equivalent YAML shapes of the `on:` field: a bare event
/// name, a sequence of event names, or a mapping keyed by event name.
#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum TriggerSpec {
    #[default]
    Missing,
    Single(String),
    List(Vec<String>),
    // serde_yaml mappings preserve source order, which the event list
    // inherits.
    Map(serde_yaml::Mapping),
}

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    uses: Option<String>,
    run: Option<String>,
}

/// One parsed workflow file: its trigger events, referenced actions,
/// inline run commands, and the aggregated sub-command histogram.
///
/// The owning repository is derived from the file's location beneath
/// the data root, which the collector lays out as
/// `<data-root>/<owner>/<name>/<workflow-file>`.
#[derive(Debug, Clone)]
pub struct WorkflowDocument {
    repository: RepoSlug,
    filename: String,
    name: Option<String>,
    events: Vec<String>,
    actions: Vec<ActionReference>,
    commands: Vec<RunCommand>,
    subcommand_counts: BTreeMap<String, u32>,
}

impl WorkflowDocument {
    /// Loads and parses one workflow file beneath `data_root`.
    pub fn load(data_root: &Path, path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| malformed(path, format!("cannot read file: {e}")))?;
        Self::from_str_at(data_root, path, &content)
    }

    fn from_str_at(data_root: &Path, path: &Path, content: &str) -> Result<Self, ModelError> {
        let file: WorkflowFile = serde_yaml::from_str(content)
            .map_err(|e| malformed(path, format!("not a workflow mapping: {e}")))?;

        let events = normalize_events(&file.on).map_err(|reason| malformed(path, reason))?;
        let jobs = file
            .jobs
            .ok_or_else(|| malformed(path, "missing jobs field".to_string()))?;

        let mut actions = Vec::new();
        let mut commands = Vec::new();
        for (_job_name, job_value) in jobs {
            let job: Job = serde_yaml::from_value(job_value)
                .map_err(|e| malformed(path, format!("unreadable job definition: {e}")))?;
            for step in job.steps {
                if let Some(uses) = step.uses {
                    match ActionReference::parse(&uses) {
                        Ok(action) => actions.push(action),
                        // A malformed reference invalidates that one
                        // step only, never the whole document.
                        Err(e) => warn!(path = %path.display(), "skipping step: {e}"),
                    }
                }
                if let Some(run) = step.run {
                    commands.push(RunCommand::parse(&run));
                }
            }
        }

        let mut subcommand_counts = BTreeMap::new();
        for command in &commands {
            for token in command.extracted() {
                *subcommand_counts.entry(token.to_string()).or_insert(0) += 1;
            }
        }

        Ok(Self {
            repository: repository_from_path(data_root, path)?,
            filename: file_name(path),
            name: file.name,
            events,
            actions,
            commands,
            subcommand_counts,
        })
    }

    pub fn repository(&self) -> &RepoSlug {
        &self.repository
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Trigger event names in source order. Duplicates are preserved.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn actions(&self) -> &[ActionReference] {
        &self.actions
    }

    pub fn commands(&self) -> &[RunCommand] {
        &self.commands
    }

    /// Frequency table of extracted sub-commands across all run
    /// commands of this workflow.
    pub fn subcommand_counts(&self) -> &BTreeMap<String, u32> {
        &self.subcommand_counts
    }
}

fn malformed(path: &Path, reason: String) -> ModelError {
    ModelError::MalformedWorkflow {
        path: path.to_path_buf(),
        reason,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn normalize_events(spec: &TriggerSpec) -> Result<Vec<String>, String> {
    match spec {
        TriggerSpec::Missing => Err("missing on field".to_string()),
        TriggerSpec::Single(event) => Ok(vec![event.clone()]),
        TriggerSpec::List(events) => Ok(events.clone()),
        TriggerSpec::Map(mapping) => mapping
            .keys()
            .map(|key| {
                key.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "non-string trigger event name".to_string())
            })
            .collect(),
    }
}

/// Derives the owning repository from the file's parent path relative
/// to the data root: `<root>/<owner>/<name>/<file>` yields the slug
/// `owner/name`.
fn repository_from_path(data_root: &Path, path: &Path) -> Result<RepoSlug, ModelError> {
    let relative = path.strip_prefix(data_root).map_err(|_| {
        malformed(
            path,
            format!("file is not beneath data root {}", data_root.display()),
        )
    })?;
    let parent: PathBuf = relative.parent().unwrap_or(Path::new("")).to_path_buf();
    let joined = parent
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    RepoSlug::parse(&joined)
}
