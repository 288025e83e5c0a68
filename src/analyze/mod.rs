pub mod mining;

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::models::WorkflowDocument;
use crate::scrape::MarketplaceClient;
use mining::{frequent_itemsets, Itemset};

/// Batch re-parse of the collected workflow files followed by the
/// tabular exports and the frequent-itemset analyses. Runs
/// single-threaded after the concurrent collection stage.
pub struct WorkflowAnalyzer {
    data_root: PathBuf,
    output_dir: PathBuf,
    min_support: f64,
}

impl WorkflowAnalyzer {
    pub fn new(data_root: PathBuf, output_dir: PathBuf, min_support: f64) -> Self {
        Self {
            data_root,
            output_dir,
            min_support,
        }
    }

    pub async fn run(&self, with_marketplace: bool) -> Result<()> {
        let paths = collect_workflow_paths(&self.data_root)?;
        info!(count = paths.len(), "found workflow files");

        let mut documents = Vec::new();
        let mut malformed = 0usize;
        for path in &paths {
            match WorkflowDocument::load(&self.data_root, path) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!("skipping workflow: {e}");
                    malformed += 1;
                }
            }
        }
        info!(
            parsed = documents.len(),
            malformed, "workflow parsing finished"
        );

        self.write_workflow_table(&documents)?;
        self.write_action_table(&documents)?;
        self.mine_itemsets(&documents)?;
        if with_marketplace {
            self.write_marketplace_table(&documents).await?;
        }
        Ok(())
    }

    fn write_workflow_table(&self, documents: &[WorkflowDocument]) -> Result<()> {
        let path = self.output_dir.join("workflows.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        writer.write_record([
            "repository",
            "filename",
            "name",
            "events",
            "action_count",
            "run_command_count",
            "uses_docker_action",
            "runs_docker_commands",
            "runs_cml_commands",
            "subcommands",
            "docker_subcommands",
            "cml_subcommands",
        ])?;

        for doc in documents {
            let subcommands: Vec<&str> = doc
                .subcommand_counts()
                .keys()
                .map(String::as_str)
                .collect();
            let docker_subcommands: Vec<&str> = doc
                .commands()
                .iter()
                .flat_map(|c| c.docker_commands())
                .map(String::as_str)
                .collect();
            let cml_subcommands: Vec<&str> = doc
                .commands()
                .iter()
                .flat_map(|c| c.cml_commands())
                .map(String::as_str)
                .collect();
            writer.write_record([
                doc.repository().to_string(),
                doc.filename().to_string(),
                doc.name().unwrap_or_default().to_string(),
                doc.events().join(";"),
                doc.actions().len().to_string(),
                doc.commands().len().to_string(),
                doc.actions()
                    .iter()
                    .any(|a| a.is_docker_related())
                    .to_string(),
                doc.commands()
                    .iter()
                    .any(|c| c.is_docker_related())
                    .to_string(),
                doc.commands().iter().any(|c| c.is_cml_related()).to_string(),
                subcommands.join(";"),
                docker_subcommands.join(";"),
                cml_subcommands.join(";"),
            ])?;
        }
        writer.flush()?;
        info!(path = %path.display(), "wrote workflow table");
        Ok(())
    }

    fn write_action_table(&self, documents: &[WorkflowDocument]) -> Result<()> {
        let path = self.output_dir.join("actions.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        writer.write_record([
            "slug",
            "name",
            "slug_without_tag",
            "tag",
            "is_docker_related",
            "repository",
            "workflow_filename",
        ])?;

        for doc in documents {
            for action in doc.actions() {
                writer.write_record([
                    action.slug().to_string(),
                    action.name().to_string(),
                    action.slug_without_tag().to_string(),
                    action.tag().to_string(),
                    action.is_docker_related().to_string(),
                    doc.repository().to_string(),
                    doc.filename().to_string(),
                ])?;
            }
        }
        writer.flush()?;
        info!(path = %path.display(), "wrote action table");
        Ok(())
    }

    fn mine_itemsets(&self, documents: &[WorkflowDocument]) -> Result<()> {
        // Tag-qualified identities: the same action at different tags
        // is a different item (reproducibility analysis).
        let tagged: Vec<BTreeSet<String>> = documents
            .iter()
            .map(|doc| {
                doc.actions()
                    .iter()
                    .map(|a| a.slug().to_string())
                    .collect()
            })
            .collect();
        self.write_itemset_table("itemsets_actions.csv", &tagged)?;

        // Tag-stripped identities: coarser grouping for co-occurrence.
        let untagged: Vec<BTreeSet<String>> = documents
            .iter()
            .map(|doc| {
                doc.actions()
                    .iter()
                    .map(|a| a.slug_without_tag().to_string())
                    .collect()
            })
            .collect();
        self.write_itemset_table("itemsets_actions_untagged.csv", &untagged)?;

        // Extracted sub-commands, restricted to workflows that have at
        // least one so irrelevant workflows do not dilute support.
        let commands: Vec<BTreeSet<String>> = documents
            .iter()
            .map(|doc| doc.subcommand_counts().keys().cloned().collect())
            .filter(|set: &BTreeSet<String>| !set.is_empty())
            .collect();
        self.write_itemset_table("itemsets_subcommands.csv", &commands)?;
        Ok(())
    }

    fn write_itemset_table(
        &self,
        filename: &str,
        transactions: &[BTreeSet<String>],
    ) -> Result<()> {
        let itemsets: Vec<Itemset> = frequent_itemsets(transactions, self.min_support);

        let path = self.output_dir.join(filename);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        writer.write_record(["itemset", "support", "size"])?;
        for itemset in &itemsets {
            writer.write_record([
                itemset.items.join(";"),
                format!("{:.6}", itemset.support),
                itemset.size.to_string(),
            ])?;
        }
        writer.flush()?;
        info!(
            path = %path.display(),
            itemsets = itemsets.len(),
            transactions = transactions.len(),
            "wrote itemset table"
        );
        Ok(())
    }

    async fn write_marketplace_table(&self, documents: &[WorkflowDocument]) -> Result<()> {
        let mut names: Vec<(String, String)> = documents
            .iter()
            .flat_map(|doc| doc.actions())
            .map(|a| (a.slug_without_tag().to_string(), a.name().to_string()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();

        let mut client = MarketplaceClient::new();
        let path = self.output_dir.join("marketplace.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        writer.write_record([
            "slug_without_tag",
            "available_in_marketplace",
            "verified_creator",
            "categories",
        ])?;

        for (slug_without_tag, name) in names {
            let metadata = client.lookup(&slug_without_tag, &name).await?;
            writer.write_record([
                slug_without_tag,
                metadata.available_in_marketplace.to_string(),
                metadata.verified_creator.to_string(),
                metadata.categories.join(";"),
            ])?;
        }
        writer.flush()?;
        info!(path = %path.display(), "wrote marketplace table");
        Ok(())
    }
}

/// Recursively collects every workflow file beneath the data root. The
/// collection stage lays files out as `<root>/<owner>/<name>/<file>`.
fn collect_workflow_paths(data_root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut pending = vec![data_root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("cannot read data directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_yaml_path(&path) {
                paths.push(path);
            }
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_workflow(root: &Path, slug: &str, filename: &str, content: &str) {
        let dir = root.join(slug);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(filename), content).unwrap();
    }

    const DOCKER_WORKFLOW: &str = concat!(
        "name: CI\n",
        "on: [push]\n",
        "jobs:\n",
        "  build:\n",
        "    steps:\n",
        "      - uses: actions/checkout@v3\n",
        "      - uses: docker/build-push-action@v2\n",
        "      - run: docker build -t img .\n",
    );

    const PLAIN_WORKFLOW: &str = concat!(
        "on: push\n",
        "jobs:\n",
        "  test:\n",
        "    steps:\n",
        "      - uses: actions/checkout@v3\n",
        "      - run: pytest\n",
    );

    #[test]
    fn walks_the_two_level_layout() {
        let root = tempfile::tempdir().unwrap();
        write_workflow(root.path(), "a/one", "ci.yml", PLAIN_WORKFLOW);
        write_workflow(root.path(), "b/two", "release.yaml", PLAIN_WORKFLOW);
        fs::write(root.path().join("a/one/README.md"), "not yaml").unwrap();

        let paths = collect_workflow_paths(root.path()).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn writes_all_tables() {
        let root = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_workflow(root.path(), "acme/app", "ci.yml", DOCKER_WORKFLOW);
        write_workflow(root.path(), "acme/lib", "ci.yml", PLAIN_WORKFLOW);
        // Malformed file is counted and skipped, not fatal.
        write_workflow(root.path(), "acme/bad", "ci.yml", "jobs: {}\n");

        let analyzer = WorkflowAnalyzer::new(
            root.path().to_path_buf(),
            output.path().to_path_buf(),
            0.5,
        );
        analyzer.run(false).await.unwrap();

        let workflows = fs::read_to_string(output.path().join("workflows.csv")).unwrap();
        assert!(workflows.contains("acme/app"));
        assert!(workflows.contains("docker_subcommands"));
        // The docker workflow row carries its extracted tool verbs.
        assert!(workflows.contains("build,build,"));

        let actions = fs::read_to_string(output.path().join("actions.csv")).unwrap();
        assert!(actions.contains("actions/checkout@v3"));
        assert!(actions.contains("docker/build-push-action"));

        let tagged = fs::read_to_string(output.path().join("itemsets_actions.csv")).unwrap();
        // checkout@v3 appears in both parsed workflows: support 1.0.
        assert!(tagged.contains("actions/checkout@v3,1.000000,1"));

        let untagged =
            fs::read_to_string(output.path().join("itemsets_actions_untagged.csv")).unwrap();
        assert!(untagged.contains("actions/checkout,1.000000,1"));

        let subcommands =
            fs::read_to_string(output.path().join("itemsets_subcommands.csv")).unwrap();
        // Only the docker workflow has sub-commands, so support is 1.0
        // within the restricted transaction set.
        assert!(subcommands.contains("build,1.000000,1"));
    }
}
