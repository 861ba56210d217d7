//! Conversion job
//!
//! One job converts one input file:
//! `Start → StagingInput → Parsing → RewritingResources → Serializing → Done`,
//! with any failure moving to `Failed` and abandoning the rest of the work.
//! Files already written to the assets directory stay where they are.

use crate::error::ConvertError;
use crate::fetchers::ResourceFetcher;
use crate::rewriter::{LocalAsset, RewritePlan};
use crate::ASSETS_DIR_SUFFIX;
use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Where a job is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Start,
    StagingInput,
    Parsing,
    RewritingResources { done: usize, total: usize },
    Serializing,
    Done,
    /// Terminal; carries the error message
    Failed(String),
}

/// What a successful job produced
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// Page title as used in the output names
    pub title: String,
    pub html_path: PathBuf,
    pub assets_dir: PathBuf,
    pub assets: Vec<LocalAsset>,
}

impl ConversionReport {
    /// Sum of bytes written across all assets
    pub fn total_bytes(&self) -> u64 {
        self.assets.iter().map(|asset| asset.bytes).sum()
    }
}

/// Converts one HTML file into `<Title>.html` plus `<Title>_files/`
pub struct ConversionJob {
    input: PathBuf,
    output_dir: PathBuf,
    state: JobState,
    /// Holds the staged copy of the input; removed on drop
    staging: Option<TempDir>,
}

impl ConversionJob {
    /// Create a job writing its outputs into `output_dir`
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            state: JobState::Start,
            staging: None,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Directory holding the staged input, once staging has happened
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging.as_ref().map(TempDir::path)
    }

    /// Run the job to completion
    ///
    /// A job runs once; calling `run` again fails with
    /// [`ConvertError::InvalidInput`].
    pub async fn run(
        &mut self,
        fetcher: &dyn ResourceFetcher,
    ) -> Result<ConversionReport, ConvertError> {
        if self.state != JobState::Start {
            return Err(ConvertError::InvalidInput(format!(
                "conversion of '{}' has already run",
                self.input.display()
            )));
        }

        match self.convert(fetcher).await {
            Ok(report) => {
                self.transition(JobState::Done);
                Ok(report)
            }
            Err(err) => {
                self.transition(JobState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    async fn convert(
        &mut self,
        fetcher: &dyn ResourceFetcher,
    ) -> Result<ConversionReport, ConvertError> {
        self.transition(JobState::StagingInput);
        let staged = self.stage_input().await?;

        self.transition(JobState::Parsing);
        let document = parse_document(&staged)?;
        let title = page_title(&document)?;

        let assets_name = format!("{title}{ASSETS_DIR_SUFFIX}");
        let assets_dir = self.output_dir.join(&assets_name);
        let html_path = self.output_dir.join(format!("{title}.html"));

        let plan = RewritePlan::new(&document, &assets_dir, &assets_name)?;
        tokio::fs::create_dir_all(&assets_dir)
            .await
            .map_err(|source| ConvertError::CreateAssetsDir {
                path: assets_dir.clone(),
                source,
            })?;

        self.transition(JobState::RewritingResources {
            done: 0,
            total: plan.len(),
        });
        let state = &mut self.state;
        let assets = plan
            .execute(fetcher, |done, total| {
                *state = JobState::RewritingResources { done, total };
            })
            .await?;

        self.transition(JobState::Serializing);
        document
            .serialize_to_file(&html_path)
            .map_err(|source| ConvertError::Serialize {
                path: html_path.clone(),
                source,
            })?;

        info!(
            html = %html_path.display(),
            assets = assets.len(),
            "Saved page"
        );

        Ok(ConversionReport {
            title,
            html_path,
            assets_dir,
            assets,
        })
    }

    /// Copy the input into a fresh temp directory and return the copy's path
    async fn stage_input(&mut self) -> Result<PathBuf, ConvertError> {
        if !self.input.exists() {
            return Err(ConvertError::InvalidInput(format!(
                "The file '{}' does not exist.",
                self.input.display()
            )));
        }
        let file_name = self.input.file_name().ok_or_else(|| {
            ConvertError::InvalidInput(format!("'{}' is not a file", self.input.display()))
        })?;

        let staging = tempfile::Builder::new()
            .prefix("webpage-complete-")
            .tempdir()
            .map_err(|source| ConvertError::Staging {
                path: self.input.clone(),
                source,
            })?;
        let staged = staging.path().join(file_name);
        tokio::fs::copy(&self.input, &staged)
            .await
            .map_err(|source| ConvertError::Staging {
                path: self.input.clone(),
                source,
            })?;

        debug!(staged = %staged.display(), "Staged input");
        self.staging = Some(staging);
        Ok(staged)
    }

    fn transition(&mut self, next: JobState) {
        debug!(from = ?self.state, to = ?next, "Job state");
        self.state = next;
    }
}

fn parse_document(path: &Path) -> Result<NodeRef, ConvertError> {
    kuchiki::parse_html()
        .from_utf8()
        .from_file(path)
        .map_err(|source| ConvertError::ReadInput {
            path: path.to_path_buf(),
            source,
        })
}

/// Output name stem: the `<title>` text, trimmed, with `/` replaced by `\`
pub fn page_title(document: &NodeRef) -> Result<String, ConvertError> {
    let title = document
        .select_first("title")
        .map_err(|()| ConvertError::MissingTitle)?
        .text_contents();
    let title = title.trim();
    if title.is_empty() {
        return Err(ConvertError::MissingTitle);
    }
    Ok(title.replace('/', "\\"))
}
