//! Canned analysis engine used until a real agent system is wired in.
//!
//! Walks through a fixed list of steps, sleeping between them, and returns a
//! placeholder result. Stops early when the run is cancelled.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use datagen_core::job::{JobUpdate, Message};
use datagen_core::result::{
    AnalysisResult, CodeBlock, ReportSection, Visualization, VisualizationKind,
};
use uuid::Uuid;

use crate::engine::{AnalysisEngine, AnalysisRequest, ProgressReporter};

/// `(agent, step name, description, progress after the step)`.
const STEPS: &[(&str, &str, &str, u32)] = &[
    ("data_loader", "Data loading", "Loading and parsing input files", 10),
    ("preprocessor", "Data preprocessing", "Cleaning and preparing data for analysis", 30),
    ("analyst", "Analysis", "Performing core analysis operations", 50),
    ("visualizer", "Visualization", "Generating visualizations and charts", 70),
    ("reporter", "Report generation", "Compiling final analysis report", 90),
];

pub struct SimulatedEngine {
    step_delay: Duration,
}

impl SimulatedEngine {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }

    async fn pause(&self, reporter: &ProgressReporter) -> anyhow::Result<()> {
        tokio::select! {
            () = reporter.cancelled() => anyhow::bail!("analysis cancelled"),
            () = tokio::time::sleep(self.step_delay) => Ok(()),
        }
    }
}

#[async_trait]
impl AnalysisEngine for SimulatedEngine {
    async fn run(
        &self,
        request: AnalysisRequest,
        reporter: ProgressReporter,
    ) -> anyhow::Result<AnalysisResult> {
        for &(agent, name, description, progress) in STEPS {
            self.pause(&reporter).await?;
            reporter
                .update(
                    JobUpdate::default()
                        .with_progress(progress)
                        .with_agent(agent)
                        .with_message(Message::agent(format!("{name}: {description}"))),
                )
                .await?;
        }
        self.pause(&reporter).await?;

        Ok(placeholder_result(&request))
    }
}

fn placeholder_result(request: &AnalysisRequest) -> AnalysisResult {
    let now = Utc::now();
    let mut result = AnalysisResult::new(
        format!(
            "Analysis of {} file(s) completed. Found interesting patterns in the data.",
            request.files.len()
        ),
        now,
    );
    result.files = request.files.iter().map(|f| f.name.clone()).collect();
    result.visualizations = vec![Visualization {
        id: Uuid::new_v4(),
        title: "Data Distribution".to_string(),
        description: Some("Distribution of values across the dataset".to_string()),
        file_path: "/mock/visualization1.png".to_string(),
        kind: VisualizationKind::Chart,
        created_at: now,
    }];
    result.code_blocks = vec![CodeBlock {
        id: Uuid::new_v4(),
        title: Some("Data Processing Code".to_string()),
        content: "import pandas as pd\n\ndf = pd.read_csv('data.csv')\ndf.head()".to_string(),
        language: "python".to_string(),
        created_at: now,
    }];
    result.report_sections = vec![
        ReportSection {
            id: Uuid::new_v4(),
            title: "Executive Summary".to_string(),
            content: format!("Request: {}", request.instructions),
            order: 1,
            created_at: now,
        },
        ReportSection {
            id: Uuid::new_v4(),
            title: "Detailed Findings".to_string(),
            content: "Our analysis revealed the following patterns and trends...".to_string(),
            order: 2,
            created_at: now,
        },
    ];
    result
}
