//! Logging configuration for mesh processes

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A part of the mesh stack whose verbosity can be tuned on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshComponent {
    /// Join/leave bookkeeping and event publishing
    Coordinator,
    /// The serialized action queue
    Sequencer,
    /// Edge establishment, rollback, and teardown
    Regulation,
    /// Offer/answer/finish exchanges
    Handshake,
    /// Triangulation and graph diffs
    Topology,
    /// Simulated peers and the audit
    Simulation,
}

impl MeshComponent {
    /// The tracing target events from this component are emitted under
    pub fn target(self) -> &'static str {
        match self {
            MeshComponent::Coordinator => "weft_coordinator::coordinator",
            MeshComponent::Sequencer => "weft_coordinator::sequencer",
            MeshComponent::Regulation => "weft_coordinator::regulation",
            MeshComponent::Handshake => "weft_coordinator::handshake",
            MeshComponent::Topology => "weft_topology",
            MeshComponent::Simulation => "weft_sim",
        }
    }
}

/// How console lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable, optionally colored
    Pretty,
    /// No console output
    Off,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for everything without a component override (RUST_LOG wins when set)
    pub level: String,
    pub console: ConsoleFormat,
    /// Colors for pretty console output
    pub ansi: bool,
    /// JSONL log files, in addition to the console
    pub file: Option<FileConfig>,
    /// Per-component level overrides
    pub components: BTreeMap<MeshComponent, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::Json,
            ansi: false,
            file: None,
            components: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Pretty console output for someone watching a run
    pub fn interactive() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::Pretty,
            ansi: true,
            ..Default::default()
        }
    }

    /// Quiet console, warnings only
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Set the level of one component
    pub fn with_component(mut self, component: MeshComponent, level: impl Into<String>) -> Self {
        self.components.insert(component, level.into());
        self
    }

    /// Log every handshake step and regulation outcome
    pub fn trace_handshakes(self) -> Self {
        self.with_component(MeshComponent::Handshake, "trace")
            .with_component(MeshComponent::Regulation, "debug")
    }

    /// Filter directives: the base level followed by component overrides
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(
            self.components
                .iter()
                .map(|(component, level)| format!("{}={}", component.target(), level)),
        );
        directives.join(",")
    }
}

impl fmt::Display for MeshComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

/// JSONL file output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix, usually the mesh instance name
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl FileConfig {
    /// Daily files named after a mesh instance
    pub fn for_mesh(directory: impl Into<PathBuf>, mesh_name: &str) -> Self {
        Self {
            directory: directory.into(),
            prefix: mesh_name.to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// A single file, truncated on start
    Never,
}
