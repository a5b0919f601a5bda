//! Run configuration.
//!
//! Resolution order: built-in defaults, then the TOML file (`--config`), then
//! command-line flags. Credentials never live here; they are read from the
//! environment by the narrative provider.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use pbidoc_docx::assembler::{
    format_date, DEFAULT_DATE_FORMAT, DEFAULT_DATE_LABEL, DEFAULT_HEADING, DEFAULT_NAME_LABEL,
};
use pbidoc_docx::{AssemblyOptions, AssemblyStrategy, RenderMode};
use pbidoc_ingest_pbit::{ExtractOptions, MissingEndpointPolicy};
use pbidoc_narrative::{EnrichOptions, NarrativeMode, ProviderConfig, ProviderKind, SectionTitles};

pub const PACKAGE_EXTENSION: &str = "pbit";
pub const CONTAINER_EXTENSION: &str = "zip";
pub const OUTPUT_SUFFIX: &str = "_doc.docx";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PbidocConfig {
    /// Directory holding `{report_name}.pbit`.
    pub report_dir: PathBuf,
    /// Package stem; also the value written after the report-name label.
    pub report_name: String,
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub narrative: NarrativeSettings,
    pub output: OutputSettings,
    pub relationships: RelationshipSettings,
}

impl Default for PbidocConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("."),
            report_name: String::new(),
            template_path: PathBuf::from("template.docx"),
            output_dir: PathBuf::from("."),
            narrative: NarrativeSettings::default(),
            output: OutputSettings::default(),
            relationships: RelationshipSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarrativeSettings {
    pub mode: NarrativeMode,
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Per-call deadline; `0` waits forever.
    pub timeout_secs: u64,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Issue per-item calls concurrently.
    pub parallel: bool,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            mode: NarrativeMode::default(),
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            timeout_secs: 120,
            max_output_tokens: None,
            temperature: None,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    /// Unset: markers for per-item narrative, append for whole-report.
    pub strategy: Option<AssemblyStrategy>,
    pub render: RenderMode,
    pub date_label: String,
    pub name_label: String,
    pub heading: String,
    pub date_format: String,
    pub titles: SectionTitles,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            strategy: None,
            render: RenderMode::default(),
            date_label: DEFAULT_DATE_LABEL.to_string(),
            name_label: DEFAULT_NAME_LABEL.to_string(),
            heading: DEFAULT_HEADING.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            titles: SectionTitles::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationshipSettings {
    pub missing_endpoint: MissingEndpointPolicy,
}

/// Parse a flag value with the same spelling the config file uses.
fn parse_setting<T: DeserializeOwned>(value: &str) -> std::result::Result<T, String> {
    let normalized = value.trim().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized)).map_err(|e| e.to_string())
}

/// Flags that override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the .pbit package
    #[arg(long, global = true)]
    pub report_dir: Option<PathBuf>,

    /// Report name (package file stem)
    #[arg(long, short = 'r', global = true)]
    pub report_name: Option<String>,

    /// Template .docx
    #[arg(long, global = true)]
    pub template: Option<PathBuf>,

    /// Directory for the generated document
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Narrative mode: per-item or whole-report
    #[arg(long, global = true, value_parser = parse_setting::<NarrativeMode>)]
    pub mode: Option<NarrativeMode>,

    /// Assembly strategy: markers or append
    #[arg(long, global = true, value_parser = parse_setting::<AssemblyStrategy>)]
    pub strategy: Option<AssemblyStrategy>,

    /// Appended text rendering: lines or markdown
    #[arg(long, global = true, value_parser = parse_setting::<RenderMode>)]
    pub render: Option<RenderMode>,

    /// Narrative provider: gemini, openai, anthropic or ollama
    #[arg(long, global = true, value_parser = parse_setting::<ProviderKind>)]
    pub provider: Option<ProviderKind>,

    /// Provider model name
    #[arg(long, global = true)]
    pub model: Option<String>,
}

impl PbidocConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| anyhow!("invalid configuration: {e}"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults, then `overrides.config` if given, then the flags.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match &overrides.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, o: &ConfigOverrides) {
        if let Some(v) = &o.report_dir {
            self.report_dir = v.clone();
        }
        if let Some(v) = &o.report_name {
            self.report_name = v.clone();
        }
        if let Some(v) = &o.template {
            self.template_path = v.clone();
        }
        if let Some(v) = &o.output_dir {
            self.output_dir = v.clone();
        }
        if let Some(v) = o.mode {
            self.narrative.mode = v;
        }
        if let Some(v) = o.strategy {
            self.output.strategy = Some(v);
        }
        if let Some(v) = o.render {
            self.output.render = v;
        }
        if let Some(v) = o.provider {
            // A model configured for another provider would not make sense.
            if v != self.narrative.provider {
                self.narrative.model = None;
                self.narrative.base_url = None;
            }
            self.narrative.provider = v;
        }
        if let Some(v) = &o.model {
            self.narrative.model = Some(v.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.report_name.trim().is_empty() {
            bail!("no report name configured (set report_name or pass --report-name)");
        }
        let texts = [
            ("output.date_label", &self.output.date_label),
            ("output.name_label", &self.output.name_label),
            ("output.heading", &self.output.heading),
            ("output.titles.pages", &self.output.titles.pages),
            ("output.titles.tables", &self.output.titles.tables),
            ("output.titles.relationships", &self.output.titles.relationships),
        ];
        if let Some((key, _)) = texts.iter().find(|(_, value)| value.trim().is_empty()) {
            bail!("{key} must not be blank");
        }
        let sample = chrono::NaiveDate::from_ymd_opt(2000, 1, 31).ok_or_else(|| anyhow!("invalid sample date"))?;
        format_date(sample, &self.output.date_format)?;
        Ok(())
    }

    pub fn package_path(&self) -> PathBuf {
        self.report_dir
            .join(format!("{}.{PACKAGE_EXTENSION}", self.report_name))
    }

    pub fn container_path(&self) -> PathBuf {
        self.report_dir
            .join(format!("{}.{CONTAINER_EXTENSION}", self.report_name))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}{OUTPUT_SUFFIX}", self.report_name))
    }

    pub fn strategy(&self) -> AssemblyStrategy {
        self.output.strategy.unwrap_or(match self.narrative.mode {
            NarrativeMode::PerItem => AssemblyStrategy::Markers,
            NarrativeMode::WholeReport => AssemblyStrategy::Append,
        })
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let n = &self.narrative;
        let mut config = ProviderConfig::for_provider(n.provider);
        if let Some(model) = &n.model {
            config.model = model.clone();
        }
        if let Some(url) = &n.base_url {
            config.base_url = url.clone();
        }
        config.timeout = (n.timeout_secs > 0).then(|| Duration::from_secs(n.timeout_secs));
        config.max_output_tokens = n.max_output_tokens;
        config.temperature = n.temperature;
        config
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            missing_endpoint: self.relationships.missing_endpoint,
        }
    }

    pub fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions {
            titles: self.output.titles.clone(),
            parallel: self.narrative.parallel,
        }
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            date_label: self.output.date_label.clone(),
            name_label: self.output.name_label.clone(),
            date_format: self.output.date_format.clone(),
            heading: self.output.heading.clone(),
            render: self.output.render,
        }
    }
}
