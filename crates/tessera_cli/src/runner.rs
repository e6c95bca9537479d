use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;
use tessera_common::config::TesseraConfig;
use tessera_common::datum::Datum;
use tessera_kernel::ShardingKernel;
use tessera_route::HintContext;
use tessera_rule::{RuleRegistry, ShardingRule, ShardingRuleConfig};
use tessera_sql::BoundStatement;

use crate::args::OutputFormat;
use crate::format::{format_plan_text, format_rule_summary};

pub struct ExplainRequest<'a> {
    pub rule: &'a Path,
    pub statement: &'a str,
    pub params: Option<&'a str>,
    pub hint: Option<&'a str>,
    pub config: Option<&'a Path>,
    pub format: OutputFormat,
}

pub fn run_check(rule: &Path) -> Result<String> {
    let (_, rule) = load_rule(rule)?;
    Ok(format_rule_summary(&rule))
}

pub fn run_explain(req: &ExplainRequest<'_>) -> Result<String> {
    let (rule_config, _) = load_rule(req.rule)?;
    let config = match req.config {
        Some(path) => TesseraConfig::load(path)
            .with_context(|| format!("Could not load props from {}", path.display()))?,
        None => TesseraConfig::default(),
    };
    let statement: BoundStatement = serde_json::from_str(&json_argument(req.statement)?)
        .context("Statement is not a valid bound statement")?;
    let params = match req.params {
        Some(text) => parse_params(text)?,
        None => Vec::new(),
    };
    let hint: Option<HintContext> = match req.hint {
        Some(arg) => Some(
            serde_json::from_str(&json_argument(arg)?).context("Hint is not a valid hint context")?,
        ),
        None => None,
    };

    let registry = Arc::new(RuleRegistry::from_config(&rule_config)?);
    let kernel = ShardingKernel::new(registry, config);
    let plan = kernel.plan(statement, params, hint.as_ref())?;
    match req.format {
        OutputFormat::Text => Ok(format_plan_text(&plan)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&plan)? + "\n"),
    }
}

pub fn default_config() -> Result<String> {
    Ok(TesseraConfig::default().to_toml_string()?)
}

fn load_rule(path: &Path) -> Result<(ShardingRuleConfig, ShardingRule)> {
    let config = ShardingRuleConfig::load(path)
        .with_context(|| format!("Could not read rule document {}", path.display()))?;
    let rule = config
        .build()
        .with_context(|| format!("Invalid rule document {}", path.display()))?;
    Ok((config, rule))
}

/// Inline JSON is used as is; anything else names a file.
fn json_argument(arg: &str) -> Result<String> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(arg.to_string());
    }
    std::fs::read_to_string(arg).with_context(|| format!("Could not read {arg}"))
}

fn parse_params(text: &str) -> Result<Vec<Datum>> {
    let values: Vec<JsonValue> =
        serde_json::from_str(&json_argument(text)?).context("Parameters must be a JSON array")?;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| match Datum::from_json(v) {
            Some(d) => Ok(d),
            None => bail!("Parameter {i} is not a scalar: {v}"),
        })
        .collect()
}
