use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pipecraft_core::{
    AuthCallback, ExtractionError, ExtractionPlan, ExtractorFactory, Invocation, ParameterRecord,
    Pipeline, ResourceProvider,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding a bearer token for the api backend.
pub const AUTH_TOKEN_ENV: &str = "PIPECRAFT_AUTH_TOKEN";

/// CLI for pipecraft: declarative batch extraction.
#[derive(Parser, Debug)]
#[clap(
    name = "pipecraft",
    version,
    about = "Expand a parameter space, fetch one payload per combination and write each to a templated path"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the extraction and print every resulting path
    Extract {
        #[clap(flatten)]
        job: JobArgs,
    },
    /// Print the extraction plan as JSON without sending any request
    Plan {
        #[clap(flatten)]
        job: JobArgs,
    },
}

/// Job settings shared by every subcommand. Anything left out falls back to
/// the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct JobArgs {
    /// YAML, TOML or JSON config file with job defaults
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// YAML, TOML or JSON resource file describing the parameter space
    #[clap(long)]
    pub resources: Option<PathBuf>,

    #[clap(long)]
    pub source_name: Option<String>,

    /// Backend to use: `api` or `web`
    #[clap(long)]
    pub extractor_type: Option<String>,

    #[clap(long)]
    pub url_template: Option<String>,

    /// Output path template, e.g. `out/$id.json`
    #[clap(long)]
    pub output_pattern: Option<String>,

    /// Leave records whose output file already exists untouched
    #[clap(long)]
    pub skip_if_exists: bool,

    /// Parameter merged into every record (repeatable)
    #[clap(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Backend option override; the value is read as JSON when it parses (repeatable)
    #[clap(long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,
}

impl JobArgs {
    pub fn pipeline(&self) -> Pipeline {
        let mut pipeline = Pipeline::new()
            .skip_if_exists(self.skip_if_exists)
            .factory(Arc::new(extractor_factory()));
        if let Some(path) = &self.config {
            pipeline = pipeline.config_path(path);
        }
        if let Some(path) = &self.resources {
            pipeline = pipeline.resources(Arc::new(ResourceProvider::from_file(path)));
        }
        if let Some(name) = &self.source_name {
            pipeline = pipeline.source_name(name);
        }
        if let Some(extractor_type) = &self.extractor_type {
            pipeline = pipeline.extractor_type(extractor_type);
        }
        if let Some(template) = &self.url_template {
            pipeline = pipeline.url_template(template);
        }
        if let Some(pattern) = &self.output_pattern {
            pipeline = pipeline.output_pattern(pattern.as_str());
        }
        pipeline
    }

    pub fn invocation(&self) -> Invocation {
        let mut invocation = Invocation::new();
        if !self.params.is_empty() {
            invocation = invocation.params(self.params.iter().cloned().collect::<ParameterRecord>());
        }
        for (key, raw) in &self.options {
            invocation = invocation.option(key.clone(), option_value(raw));
        }
        invocation
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn option_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn extractor_factory() -> ExtractorFactory {
    let factory = ExtractorFactory::default();
    match std::env::var(AUTH_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => {
            tracing::debug!("Using bearer token from {}", AUTH_TOKEN_ENV);
            let callback: AuthCallback = Arc::new(move || -> Result<String, ExtractionError> {
                Ok(token.clone())
            });
            factory.with_auth_callback(callback)
        }
        _ => factory,
    }
}

fn plan_report(plan: &ExtractionPlan) -> Result<Value> {
    Ok(json!({
        "source_name": plan.source_name,
        "extractor_type": plan.extractor_type.as_str(),
        "to_fetch": serde_json::to_value(&plan.to_fetch)?,
        "skipped": serde_json::to_value(&plan.skipped)?,
    }))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("pipecraft_started");

    match cli.command {
        Commands::Extract { job } => {
            let paths = job
                .pipeline()
                .run(job.invocation())
                .await
                .context("extraction failed")?;
            for path in paths {
                println!("{}", path.display());
            }
        }
        Commands::Plan { job } => {
            let plan = job
                .pipeline()
                .plan(job.invocation())
                .context("planning failed")?;
            println!("{}", serde_json::to_string_pretty(&plan_report(&plan)?)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs_split_on_first_equals() {
        assert_eq!(
            parse_key_value("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn option_values_are_json_when_they_parse() {
        assert_eq!(option_value("3"), json!(3));
        assert_eq!(option_value("false"), json!(false));
        assert_eq!(option_value("null"), Value::Null);
        assert_eq!(option_value(r#"{"a":1}"#), json!({ "a": 1 }));
        assert_eq!(option_value("POST"), json!("POST"));
    }

    #[test]
    fn cli_parses_repeated_params_and_options() {
        let cli = Cli::parse_from([
            "pipecraft",
            "plan",
            "--extractor-type",
            "web",
            "--param",
            "lang=en",
            "--param",
            "run=2",
            "--option",
            "timeout=5",
            "--skip-if-exists",
        ]);
        let Commands::Plan { job } = cli.command else {
            panic!("expected plan subcommand");
        };
        assert_eq!(job.extractor_type.as_deref(), Some("web"));
        assert_eq!(job.params.len(), 2);
        assert_eq!(job.options, vec![("timeout".to_string(), "5".to_string())]);
        assert!(job.skip_if_exists);
    }
}
