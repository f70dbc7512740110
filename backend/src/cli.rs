use clap::{Args, CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{self, ClassifierOverrides, ConfigError};
use crate::inference::{ClassifierError, load_classifier};
use crate::pipeline::{
    ClassificationOutcome, ClassificationPipeline, NamingPolicy, PipelineError, ValidationError,
};
use crate::storage::local_store::LocalStore;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load classifier: {0}")]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Options handed to classifier construction. Unset ones fall back to the environment.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ClassifierFlags {
    /// Model file (.onnx; .pt/.pth/.torchscript with the with-tch feature)
    #[arg(long, value_name = "FILE")]
    pub model: Option<PathBuf>,
    /// Labels file, one class per line
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,
    /// Name of the model's input tensor
    #[arg(long = "input_blob", visible_alias = "input-blob", value_name = "NAME")]
    pub input_blob: Option<String>,
    /// Name of the model's output tensor
    #[arg(long = "output_blob", visible_alias = "output-blob", value_name = "NAME")]
    pub output_blob: Option<String>,
}

impl From<ClassifierFlags> for ClassifierOverrides {
    fn from(flags: ClassifierFlags) -> Self {
        Self {
            model: flags.model,
            labels: flags.labels,
            input_blob: flags.input_blob,
            output_blob: flags.output_blob,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fruitveg-classify")]
#[command(about = "Classify an image and print the top prediction")]
pub struct ClassifyArgs {
    /// Image to classify
    pub filename: String,

    #[command(flatten)]
    pub classifier: ClassifierFlags,

    /// Values left behind by ignored options
    #[arg(hide = true)]
    pub extra: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(name = "fruitveg-label")]
#[command(about = "Classify an image and write a copy with the result drawn on it")]
pub struct LabelArgs {
    /// Image to classify
    pub filename: String,

    /// Where to write the labeled JPEG (default: next to the input)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub classifier: ClassifierFlags,

    /// Values left behind by ignored options
    #[arg(hide = true)]
    pub extra: Vec<String>,
}

/// Parses what `P` declares and sets aside every other `--flag` or
/// `--flag=value`, which is logged and returned instead of failing the parse.
pub fn parse_known<P: Parser>(
    args: impl IntoIterator<Item = String>,
) -> Result<(P, Vec<String>), clap::Error> {
    let command = <P as CommandFactory>::command();
    let known: Vec<&str> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long_and_visible_aliases())
        .flatten()
        .chain(["help"])
        .collect();

    let mut kept = Vec::new();
    let mut ignored = Vec::new();
    let mut positional_only = false;
    for arg in args {
        let unknown = !positional_only
            && arg.strip_prefix("--").is_some_and(|rest| {
                let name = rest.split_once('=').map_or(rest, |(name, _)| name);
                !name.is_empty() && !known.contains(&name)
            });
        if arg == "--" {
            positional_only = true;
        }
        if unknown {
            ignored.push(arg);
        } else {
            kept.push(arg);
        }
    }

    let parsed = P::try_parse_from(kept)?;
    for flag in &ignored {
        log::warn!("Ignoring unrecognized option {}", flag);
    }
    Ok((parsed, ignored))
}

pub fn run_classify(args: ClassifyArgs) -> ExitCode {
    warn_extra(&args.extra);
    report(
        build_pipeline(args.classifier)
            .and_then(|pipeline| classify_summary(&pipeline, &args.filename)),
    )
}

pub fn run_label(args: LabelArgs) -> ExitCode {
    warn_extra(&args.extra);
    report(build_pipeline(args.classifier).and_then(|pipeline| {
        label_summary(&pipeline, &args.filename, args.out)
    }))
}

pub fn classify_summary(
    pipeline: &ClassificationPipeline,
    filename: &str,
) -> Result<String, CliError> {
    let source = validate_source(filename)?;
    let outcome = pipeline.classify(&source)?;
    Ok(render_summary(filename, None, &outcome))
}

pub fn label_summary(
    pipeline: &ClassificationPipeline,
    filename: &str,
    out: Option<PathBuf>,
) -> Result<String, CliError> {
    let source = validate_source(filename)?;
    let artifact = pipeline.classify_and_annotate(&source, &NamingPolicy::Adjacent { output: out })?;
    Ok(render_summary(
        filename,
        Some(&artifact.paths.output_path),
        &artifact.outcome,
    ))
}

pub fn render_summary(image: &str, saved: Option<&Path>, outcome: &ClassificationOutcome) -> String {
    let mut lines = vec![format!("Image:   {}", image)];
    if let Some(saved) = saved {
        lines.push(format!("Saved:   {}", saved.display()));
    }
    lines.push(format!("Network: {}", outcome.model_name));
    lines.push(format!(
        "Classified as '{}' (class #{}) with {}% confidence",
        outcome.class_label,
        outcome.class_index,
        shared::format_percent(outcome.confidence)
    ));
    lines.join("\n")
}

fn build_pipeline(flags: ClassifierFlags) -> Result<ClassificationPipeline, CliError> {
    let lookup = config::env_lookup;
    let base_dir = config::base_dir(&lookup);
    let settings = config::resolve_classifier_settings(&lookup, &base_dir, &flags.into())?;
    log::info!(
        "Loading {} (labels {}, input '{}', output '{}')",
        settings.model_path.display(),
        settings.labels_path.display(),
        settings.input_tensor_name,
        settings.output_tensor_name
    );
    let classifier = load_classifier(&settings)?;
    Ok(ClassificationPipeline::new(classifier))
}

fn validate_source(filename: &str) -> Result<PathBuf, ValidationError> {
    let path = PathBuf::from(filename);
    if !path.is_file() {
        return Err(ValidationError::NotFound(path));
    }
    if !LocalStore::allowed_file(filename) {
        return Err(ValidationError::UnsupportedType);
    }
    Ok(path)
}

fn warn_extra(extra: &[String]) {
    if !extra.is_empty() {
        log::warn!("Ignoring extra arguments: {}", extra.join(" "));
    }
}

fn report(result: Result<String, CliError>) -> ExitCode {
    match result {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            ExitCode::FAILURE
        }
    }
}
