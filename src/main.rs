//! scorecard CLI - render interview assessment reports and combine them with resumes

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use scorecard::{
    AssessmentRecord, Delivery, DeliveryMode, EngineConfig, ReportEngine, ReportEngineBuilder,
    ScorePolicy, WatermarkSource, inspect_pdf_bytes, parse_page_size, prepare_watermark,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Report pages followed by resume pages in one file
    Merged,
    /// Report and resume written to separate files
    Separate,
}

impl From<ModeArg> for DeliveryMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Merged => DeliveryMode::Merged,
            ModeArg::Separate => DeliveryMode::Separate,
        }
    }
}

#[derive(Parser)]
#[command(name = "scorecard")]
#[command(author, version, about = "Interview assessment reports as PDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a report from an assessment record (JSON)
    Render {
        /// Assessment record JSON file
        #[arg(short, long)]
        record: PathBuf,

        /// Candidate resume PDF to stamp and deliver with the report
        #[arg(long)]
        resume: Option<PathBuf>,

        /// How report and resume are delivered
        #[arg(long, value_enum, default_value = "merged")]
        mode: ModeArg,

        /// Output PDF
        #[arg(short, long)]
        out: PathBuf,

        /// Output for the stamped resume in separate mode (defaults to <out>-resume.pdf)
        #[arg(long)]
        resume_out: Option<PathBuf>,

        /// Watermark image: URL, data URI or file path (overrides the environment)
        #[arg(long)]
        watermark: Option<String>,

        /// Out-of-range score handling: reject, clamp or pass-through
        #[arg(long)]
        score_policy: Option<ScorePolicy>,

        /// Page size: letter or a4
        #[arg(long)]
        page_size: Option<String>,

        /// Report generation date to print (defaults to today)
        #[arg(long)]
        generated_on: Option<String>,
    },

    /// Concatenate PDFs in the given order
    Merge {
        /// Input PDFs
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output PDF
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Stamp a watermark onto every page of a PDF
    Stamp {
        /// Input PDF
        input: PathBuf,

        /// Watermark image: URL, data URI or file path
        #[arg(long)]
        image: String,

        /// Output PDF
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print page count and page sizes of a PDF
    Inspect {
        /// Input PDF
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = EngineConfig::from_env().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}=info", env!("CARGO_PKG_NAME")))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Render {
            record,
            resume,
            mode,
            out,
            resume_out,
            watermark,
            score_policy,
            page_size,
            generated_on,
        } => {
            let mut config = config;
            if let Some(raw) = watermark {
                config.watermark = Some(WatermarkSource::parse(&raw));
            }
            if let Some(policy) = score_policy {
                config.score_policy = policy;
            }
            if let Some(raw) = page_size {
                config.page_size = parse_page_size(&raw)?;
            }
            let mut builder = ReportEngineBuilder::from_config(&config);
            if let Some(date) = generated_on {
                builder = builder.generated_on(date);
            }
            let engine = builder.build().context("failed to configure report engine")?;
            render(&engine, &record, resume.as_deref(), mode.into(), &out, resume_out).await
        }
        Commands::Merge { inputs, out } => {
            let buffers = inputs
                .iter()
                .map(|path| read(path))
                .collect::<Result<Vec<_>>>()?;
            let slices: Vec<&[u8]> = buffers.iter().map(Vec::as_slice).collect();
            let merged = scorecard::merge_documents(&slices).context("merge failed")?;
            write(&out, &merged)?;
            info!(inputs = inputs.len(), out = %out.display(), "merged");
            Ok(())
        }
        Commands::Stamp { input, image, out } => {
            let source = WatermarkSource::parse(&image);
            let watermark = prepare_watermark(&source, config.watermark_timeout)
                .await
                .with_context(|| format!("failed to prepare watermark {image}"))?;
            let stamped = scorecard::stamp_watermark(&read(&input)?, &watermark)
                .with_context(|| format!("failed to stamp {}", input.display()))?;
            write(&out, &stamped)?;
            info!(out = %out.display(), "stamped");
            Ok(())
        }
        Commands::Inspect { input } => {
            let report = inspect_pdf_bytes(&read(&input)?)
                .with_context(|| format!("failed to inspect {}", input.display()))?;
            println!("version:   {}", report.pdf_version);
            println!("pages:     {}", report.page_count);
            println!("encrypted: {}", report.encrypted);
            println!("bytes:     {}", report.file_size_bytes);
            for (idx, size) in report.page_sizes.iter().enumerate() {
                println!(
                    "page {:>3}: {} x {} pt",
                    idx + 1,
                    size.width.to_f32(),
                    size.height.to_f32()
                );
            }
            Ok(())
        }
    }
}

async fn render(
    engine: &ReportEngine,
    record_path: &Path,
    resume_path: Option<&Path>,
    mode: DeliveryMode,
    out: &Path,
    resume_out: Option<PathBuf>,
) -> Result<()> {
    let raw = fs::read_to_string(record_path)
        .with_context(|| format!("failed to read {}", record_path.display()))?;
    let record: AssessmentRecord = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid assessment record", record_path.display()))?;
    let resume = resume_path.map(read).transpose()?;

    let delivery = engine
        .deliver(&record, resume.as_deref(), mode)
        .await
        .context("report generation failed")?;
    match delivery {
        Delivery::Merged(bytes) => write(out, &bytes)?,
        Delivery::Separate { report, resume } => {
            write(out, &report)?;
            if let Some(resume) = resume {
                let path = resume_out.unwrap_or_else(|| default_resume_out(out));
                write(&path, &resume)?;
            }
        }
    }
    info!(candidate = %record.candidate_name, out = %out.display(), "report written");
    Ok(())
}

fn default_resume_out(out: &Path) -> PathBuf {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    out.with_file_name(format!("{stem}-resume.pdf"))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
