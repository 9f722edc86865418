use std::io::{self, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use isa_datatype::archive::CompositeArchive;
use isa_datatype::config::ConfigLoader;
use isa_datatype::datatype::{Datatype, open_upload};
use isa_datatype::domain::Dataset;
use isa_datatype::error::IsaError;
use isa_datatype::isa::IsaDatatype;
use isa_datatype::output::{ArchiveResult, JsonOutput, PrimaryResult, SniffResult};

#[derive(Parser)]
#[command(name = "isa-dt")]
#[command(about = "ISA-Tab composite datatype: ingest archives and render dataset summaries")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Extract an ISA-Tab archive into a dataset")]
    Ingest(IngestArgs),
    #[command(about = "Check whether a file is accepted as ISA-Tab")]
    Sniff(SniffArgs),
    #[command(about = "Locate the investigation file in a directory")]
    Primary(PrimaryArgs),
    #[command(about = "Print the composite file listing as HTML")]
    Summary(DatasetArgs),
    #[command(about = "Print the investigation summary table as HTML")]
    Table(DatasetArgs),
    #[command(about = "Validate a dataset")]
    Validate(DatasetArgs),
    #[command(about = "Archive a composite dataset as tar")]
    Archive(ArchiveArgs),
}

#[derive(Args, Clone)]
struct DatasetArgs {
    #[arg(long)]
    dataset: Utf8PathBuf,

    #[arg(long)]
    files_path: Option<Utf8PathBuf>,

    #[arg(long)]
    name: Option<String>,
}

impl DatasetArgs {
    fn into_dataset(self) -> Dataset {
        let mut dataset = match self.files_path {
            Some(files_path) => Dataset::new(self.dataset, files_path),
            None => Dataset::with_default_files_path(self.dataset),
        };
        if let Some(name) = self.name {
            dataset.set_meta("name", name);
        }
        dataset
    }
}

#[derive(Args)]
struct IngestArgs {
    archive: Utf8PathBuf,

    #[command(flatten)]
    dataset: DatasetArgs,
}

#[derive(Args)]
struct SniffArgs {
    file: Utf8PathBuf,
}

#[derive(Args)]
struct PrimaryArgs {
    files_path: Utf8PathBuf,
}

#[derive(Args)]
struct ArchiveArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long)]
    output: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<IsaError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IsaError) -> u8 {
    match error {
        IsaError::InvestigationNotFound(_) => 2,
        IsaError::ConfigRead(_) | IsaError::ConfigParse(_) | IsaError::InvalidPattern(_) => 3,
        _ => 1,
    }
}

fn print_html(html: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(html.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let isa = IsaDatatype::from_config(config);

    match cli.command {
        Command::Ingest(args) => {
            let mut upload = open_upload(&args.archive)?;
            let mut dataset = args.dataset.into_dataset();
            let report = isa.write_from_stream(&mut dataset, &mut upload)?;
            isa.set_meta(&mut dataset)?;
            JsonOutput::print_ingest(&report).into_diagnostic()
        }
        Command::Sniff(args) => {
            let result = SniffResult {
                matched: isa.sniff(&args.file),
                file: args.file.to_string(),
                file_ext: isa.file_ext().to_string(),
            };
            JsonOutput::print_sniff(&result).into_diagnostic()
        }
        Command::Primary(args) => {
            let primary = isa
                .primary_filename(&args.files_path)?
                .ok_or_else(|| IsaError::InvestigationNotFound(args.files_path.clone()))?;
            let result = PrimaryResult {
                files_path: args.files_path.to_string(),
                pattern: isa.config().investigation_pattern.to_string(),
                primary_file: primary.to_string(),
            };
            JsonOutput::print_primary(&result).into_diagnostic()
        }
        Command::Summary(args) => {
            let dataset = args.into_dataset();
            print_html(&isa.generate_primary_file(&dataset)).into_diagnostic()
        }
        Command::Table(args) => {
            let dataset = args.into_dataset();
            print_html(&isa.make_html_table(&dataset)?).into_diagnostic()
        }
        Command::Validate(args) => {
            let dataset = args.into_dataset();
            JsonOutput::print_validation(&isa.validate(&dataset)?).into_diagnostic()
        }
        Command::Archive(args) => {
            let dataset = args.dataset.into_dataset();
            let mut archive = CompositeArchive::create(&args.output)?;
            isa.archive_composite_dataset(&dataset, &mut archive)?;
            let members = archive.members().to_vec();
            let path = archive.finish()?;
            let result = ArchiveResult {
                archive: path.to_string(),
                members,
            };
            JsonOutput::print_archive(&result).into_diagnostic()
        }
    }
}
