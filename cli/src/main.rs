//! docvert CLI - office document conversion tool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use docvert::{
    BatchEvent, BatchJob, ConvertOptions, Converter, DocumentFormat, FormatTable, JsonFormat,
    SourceHint,
};

#[derive(Parser)]
#[command(name = "docvert")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Convert documents between DOCX, ODT, RTF, PDF and text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a document to another format
    Convert {
        /// Input document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Target format
        #[arg(short, long, value_enum)]
        to: FormatArg,

        /// Source format (detected from the extension or content if omitted)
        #[arg(long, value_enum)]
        from: Option<FormatArg>,

        /// Output directory
        #[arg(short, long, value_name = "DIR", env = "DOCVERT_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,

        /// Replace an existing output file
        #[arg(long)]
        overwrite: bool,

        /// Leave tables out of the output
        #[arg(long)]
        no_tables: bool,
    },

    /// Extract plain text
    Text {
        /// Input document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Convert many documents in parallel
    Batch {
        /// Input documents
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Target format
        #[arg(short, long, value_enum)]
        to: FormatArg,

        /// Output directory
        #[arg(short, long, value_name = "DIR", env = "DOCVERT_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Dump the content model as JSON
    Json {
        /// Input document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Show document information
    Info {
        /// Input document
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Office Open XML document
    Docx,
    /// OpenDocument text
    Odt,
    /// Rich Text Format
    Rtf,
    /// Portable Document Format
    Pdf,
    /// UTF-8 plain text
    Txt,
}

impl From<FormatArg> for DocumentFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Docx => DocumentFormat::Docx,
            FormatArg::Odt => DocumentFormat::Odt,
            FormatArg::Rtf => DocumentFormat::Rtf,
            FormatArg::Pdf => DocumentFormat::Pdf,
            FormatArg::Txt => DocumentFormat::Txt,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            to,
            from,
            output,
            overwrite,
            no_tables,
        }) => cmd_convert(&input, to, from, &output, overwrite, no_tables),
        Some(Commands::Text { input, output }) => cmd_text(&input, output.as_deref()),
        Some(Commands::Batch { inputs, to, output }) => cmd_batch(inputs, to, &output),
        Some(Commands::Json {
            input,
            output,
            compact,
        }) => cmd_json(&input, output.as_deref(), compact),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!("{}", "Usage: docvert convert <FILE> --to <FORMAT>".yellow());
            println!("       docvert --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn converter(options: ConvertOptions) -> Converter {
    Converter::new(FormatTable::new(), options)
}

fn cmd_convert(
    input: &Path,
    to: FormatArg,
    from: Option<FormatArg>,
    output: &Path,
    overwrite: bool,
    no_tables: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ConvertOptions::new()
        .with_output_dir(output)
        .with_overwrite(overwrite);
    options.render = options.render.with_tables(!no_tables);

    let mut hint = SourceHint::from_path(input);
    if let Some(format) = from {
        hint = hint.with_format(format.into());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Converting {}...", input.display()));
    let result = converter(options).convert_reader(fs::File::open(input)?, &hint, to.into())?;
    pb.finish_and_clear();

    println!(
        "{} {} {} {}",
        result.source_format.to_string().cyan(),
        "→".dimmed(),
        result.target_format.to_string().cyan(),
        result.output_path.display()
    );
    println!(
        "  {} {} bytes, {} paragraphs, {} tables",
        "└─".dimmed(),
        result.bytes_written,
        result.stats.paragraph_count,
        result.stats.table_count
    );

    Ok(())
}

fn cmd_text(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let text = converter(ConvertOptions::default())
        .extract_text(fs::File::open(input)?, &SourceHint::from_path(input))?;

    if let Some(path) = output {
        fs::write(path, &text)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        print!("{}", text);
    }

    Ok(())
}

fn cmd_batch(
    inputs: Vec<PathBuf>,
    to: FormatArg,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let converter = Arc::new(converter(ConvertOptions::new().with_output_dir(output)));
    let jobs: Vec<BatchJob> = inputs
        .into_iter()
        .map(|input| BatchJob::new(input, to.into()))
        .collect();
    log::debug!("Submitting {} jobs to {}", jobs.len(), output.display());

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut converted = 0;
    let mut failures = Vec::new();
    for event in converter.convert_batch(jobs).iter() {
        match event {
            BatchEvent::Started { input, .. } => {
                pb.set_message(input.display().to_string());
            }
            BatchEvent::Finished { result, .. } => {
                pb.println(format!("{} {}", "Converted".green(), result.output_path.display()));
                converted += 1;
                pb.inc(1);
            }
            BatchEvent::Failed { input, error, .. } => {
                pb.println(format!("{} {}: {}", "Failed".red(), input.display(), error));
                failures.push(input);
                pb.inc(1);
            }
        }
    }
    pb.finish_with_message("Done!");

    println!(
        "\n{} {} converted, {} failed",
        "Batch complete:".green().bold(),
        converted,
        failures.len()
    );
    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} of the inputs could not be converted", failures.len()).into())
    }
}

fn cmd_json(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    let json = docvert::to_json(input, format)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let model = converter(ConvertOptions::default())
        .read_model(fs::File::open(input)?, &SourceHint::from_path(input))?;
    let metadata = &model.metadata;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    if let Some(format) = metadata.source_format {
        println!("{}: {} ({})", "Format".bold(), format, format.mime_type());
    }
    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref creator) = metadata.creator {
        println!("{}: {}", "Creator".bold(), creator);
    }
    if let Some(ref subject) = metadata.subject {
        println!("{}: {}", "Subject".bold(), subject);
    }
    if let Some(ref created) = metadata.created {
        println!("{}: {}", "Created".bold(), created);
    }
    if let Some(ref modified) = metadata.modified {
        println!("{}: {}", "Modified".bold(), modified);
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let stats = model.stats();
    println!(
        "{}: {} ({} empty)",
        "Paragraphs".bold(),
        stats.paragraph_count,
        stats.empty_paragraph_count
    );
    println!("{}: {}", "Headings".bold(), stats.heading_count);
    println!("{}: {}", "Runs".bold(), stats.run_count);
    println!("{}: {} ({} cells)", "Tables".bold(), stats.table_count, stats.cell_count);
    println!("{}: {}", "Words".bold(), stats.word_count);
    println!("{}: {}", "Characters".bold(), stats.char_count);

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "docvert".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Office document conversion tool (library {})", docvert::VERSION);
    println!();
    println!("Repository: {}", "https://github.com/iyulab/docvert".dimmed());
    println!("License: MIT");
}
