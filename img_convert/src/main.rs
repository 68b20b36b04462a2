use clap::{Parser, Subcommand};
use img_convert::{
    BatchScheduler, CancelToken, ConversionOptions, EventSink, FileTask, OutputFormat,
};
use shared_utils::common_utils::absolute_normalized;
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::thread_manager::default_worker_count;
use shared_utils::unified_progress::UnifiedProgressBar;
use shared_utils::{check_dangerous_directory, collect_files, print_summary_report, IMAGE_EXTENSIONS};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "img-convert")]
#[command(version, about = "Batch image format converter (JPG, PNG, BMP, TIFF, WEBP, HEIC)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file or every supported image in a directory
    #[command(name = "run")]
    Run {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Target format
        #[arg(short, long, value_enum, default_value = "jpg")]
        format: OutputFormat,

        /// Output directory (default: alongside the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not append "_out" to output file names
        #[arg(long)]
        no_suffix: bool,

        /// Write beside each source and delete the source after a successful conversion
        #[arg(long)]
        replace: bool,

        /// Parallel workers (1-16)
        #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..=16))]
        workers: Option<u16>,

        /// HEIC encoder quality (0-100)
        #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(i32).range(0..=100))]
        heic_quality: i32,

        /// Only convert inputs of this format
        #[arg(long, value_enum)]
        input_format: Option<OutputFormat>,

        /// Only scan the top level of a directory input
        #[arg(long)]
        no_recursive: bool,

        #[arg(short, long)]
        verbose: bool,

        /// Write the log to this file instead of the temp directory
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,
    },

    /// List supported formats
    Formats,
}

/// Drives the terminal progress bar from scheduler events.
struct ProgressSink {
    bar: Arc<UnifiedProgressBar>,
    verbose: bool,
}

impl EventSink for ProgressSink {
    fn on_progress(&self, percent: u8) {
        self.bar.set_percent(percent);
    }

    fn on_completed_count(&self, completed: usize) {
        self.bar.set_completed(completed);
    }

    fn on_file_log(&self, line: &str) {
        tracing::info!("{}", line);
        if self.verbose {
            self.bar.println(line);
        }
    }

    fn on_error(&self, message: &str) {
        tracing::error!("{}", message);
        self.bar.println(&format!("❌ {}", message));
    }

    fn on_finished(&self) {
        self.bar.finish_with_message("done");
    }
}

fn input_extensions(input_format: Option<OutputFormat>) -> Vec<&'static str> {
    IMAGE_EXTENSIONS
        .iter()
        .copied()
        .filter(|ext| match input_format {
            Some(f) => OutputFormat::from_extension(ext) == Some(f),
            None => true,
        })
        .collect()
}

fn input_dir(input: &Path) -> PathBuf {
    if input.is_dir() {
        input.to_path_buf()
    } else {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn print_formats() {
    println!("Output formats:");
    for format in OutputFormat::ALL {
        println!(
            "  {:<5} .{:<5} (accepts: {})",
            format.as_str(),
            format.extension(),
            format.aliases().join(", ")
        );
    }
    println!();
    println!("Input extensions: {}", IMAGE_EXTENSIONS.join(", "));
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Commands::Run {
        input,
        format,
        output,
        no_suffix,
        replace,
        workers,
        heic_quality,
        input_format,
        no_recursive,
        verbose,
        log_file,
    } = cli.command
    else {
        print_formats();
        return Ok(());
    };

    let mut log_config = LogConfig::default()
        .with_stderr(false)
        .with_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        });
    if let Some(ref path) = log_file {
        log_config = log_config.with_log_file(path);
    }
    if let Err(e) = init_logging("img_convert", log_config) {
        eprintln!("⚠️  Logging disabled: {:#}", e);
    }

    if !input.exists() {
        anyhow::bail!("Input path does not exist: {}", input.display());
    }
    let input = absolute_normalized(&input);

    if replace {
        check_dangerous_directory(&input_dir(&input)).map_err(|e| anyhow::anyhow!(e))?;
    }

    let files = if input.is_file() {
        vec![input.clone()]
    } else {
        collect_files(&input, &input_extensions(input_format), !no_recursive)
    };

    let output_dir = output
        .map(|o| absolute_normalized(&o))
        .unwrap_or_else(|| input_dir(&input));

    let options = ConversionOptions {
        output_format: format,
        output_dir,
        append_suffix: !no_suffix,
        replace_original: replace,
        worker_count: workers.map(usize::from).unwrap_or_else(default_worker_count),
        heic_quality,
    };

    if files.is_empty() {
        println!("No supported image files found in {}", input.display());
        return Ok(());
    }

    eprintln!(
        "🖼️  {} file(s) → {} with {} worker(s)",
        files.len(),
        options.output_format,
        options.worker_count
    );
    if replace {
        eprintln!("🔄 Replace mode: originals are deleted after successful conversion");
    } else if verbose {
        eprintln!("📁 Output: {}", options.output_dir.display());
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let hidden = !console::Term::stderr().features().is_attended();
    let sink = ProgressSink {
        bar: UnifiedProgressBar::new(files.len(), "Converting", hidden),
        verbose,
    };

    let tasks: Vec<FileTask> = files.into_iter().map(FileTask::new).collect();
    let summary = BatchScheduler::new().run(tasks, &options, &sink, &cancel)?;

    print_summary_report(&summary.tally, summary.elapsed, summary.cancelled, "Conversion");

    if summary.cancelled {
        std::process::exit(130);
    }
    if summary.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
