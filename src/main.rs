// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::Write;
use std::path::PathBuf;

use slidelingo::app_config::{self, Config, ModelProvider};
use slidelingo::app_controller::Controller;

/// CLI Wrapper for ModelProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliModelProvider {
    Ollama,
    Mock,
}

impl From<CliModelProvider> for ModelProvider {
    fn from(cli_provider: CliModelProvider) -> Self {
        match cli_provider {
            CliModelProvider::Ollama => ModelProvider::Ollama,
            CliModelProvider::Mock => ModelProvider::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Options shared by every command that reads the configuration
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", env = "SLIDELINGO_CONFIG")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate presentations (files or directories)
    Translate(TranslateArgs),

    /// Print the extracted text units of a presentation as JSON lines
    Extract {
        /// Presentation to read
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// List recent jobs from the job history
    Jobs {
        /// Number of jobs to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for slidelingo
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Presentation files or directories to process
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Model provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliModelProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Directory for translated presentations (default: next to each input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Glossary file (JSON lines with source/target fields)
    #[arg(short, long)]
    glossary: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

/// Slidelingo - translate presentations with a local model
#[derive(Parser, Debug)]
#[command(name = "slidelingo")]
#[command(version)]
#[command(about = "Translate PowerPoint presentations with a locally hosted model")]
#[command(long_about = "Slidelingo extracts every text run of a presentation, translates the runs in
batches on a single local accelerator and writes them back without touching
any formatting.

EXAMPLES:
    slidelingo translate deck.pptx                  # Translate using default config
    slidelingo translate -t de talks/               # Translate a whole directory to German
    slidelingo translate -f -o out/ a.pptx b.pptx   # Several decks at once, overwrite outputs
    slidelingo extract deck.pptx > units.jsonl      # Dump the extracted text units
    slidelingo jobs -n 5                            # Show the last five jobs
    slidelingo completions bash > slidelingo.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The level is lowered or raised once the configuration is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "slidelingo", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Extract { input, common } => {
            let config = load_config(&common)?;
            let stdout = std::io::stdout();
            let count = Controller::extract_to_jsonl(&config, &input, &mut stdout.lock())?;
            info!("Extracted {} text units from {:?}", count, input);
            Ok(())
        }
        Commands::Jobs { limit, common } => {
            let config = load_config(&common)?;
            let controller = Controller::with_config(config)?;
            for record in controller.recent_jobs(limit).await? {
                println!(
                    "{}  {:<22} {} -> {}  units {}/{} failed {}  {}",
                    record.id,
                    record.state,
                    record.source_language,
                    record.target_language,
                    record.counts.translated,
                    record.counts.total,
                    record.counts.failed,
                    record.input_name
                );
            }
            Ok(())
        }
    }
}

/// Load the configuration and apply the log level it or the CLI asks for
fn load_config(common: &CommonArgs) -> Result<Config> {
    let mut config = Config::load_or_create(&common.config_path)?;
    if let Some(log_level) = &common.log_level {
        config.log_level = log_level.clone().into();
    }
    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let mut config = load_config(&options.common)?;

    // Override config with CLI options if provided
    if let Some(provider) = options.provider {
        config.translation.provider = provider.into();
    }
    if let Some(model) = options.model {
        config.translation.model = model;
    }
    if let Some(source_language) = options.source_language {
        config.source_language = source_language;
    }
    if let Some(target_language) = options.target_language {
        config.target_language = target_language;
    }
    if let Some(output_dir) = options.output_dir {
        config.storage.output_dir = Some(output_dir);
    }
    if let Some(glossary) = options.glossary {
        config.translation.glossary_path = Some(glossary);
    }

    config.validate()?;

    let target_language = config.target_language.clone();
    let controller = Controller::with_config(config)?;
    controller.check_model().await?;

    let summary = controller
        .run(&options.inputs, &target_language, options.force_overwrite)
        .await?;

    if summary.has_failures() {
        error!("{} job(s) failed", summary.failed);
        return Err(anyhow!("{} of the submitted presentations failed", summary.failed));
    }

    Ok(())
}
