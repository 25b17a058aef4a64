use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use clap::{Parser, Subcommand, ValueEnum};
use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use simple_logger::SimpleLogger;

use hwdiag::core::config::{KeyboardLayout, OutputFormat, ReportFormat, TestConfig};
use hwdiag::core::instance::InstanceGuard;
use hwdiag::core::operator::{ConsoleOperator, Operator, UnattendedOperator};
use hwdiag::core::platform::SystemShell;
use hwdiag::core::runner::Session;
use hwdiag::menu::{Menu, StdinLines};
use hwdiag::report::{default_report_dir, hardware_sections, Identification, ReportGenerator};
use hwdiag::reporters::{json::JsonReporter, text::TextReporter, Reporter};


#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Console output format
    #[arg(short, long, value_enum, global = true)]
    format: Option<FormatArg>,

    /// Report file format
    #[arg(long, value_enum, global = true)]
    report_format: Option<ReportFormatArg>,

    /// Directory for report files (default: Documents/Hardware Reports)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// TOML or JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    technician: Option<String>,

    #[arg(long, global = true)]
    workbench: Option<String>,

    /// Never prompt; interactive tests are skipped or left unverified
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Timeout for each system command, e.g. "10s"
    #[arg(long, global = true, value_parser = TestConfig::parse_timeout)]
    command_timeout: Option<Duration>,

    /// Amount of data written by the USB test, e.g. "256MiB"
    #[arg(long, global = true, value_parser = TestConfig::parse_size)]
    usb_size: Option<u64>,

    /// Mounted directory to use for the USB test instead of asking
    #[arg(long, global = true)]
    usb_drive: Option<PathBuf>,

    /// Keyboard layout checked by the keyboard test
    #[arg(long, value_enum, global = true)]
    layout: Option<LayoutArg>,

    #[command(subcommand)]
    command: Option<Commands>,
}


#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}


#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ReportFormatArg {
    Html,
    Text,
    Json,
    Csv,
}


#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Us,
    Abnt2,
}


#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Session,

    /// Print the hardware inventory
    Info,

    /// List the available tests
    List,

    /// Run one test
    Test {
        #[arg(value_enum)]
        name: TestName,

        /// Also write a report file
        #[arg(long)]
        report: bool,
    },

    /// Run several tests and write a report
    Run {
        #[arg(short, long, value_enum, value_delimiter = ',')]
        tests: Option<Vec<TestName>>,

        #[arg(long)]
        no_report: bool,
    },
}


#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum TestName {
    Bluetooth,
    Keyboard,
    Tpm,
    Usb,
    Webcam,
    Wifi,
    Audio,
}

impl TestName {
    fn as_str(&self) -> &'static str {
        match self {
            TestName::Bluetooth => "bluetooth",
            TestName::Keyboard => "keyboard",
            TestName::Tpm => "tpm",
            TestName::Usb => "usb",
            TestName::Webcam => "webcam",
            TestName::Wifi => "wifi",
            TestName::Audio => "audio",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let json_output = cli.format == Some(FormatArg::Json);
    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if cli.quiet || json_output {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };

    if let Err(e) = SimpleLogger::new().with_level(log_level).init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let code = match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            2
        }
    };

    process::exit(code);
}

fn execute(cli: Cli) -> Result<i32> {
    info!("hwdiag v{}", env!("CARGO_PKG_VERSION"));

    let mut config = build_config(&cli)?;
    let command = cli.command.unwrap_or(Commands::Session);

    match command {
        Commands::List => {
            list_tests(&config);
            Ok(0)
        }

        Commands::Info => {
            let mut session = new_session(config);
            print_hardware_info(&mut session)?;
            Ok(0)
        }

        Commands::Test { name, report } => {
            let mut session = new_session(config);
            session.setup_interrupt_handler()?;
            if report {
                ensure_identification(&mut session)?;
            }

            let status = session.run_test(name.as_str())?.status;
            if report {
                write_report(&mut session)?;
            }
            Ok(if status.is_failure() { 1 } else { 0 })
        }

        Commands::Run { tests, no_report } => {
            if let Some(tests) = tests {
                config.enabled_tests = tests.iter().map(|t| t.as_str().to_string()).collect();
            }
            run_tests(new_session(config), !no_report)
        }

        Commands::Session => {
            if !config.interactive {
                return run_tests(new_session(config), true);
            }

            let Some(_guard) = InstanceGuard::acquire(config.instance_port)
                .context("Failed to claim the instance port")?
            else {
                warn!("Another hwdiag session is already running on this machine");
                return Ok(0);
            };

            let report_dir = report_dir(&config);
            let report_format = config.report_format;
            let mut session = new_session(config);
            session.setup_interrupt_handler()?;

            let mut output = io::stdout();
            Menu::new(&mut session, report_dir, report_format)
                .run(&mut StdinLines, &mut output)
                .context("Interactive session failed")?;

            Ok(if session.summary().has_failures() { 1 } else { 0 })
        }
    }
}

fn build_config(cli: &Cli) -> Result<TestConfig> {
    let mut config = match &cli.config {
        Some(path) => TestConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => TestConfig::default(),
    };

    if cli.non_interactive {
        let tests = config.enabled_tests.clone();
        config.apply_preset_unattended();
        if cli.config.is_some() {
            config.enabled_tests = tests;
        }
    }

    if let Some(format) = cli.format {
        config.output_format = match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        };
    }
    if let Some(format) = cli.report_format {
        config.report_format = match format {
            ReportFormatArg::Html => ReportFormat::Html,
            ReportFormatArg::Text => ReportFormat::Text,
            ReportFormatArg::Json => ReportFormat::Json,
            ReportFormatArg::Csv => ReportFormat::Csv,
        };
    }
    if let Some(layout) = cli.layout {
        config.keyboard_layout = match layout {
            LayoutArg::Us => KeyboardLayout::Us,
            LayoutArg::Abnt2 => KeyboardLayout::Abnt2,
        };
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if let Some(technician) = &cli.technician {
        config.technician = Some(technician.clone());
    }
    if let Some(workbench) = &cli.workbench {
        config.workbench_id = Some(workbench.clone());
    }
    if let Some(timeout) = cli.command_timeout {
        config.command_timeout = timeout;
    }
    if let Some(size) = cli.usb_size {
        config.usb_test_size = size;
    }
    if let Some(drive) = &cli.usb_drive {
        config.usb_drive = Some(drive.clone());
    }
    config.verbose |= cli.verbose;
    config.quiet |= cli.quiet;

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn new_session(config: TestConfig) -> Session {
    let reporter: Box<dyn Reporter + Send + Sync> = match config.output_format {
        OutputFormat::Text => Box::new(TextReporter::new(config.verbose, config.quiet)),
        OutputFormat::Json => Box::new(JsonReporter::new(config.verbose)),
    };
    let operator: Box<dyn Operator> = if config.interactive {
        Box::new(ConsoleOperator)
    } else {
        Box::new(UnattendedOperator)
    };
    let shell = Box::new(SystemShell::new(config.command_timeout));
    let tests = hwdiag::tests::all();

    Session::new(tests, config, shell, operator, reporter)
}

fn report_dir(config: &TestConfig) -> PathBuf {
    config.output_dir.clone().unwrap_or_else(default_report_dir)
}

/// Fills in technician and workbench, prompting when someone is at the console.
fn ensure_identification(session: &mut Session) -> Result<()> {
    let config = session.config();
    if !config.require_identification || Identification::from_config(config).is_complete() {
        return Ok(());
    }

    if !session.operator().is_attended() {
        bail!("Technician and workbench are required; pass --technician and --workbench");
    }

    if session.config().technician.is_none() {
        let answer = session.operator().prompt_text("Technician name:")?;
        session.config_mut().technician = answer;
    }
    if session.config().workbench_id.is_none() {
        let answer = session.operator().prompt_text("Workbench ID:")?;
        session.config_mut().workbench_id = answer;
    }

    if !Identification::from_config(session.config()).is_complete() {
        bail!("Technician and workbench are required");
    }
    Ok(())
}

fn run_tests(mut session: Session, report: bool) -> Result<i32> {
    session.setup_interrupt_handler()?;
    if report {
        ensure_identification(&mut session)?;
    }

    let names = session.config().enabled_tests.clone();
    let summary = session.run_selected(&names).context("Test execution failed")?;

    if report {
        write_report(&mut session)?;
    }

    Ok(if summary.has_failures() { 1 } else { 0 })
}

fn write_report(session: &mut Session) -> Result<()> {
    session.hardware();
    let dir = report_dir(session.config());
    let format = session.config().report_format;

    let path = ReportGenerator::for_session(session)
        .write(&dir, format)
        .with_context(|| format!("Failed to write report to {}", dir.display()))?;
    session.reporter().report_info(&format!("Report written to {}", path.display()));
    if session.config().output_format == OutputFormat::Text && !session.config().quiet {
        println!("Report: {}", path.display());
    }
    Ok(())
}

fn list_tests(config: &TestConfig) {
    let tests = hwdiag::tests::all();

    if config.output_format == OutputFormat::Json {
        let list: Vec<serde_json::Value> = tests
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "title": t.title(),
                    "interactive": t.interactive(),
                    "enabled": config.is_enabled(t.name()),
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(list));
        return;
    }

    println!("Available tests:");
    for test in &tests {
        println!(
            "  {:<10} {:<14} {:<12} {}",
            test.name(),
            test.title(),
            if test.interactive() { "interactive" } else { "" },
            if config.is_enabled(test.name()) { "enabled" } else { "disabled" }
        );
    }
}

fn print_hardware_info(session: &mut Session) -> Result<()> {
    let json = session.config().output_format == OutputFormat::Json;
    let hardware = session.hardware();

    if json {
        println!("{}", serde_json::to_string(hardware).context("Failed to serialize hardware info")?);
        return Ok(());
    }

    println!("System Hardware Information:");
    println!("============================");
    for section in hardware_sections(hardware) {
        println!("\n{}:", section.title);
        for (label, value) in &section.rows {
            println!("  {}: {}", label, value);
        }
    }

    Ok(())
}
