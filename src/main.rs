//! hive-rip CLI
//!
//! Entry point for the `hive-rip` command-line tool.

use clap::{Args, Parser, Subcommand};
use hive_rip::cancel::EXIT_CODE_STOPPED;
use hive_rip::config::{ModuleArgs, StaticProperties, SystemProperties};
use hive_rip::lifecycle::FinalizeReport;
use hive_rip::{
    CancelToken, DirectoryEvidence, EvidenceStore, HiveReportModule, JsonlEvidenceStore,
    MemoryEvidenceStore, ModuleConfig, RunReport, Services, Settings,
};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "hive-rip")]
#[command(about = "Run a hive-dump tool over registry hives and record OS facts", version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every hive under an evidence directory
    Run {
        /// Directory holding extracted or mounted evidence
        evidence_dir: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Copy hives here before running the tool on them
        #[arg(long)]
        staging: Option<PathBuf>,

        /// Append recorded artifacts to this JSON-lines file
        #[arg(long)]
        artifacts: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract field values from a captured report
    Scan {
        /// Capture file to read
        capture: PathBuf,

        /// Field name to look for (repeatable)
        #[arg(long = "field", short = 'f', required = true)]
        fields: Vec<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration and output layout
    Layout {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML settings file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Module argument string, e.g. "-e /opt/rip/rip.pl;-o /cases/7/out"
    #[arg(long = "module-args", allow_hyphen_values = true)]
    module_args: Option<String>,

    /// Hive-dump executable
    #[arg(long, short = 'e')]
    tool: Option<String>,

    /// Module output directory
    #[arg(long, short = 'o')]
    output: Option<String>,

    /// Program directory used to locate the default tool
    #[arg(long)]
    program_dir: Option<String>,

    /// Host output directory used when --output is not given
    #[arg(long)]
    out_dir: Option<String>,

    /// Kill the tool after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl ConfigArgs {
    fn cli_overrides(&self) -> Value {
        let mut map = Map::new();
        if let Some(ref tool) = self.tool {
            map.insert("tool_path".to_string(), json!(tool));
        }
        if let Some(ref output) = self.output {
            map.insert("output_dir".to_string(), json!(output));
        }
        if let Some(timeout) = self.timeout {
            map.insert("tool_timeout_seconds".to_string(), json!(timeout));
        }
        let mut props = Map::new();
        if let Some(ref dir) = self.program_dir {
            props.insert("program_dir".to_string(), json!(dir));
        }
        if let Some(ref dir) = self.out_dir {
            props.insert("output_dir".to_string(), json!(dir));
        }
        if !props.is_empty() {
            map.insert("properties".to_string(), Value::Object(props));
        }
        Value::Object(map)
    }

    fn settings(&self) -> Result<Settings, String> {
        let module_args = match self.module_args {
            Some(ref raw) => ModuleArgs::parse(raw).map_err(|e| e.to_string())?,
            None => ModuleArgs::default(),
        };
        Settings::build(self.config.as_deref(), &module_args, Some(self.cli_overrides()))
            .map_err(|e| e.to_string())
    }
}

/// Host properties when neither settings nor flags give them.
fn host_properties() -> StaticProperties {
    let program_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_string_lossy().to_string()))
        .unwrap_or_default();
    StaticProperties::new(program_dir, "")
}

fn main() {
    let cli = Cli::parse();
    hive_rip::logging::init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            evidence_dir,
            config,
            staging,
            artifacts,
            json,
        } => run(evidence_dir, config, staging, artifacts, json),
        Commands::Scan { capture, fields, json } => run_scan(capture, fields, json),
        Commands::Layout { config } => run_layout(config),
    }
}

fn run(
    evidence_dir: PathBuf,
    config: ConfigArgs,
    staging: Option<PathBuf>,
    artifacts: Option<PathBuf>,
    json: bool,
) {
    let settings = config.settings().unwrap_or_else(|e| fail(&format!("Configuration error: {}", e)));
    let properties = StaticProperties::from_settings(&settings, &host_properties());

    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_signal_handler() {
        tracing::warn!(error = %e, "could not install signal handler");
    }

    let mut module = HiveReportModule::with_cancel_token(cancel);
    if let Err(e) = module.run_initialize(&settings, &properties) {
        fail(&format!("Initialization failed: {}", e));
    }

    let mut evidence = match DirectoryEvidence::open(&evidence_dir) {
        Ok(ev) => ev,
        Err(e) => {
            module.finalize();
            fail(&format!("Cannot open evidence: {}", e));
        }
    };
    if let Some(dir) = staging {
        evidence = evidence.with_staging(dir);
    }

    let mut jsonl = artifacts.map(JsonlEvidenceStore::new);
    let mut memory = MemoryEvidenceStore::new();

    let result = {
        let store: &mut dyn EvidenceStore = match jsonl.as_mut() {
            Some(store) => store,
            None => &mut memory,
        };
        let mut services = Services {
            catalog: &evidence,
            content: &evidence,
            evidence: store,
        };
        module.run_report(&mut services)
    };

    if let Some(store) = jsonl.as_mut() {
        if let Err(e) = store.flush() {
            tracing::error!(error = %e, path = %store.path().display(), "could not write artifacts");
        }
    }
    let cleanup = module.run_finalize();

    match result {
        Ok(report) => {
            print_report(&report, &cleanup, json);
            if report.stopped {
                process::exit(EXIT_CODE_STOPPED);
            }
        }
        Err(e) => fail(&format!("Report failed: {}", e)),
    }
}

fn print_report(report: &RunReport, cleanup: &FinalizeReport, json: bool) {
    if json {
        let out = json!({ "report": report, "finalize": cleanup });
        match serde_json::to_string_pretty(&out) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(&format!("Error serializing output: {}", e)),
        }
    } else {
        print!("{}", report.to_human());
    }
}

fn run_scan(capture: PathBuf, fields: Vec<String>, json: bool) {
    let names: Vec<&str> = fields.iter().map(String::as_str).collect();
    let found = match hive_rip_scan::scan_fields(&capture, &names) {
        Ok(found) => found,
        Err(e) => fail(&format!("Scan failed: {}", e)),
    };

    if json {
        match serde_json::to_string_pretty(&found) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(&format!("Error serializing output: {}", e)),
        }
    } else {
        for field in &names {
            for value in found.get(*field).into_iter().flatten() {
                println!("{}: {}", field, value);
            }
        }
    }
}

fn run_layout(config: ConfigArgs) {
    let settings = config.settings().unwrap_or_else(|e| fail(&format!("Configuration error: {}", e)));
    let properties = StaticProperties::from_settings(&settings, &host_properties());
    let resolved = ModuleConfig::resolve(&settings, &properties)
        .unwrap_or_else(|e| fail(&format!("Configuration error: {}", e)));

    let out = json!({
        "tool_path": resolved.tool_path,
        "tool_timeout_seconds": resolved.tool_timeout.map(|d| d.as_secs()),
        "layout": resolved.layout,
        "properties": {
            "program_dir": properties.get(hive_rip::config::SystemProperty::ProgramDir),
            "output_dir": properties.get(hive_rip::config::SystemProperty::OutputDir),
        },
        "sources": settings.sources,
    });
    match serde_json::to_string_pretty(&out) {
        Ok(text) => println!("{}", text),
        Err(e) => fail(&format!("Error serializing output: {}", e)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}
