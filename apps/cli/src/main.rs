//! traymount CLI - terminal surface for removable-volume mounting.
//!
//! Runs the core watcher/orchestrator pair with a console front end. The
//! `watch` command is an interactive session: the disk watcher feeds
//! attach/detach events from its own thread while stdin commands drive
//! mount and unmount requests through the same queue.

mod frontend;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use traymount_core::{
    Config, DeviceEnumerator, DiskWatcher, LsblkEnumerator, MountOrchestrator,
    OrchestratorCommand, PrivilegeEscalation, PrivilegedExecutor, ProcMounts,
};

use frontend::{PromptSeed, TerminalFrontEnd};

/// traymount CLI tool.
#[derive(Parser)]
#[command(name = "traymount-cli")]
#[command(about = "CLI for removable-volume mount operations", long_about = None)]
struct Cli {
    /// Config file path; defaults to the per-user config location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch for devices and process mount commands interactively.
    ///
    /// Commands on stdin: "mount <node> [fstype] <dir>", "umount <node>",
    /// "list", "quit".
    Watch {
        /// Privilege escalation method override.
        #[arg(long, value_enum)]
        escalation: Option<Escalation>,
    },
    /// List mountable partitions and exit.
    Devices,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Escalation {
    Pkexec,
    Sudo,
    None,
}

impl From<Escalation> for PrivilegeEscalation {
    fn from(value: Escalation) -> Self {
        match value {
            Escalation::Pkexec => PrivilegeEscalation::Pkexec,
            Escalation::Sudo => PrivilegeEscalation::Sudo,
            Escalation::None => PrivilegeEscalation::None,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Watch { escalation } => {
                let mut config = config;
                if let Some(escalation) = escalation {
                    config.escalation = escalation.into();
                }
                run_watch(config)
            }
            Commands::Devices => run_devices(),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> traymount_core::Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load(&traymount_core::config::default_config_path()?),
    }
}

fn run_devices() -> traymount_core::Result<()> {
    let devices = LsblkEnumerator.enumerate()?;
    if devices.is_empty() {
        println!("no mountable partitions");
        return Ok(());
    }
    for device in devices {
        println!(
            "{} ({} GiB)",
            device.node_path,
            device.size_bytes / (1024 * 1024 * 1024)
        );
    }
    Ok(())
}

fn run_watch(config: Config) -> traymount_core::Result<()> {
    let (queue_tx, queue_rx) = mpsc::channel();

    let watcher = DiskWatcher::new(
        LsblkEnumerator,
        Duration::from_millis(config.poll_interval_ms),
    );
    let watcher_handle = watcher.handle();
    let watcher_tx = queue_tx.clone();
    let watcher_fail_tx = queue_tx.clone();
    let watcher_thread = thread::spawn(move || {
        let result = watcher.run(watcher_tx);
        if let Err(e) = &result {
            error!(error = %e, "disk watcher failed");
            let _ = watcher_fail_tx.send(OrchestratorCommand::Shutdown);
        }
        result
    });

    let terminal = TerminalFrontEnd::new();
    let reader_terminal = terminal.clone();
    let reader_tx = queue_tx;
    thread::spawn(move || read_commands(reader_terminal, reader_tx));

    println!("watching for devices; type 'help' for commands");
    let mut orchestrator = MountOrchestrator::new(
        Box::new(PrivilegedExecutor::new(config.escalation)),
        Box::new(ProcMounts::default()),
        terminal,
        config,
    );
    orchestrator.run(queue_rx);

    watcher_handle.stop();
    match watcher_thread.join() {
        Ok(result) => result,
        Err(_) => Ok(()),
    }
}

/// Parses stdin commands into queue traffic until EOF or "quit".
fn read_commands(terminal: TerminalFrontEnd, queue: mpsc::Sender<OrchestratorCommand>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            [] => {}
            ["help"] => {
                println!("commands:");
                println!("  list                        show known devices");
                println!("  mount <node> [fstype] <dir> mount a device");
                println!("  umount <node>               unmount a device");
                println!("  quit                        exit");
            }
            ["list"] => terminal.print_devices(),
            ["mount", node, rest @ ..] => {
                let (fs_type, mount_point) = match *rest {
                    [dir] => (None, Some(dir.to_string())),
                    [fs, dir] => (Some(fs.to_string()), Some(dir.to_string())),
                    _ => (None, None),
                };
                terminal.seed_prompts(PromptSeed {
                    fs_type,
                    mount_point,
                    confirm_unmount: false,
                });
                if send_toggle(&queue, node).is_err() {
                    break;
                }
            }
            ["umount" | "unmount", node] => {
                terminal.seed_prompts(PromptSeed {
                    fs_type: None,
                    mount_point: None,
                    confirm_unmount: true,
                });
                if send_toggle(&queue, node).is_err() {
                    break;
                }
            }
            ["quit" | "exit"] => break,
            _ => println!("unknown command; type 'help'"),
        }
    }

    let _ = queue.send(OrchestratorCommand::Shutdown);
}

fn send_toggle(
    queue: &mpsc::Sender<OrchestratorCommand>,
    node_path: &str,
) -> Result<(), mpsc::SendError<OrchestratorCommand>> {
    queue.send(OrchestratorCommand::ToggleRequested {
        node_path: node_path.to_string(),
    })
}
