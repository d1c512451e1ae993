//! mcp-installer - MCP Installer CLI

use std::io::{BufRead, Write};
use std::path::Path;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dialoguer::Input;
use mcp_installer::bridge::strip_ansi;
use mcp_installer::{
    fetch_servers, logging, merge_client_config, run_install, BridgeHandle, CatalogServer, Client,
    InstallNotice, InstallOutcome, InstallUi, InstallerCommand, Paths, ProcessBridge, PromptReply,
    DEFAULT_PAGE_SIZE,
};

#[derive(Parser)]
#[command(name = "mcp-installer")]
#[command(about = "MCP Installer - browse the Smithery catalog and install MCP servers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the server catalog
    Browse {
        /// Search text (omit to list the first page)
        query: Option<String>,

        /// Number of entries to request
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Install a server through the installer CLI
    Install {
        /// Qualified server name (e.g. @acme/weather)
        qualified_name: String,

        /// Client to register the server with
        #[arg(long, value_enum, default_value_t = Client::Claude)]
        client: Client,

        /// Stream raw installer output and forward stdin instead of asking each question
        #[arg(long)]
        terminal: bool,
    },

    /// Merge the installer-written config into the client config
    SyncConfig,

    /// Show resolved paths (for debugging)
    Paths,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);
    let paths = Paths::resolve();

    match cli.command {
        Commands::Paths => {
            println!("Catalog URL:    {}", paths.catalog_url);
            println!("Runner home:    {}", paths.runner_home().display());
            println!("Runner config:  {}", paths.runner_config().display());
            println!("Client config:  {}", paths.client_config().display());
            println!("npx:            {}", mcp_installer::locate_npx(&paths).display());
            println!("Runner ready:   {}", mcp_installer::runner_ready(&paths));
        }
        Commands::Browse { query, page_size, json } => {
            let servers = match fetch_servers(&paths.catalog_url, query.as_deref(), page_size) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", error_chain(&e));
                    process::exit(1);
                }
            };

            if json {
                match serde_json::to_string_pretty(&servers) {
                    Ok(output) => println!("{output}"),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        process::exit(1);
                    }
                }
            } else if servers.is_empty() {
                println!("No servers found.");
            } else {
                print_browse_table(&servers);
            }
        }
        Commands::Install {
            qualified_name,
            client,
            terminal,
        } => {
            let code = install(&paths, &qualified_name, client, terminal);
            process::exit(code);
        }
        Commands::SyncConfig => {
            match merge_client_config(&paths.runner_config(), paths.client_config()) {
                Ok(names) if names.is_empty() => println!("No servers to merge."),
                Ok(names) => {
                    println!("Merged into {}:", paths.client_config().display());
                    for name in names {
                        println!("  {}", name);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", error_chain(&e));
                    process::exit(1);
                }
            }
        }
    }
}

fn install(paths: &Paths, qualified_name: &str, client: Client, terminal: bool) -> i32 {
    #[cfg(target_os = "linux")]
    {
        if let Err(message) = bootstrap_runner(paths) {
            eprintln!("Setup failed: {}", message);
            return 1;
        }
    }

    let command = InstallerCommand::new(qualified_name, client)
        .with_npx(mcp_installer::locate_npx(paths))
        .command_line();
    let bridge = ProcessBridge::default();

    println!("Installing {} with client: {}...", qualified_name, client);
    if terminal {
        println!("> {}\n", command);
    }

    let result = if terminal {
        run_install(&bridge, &command, &mut TerminalUi)
    } else {
        run_install(&bridge, &command, &mut DialogUi::default())
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", error_chain(&e));
            return 1;
        }
    };

    report(paths, &outcome);
    if outcome.success() {
        0
    } else {
        1
    }
}

#[cfg(target_os = "linux")]
fn bootstrap_runner(paths: &Paths) -> Result<(), String> {
    use dialoguer::Password;
    use mcp_installer::elevation::{ensure_runner_dir, is_elevated, runner_ready};

    if runner_ready(paths) {
        return Ok(());
    }
    println!(
        "The installer needs to create {}. This requires sudo access and will only happen once.",
        paths.runner_home().display()
    );

    let password = if is_elevated() {
        None
    } else {
        let password = Password::new()
            .with_prompt("Please enter your sudo password")
            .interact()
            .map_err(|e| e.to_string())?;
        if password.is_empty() {
            return Err("no password entered".to_string());
        }
        Some(password)
    };

    ensure_runner_dir(paths, password.as_deref())
        .map_err(|e| format!("Failed to create directories: {}", e))
}

fn report(paths: &Paths, outcome: &InstallOutcome) {
    if outcome.installed {
        // The installer may still be flushing its config file.
        std::thread::sleep(Duration::from_secs(1));
        let source = paths.runner_config();
        match merge_client_config(&source, paths.client_config()) {
            Ok(_) => {
                println!(
                    "Installation completed successfully!\n\nPlease restart Claude to use the new MCP."
                );
            }
            Err(e) => {
                eprintln!("Installation completed but config setup failed.");
                eprintln!("Try running the installer with sudo once.");
                eprintln!("\nDebug info: {}", error_chain(&e));
                print_config_debug(&source);
            }
        }
        return;
    }

    if !outcome.success() {
        eprintln!("Installation failed: {}", outcome.exit.completion_message());
        for warning in &outcome.warnings {
            eprintln!("  {}", warning);
        }
    }
}

fn print_config_debug(source: &Path) {
    match std::fs::read_to_string(source) {
        Ok(config) => eprintln!("Config exists at {}\nContents: {}", source.display(), config),
        Err(e) if source.exists() => eprintln!("Failed to read config: {}", e),
        Err(_) => eprintln!("Config not found at {}", source.display()),
    }
}

/// Asks each surfaced question with an input prompt.
#[derive(Default)]
struct DialogUi {
    last_warning: Option<String>,
}

impl InstallUi for DialogUi {
    fn output(&mut self, text: &str) {
        tracing::debug!(output = ?text, "installer output");
    }

    fn prompt(&mut self, prompt: &str) -> PromptReply {
        let answer = Input::<String>::new()
            .with_prompt(prompt.trim_end_matches(':').trim())
            .allow_empty(true)
            .interact_text();
        match answer {
            Ok(text) => PromptReply::Answer(text),
            Err(e) => {
                eprintln!("Cancelled: {}", e);
                PromptReply::Cancel
            }
        }
    }

    fn notice(&mut self, notice: &InstallNotice) {
        if let InstallNotice::Warning(text) = notice {
            if self.last_warning.as_deref() != Some(text.as_str()) {
                eprintln!("Warning: {}", text);
                self.last_warning = Some(text.clone());
            }
        }
    }
}

/// Streams raw installer output and forwards stdin lines to the installer.
struct TerminalUi;

impl InstallUi for TerminalUi {
    fn started(&mut self, handle: &BridgeHandle) {
        let handle = handle.clone();
        let spawned = std::thread::Builder::new()
            .name("stdin-forward".to_string())
            .spawn(move || forward_stdin(handle));
        if let Err(e) = spawned {
            eprintln!("Warning: cannot forward input: {}", e);
        }
    }

    fn output(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn prompt(&mut self, _prompt: &str) -> PromptReply {
        PromptReply::Ignore
    }
}

fn forward_stdin(handle: BridgeHandle) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = strip_ansi(&line);
        if handle.send_reply(line.trim()).is_err() {
            break;
        }
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        out.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    out
}

fn print_browse_table(servers: &[CatalogServer]) {
    const INDENT: &str = "        ";

    for s in servers {
        println!("{}", s.qualified_name);
        println!("{}Name:     {}", INDENT, s.title());
        if !s.description.is_empty() {
            println!("{}Summary:  {}", INDENT, s.description.lines().next().unwrap_or("").trim());
        }
        println!("{}Install:  {}", INDENT, s.install_command());
        println!("{}Page:     {}", INDENT, s.page_url());
        println!();
    }
}
