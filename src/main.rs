use clap::Parser;
use colored::*;
use env_logger::{Builder, Env, Target};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rflaunch::cli::{Cli, Commands, ReplCommand};
use rflaunch::config::Config;
use rflaunch::dispatch::DispatchOutcome;
use rflaunch::error::{Result as RflaunchResult, RflaunchError};
use rflaunch::protocol::HostApi;
use rflaunch::ranking::PINNED_SCORE;
use rflaunch::result::{PluginResult, ResultSummary};
use rflaunch::Launcher;
use std::fs;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

fn main() -> RflaunchResult<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    let start_time = Instant::now();
    info!("Application started with command: {}", cli.command.name());

    let config = Config::load(cli.config.as_deref())?;
    let host = Arc::new(ConsoleHost::default());
    let launcher = Arc::new(Launcher::new(
        config,
        &cli.plugin_dirs,
        Arc::clone(&host) as Arc<dyn HostApi>,
    )?);

    match &cli.command {
        Commands::Query { text, json, run } => {
            run_query(&launcher, &host, &text.join(" "), *json, *run)?;
        }
        Commands::Plugins { json } => list_plugins(&launcher, *json)?,
        Commands::Repl => run_repl(&launcher, &host)?,
    }

    launcher.save()?;
    info!(
        "Application finished. Total elapsed time: {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

fn setup_logging(cli: &Cli) -> RflaunchResult<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir).map_err(RflaunchError::Io)?;
            }
        }
        let log_file = fs::File::create(log_path).map_err(RflaunchError::Io)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| RflaunchError::Other(e.to_string()))?;
    Ok(())
}

/// Host API as seen from a terminal.
#[derive(Default)]
struct ConsoleHost {
    pending_query: Mutex<Option<String>>,
}

impl ConsoleHost {
    fn take_pending_query(&self) -> Option<String> {
        self.pending_query.lock().take()
    }
}

impl HostApi for ConsoleHost {
    fn change_query(&self, query: &str, requery: bool) {
        println!("{} {}", "Query changed to:".cyan(), query);
        if requery {
            *self.pending_query.lock() = Some(query.to_string());
        }
    }

    fn show_message(&self, title: &str, subtitle: &str, _icon_path: &str) {
        if subtitle.is_empty() {
            println!("{}", title.bold());
        } else {
            println!("{} {}", title.bold(), subtitle.dimmed());
        }
    }

    fn copy_to_clipboard(&self, text: &str) {
        let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
        match copied {
            Ok(()) => println!("{}", "Copied to clipboard!".green()),
            Err(e) => warn!("Clipboard unavailable: {e}"),
        }
    }

    fn hide_app(&self) {
        debug!("Host asked to hide the launcher");
    }

    fn show_app(&self) {
        debug!("Host asked to show the launcher");
    }

    fn reload_plugin_data(&self) {
        println!("{}", "Plugin data reload requested".yellow());
    }
}

fn run_query(
    launcher: &Launcher,
    host: &ConsoleHost,
    text: &str,
    json: bool,
    run: Option<usize>,
) -> RflaunchResult<()> {
    let Some(outcome) = launcher.query(text, |batch| {
        debug!("{} result(s) so far", batch.results.len());
    }) else {
        println!("{}", "Empty query".yellow());
        return Ok(());
    };

    let results = match outcome {
        DispatchOutcome::Completed(batch) => batch.results,
        DispatchOutcome::Superseded { generation } => {
            println!("{}", format!("Query {generation} was cancelled").yellow());
            return Ok(());
        }
    };

    if json {
        let summaries: Vec<ResultSummary<'_>> = results.iter().map(ResultSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print_results(&results);
    }

    if let Some(n) = run {
        let result = nth_result(&results, n)?;
        let hide = launcher.execute(result)?;
        debug!("Action of '{}' finished, hide window: {}", result.title, hide);
        if let Some(next) = host.take_pending_query() {
            println!("{} {}", "Plugin requested a new query:".cyan(), next);
        }
    }
    Ok(())
}

fn print_results(results: &[PluginResult]) {
    if results.is_empty() {
        println!("{}", "No results".yellow());
        return;
    }
    for (i, result) in results.iter().enumerate() {
        let score = if result.score == PINNED_SCORE {
            "pinned".magenta().to_string()
        } else {
            result.score.to_string()
        };
        println!(
            "{:>3}. {} {}",
            (i + 1).to_string().cyan(),
            result.title.bold(),
            format!("[{} {}]", result.plugin_id, score).dimmed()
        );
        if !result.subtitle.is_empty() {
            println!("     {}", result.subtitle.dimmed());
        }
    }
}

fn nth_result(results: &[PluginResult], n: usize) -> RflaunchResult<&PluginResult> {
    n.checked_sub(1)
        .and_then(|i| results.get(i))
        .ok_or_else(|| RflaunchError::Other(format!("there is no result {n}")))
}

fn list_plugins(launcher: &Launcher, json: bool) -> RflaunchResult<()> {
    let descriptors = launcher.registry().descriptors();
    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }
    if descriptors.is_empty() {
        println!("{}", "No plugins loaded".yellow());
        return Ok(());
    }

    println!("\n{}", "Plugins:".green().bold());
    for descriptor in &descriptors {
        let keywords: Vec<String> = descriptor
            .action_keywords
            .iter()
            .map(|k| k.to_string())
            .collect();
        let state = if descriptor.disabled {
            "disabled".red()
        } else {
            "enabled".green()
        };
        let icon = match launcher.plugin_icon(descriptor) {
            Some(image) => format!("icon {:?}", image.source()).to_lowercase(),
            None => "no icon".to_string(),
        };
        println!(
            "  {} {} ({}, {}) [{}] {}",
            descriptor.id.cyan(),
            descriptor.name,
            descriptor.language,
            state,
            keywords.join(" "),
            icon.dimmed()
        );
    }
    Ok(())
}

fn run_repl(launcher: &Arc<Launcher>, host: &Arc<ConsoleHost>) -> RflaunchResult<()> {
    {
        let launcher = Arc::clone(launcher);
        ctrlc::set_handler(move || {
            launcher.cancel();
            eprintln!("{}", "(cancelled)".yellow());
        })
        .map_err(|e| RflaunchError::Other(format!("failed to install Ctrl-C handler: {e}")))?;
    }

    println!(
        "{}",
        "Type a query, or :help for commands. Ctrl-C cancels a running query.".dimmed()
    );

    let mut in_flight: Option<JoinHandle<()>> = None;
    for line in io::stdin().lock().lines() {
        let line = line?;
        if let Some(command) = line.strip_prefix(':') {
            wait_for(&mut in_flight);
            match ReplCommand::parse(command) {
                Ok(ReplCommand::Quit) => break,
                Ok(command) => {
                    if let Err(e) = handle_command(launcher, command) {
                        eprintln!("{}", e.to_string().red());
                    }
                }
                Err(message) => eprintln!("{}", message.red()),
            }
            if let Some(next) = host.take_pending_query() {
                in_flight = Some(spawn_query(launcher, next));
            }
            continue;
        }
        // The previous generation is cancelled by the next dispatch and its
        // thread finishes on its own.
        in_flight = Some(spawn_query(launcher, line));
    }
    wait_for(&mut in_flight);
    Ok(())
}

fn spawn_query(launcher: &Arc<Launcher>, text: String) -> JoinHandle<()> {
    let launcher = Arc::clone(launcher);
    thread::spawn(move || match launcher.query(&text, |_| {}) {
        Some(DispatchOutcome::Completed(batch)) => {
            if launcher.view().generation() == batch.generation {
                print_results(&batch.results);
            }
        }
        Some(DispatchOutcome::Superseded { generation }) => {
            debug!("Generation {generation} superseded");
        }
        None => {}
    })
}

fn wait_for(in_flight: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = in_flight.take() {
        if handle.join().is_err() {
            warn!("Query thread panicked");
        }
    }
}

fn handle_command(launcher: &Launcher, command: ReplCommand) -> RflaunchResult<()> {
    match command {
        ReplCommand::Run(n) => {
            let results = launcher.results();
            let result = nth_result(&results, n)?;
            let hide = launcher.execute(result)?;
            debug!("Action of '{}' finished, hide window: {}", result.title, hide);
        }
        ReplCommand::Menu(n) => {
            let results = launcher.results();
            let items = launcher.context_menu(nth_result(&results, n)?)?;
            print_results(&items);
        }
        ReplCommand::Pin(n) => {
            let results = launcher.results();
            let result = nth_result(&results, n)?;
            if launcher.pin(result) {
                println!("{} {}", "Pinned".green(), result.title);
            }
        }
        ReplCommand::Unpin => {
            let raw = launcher
                .results()
                .first()
                .and_then(|r| r.origin_query.clone());
            match raw {
                Some(raw) if launcher.unpin(&raw) => println!("{} '{}'", "Unpinned".green(), raw),
                _ => println!("{}", "Nothing pinned for this query".yellow()),
            }
        }
        ReplCommand::Enable(id) => launcher.registry().set_disabled(&id, false)?,
        ReplCommand::Disable(id) => launcher.registry().set_disabled(&id, true)?,
        ReplCommand::AddKeyword { plugin_id, keyword } => {
            launcher.registry().add_keyword(&plugin_id, &keyword)?
        }
        ReplCommand::RemoveKeyword { plugin_id, keyword } => {
            launcher.registry().remove_keyword(&plugin_id, &keyword)?
        }
        ReplCommand::Stats => {
            println!("\n{}", "Plugin statistics:".green().bold());
            for (id, stats) in launcher.telemetry().snapshot() {
                println!(
                    "  {}: {} call(s), {} failure(s), {:.1}ms avg",
                    id.cyan(),
                    stats.invocations,
                    stats.failures,
                    stats.avg_time_ms
                );
            }
            debug!("{}", launcher.telemetry().gather());
        }
        ReplCommand::Help => {
            println!(":run N        run the action of result N");
            println!(":menu N       show the context menu of result N");
            println!(":pin N        always rank result N first for this query");
            println!(":unpin        remove the pin for this query");
            println!(":enable ID    enable a plugin");
            println!(":disable ID   disable a plugin");
            println!(":keyword add|remove ID KW");
            println!(":stats        per-plugin call statistics");
            println!(":quit");
        }
        ReplCommand::Quit => {}
    }
    Ok(())
}
