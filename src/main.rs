mod core;
mod i18n;
mod plugins;

use crate::core::bridge::{self, UiReceiver};
use crate::core::config::AppConfig;
use crate::core::engine::BatchOrchestrator;
use crate::core::events::{BatchEvent, ProgressEvent, StatusMessage};
use crate::core::model::{BatchOutcome, BatchRequest, BatchStatus};
use crate::core::progress::{fmt_bytes, ProgressView};
use crate::core::session::Session;
use crate::core::store::OutputPathStore;
use crate::core::targets::TargetSource;
use crate::i18n::{Locale, Messages};
use crate::plugins::registry::{DriverContext, PluginRegistry};
use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn, Level};

fn build_cli(registry: &PluginRegistry) -> Command {
    let download = Command::new("download")
        .about("Download links one after another (Ctrl-C halts after the current file)")
        .arg(
            Arg::new("links")
                .help("Links or playlists to download; read from stdin when omitted")
                .action(ArgAction::Append)
                .num_args(1..),
        )
        .arg(
            Arg::new("bulk")
                .long("bulk")
                .help("Read links from the configured bulk file instead")
                .action(ArgAction::SetTrue)
                .conflicts_with("links"),
        )
        .arg(
            Arg::new("quality")
                .long("quality")
                .short('q')
                .help("Quality label, e.g. 1080p, 720p, 'Audio Only (MP3)' (default: first configured)")
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Output root for this run (default: saved or configured path)")
                .num_args(1),
        );

    let download = registry.augment_download_command(download);

    Command::new("zenith")
        .about("Sequential batch video downloader")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("JSON configuration file")
                .default_value("config.json")
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("Interface language (en, zh)")
                .default_value("en")
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("More log output on stderr (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(download)
        .subcommand(Command::new("formats").about("List configured quality labels"))
        .subcommand(
            Command::new("output-dir")
                .about("Show the output directory, or save a new one")
                .arg(Arg::new("path").help("Directory to remember").num_args(1)),
        )
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let registry = PluginRegistry::with_defaults();
    let app = build_cli(&registry);
    let matches = app.get_matches();

    init_tracing(matches.get_count("verbose"));

    let locale = Locale::from_str(matches.get_one::<String>("locale").map(String::as_str).unwrap_or("en"));
    let msgs = i18n::get_messages(locale);
    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path).await;
    let store = OutputPathStore::new(config.general.output_path_file.clone());

    match matches.subcommand() {
        Some(("download", m)) => download(registry, &config, &store, m, msgs).await,
        Some(("formats", _)) => {
            for (label, spec) in config.formats() {
                println!("{label}\t{spec}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("output-dir", m)) => {
            match m.get_one::<String>("path") {
                Some(path) => {
                    let dir = PathBuf::from(path);
                    tokio::fs::create_dir_all(&dir)
                        .await
                        .with_context(|| format!("create {}", dir.display()))?;
                    let dir = tokio::fs::canonicalize(&dir).await.unwrap_or(dir);
                    store.save(&dir).await?;
                    println!("{}", dir.display());
                }
                None => {
                    let dir = store.load_or(&config.downloader.default_output_path).await;
                    println!("{}", dir.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

async fn download(
    registry: PluginRegistry,
    config: &AppConfig,
    store: &OutputPathStore,
    m: &ArgMatches,
    msgs: &'static Messages,
) -> anyhow::Result<ExitCode> {
    let mut driver_ctx = DriverContext::default();
    registry.apply_download_matches(m, &mut driver_ctx)?;

    let format = config.format_for(m.get_one::<String>("quality").map(String::as_str))?;
    let root = match m.get_one::<String>("out_dir") {
        Some(dir) => PathBuf::from(dir),
        None => store.load_or(&config.downloader.default_output_path).await,
    };
    tokio::fs::create_dir_all(&root)
        .await
        .with_context(|| format!("create output root {}", root.display()))?;

    let source = if m.get_flag("bulk") {
        TargetSource::Bulk(config.downloader.bulk_mode_file.clone())
    } else {
        let text = match m.get_many::<String>("links") {
            Some(links) => links.cloned().collect::<Vec<_>>().join("\n"),
            None => read_links_from_stdin(msgs).await?,
        };
        TargetSource::Manual(text)
    };

    println!("{} :: {} {}", config.general.app_name, msgs.by, config.general.author);
    println!("{}: {}", msgs.output_label, root.display());

    let (bridge, rx) = bridge::channel();
    let ui_task = tokio::spawn(render_events(rx, msgs));

    let session = Session::new();
    let guard = session.begin(&bridge)?;
    let _ = bridge.forward(BatchEvent::Status(StatusMessage::Standby));

    let halter = session.clone();
    let halt_bridge = bridge.clone();
    let signal_task = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if halter.halt() {
                info!("halt requested");
                let _ = halt_bridge.forward(BatchEvent::Status(StatusMessage::HaltRequested));
            }
        }
    });

    let resolved = source
        .resolve(config.downloader.manual_mode_url_limit)
        .await
        .and_then(|targets| BatchRequest::new(targets, format, config.layout(root.clone())));

    let outcome = match resolved {
        Ok(request) => {
            let orchestrator = BatchOrchestrator::new(Arc::new(registry), driver_ctx, bridge.clone());
            let token = guard.token();
            let worker = tokio::spawn(async move { orchestrator.run(request, token).await });
            match worker.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(error = %e, "batch worker died");
                    let _ = bridge.forward(BatchEvent::Status(StatusMessage::Critical { message: e.to_string() }));
                    None
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "nothing to download");
            let _ = bridge.forward(BatchEvent::Status(StatusMessage::Resolution(e)));
            None
        }
    };

    signal_task.abort();
    drop(guard);
    let _ = ui_task.await;

    Ok(ExitCode::from(exit_code(outcome.as_ref())))
}

/// 0 clean run, 2 some targets skipped, 3 halted, 1 nothing ran or the batch failed.
fn exit_code(outcome: Option<&BatchOutcome>) -> u8 {
    match outcome {
        Some(o) if o.status == BatchStatus::Completed && o.failed == 0 => 0,
        Some(o) if o.status == BatchStatus::Completed => 2,
        Some(o) if o.status == BatchStatus::Halted => 3,
        _ => 1,
    }
}

async fn read_links_from_stdin(msgs: &Messages) -> anyhow::Result<String> {
    if std::io::stdin().is_terminal() {
        eprintln!("{}", msgs.paste_hint);
    }
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("read links from stdin")?;
    Ok(text)
}

/// Drains the bridge on the presentation side until controls are restored.
async fn render_events(mut rx: UiReceiver, msgs: &'static Messages) {
    let mp = MultiProgress::new();
    let sty_spin = ProgressStyle::with_template("{spinner:.green} {prefix} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("|/-\\ ");
    let sty_bar = ProgressStyle::with_template("{prefix} {bar:40.cyan/blue} {bytes}/{total_bytes} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut bar: Option<ProgressBar> = None;
    let mut view = ProgressView::default();
    let mut batch_status = BatchStatus::Idle;
    let mut results: Vec<(usize, String, Option<String>)> = Vec::new();

    while let Some(evt) = rx.recv().await {
        match evt {
            BatchEvent::BatchStatusChanged { batch_id, status } => {
                debug!(batch = %batch_id, from = ?batch_status, to = ?status, "batch status");
                batch_status = status;
                if batch_status.is_terminal() {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                }
            }
            BatchEvent::TargetStarted { index, total, url } => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                view.reset();
                let pb = mp.add(ProgressBar::new_spinner());
                pb.set_style(sty_spin.clone());
                pb.set_prefix(format!("[{index}/{total}]"));
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                pb.set_message(format!("{}: {}", msgs.target_label, url));
                bar = Some(pb);
            }
            BatchEvent::Progress { event, .. } => {
                view.apply(&event);
                let Some(pb) = bar.as_ref() else { continue };

                if let ProgressEvent::Finished { postprocessor: Some(pp), .. } = &event {
                    pb.set_message(format!("{} ({}) {}", msgs.post_processed, pp, view.title.as_deref().unwrap_or("")));
                    continue;
                }

                match view.total {
                    Some(t) => {
                        if pb.length() != Some(t) {
                            pb.set_style(sty_bar.clone());
                            pb.set_length(t);
                        }
                        pb.set_position(view.downloaded.unwrap_or(0).min(t));
                    }
                    None => pb.set_style(sty_spin.clone()),
                }
                let state = if view.complete {
                    msgs.status_done.to_string()
                } else {
                    format!("{:>5.1}% | {} | {} {}", view.percent(), view.speed, msgs.eta_label, view.eta)
                };
                pb.set_message(format!("{} | {}", state, view.title.as_deref().unwrap_or("")));
            }
            BatchEvent::TargetDone { index } => {
                if let Some(pb) = bar.take() {
                    pb.finish_with_message(format!("{} {}", msgs.status_done, view.title.as_deref().unwrap_or("")));
                }
                let size = view.total.map(fmt_bytes).unwrap_or_else(|| "?".to_string());
                results.push((index, format!("{} {}", msgs.status_done, size), view.title.clone()));
            }
            BatchEvent::TargetFailed { index, url, error } => {
                if let Some(pb) = bar.take() {
                    pb.abandon_with_message(format!("{}: {}", msgs.status_failed, error));
                }
                results.push((index, format!("{}: {}", msgs.status_failed, error), Some(url)));
            }
            BatchEvent::Status(msg) => {
                let _ = mp.println(format!("[{}] {}", msgs.prefix_for(&msg), msgs.status(&msg)));
            }
            BatchEvent::Finished(outcome) => {
                let _ = mp.println(String::new());
                let _ = mp.println(format!(
                    "{}: {:?} ({}/{})",
                    msgs.summary_header, outcome.status, outcome.processed, outcome.total
                ));
                for (index, status, name) in &results {
                    let _ = mp.println(format!("- #{} {} {}", index, status, name.as_deref().unwrap_or("")));
                }
            }
            BatchEvent::ControlsRestored => break,
        }
    }
}
