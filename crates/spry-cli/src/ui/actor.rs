//! UI Actor - single-threaded event processing
//!
//! Concurrent install tasks fire events at one thread that owns stdout, so
//! lines from different packages never interleave mid-line.

use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;

use crossterm::style::Stylize;
use semver::Version;
use spry_schema::PackageName;

use super::theme::{Theme, format_size};

#[derive(Debug)]
pub enum UiEvent {
    Resolved {
        name: PackageName,
        version: Version,
        platform: String,
        url: String,
    },
    Downloading {
        name: PackageName,
        version: Version,
        current: u64,
        total: Option<u64>,
    },
    Installing {
        name: PackageName,
        version: Version,
    },
    Verifying {
        name: PackageName,
        version: Version,
    },
    Done {
        name: PackageName,
        version: Version,
        detail: String,
    },
    Failed {
        name: PackageName,
        version: Version,
        reason: String,
    },
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// Acknowledged once every earlier event has been rendered.
    Sync(tokio::sync::oneshot::Sender<()>),
    Shutdown,
}

#[derive(Debug)]
pub struct UiActor {
    sender: mpsc::Sender<UiEvent>,
    _handle: thread::JoinHandle<()>,
}

impl UiActor {
    pub fn spawn(quiet: bool) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || run_event_loop(&receiver, quiet));
        Self {
            sender,
            _handle: handle,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<UiEvent> {
        self.sender.clone()
    }
}

impl Drop for UiActor {
    fn drop(&mut self) {
        let _ = self.sender.send(UiEvent::Shutdown);
    }
}

/// Renders one line per state change. In quiet mode only outcomes are shown.
fn run_event_loop(receiver: &mpsc::Receiver<UiEvent>, quiet: bool) {
    let theme = Theme::default();
    let icons = &theme.icons;
    let colors = &theme.colors;
    let mut downloading: HashSet<PackageName> = HashSet::new();

    let label = |name: &PackageName, version: &Version| {
        format!(
            "{} {}",
            format!("{:<w$}", name.as_str(), w = theme.layout.name_width).with(colors.package_name),
            format!("{version:<w$}", w = theme.layout.version_width).with(colors.version)
        )
    };

    while let Ok(event) = receiver.recv() {
        match event {
            UiEvent::Resolved {
                name,
                version,
                platform,
                url,
            } => {
                if !quiet {
                    println!(
                        "  {} {} {}",
                        icons.pending.with(colors.secondary),
                        label(&name, &version),
                        format!("{platform} {url}").with(colors.secondary)
                    );
                }
            }
            UiEvent::Downloading {
                name,
                version,
                current,
                total,
            } => {
                // Only the first chunk of each download is announced.
                if !quiet && current > 0 && downloading.insert(name.clone()) {
                    let size = total.map_or_else(|| "unknown size".to_string(), format_size);
                    println!(
                        "  {} {} {}",
                        icons.active.with(colors.secondary),
                        label(&name, &version),
                        format!("fetching ({size})").with(colors.secondary)
                    );
                }
            }
            UiEvent::Installing { name, version } => {
                if !quiet {
                    println!(
                        "  {} {} {}",
                        icons.active.with(colors.secondary),
                        label(&name, &version),
                        "installing".with(colors.secondary)
                    );
                }
            }
            UiEvent::Verifying { name, version } => {
                if !quiet {
                    println!(
                        "  {} {} {}",
                        icons.active.with(colors.secondary),
                        label(&name, &version),
                        "verifying".with(colors.secondary)
                    );
                }
            }
            UiEvent::Done {
                name,
                version,
                detail,
            } => {
                println!(
                    "  {} {} {}",
                    icons.success.with(colors.success),
                    label(&name, &version),
                    detail.with(colors.secondary)
                );
            }
            UiEvent::Failed {
                name,
                version,
                reason,
            } => {
                println!(
                    "  {} {} {}",
                    icons.error.with(colors.error),
                    label(&name, &version),
                    reason.with(colors.error)
                );
            }
            UiEvent::Info(msg) => {
                if !quiet {
                    println!("  {} {msg}", icons.info);
                }
            }
            UiEvent::Success(msg) => println!("\n  {}", msg.with(colors.success).bold()),
            UiEvent::Warning(msg) => {
                println!("  {} {}", icons.warning.with(colors.warning), msg.with(colors.warning));
            }
            UiEvent::Error(msg) => {
                eprintln!("  {} {}", icons.error.with(colors.error), msg.with(colors.error));
            }
            UiEvent::Sync(tx) => {
                let _ = tx.send(());
            }
            UiEvent::Shutdown => break,
        }
    }
}
