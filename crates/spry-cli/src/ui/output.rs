//! Terminal implementation of the engine's [`Reporter`].
//!
//! Every call becomes a [`UiEvent`] for the actor thread, so reporting never
//! blocks an install task on the terminal.

use std::sync::{Arc, mpsc};

use semver::Version;
use spry_core::Reporter;
use spry_schema::PackageName;

use super::actor::{UiActor, UiEvent};

/// A cloneable handle for sending UI events to the terminal actor.
#[derive(Debug, Clone)]
pub struct Output {
    sender: mpsc::Sender<UiEvent>,
    // Keeps the actor alive while any handle exists.
    _actor: Arc<UiActor>,
}

impl Output {
    pub fn new(quiet: bool) -> Self {
        let actor = UiActor::spawn(quiet);
        Self {
            sender: actor.sender(),
            _actor: Arc::new(actor),
        }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.sender.send(event);
    }

    pub fn success(&self, msg: &str) {
        self.send(UiEvent::Success(msg.to_string()));
    }

    pub fn error(&self, msg: &str) {
        self.send(UiEvent::Error(msg.to_string()));
    }

    /// Wait until everything sent so far has been printed.
    pub async fn wait(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(UiEvent::Sync(tx));
        let _ = rx.await;
    }
}

impl Reporter for Output {
    fn resolved(&self, name: &PackageName, version: &Version, platform: &str, url: &str) {
        self.send(UiEvent::Resolved {
            name: name.clone(),
            version: version.clone(),
            platform: platform.to_string(),
            url: url.to_string(),
        });
    }

    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        self.send(UiEvent::Downloading {
            name: name.clone(),
            version: version.clone(),
            current,
            total,
        });
    }

    fn installing(&self, name: &PackageName, version: &Version) {
        self.send(UiEvent::Installing {
            name: name.clone(),
            version: version.clone(),
        });
    }

    fn verifying(&self, name: &PackageName, version: &Version) {
        self.send(UiEvent::Verifying {
            name: name.clone(),
            version: version.clone(),
        });
    }

    fn done(&self, name: &PackageName, version: &Version, detail: &str) {
        self.send(UiEvent::Done {
            name: name.clone(),
            version: version.clone(),
            detail: detail.to_string(),
        });
    }

    fn failed(&self, name: &PackageName, version: &Version, reason: &str) {
        self.send(UiEvent::Failed {
            name: name.clone(),
            version: version.clone(),
            reason: reason.to_string(),
        });
    }

    fn info(&self, msg: &str) {
        self.send(UiEvent::Info(msg.to_string()));
    }

    fn warning(&self, msg: &str) {
        self.send(UiEvent::Warning(msg.to_string()));
    }
}
