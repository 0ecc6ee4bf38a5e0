use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::data_uri::read_asset;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{AssetKind, Attachment};

/// Identifies one staging request: the draft session it belongs to, its
/// submission order, and the slot it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTicket {
    pub session: u64,
    pub seq: u64,
    pub kind: AssetKind,
}

pub struct AssetRequest {
    pub ticket: StageTicket,
    pub path: PathBuf,
}

pub struct AssetLoaded {
    pub ticket: StageTicket,
    pub result: CatalogResult<Attachment>,
}

/// Reads files on a background thread and hands back their embedded form.
pub struct AssetLoader {
    request_tx: Sender<AssetRequest>,
    response_rx: Receiver<AssetLoaded>,
}

impl AssetLoader {
    /// `notify` runs after every completed read, typically to wake the UI.
    pub fn spawn<F>(notify: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<AssetRequest>();
        let (response_tx, response_rx) = mpsc::channel::<AssetLoaded>();
        std::thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                let result = read_asset(&request.path);
                if let Err(err) = &result {
                    log::warn!("staging {} failed: {err}", request.path.display());
                }
                if response_tx
                    .send(AssetLoaded {
                        ticket: request.ticket,
                        result,
                    })
                    .is_err()
                {
                    break;
                }
                notify();
            }
        });

        Self {
            request_tx,
            response_rx,
        }
    }

    pub fn submit(&self, ticket: StageTicket, path: PathBuf) -> CatalogResult<()> {
        self.request_tx
            .send(AssetRequest { ticket, path })
            .map_err(|err| CatalogError::Storage(format!("asset reader stopped: {err}")))
    }

    /// Returns every result that has arrived so far without blocking.
    pub fn drain(&self) -> Vec<AssetLoaded> {
        let mut loaded = Vec::new();
        loop {
            match self.response_rx.try_recv() {
                Ok(item) => loaded.push(item),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        loaded
    }

    /// Blocks for the next result. Used by tests and headless callers.
    pub fn recv(&self) -> Option<AssetLoaded> {
        self.response_rx.recv().ok()
    }
}
