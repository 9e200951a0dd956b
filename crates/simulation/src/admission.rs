//! Entry-kiosk admission: plate in, accept/reject verdict out.
//!
//! The kiosk side blocks on [`AdmissionClient::request`] with a fixed
//! timeout. The core consumes at most one pending plate per vehicle creation
//! and answers on the shared verdict channel; a request that never matches a
//! track in the entry corridor simply times out on the caller's side, and
//! the core's own state stays authoritative.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use bevy::prelude::*;
use thiserror::Error;

use crate::config::{ADMISSION_TIMEOUT_SECS, PLATE_LEN};

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("plate {0:?} is not a valid kiosk plate")]
    InvalidPlate(String),
    #[error("no admission verdict within the timeout")]
    TimedOut,
    #[error("admission channel closed")]
    Closed,
}

/// Pending kiosk plates waiting for an unmatched track in the entry
/// corridor, plus the channel verdicts go out on.
#[derive(Resource, Default)]
pub struct AdmissionQueue {
    pub pending: VecDeque<String>,
    pub responder: Option<Sender<bool>>,
}

impl AdmissionQueue {
    pub fn push(&mut self, plate: String) {
        self.pending.push_back(plate);
    }

    pub fn respond(&self, accepted: bool) {
        if let Some(responder) = &self.responder {
            if responder.send(accepted).is_err() {
                debug!("admission verdict dropped, caller went away");
            }
        }
    }
}

/// Caller-side handle used by the entry kiosk.
pub struct AdmissionClient {
    requests: Sender<String>,
    verdicts: Receiver<bool>,
}

impl AdmissionClient {
    pub fn new(requests: Sender<String>, verdicts: Receiver<bool>) -> Self {
        Self { requests, verdicts }
    }

    /// Submit a plate and block for the core's verdict. `Ok(false)` means the
    /// lot is full. On timeout the caller must not assume the vehicle was or
    /// wasn't admitted.
    pub fn request(&mut self, plate: &str) -> Result<bool, AdmissionError> {
        if plate.chars().count() != PLATE_LEN {
            return Err(AdmissionError::InvalidPlate(plate.to_string()));
        }
        // Verdicts for requests that already timed out must not be handed to
        // this caller.
        while self.verdicts.try_recv().is_ok() {}
        self.requests
            .send(plate.to_string())
            .map_err(|_| AdmissionError::Closed)?;
        match self.verdicts.recv_timeout(Duration::from_secs(ADMISSION_TIMEOUT_SECS)) {
            Ok(accepted) => Ok(accepted),
            Err(RecvTimeoutError::Timeout) => Err(AdmissionError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(AdmissionError::Closed),
        }
    }
}
