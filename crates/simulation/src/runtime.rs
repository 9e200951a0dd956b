//! The core worker: a headless app driven one update per tracking frame.
//!
//! All channels live here, at the boundary. The worker blocks on the frame
//! feed (waking periodically to honor shutdown), never blocks on publishing,
//! and always finishes a tick even with no consumer listening.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bevy::prelude::*;

use crate::admission::{AdmissionClient, AdmissionQueue};
use crate::allocation::{ExitNotice, ExitNotices, SeedPending, TrackingFrame};
use crate::config::{SHUTDOWN_POLL_MS, SNAPSHOT_CHANNEL_CAPACITY, WARMUP_FRAMES};
use crate::lot::{LayoutError, LotLayout, LotMap};
use crate::snapshot::{CurrentSnapshot, DisplayFrame, LotSnapshot};
use crate::SimulationPlugin;

pub struct RuntimeConfig {
    /// Tracking frames discarded before the seeding frame, covering camera
    /// warm-up after process start.
    pub warmup_frames: usize,
    /// Buffered ticks per outbound channel before drops set in.
    pub snapshot_capacity: usize,
    /// Install the tracing log plugin on the internal app. Leave off when
    /// several runtimes share a process (tests).
    pub install_logger: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            warmup_frames: WARMUP_FRAMES,
            snapshot_capacity: SNAPSHOT_CHANNEL_CAPACITY,
            install_logger: false,
        }
    }
}

/// Cooperative stop signal, checked once per tick. No tick is interrupted
/// mid-mutation.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_signaled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Everything the outside world holds onto: feed the tracker frames in, take
/// snapshots, display frames, and exit notices out, talk to admission.
pub struct LotHandles {
    pub frames: Sender<TrackingFrame>,
    pub snapshots: Receiver<Arc<LotSnapshot>>,
    pub displays: Receiver<DisplayFrame>,
    pub exits: Receiver<ExitNotice>,
    pub admission: AdmissionClient,
    pub shutdown: ShutdownHandle,
}

pub struct LotRuntime {
    // `bevy::App` is not `Send` (its runner box has no `Send` bound), so the
    // app cannot be moved into the worker thread. The layout is validated
    // eagerly in `new` and the resulting `LotMap` is carried here; the app is
    // built on the worker thread at the top of `run`.
    lot: Option<LotMap>,
    install_logger: bool,
    verdict_tx: Option<Sender<bool>>,
    frames: Receiver<TrackingFrame>,
    admission_requests: Receiver<String>,
    snapshots: SyncSender<Arc<LotSnapshot>>,
    displays: SyncSender<DisplayFrame>,
    exits: Sender<ExitNotice>,
    shutdown: ShutdownHandle,
    warmup_frames: usize,
}

impl LotRuntime {
    /// Build the runtime and its boundary channels. Fails fast on layout
    /// defects, before any thread starts.
    pub fn new(layout: &LotLayout, config: RuntimeConfig) -> Result<(Self, LotHandles), LayoutError> {
        // Validate the layout before any thread starts; the built map travels
        // to the worker thread, where the app is constructed.
        let lot = LotMap::from_layout(layout)?;

        let (frame_tx, frame_rx) = mpsc::channel();
        let (snapshot_tx, snapshot_rx) = mpsc::sync_channel(config.snapshot_capacity);
        let (display_tx, display_rx) = mpsc::sync_channel(config.snapshot_capacity);
        let (exit_tx, exit_rx) = mpsc::channel();
        let (request_tx, request_rx) = mpsc::channel();
        let (verdict_tx, verdict_rx) = mpsc::channel();

        let shutdown = ShutdownHandle::default();
        let runtime = Self {
            lot: Some(lot),
            install_logger: config.install_logger,
            verdict_tx: Some(verdict_tx),
            frames: frame_rx,
            admission_requests: request_rx,
            snapshots: snapshot_tx,
            displays: display_tx,
            exits: exit_tx,
            shutdown: shutdown.clone(),
            warmup_frames: config.warmup_frames,
        };
        let handles = LotHandles {
            frames: frame_tx,
            snapshots: snapshot_rx,
            displays: display_rx,
            exits: exit_rx,
            admission: AdmissionClient::new(request_tx, verdict_rx),
            shutdown,
        };
        Ok((runtime, handles))
    }

    /// `new` plus a dedicated worker thread running the tick loop.
    pub fn spawn(
        layout: &LotLayout,
        config: RuntimeConfig,
    ) -> Result<(JoinHandle<()>, LotHandles), LayoutError> {
        let (runtime, handles) = Self::new(layout, config)?;
        let join = std::thread::spawn(move || runtime.run());
        Ok((join, handles))
    }

    /// Build the headless app on the worker thread. `App` is not `Send`, so it
    /// is constructed here rather than carried across the thread boundary.
    fn build_app(&mut self) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        if self.install_logger {
            app.add_plugins(bevy::log::LogPlugin::default());
        }
        app.insert_resource(self.lot.take().expect("lot map already consumed"));
        app.add_plugins(SimulationPlugin);
        app.world_mut().resource_mut::<AdmissionQueue>().responder = self.verdict_tx.take();
        app
    }

    /// The tick loop: block for the next frame, advance the automaton,
    /// publish. Returns when shut down or when the tracking feed closes.
    pub fn run(mut self) {
        let mut app = self.build_app();
        let poll = Duration::from_millis(SHUTDOWN_POLL_MS);

        let mut discarded = 0;
        while discarded < self.warmup_frames {
            if self.shutdown.is_signaled() {
                return;
            }
            match self.frames.recv_timeout(poll) {
                Ok(_) => discarded += 1,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        app.world_mut().resource_mut::<SeedPending>().0 = true;

        loop {
            if self.shutdown.is_signaled() {
                info!("shutdown requested, core stopping");
                return;
            }
            let frame = match self.frames.recv_timeout(poll) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("tracking feed closed, core stopping");
                    return;
                }
            };
            self.tick(&mut app, frame);
        }
    }

    fn tick(&self, app: &mut App, frame: TrackingFrame) {
        // Admission intake is non-blocking; pending plates wait in the queue
        // resource until an unmatched track shows up in the entry corridor.
        while let Ok(plate) = self.admission_requests.try_recv() {
            app.world_mut().resource_mut::<AdmissionQueue>().push(plate);
        }

        app.insert_resource(frame);
        app.update();

        let world = app.world_mut();
        let notices = std::mem::take(&mut world.resource_mut::<ExitNotices>().0);
        for notice in notices {
            if self.exits.send(notice).is_err() {
                debug!("exit notice dropped, consumer gone");
            }
        }

        if let Some(snapshot) = world.resource::<CurrentSnapshot>().0.clone() {
            match self.displays.try_send(snapshot.displays.clone()) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => debug!("display consumer lagging, tick dropped"),
            }
            match self.snapshots.try_send(snapshot) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => debug!("snapshot consumer lagging, tick dropped"),
            }
        }
    }
}
