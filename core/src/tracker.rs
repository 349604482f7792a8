//! Én arbeidstråd eier en `Session`; alt går inn via en begrenset kommandokø.
//!
//! Lesere får et `Arc<TrackerSnapshot>` (copy-on-read) og blokkeres aldri av
//! en treg skriving. Høydeoppslag kjøres i egne tråder og kommer tilbake som
//! kommandoer.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::config::TrackerConfig;
use crate::elevation::{spawn_refinement, ElevationClient};
use crate::models::{Fix, Lap, SignalQuality, Totals};
use crate::session::Session;
use crate::types::{LiveStats, SessionStateKind, SessionSummary};

pub enum Command {
    Fix(Fix),
    Start,
    Pause,
    Resume,
    Stop(mpsc::Sender<SessionSummary>),
    Reset,
    /// Høyder for økten med gitt id; forkastes hvis økten er nullstilt siden.
    Elevations { session_id: String, updates: Vec<(usize, Option<f64>)> },
    SignalQuality(SignalQuality),
    Shutdown,
}

/// Uforanderlig øyeblikksbilde, publisert etter hver kommando.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub session_id: String,
    pub state: SessionStateKind,
    pub stats: LiveStats,
    pub totals: Totals,
    pub laps: Vec<Lap>,
    pub samples: usize,
    pub samples_with_elevation: usize,
    pub rejected_samples: u64,
}

impl TrackerSnapshot {
    fn of(session: &Session) -> Self {
        Self {
            session_id: session.id().to_string(),
            state: session.state().kind(),
            stats: session.stats(),
            totals: session.totals().clone(),
            laps: session.laps().to_vec(),
            samples: session.samples().len(),
            samples_with_elevation: session
                .samples()
                .iter()
                .filter(|s| s.elevation_m.is_some())
                .count(),
            rejected_samples: session.rejected_samples(),
        }
    }
}

/// Klonbar inngang for fixer (f.eks. fra `SensorAdapter::start_watch`).
#[derive(Clone)]
pub struct FixSink {
    tx: SyncSender<Command>,
}

impl FixSink {
    /// Blokkerer hvis køen er full. `false` hvis trackeren er borte.
    pub fn push(&self, fix: Fix) -> bool {
        self.tx.send(Command::Fix(fix)).is_ok()
    }
}

pub struct Tracker {
    tx: SyncSender<Command>,
    snapshot: Arc<Mutex<Arc<TrackerSnapshot>>>,
    worker: Option<JoinHandle<Session>>,
}

impl Tracker {
    pub fn spawn(session: Session, config: &TrackerConfig) -> Self {
        Self::spawn_with_elevation(session, config, None)
    }

    pub fn spawn_with_elevation(
        session: Session,
        config: &TrackerConfig,
        elevation: Option<Arc<ElevationClient>>,
    ) -> Self {
        let (tx, rx) = mpsc::sync_channel(config.queue_capacity.max(1));
        let snapshot = Arc::new(Mutex::new(Arc::new(TrackerSnapshot::of(&session))));

        let worker = Worker {
            session,
            rx,
            tx_back: tx.clone(),
            snapshot: Arc::clone(&snapshot),
            elevation,
            elevation_batch: config.elevation_batch,
        };
        let handle = thread::spawn(move || worker.run());

        Self { tx, snapshot, worker: Some(handle) }
    }

    pub fn fix_sink(&self) -> FixSink {
        FixSink { tx: self.tx.clone() }
    }

    pub fn push_fix(&self, fix: Fix) -> bool {
        self.send(Command::Fix(fix))
    }

    pub fn start(&self) -> bool {
        self.send(Command::Start)
    }

    pub fn pause(&self) -> bool {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(Command::Resume)
    }

    pub fn reset(&self) -> bool {
        self.send(Command::Reset)
    }

    pub fn set_signal_quality(&self, quality: SignalQuality) -> bool {
        self.send(Command::SignalQuality(quality))
    }

    /// Stopper økten og venter på sluttrapporten.
    pub fn stop(&self) -> Option<SessionSummary> {
        let (reply_tx, reply_rx) = mpsc::channel();
        if !self.send(Command::Stop(reply_tx)) {
            return None;
        }
        reply_rx.recv().ok()
    }

    /// Siste publiserte snapshot (billig klone av en Arc).
    pub fn snapshot(&self) -> Arc<TrackerSnapshot> {
        Arc::clone(&self.snapshot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Avslutter arbeidstråden og gir tilbake økten.
    pub fn shutdown(mut self) -> Option<Session> {
        let _ = self.tx.send(Command::Shutdown);
        self.worker.take().and_then(|h| h.join().ok())
    }

    fn send(&self, cmd: Command) -> bool {
        self.tx.send(cmd).is_ok()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if self.worker.is_some() {
            // arbeidstråden holder selv en sender, så kanalen lukkes aldri av seg selv
            let _ = self.tx.send(Command::Shutdown);
        }
    }
}

struct Worker {
    session: Session,
    rx: Receiver<Command>,
    tx_back: SyncSender<Command>,
    snapshot: Arc<Mutex<Arc<TrackerSnapshot>>>,
    elevation: Option<Arc<ElevationClient>>,
    elevation_batch: usize,
}

impl Worker {
    fn run(mut self) -> Session {
        while let Ok(cmd) = self.rx.recv() {
            match cmd {
                Command::Fix(fix) => {
                    if self.session.add_sample(fix).is_accepted() {
                        self.maybe_refine(false);
                    }
                }
                Command::Start => {
                    self.session.start();
                }
                Command::Pause => {
                    self.session.pause();
                }
                Command::Resume => {
                    self.session.resume();
                }
                Command::Stop(reply) => {
                    let summary = self.session.stop();
                    self.maybe_refine(true);
                    // snapshot skal vise Stopped før kalleren får svar
                    self.publish();
                    if reply.send(summary).is_err() {
                        debug!("stop reply receiver dropped");
                    }
                }
                Command::Reset => self.session.reset(),
                Command::Elevations { session_id, updates } => {
                    if session_id != self.session.id() {
                        debug!("dropped {} elevations for old session {session_id}", updates.len());
                        continue;
                    }
                    let n = self.session.apply_elevations(&updates);
                    debug!("applied {n} elevation refinements");
                }
                Command::SignalQuality(q) => self.session.set_gps_quality(q),
                Command::Shutdown => break,
            }
            self.publish();
        }
        self.session
    }

    fn publish(&self) {
        let snap = Arc::new(TrackerSnapshot::of(&self.session));
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snap;
    }

    /// Sender høydeoppslag når nok samples mangler høyde (eller ved flush).
    fn maybe_refine(&mut self, flush: bool) {
        let Some(client) = &self.elevation else { return };
        if self.elevation_batch == 0 {
            return;
        }
        let pending = self.session.pending_elevation_count();
        if pending == 0 || (!flush && pending < self.elevation_batch) {
            return;
        }

        let requests = self.session.pending_elevation_lookups();
        let session_id = self.session.id().to_string();
        let tx = self.tx_back.clone();
        spawn_refinement(Arc::clone(client), requests, move |updates| {
            if tx.send(Command::Elevations { session_id, updates }).is_err() {
                warn!("tracker gone before elevation results arrived");
            }
        });
    }
}
