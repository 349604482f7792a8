//! Sensor Adapter: skjuler ustabil GPS for Session Engine.
//!
//! Pull (`get_current_fix`) med timeout og begrenset retry, og push
//! (`start_watch`) med nøyaktighets- og minimumsbevegelsesfilter. Avviste
//! fixer logges og telles, men blir aldri feil.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::{debug, info};
use once_cell::sync::OnceCell;

use crate::clock::{to_utc, Clock, SystemClock};
use crate::config::SensorOptions;
use crate::error::SensorError;
use crate::metrics::{fixes_filtered_total, METRICS};
use crate::models::{Fix, SignalQuality};
use crate::types::SensorStatus;

/// Hvor ofte leveringstråden sjekker om watch er stoppet.
const WATCH_POLL: Duration = Duration::from_millis(50);
/// Kapasitet på råkanalen fra plattformen.
const RAW_QUEUE: usize = 32;

/// Plattformens lokasjonsprimitiv.
pub trait LocationProvider: Send + Sync {
    fn is_available(&self) -> bool;
    fn has_permission(&self) -> bool;

    /// Blokkerende enkeltavlesning. Adapteren håndhever timeout selv.
    fn read_fix(&self, options: &SensorOptions) -> Result<Fix, SensorError>;

    /// Start push-levering av rå fixer til `sink`. Leverandøren skal stoppe
    /// når `send` feiler (mottakeren er borte).
    fn watch(&self, options: &SensorOptions, sink: SyncSender<Fix>) -> Result<(), SensorError>;
}

struct WatchShared {
    cancelled: AtomicBool,
    // holdes mens callback kjører; stop_watch venter på den
    gate: Mutex<()>,
    delivery_thread: OnceCell<ThreadId>,
}

/// Håndtak for et aktivt abonnement.
#[derive(Clone)]
pub struct WatchHandle {
    id: u64,
    shared: Arc<WatchShared>,
}

impl WatchHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        !self.shared.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Debug, Default)]
struct StatusInner {
    last_update_ms: Option<u64>,
    signal_quality: SignalQuality,
}

pub struct SensorAdapter {
    provider: Arc<dyn LocationProvider>,
    clock: Arc<dyn Clock>,
    status: Arc<Mutex<StatusInner>>,
    active_watches: Arc<AtomicUsize>,
    next_watch_id: AtomicU64,
}

impl SensorAdapter {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self::with_clock(provider, Arc::new(SystemClock))
    }

    pub fn with_clock(provider: Arc<dyn LocationProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            status: Arc::new(Mutex::new(StatusInner::default())),
            active_watches: Arc::new(AtomicUsize::new(0)),
            next_watch_id: AtomicU64::new(1),
        }
    }

    fn check_access(&self) -> Result<(), SensorError> {
        if !self.provider.is_available() {
            return Err(SensorError::Unavailable);
        }
        if !self.provider.has_permission() {
            return Err(SensorError::PermissionDenied);
        }
        Ok(())
    }

    /// Én avlesning nå. Dårlige eller gamle fixer prøves på nytt inntil
    /// `retry_attempts`; når budsjettet er brukt opp aksepteres siste fix.
    pub fn get_current_fix(&self, options: &SensorOptions) -> Result<Fix, SensorError> {
        self.check_access()?;

        let attempts = options.retry_attempts.max(1);
        let mut last: Option<Fix> = None;

        for attempt in 1..=attempts {
            let fix = match self.read_with_timeout(options) {
                Ok(fix) => fix,
                Err(e) => match last {
                    // har allerede en brukbar (men svak) fix: bruk den
                    Some(_) => {
                        debug!("fix attempt {attempt}/{attempts} failed ({e}), keeping previous fix");
                        break;
                    }
                    None => return Err(e),
                },
            };

            if fix.has_valid_coordinates() {
                let accurate = fix
                    .accuracy_m
                    .map_or(true, |a| a <= options.max_acceptable_accuracy_m);
                let age_ms = self.clock.now_ms().saturating_sub(fix.timestamp_ms);
                let fresh = options.max_fix_age_ms == 0 || age_ms <= options.max_fix_age_ms;

                if accurate && fresh {
                    self.record(&fix);
                    return Ok(fix);
                }
                debug!(
                    "fix attempt {attempt}/{attempts} not good enough (accuracy={:?} m, age={} ms)",
                    fix.accuracy_m, age_ms
                );
                last = Some(fix);
            } else {
                debug!("fix attempt {attempt}/{attempts} had invalid coordinates");
            }

            if attempt < attempts && options.retry_delay_ms > 0 {
                thread::sleep(Duration::from_millis(options.retry_delay_ms));
            }
        }

        match last {
            Some(fix) => {
                self.record(&fix);
                Ok(fix)
            }
            None => Err(SensorError::Unavailable),
        }
    }

    fn read_with_timeout(&self, options: &SensorOptions) -> Result<Fix, SensorError> {
        if options.timeout_ms == 0 {
            return self.provider.read_fix(options);
        }

        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let opts = options.clone();
        // Henger leverandøren, blir tråden liggende til den returnerer.
        thread::spawn(move || {
            let _ = tx.send(provider.read_fix(&opts));
        });

        match rx.recv_timeout(Duration::from_millis(options.timeout_ms)) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => Err(SensorError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(SensorError::Unavailable),
        }
    }

    fn record(&self, fix: &Fix) {
        let mut st = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        st.last_update_ms = Some(self.clock.now_ms());
        st.signal_quality = SignalQuality::from_accuracy(fix.accuracy_m);
    }

    /// Starter push-abonnement. Aksepterte fixer sendes til `callback` i
    /// ankomstrekkefølge fra én leveringstråd.
    pub fn start_watch<F>(&self, mut callback: F, options: &SensorOptions) -> Result<WatchHandle, SensorError>
    where
        F: FnMut(Fix) + Send + 'static,
    {
        self.check_access()?;

        let (tx, rx) = mpsc::sync_channel::<Fix>(RAW_QUEUE);
        self.provider.watch(options, tx)?;

        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(WatchShared {
            cancelled: AtomicBool::new(false),
            gate: Mutex::new(()),
            delivery_thread: OnceCell::new(),
        });
        self.active_watches.fetch_add(1, Ordering::SeqCst);

        let handle = WatchHandle { id, shared: Arc::clone(&shared) };
        let status = Arc::clone(&self.status);
        let clock = Arc::clone(&self.clock);
        let active = Arc::clone(&self.active_watches);
        let opts = options.clone();

        thread::spawn(move || {
            let _ = shared.delivery_thread.set(thread::current().id());
            let mut filter = MovementFilter::new(opts.max_acceptable_accuracy_m, opts.min_movement_m);

            loop {
                if shared.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let fix = match rx.recv_timeout(WATCH_POLL) {
                    Ok(fix) => fix,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("watch {id}: provider closed the stream");
                        // teller ned kun hvis ingen stop_watch kom først
                        if !shared.cancelled.swap(true, Ordering::SeqCst) {
                            active.fetch_sub(1, Ordering::SeqCst);
                        }
                        break;
                    }
                };

                if let Err(reason) = filter.offer(&fix) {
                    debug!("watch {id}: dropped fix @{} ({reason})", fix.timestamp_ms);
                    fixes_filtered_total(&METRICS, reason).inc();
                    continue;
                }

                let _gate = shared.gate.lock().unwrap_or_else(PoisonError::into_inner);
                if shared.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                {
                    let mut st = status.lock().unwrap_or_else(PoisonError::into_inner);
                    st.last_update_ms = Some(clock.now_ms());
                    st.signal_quality = SignalQuality::from_accuracy(fix.accuracy_m);
                }
                callback(fix);
            }
        });

        info!("watch {id} started");
        Ok(handle)
    }

    /// Stopper abonnementet. Idempotent; etter retur fyres ingen callbacks.
    pub fn stop_watch(&self, handle: &WatchHandle) {
        if handle.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active_watches.fetch_sub(1, Ordering::SeqCst);

        let inside_callback = handle.shared.delivery_thread.get() == Some(&thread::current().id());
        if !inside_callback {
            // vent på eventuell levering som pågår
            let _gate = handle.shared.gate.lock().unwrap_or_else(PoisonError::into_inner);
        }
        info!("watch {} stopped", handle.id);
    }

    pub fn status(&self) -> SensorStatus {
        let st = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        SensorStatus {
            available: self.provider.is_available(),
            has_permission: self.provider.has_permission(),
            is_tracking: self.active_watches.load(Ordering::SeqCst) > 0,
            last_update: st.last_update_ms.and_then(to_utc),
            signal_quality: st.signal_quality,
        }
    }

    pub fn signal_quality(&self) -> SignalQuality {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).signal_quality
    }
}

/// Filter for push-modus: nøyaktighet + minimumsbevegelse fra sist aksepterte.
#[derive(Debug, Clone)]
pub struct MovementFilter {
    max_accuracy_m: f64,
    min_movement_m: f64,
    last_accepted: Option<Fix>,
}

impl MovementFilter {
    pub fn new(max_accuracy_m: f64, min_movement_m: f64) -> Self {
        Self { max_accuracy_m, min_movement_m, last_accepted: None }
    }

    /// Ok hvis fixen skal videre; ellers grunn ("invalid_coordinates" |
    /// "low_accuracy" | "min_movement"). Ukjent nøyaktighet godtas.
    pub fn offer(&mut self, fix: &Fix) -> Result<(), &'static str> {
        if !fix.has_valid_coordinates() {
            return Err("invalid_coordinates");
        }
        if let Some(acc) = fix.accuracy_m {
            if !acc.is_finite() || acc > self.max_accuracy_m {
                return Err("low_accuracy");
            }
        }
        if let Some(last) = &self.last_accepted {
            if last.distance_m_to(fix) < self.min_movement_m {
                return Err("min_movement");
            }
        }
        self.last_accepted = Some(*fix);
        Ok(())
    }
}

/// Skriptet leverandør for tester, demoer og replay.
pub struct StaticLocationProvider {
    available: bool,
    permission: bool,
    reads: Mutex<VecDeque<Result<Fix, SensorError>>>,
    stream: Vec<Fix>,
    read_delay: Duration,
    stream_interval: Duration,
}

impl Default for StaticLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticLocationProvider {
    pub fn new() -> Self {
        Self {
            available: true,
            permission: true,
            reads: Mutex::new(VecDeque::new()),
            stream: Vec::new(),
            read_delay: Duration::ZERO,
            stream_interval: Duration::ZERO,
        }
    }

    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new() }
    }

    pub fn denied() -> Self {
        Self { permission: false, ..Self::new() }
    }

    /// Svar for `read_fix`, i rekkefølge. Tom kø gir `Timeout`.
    pub fn with_reads<I>(self, reads: I) -> Self
    where
        I: IntoIterator<Item = Result<Fix, SensorError>>,
    {
        *self.reads.lock().unwrap_or_else(PoisonError::into_inner) = reads.into_iter().collect();
        self
    }

    pub fn with_stream(mut self, fixes: Vec<Fix>) -> Self {
        self.stream = fixes;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn with_stream_interval(mut self, interval: Duration) -> Self {
        self.stream_interval = interval;
        self
    }

    pub fn remaining_reads(&self) -> usize {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl LocationProvider for StaticLocationProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn has_permission(&self) -> bool {
        self.permission
    }

    fn read_fix(&self, _options: &SensorOptions) -> Result<Fix, SensorError> {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Err(SensorError::Timeout))
    }

    fn watch(&self, _options: &SensorOptions, sink: SyncSender<Fix>) -> Result<(), SensorError> {
        let fixes = self.stream.clone();
        let interval = self.stream_interval;
        thread::spawn(move || {
            for fix in fixes {
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
                if sink.send(fix).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }
}
