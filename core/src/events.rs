use std::sync::mpsc::Sender;

use crate::models::{Lap, Sample, Totals};
use crate::types::RejectReason;

/// Hendelser fra en økt. Fyres synkront i tråden som behandlet fixen.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Sample(Sample),
    Split(Lap),
    Paused,
    Resumed,
    Stats(Totals),
    SampleRejected(RejectReason),
}

/// Observatør for øktens hendelser. Alle metoder er no-op som standard.
pub trait SessionObserver: Send {
    fn on_sample(&mut self, _sample: &Sample) {}
    fn on_split(&mut self, _lap: &Lap) {}
    fn on_pause(&mut self) {}
    fn on_resume(&mut self) {}
    fn on_stats_update(&mut self, _totals: &Totals) {}
    fn on_sample_rejected(&mut self, _reason: RejectReason) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Videresender alle hendelser til en kanal. Lukket mottaker ignoreres.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, ev: SessionEvent) {
        let _ = self.tx.send(ev);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_sample(&mut self, sample: &Sample) {
        self.send(SessionEvent::Sample(*sample));
    }
    fn on_split(&mut self, lap: &Lap) {
        self.send(SessionEvent::Split(lap.clone()));
    }
    fn on_pause(&mut self) {
        self.send(SessionEvent::Paused);
    }
    fn on_resume(&mut self) {
        self.send(SessionEvent::Resumed);
    }
    fn on_stats_update(&mut self, totals: &Totals) {
        self.send(SessionEvent::Stats(totals.clone()));
    }
    fn on_sample_rejected(&mut self, reason: RejectReason) {
        self.send(SessionEvent::SampleRejected(reason));
    }
}

/// Liste med observatører, dispatcher hendelser i registreringsrekkefølge.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    list: Vec<(ObserverId, Box<dyn SessionObserver>)>,
}

impl Observers {
    pub(crate) fn add(&mut self, obs: Box<dyn SessionObserver>) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.list.push((id, obs));
        id
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.list.len();
        self.list.retain(|(i, _)| *i != id);
        self.list.len() != before
    }

    pub(crate) fn emit(&mut self, ev: &SessionEvent) {
        for (_, obs) in self.list.iter_mut() {
            match ev {
                SessionEvent::Sample(s) => obs.on_sample(s),
                SessionEvent::Split(l) => obs.on_split(l),
                SessionEvent::Paused => obs.on_pause(),
                SessionEvent::Resumed => obs.on_resume(),
                SessionEvent::Stats(t) => obs.on_stats_update(t),
                SessionEvent::SampleRejected(r) => obs.on_sample_rejected(*r),
            }
        }
    }
}
