use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::geo::GeoPoint;
use crate::session::{SessionEnded, WalkSession};

/// User controls dispatched by the presentation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    End,
}

/// Unified event type consumed by the session runner
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WalkEvent {
    Tick,
    Steps(u64),
    Fix(GeoPoint),
    Control(Control),
}

/// A sensor stream: events paired with their offset from the walk start
pub type Timeline = Vec<(Duration, WalkEvent)>;

/// Where the runner pulls ticks, sensor readings and controls from
pub trait WalkEventSource: Send + 'static {
    /// Next queued walk event, waiting at most `timeout`.
    /// `Disconnected` means no producer is left to send one.
    fn recv_timeout(&self, timeout: Duration) -> Result<WalkEvent, RecvTimeoutError>;
}

/// Event source fed by producer threads through an mpsc channel
pub struct ChannelEventSource {
    rx: Receiver<WalkEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<WalkEvent>) -> Self {
        Self { rx }
    }

    pub fn channel() -> (Sender<WalkEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl WalkEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<WalkEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Wall-clock length of one elapsed-time tick
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Ticks at a constant period; one second for a live walk
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Owned producer thread. Dropping it stops the thread and waits for it.
pub struct Subscription {
    name: &'static str,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    fn spawn<F>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || body(stop_rx));
        debug!(name, "subscription acquired");

        Self {
            name,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True until the producer has nothing left to send
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // disconnecting the stop channel wakes the producer
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        debug!(name = self.name, "subscription released");
    }
}

/// Sleeps for `timeout` unless the subscription is released first.
/// Returns false once the producer should exit.
fn wait_or_stop(stop: &Receiver<()>, timeout: Duration) -> bool {
    matches!(stop.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
}

/// Produces `WalkEvent::Tick` every ticker interval
pub fn spawn_ticker<T: Ticker>(tx: Sender<WalkEvent>, ticker: T) -> Subscription {
    Subscription::spawn("ticker", move |stop| {
        while wait_or_stop(&stop, ticker.interval()) {
            if tx.send(WalkEvent::Tick).is_err() {
                break;
            }
        }
    })
}

fn play_timeline(stop: &Receiver<()>, tx: &Sender<WalkEvent>, timeline: Timeline) {
    let started = Instant::now();
    for (at, event) in timeline {
        let wait = at.saturating_sub(started.elapsed());
        if !wait.is_zero() && !wait_or_stop(stop, wait) {
            return;
        }
        if tx.send(event).is_err() {
            return;
        }
    }
}

/// Replays a timeline, sending each event once its offset has passed.
/// `done` is dropped once the feed has sent its last event or was released.
pub fn spawn_feed(
    name: &'static str,
    tx: Sender<WalkEvent>,
    timeline: Timeline,
    done: Sender<()>,
) -> Subscription {
    Subscription::spawn(name, move |stop| {
        let _done = done;
        play_timeline(&stop, &tx, timeline);
    })
}

const FLUSH_POLL: Duration = Duration::from_millis(2);

/// Sends `Control::End` at `at`, but never before every tracked feed has
/// finished. Readings stamped at the same instant as the end are therefore
/// queued ahead of it.
fn spawn_closer(tx: Sender<WalkEvent>, at: Duration, done: Receiver<()>) -> Subscription {
    Subscription::spawn("closer", move |stop| {
        let started = Instant::now();
        loop {
            if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
                return;
            }
            if let Err(RecvTimeoutError::Disconnected) = done.recv_timeout(FLUSH_POLL) {
                break;
            }
        }

        let wait = at.saturating_sub(started.elapsed());
        if !wait.is_zero() && !wait_or_stop(&stop, wait) {
            return;
        }
        let _ = tx.send(WalkEvent::Control(Control::End));
    })
}

/// The two sensor streams of a walk, plus when the walk is ended
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorStreams {
    pub steps: Timeline,
    pub positions: Timeline,
    pub end_at: Option<Duration>,
}

/// The tick source and both sensor streams of one walk view.
/// Dropping the hub releases all of them.
pub struct SensorHub {
    subscriptions: Vec<Subscription>,
}

impl SensorHub {
    pub fn acquire<T: Ticker>(tx: Sender<WalkEvent>, ticker: T, streams: SensorStreams) -> Self {
        let SensorStreams {
            steps,
            positions,
            end_at,
        } = streams;
        let (done_tx, done_rx) = mpsc::channel();

        let mut subscriptions = vec![
            spawn_ticker(tx.clone(), ticker),
            spawn_feed("pedometer", tx.clone(), steps, done_tx.clone()),
            spawn_feed("location", tx.clone(), positions, done_tx),
        ];
        if let Some(at) = end_at {
            subscriptions.push(spawn_closer(tx, at, done_rx));
        }
        Self { subscriptions }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }
}

impl Drop for SensorHub {
    fn drop(&mut self) {
        // release in reverse acquisition order
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

/// Outcome of a single runner step
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Event(WalkEvent),
    Idle,
    Closed,
}

/// Runner that advances a walk session one event at a time
pub struct Runner<E: WalkEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: WalkEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to one tick interval for the next event
    pub fn step(&self) -> Step {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => Step::Event(ev),
            Err(RecvTimeoutError::Timeout) => Step::Idle,
            Err(RecvTimeoutError::Disconnected) => Step::Closed,
        }
    }

    /// Dispatches events into `session` until it ends or every producer is gone
    pub fn drive(&self, session: &mut WalkSession) -> Option<SessionEnded> {
        self.drive_with(session, |_, _| {})
    }

    /// Like [`Runner::drive`], calling `observe` after every applied event
    pub fn drive_with<F>(&self, session: &mut WalkSession, mut observe: F) -> Option<SessionEnded>
    where
        F: FnMut(&WalkEvent, &WalkSession),
    {
        loop {
            match self.step() {
                Step::Event(ev) => {
                    let ended = session.apply(ev);
                    observe(&ev, session);
                    if ended.is_some() {
                        return ended;
                    }
                }
                Step::Idle => {}
                Step::Closed => return None,
            }
        }
    }
}
