//! Drives image cache refreshes from every source of "something changed".
//!
//! Periodic ticks, space and screen notifications, menu bar color changes and
//! item set changes all land here as [`Event::Trigger`]. They pass through one
//! [`Throttle`], so a burst results in at most one refresh per interval.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, instrument, trace};

use crate::actor;
use crate::menu_bar::{ImageCache, Throttle};
use crate::model::Section;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TriggerSource {
    Tick,
    ActiveSpaceChanged,
    ScreenParametersChanged,
    AverageColorChanged,
    ItemsChanged,
}

#[derive(Debug)]
pub enum Event {
    Trigger(TriggerSource),
    /// Refreshes `sections` now, skipping the throttle and all gating.
    ForceRefresh(Vec<Section>),
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

pub struct ImageCacheActor {
    cache: Arc<ImageCache>,
    rx: Receiver,
    throttle: Throttle,
    refresh_interval: Duration,
}

impl ImageCacheActor {
    pub fn new(
        cache: Arc<ImageCache>,
        rx: Receiver,
        refresh_interval: Duration,
        throttle_interval: Duration,
    ) -> Self {
        ImageCacheActor {
            cache,
            rx,
            throttle: Throttle::new(throttle_interval),
            refresh_interval,
        }
    }

    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.refresh_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.throttle.next_deadline().map(Instant::from_std);
            tokio::select! {
                maybe = self.rx.recv() => match maybe {
                    Some((span, event)) => self.handle_event(event).instrument(span).await,
                    None => break,
                },
                _ = tick.tick() => self.on_trigger(TriggerSource::Tick).await,
                _ = sleep_until(deadline) => {
                    if self.throttle.poll(Instant::now().into_std()) {
                        self.refresh().await;
                    }
                }
            }
        }
        debug!("image cache actor exiting");
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Trigger(source) => self.on_trigger(source).await,
            Event::ForceRefresh(sections) => {
                debug!(?sections, "forced refresh");
                self.cache.update_cache_without_checks(&sections).await;
            }
        }
    }

    async fn on_trigger(&mut self, source: TriggerSource) {
        if self.throttle.post(Instant::now().into_std()) {
            trace!(%source, "trigger fired");
            self.refresh().await;
        } else {
            trace!(%source, "trigger deferred");
        }
    }

    #[instrument(skip(self))]
    async fn refresh(&mut self) {
        if !self.cache.permission().cached_check(false) {
            debug!("no screen capture access, skipping refresh");
            return;
        }
        self.cache.update_cache_all().await;
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// A hook for [`crate::model::ItemManager::with_change_hook`] that posts
/// [`TriggerSource::ItemsChanged`].
pub fn items_changed_hook(tx: Sender) -> impl Fn() + Send + Sync + 'static {
    move || {
        if tx.try_send(Event::Trigger(TriggerSource::ItemsChanged)).is_err() {
            trace!("image cache actor is gone");
        }
    }
}
