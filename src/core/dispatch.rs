use crate::core::event::{DispatchMode, EventKind, EventSet, ShowerEvent};
use crate::error::Result;
use log::{debug, warn};

/// Receives shower events. Both methods default to doing nothing.
pub trait ShowerObserver {
    /// Handle a broadcast event. Failures are logged and otherwise ignored.
    fn on_event(&mut self, _event: &ShowerEvent<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once per completed shower. Returning `Ok(false)` or an error stops the batch.
    fn trajectory_end(&mut self, _shower: u64) -> Result<bool> {
        Ok(true)
    }
}

/// Verdict of the trajectory-end gatekeeper chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    /// Observer at registration position `observer` stopped the batch.
    Stop {
        observer: usize,
        reason: Option<String>,
    },
}

impl GateDecision {
    #[inline]
    pub fn should_continue(&self) -> bool {
        matches!(self, GateDecision::Continue)
    }
}

enum Slot<'a> {
    Borrowed(&'a mut dyn ShowerObserver),
    Owned(Box<dyn ShowerObserver + 'a>),
}

impl Slot<'_> {
    fn get(&mut self) -> &mut dyn ShowerObserver {
        match self {
            Slot::Borrowed(o) => &mut **o,
            Slot::Owned(o) => o.as_mut(),
        }
    }
}

struct Subscription<'a> {
    observer: Slot<'a>,
    events: EventSet,
}

/// Ordered observer registry.
///
/// Observers are called in registration order. An observer only sees the event kinds
/// it subscribed to; `register` subscribes to everything.
#[derive(Default)]
pub struct EventDispatcher<'a> {
    subscriptions: Vec<Subscription<'a>>,
    swallowed: u64,
}

impl<'a> EventDispatcher<'a> {
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            swallowed: 0,
        }
    }

    /// Subscribe a borrowed observer to every event kind.
    pub fn register(&mut self, observer: &'a mut dyn ShowerObserver) -> &mut Self {
        self.register_for(EventSet::all(), observer)
    }

    /// Subscribe a borrowed observer to the given event kinds only.
    pub fn register_for(&mut self, events: EventSet, observer: &'a mut dyn ShowerObserver) -> &mut Self {
        self.subscriptions.push(Subscription {
            observer: Slot::Borrowed(observer),
            events,
        });
        self
    }

    /// Hand ownership of an observer to the dispatcher (e.g. a logger nobody reads back).
    pub fn register_owned(&mut self, events: EventSet, observer: Box<dyn ShowerObserver + 'a>) -> &mut Self {
        self.subscriptions.push(Subscription {
            observer: Slot::Owned(observer),
            events,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of broadcast failures swallowed since the dispatcher was created.
    pub fn swallowed_failures(&self) -> u64 {
        self.swallowed
    }

    /// Fire-and-forget delivery to every subscribed observer.
    pub fn broadcast(&mut self, event: &ShowerEvent<'_>) {
        debug_assert_eq!(event.kind.dispatch_mode(), DispatchMode::Broadcast);
        for (position, sub) in self.subscriptions.iter_mut().enumerate() {
            if !sub.events.contains(event.kind) {
                continue;
            }
            if let Err(e) = sub.observer.get().on_event(event) {
                self.swallowed += 1;
                warn!(
                    "observer #{position} failed on {} (shower {}): {e}",
                    event.kind, event.shower
                );
            }
        }
    }

    /// Gatekeeper delivery of the trajectory end; stops at the first refusal or failure.
    pub fn trajectory_end(&mut self, shower: u64) -> GateDecision {
        for (position, sub) in self.subscriptions.iter_mut().enumerate() {
            if !sub.events.contains(EventKind::TrajectoryEnd) {
                continue;
            }
            match sub.observer.get().trajectory_end(shower) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("observer #{position} stopped the batch after shower {shower}");
                    return GateDecision::Stop {
                        observer: position,
                        reason: None,
                    };
                }
                Err(e) => {
                    debug!("observer #{position} failed at trajectory end of shower {shower}: {e}");
                    return GateDecision::Stop {
                        observer: position,
                        reason: Some(e.to_string()),
                    };
                }
            }
        }
        GateDecision::Continue
    }
}
