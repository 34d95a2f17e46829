//! The shared suggest stream.
//!
//! Suggestions are not tracked per request. One engine manager, created on first use, serves
//! every request, and each request supersedes the previous one. Results of all requests go to
//! the single suggest channel, and only while a listener is attached to it.

use std::sync::{Arc, Mutex, Weak};

use log::debug;
use mapkit_engine::{EngineResult, MapKit, Responder, SearchManager, SearchManagerType, SuggestItem};

use super::events::{EventEmitter, EventName, SuggestResponseEvent};
use super::{lock, Channel, SuggestParams};

struct SuggestScope {
    manager: Option<Arc<dyn SearchManager>>,
    /// Incremented for every request.
    generation: u64,
    /// The generation of the request still waiting for its result.
    in_flight: Option<u64>,
    listening: bool,
}

pub struct SuggestStream {
    kit: Arc<dyn MapKit>,
    emitter: EventEmitter,
    kind: SearchManagerType,
    scope: Mutex<SuggestScope>,
}

impl SuggestStream {
    pub(crate) fn new(
        kit: Arc<dyn MapKit>,
        emitter: EventEmitter,
        kind: SearchManagerType,
        listening: bool,
    ) -> Self {
        Self {
            kit,
            emitter,
            kind,
            scope: Mutex::new(SuggestScope {
                manager: None,
                generation: 0,
                in_flight: None,
                listening,
            }),
        }
    }

    /// Request suggestions, superseding any request still in flight.
    pub fn suggest(self: &Arc<Self>, params: &SuggestParams) {
        let existing = lock(&self.scope).manager.clone();
        let manager = match existing {
            Some(manager) => manager,
            None => {
                let created = self.kit.create_search_manager(self.kind);
                lock(&self.scope).manager.get_or_insert(created).clone()
            }
        };
        let generation = {
            let mut scope = lock(&self.scope);
            scope.generation += 1;
            scope.in_flight = Some(scope.generation);
            scope.generation
        };
        let stream: Weak<Self> = Arc::downgrade(self);
        let responder = Responder::new(move |result| match stream.upgrade() {
            Some(stream) => stream.deliver(generation, result),
            None => debug!("Dropping suggest response: the bridge is gone"),
        });
        manager.suggest(&params.text, params.window, &params.options(), responder);
    }

    fn deliver(&self, generation: u64, result: EngineResult<Vec<SuggestItem>>) {
        let mut scope = lock(&self.scope);
        if scope.in_flight != Some(generation) {
            debug!("Dropping stale or cancelled suggest response #{generation}");
            return;
        }
        scope.in_flight = None;
        if !scope.listening {
            debug!("Dropping suggest response #{generation}: no listener");
            return;
        }
        match result {
            Ok(items) => self.emitter.emit(
                Channel::SuggestResults,
                EventName::SuggestResult,
                &SuggestResponseEvent::success(items),
            ),
            Err(e) => self.emitter.emit(
                Channel::SuggestResults,
                EventName::SuggestError,
                &SuggestResponseEvent::failure(&e),
            ),
        };
    }

    /// Cancel the request in flight. The listener stays attached.
    pub fn cancel(&self) {
        let manager = {
            let mut scope = lock(&self.scope);
            match scope.in_flight.take() {
                Some(_) => scope.manager.clone(),
                None => None,
            }
        };
        if let Some(manager) = manager {
            manager.cancel_suggest();
        }
    }

    pub fn listen(&self) {
        lock(&self.scope).listening = true;
    }

    pub fn unlisten(&self) {
        lock(&self.scope).listening = false;
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.scope).listening
    }

    /// Whether a request is waiting for its result.
    pub fn is_pending(&self) -> bool {
        lock(&self.scope).in_flight.is_some()
    }
}
