//! Search managers and the search sessions submitted to them.
//!
//! A session goes through these states:
//!
//! ```text
//! Created -> Active -> Completed | Cancelled | Errored -> (disposed)
//! ```
//!
//! Disposal removes the session from the registry; identities are never reused, so a response
//! for a disposed session finds nothing and is dropped. The engine reports every response
//! through a [`Responder`], which calls [`SearchRegistry::deliver`]. That is the only place a
//! session leaves `Created`/`Active` because of a response, and it emits the resulting event
//! while still holding the lock, so a concurrent cancel or dispose either happens entirely
//! before the response (which is then dropped) or entirely after the event.
//!
//! The engine is never called with the lock held: it may call a responder synchronously.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use mapkit_engine::{
    EngineResult, MapKit, Point, Responder, SearchManager, SearchManagerType, SearchOptions,
    SearchResponse, SearchSession,
};
use serde::{Deserialize, Serialize};

use super::events::{EventEmitter, EventName, SearchResponseEvent};
use super::{lock, Channel};
use crate::error::{BridgeError, BridgeResult};
use crate::ids::{IdGenerator, ManagerId, SessionId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Registered, the engine has not returned a session handle yet.
    Created,
    /// Submitted to the engine and waiting for a response.
    Active,
    Completed,
    /// Cancelled by the host. A late response is dropped.
    Cancelled,
    Errored,
}

impl SessionState {
    /// Whether a response is still expected.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Created | Self::Active)
    }
}

struct Session {
    manager: ManagerId,
    state: SessionState,
    /// The native session. Taken when the session is cancelled.
    handle: Option<Box<dyn SearchSession>>,
}

struct Manager {
    kind: SearchManagerType,
    native: Arc<dyn SearchManager>,
}

#[derive(Default)]
struct SearchScope {
    managers: HashMap<ManagerId, Manager>,
    default_manager: Option<ManagerId>,
    sessions: HashMap<SessionId, Session>,
}

/// The registry of search managers and sessions.
pub struct SearchRegistry {
    kit: Arc<dyn MapKit>,
    ids: Arc<IdGenerator>,
    emitter: EventEmitter,
    default_kind: SearchManagerType,
    scope: Mutex<SearchScope>,
}

impl SearchRegistry {
    pub(crate) fn new(
        kit: Arc<dyn MapKit>,
        ids: Arc<IdGenerator>,
        emitter: EventEmitter,
        default_kind: SearchManagerType,
    ) -> Self {
        Self {
            kit,
            ids,
            emitter,
            default_kind,
            scope: Mutex::default(),
        }
    }

    /// Create a search manager of the given kind, or of the default kind for `None`.
    pub fn create_manager(&self, kind: Option<SearchManagerType>) -> ManagerId {
        let kind = kind.unwrap_or(self.default_kind);
        let native = self.kit.create_search_manager(kind);
        let id = self.ids.manager_id();
        lock(&self.scope)
            .managers
            .insert(id.clone(), Manager { kind, native });
        debug!("Created {kind:?} search manager {id}");
        id
    }

    /// Get the default manager, creating it on first use.
    fn default_manager(&self) -> ManagerId {
        let current = |scope: &SearchScope| {
            scope
                .default_manager
                .clone()
                .filter(|id| scope.managers.contains_key(id))
        };
        if let Some(id) = current(&lock(&self.scope)) {
            return id;
        }
        let native = self.kit.create_search_manager(self.default_kind);
        let mut scope = lock(&self.scope);
        // Another thread may have created it in the meantime.
        if let Some(id) = current(&scope) {
            drop(scope);
            drop(native);
            return id;
        }
        let id = self.ids.manager_id();
        scope.managers.insert(
            id.clone(),
            Manager {
                kind: self.default_kind,
                native,
            },
        );
        scope.default_manager = Some(id.clone());
        id
    }

    pub fn manager_kind(&self, id: &ManagerId) -> Option<SearchManagerType> {
        lock(&self.scope).managers.get(id).map(|m| m.kind)
    }

    /// Dispose a manager and all of its sessions. Unknown managers are ignored.
    pub fn dispose_manager(&self, id: &ManagerId) {
        let (manager, sessions) = {
            let mut scope = lock(&self.scope);
            let manager = scope.managers.remove(id);
            if scope.default_manager.as_ref() == Some(id) {
                scope.default_manager = None;
            }
            let ids: Vec<SessionId> = scope
                .sessions
                .iter()
                .filter(|(_, session)| session.manager == *id)
                .map(|(session_id, _)| session_id.clone())
                .collect();
            let sessions: Vec<Session> = ids
                .iter()
                .filter_map(|session_id| scope.sessions.remove(session_id))
                .collect();
            (manager, sessions)
        };
        if manager.is_none() {
            debug!("Ignoring disposal of unknown search manager {id}");
        }
        for session in sessions {
            release(session);
        }
    }

    /// Start a search and return the identity of the new session.
    ///
    /// The session is registered before the engine is called; the result is delivered later as
    /// an event on the session's channel.
    pub fn submit(
        self: &Arc<Self>,
        manager: Option<&ManagerId>,
        point: Point,
        zoom: Option<f32>,
        options: &SearchOptions,
    ) -> BridgeResult<SessionId> {
        let manager = match manager {
            Some(id) => id.clone(),
            None => self.default_manager(),
        };
        let (id, native) = {
            let mut scope = lock(&self.scope);
            let native = scope
                .managers
                .get(&manager)
                .map(|m| m.native.clone())
                .ok_or_else(|| BridgeError::UnknownManager {
                    id: manager.clone(),
                })?;
            let id = self.ids.session_id();
            scope.sessions.insert(
                id.clone(),
                Session {
                    manager,
                    state: SessionState::Created,
                    handle: None,
                },
            );
            (id, native)
        };
        let handle = native.submit(point, zoom, options, self.responder(id.clone()));
        self.attach(&id, handle);
        Ok(id)
    }

    fn responder(self: &Arc<Self>, id: SessionId) -> Responder<SearchResponse> {
        let registry: Weak<Self> = Arc::downgrade(self);
        Responder::new(move |result| match registry.upgrade() {
            Some(registry) => registry.deliver(&id, result),
            None => debug!("Dropping search response for {id}: the bridge is gone"),
        })
    }

    /// Store the native session handle once the engine has accepted the search.
    fn attach(&self, id: &SessionId, mut handle: Box<dyn SearchSession>) {
        let mut scope = lock(&self.scope);
        if let Some(session) = scope.sessions.get_mut(id) {
            match session.state {
                SessionState::Created => {
                    session.state = SessionState::Active;
                    session.handle = Some(handle);
                    return;
                }
                // The response arrived before `submit` returned.
                SessionState::Completed | SessionState::Errored => {
                    session.handle = Some(handle);
                    return;
                }
                SessionState::Active | SessionState::Cancelled => (),
            }
        }
        drop(scope);
        // Cancelled or disposed while the engine was submitting.
        handle.cancel();
    }

    /// Deliver the response of a session to the host, unless the session is no longer waiting.
    fn deliver(&self, id: &SessionId, result: EngineResult<SearchResponse>) {
        let mut scope = lock(&self.scope);
        let Some(session) = scope.sessions.get_mut(id) else {
            debug!("Dropping late search response for disposed session {id}");
            return;
        };
        if !session.state.is_pending() {
            debug!(
                "Dropping late search response for {:?} session {id}",
                session.state
            );
            return;
        }
        let channel = Channel::SearchSession(id.clone());
        match result {
            Ok(response) => {
                session.state = SessionState::Completed;
                let event = SearchResponseEvent::success(id.clone(), response);
                self.emitter.emit(channel, EventName::SearchResult, &event);
            }
            Err(e) => {
                session.state = SessionState::Errored;
                let event = SearchResponseEvent::failure(id.clone(), &e);
                self.emitter.emit(channel, EventName::SearchError, &event);
            }
        }
    }

    /// Ask the engine to cancel a pending search. Any later response is dropped.
    ///
    /// Cancelling an unknown or finished session does nothing.
    pub fn cancel(&self, id: &SessionId) {
        let handle = {
            let mut scope = lock(&self.scope);
            match scope.sessions.get_mut(id) {
                Some(session) if session.state.is_pending() => {
                    session.state = SessionState::Cancelled;
                    session.handle.take()
                }
                _ => {
                    debug!("Ignoring cancellation of search session {id}");
                    None
                }
            }
        };
        if let Some(mut handle) = handle {
            handle.cancel();
        }
    }

    /// Forget a session, cancelling it if it is still pending. Idempotent.
    pub fn dispose(&self, id: &SessionId) {
        let session = lock(&self.scope).sessions.remove(id);
        if let Some(session) = session {
            release(session);
        }
    }

    /// Dispose every manager and session.
    pub(crate) fn dispose_all(&self) {
        let (managers, sessions) = {
            let mut scope = lock(&self.scope);
            scope.default_manager = None;
            let managers: Vec<Manager> = scope.managers.drain().map(|(_, m)| m).collect();
            let sessions: Vec<Session> = scope.sessions.drain().map(|(_, s)| s).collect();
            (managers, sessions)
        };
        for session in sessions {
            release(session);
        }
        drop(managers);
    }

    pub fn state(&self, id: &SessionId) -> BridgeResult<SessionState> {
        lock(&self.scope)
            .sessions
            .get(id)
            .map(|session| session.state)
            .ok_or_else(|| BridgeError::UnknownSession { id: id.clone() })
    }

    pub fn session_count(&self) -> usize {
        lock(&self.scope).sessions.len()
    }
}

/// Release the native side of a removed session. Must be called without the scope lock, since
/// the engine may call the session's responder while cancelling.
fn release(session: Session) {
    if let (true, Some(mut handle)) = (session.state.is_pending(), session.handle) {
        handle.cancel();
    }
}
