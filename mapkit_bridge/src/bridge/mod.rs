mod channel;
mod command;
mod events;
mod map_objects;
mod map_view;
mod search;
mod suggest;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use compact_str::CompactString;
use log::{debug, trace, warn};
use mapkit_engine::{MapKit, MapWindow};
use serde::Serialize;

pub use channel::Channel;
pub use command::*;
pub use events::*;
pub use map_objects::{MapObjectRegistry, ObjectKind, PlacemarkProps};
pub use map_view::MapView;
pub use search::{SearchRegistry, SessionState};
pub use suggest::SuggestStream;

use crate::codec::Codec;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::ids::{IdGenerator, MapViewId};

/// Lock a scope. A panic in another thread never leaves a scope half updated, so a poisoned lock
/// is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The synchronous answer to a command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Void,
    /// The identity of a newly created resource.
    Id(CompactString),
}

impl Reply {
    fn id(id: impl AsRef<str>) -> Self {
        Self::Id(id.as_ref().into())
    }
}

/// The root context connecting one host with the engine.
///
/// Commands are dispatched with [`Bridge::process_command`] or [`Bridge::dispatch`]; everything
/// the engine reports afterwards arrives on the [`EventStream`] returned by [`Bridge::new`].
pub struct Bridge {
    config: BridgeConfig,
    kit: Arc<dyn MapKit>,
    codec: Codec,
    ids: Arc<IdGenerator>,
    emitter: EventEmitter,
    api_key: OnceLock<CompactString>,
    map_views: Mutex<HashMap<MapViewId, Arc<MapView>>>,
    search: Arc<SearchRegistry>,
    suggest: Arc<SuggestStream>,
}

impl Bridge {
    pub fn new(kit: Arc<dyn MapKit>, config: BridgeConfig) -> (Self, EventStream) {
        let codec = Codec;
        let (emitter, events) = EventEmitter::new(codec);
        let ids = Arc::new(IdGenerator::new());
        let search = Arc::new(SearchRegistry::new(
            kit.clone(),
            ids.clone(),
            emitter.clone(),
            config.default_search_manager,
        ));
        let suggest = Arc::new(SuggestStream::new(
            kit.clone(),
            emitter.clone(),
            config.default_search_manager,
            config.suggest_listener_attached,
        ));
        let bridge = Self {
            config,
            kit,
            codec,
            ids,
            emitter,
            api_key: OnceLock::new(),
            map_views: Mutex::default(),
            search,
            suggest,
        };
        (bridge, events)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn channel_name(&self, channel: &Channel) -> CompactString {
        channel.name(&self.config.channel_prefix)
    }

    pub fn search(&self) -> &Arc<SearchRegistry> {
        &self.search
    }

    pub fn suggest(&self) -> &Arc<SuggestStream> {
        &self.suggest
    }

    /// Attach a native map window. Its commands and events use the channel of the returned id.
    pub fn create_map_view(&self, window: Arc<dyn MapWindow>) -> MapViewId {
        let id = self.ids.map_view_id();
        let view = MapView::attach(id.clone(), window, self.ids.clone(), self.emitter.clone());
        lock(&self.map_views).insert(id.clone(), Arc::new(view));
        debug!("Attached map view {id}");
        id
    }

    /// Detach a map view and remove all of its objects. Returns whether the view existed.
    pub fn dispose_map_view(&self, id: &MapViewId) -> bool {
        let view = lock(&self.map_views).remove(id);
        match view {
            Some(view) => {
                view.tear_down();
                true
            }
            None => false,
        }
    }

    pub fn map_view(&self, id: &MapViewId) -> BridgeResult<Arc<MapView>> {
        lock(&self.map_views)
            .get(id)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownMapView { id: id.clone() })
    }

    /// Handle a command arriving as bytes on a named channel and return the encoded reply:
    /// `null` for commands without a result, or the identity of the created resource.
    pub fn process_command(
        &self,
        channel: &str,
        method: &str,
        payload: &[u8],
    ) -> BridgeResult<Vec<u8>> {
        let channel = Channel::parse(channel, &self.config.channel_prefix).ok_or_else(|| {
            BridgeError::UnknownChannel {
                name: channel.into(),
            }
        })?;
        let reply = self.dispatch(channel, method, payload)?;
        self.codec
            .encode(&reply)
            .map_err(|source| BridgeError::Encode { source })
    }

    pub fn dispatch(&self, channel: Channel, method: &str, payload: &[u8]) -> BridgeResult<Reply> {
        trace!("{} <- {method}", self.channel_name(&channel));
        let command = Command::decode(&self.codec, channel, method, payload)?;
        self.execute(command)
    }

    pub fn execute(&self, command: Command) -> BridgeResult<Reply> {
        Ok(match command {
            Command::SetApiKey(key) => {
                if self.api_key.set(key.clone()).is_ok() {
                    self.kit.set_api_key(&key);
                } else {
                    debug!("Ignoring repeated API key");
                }
                Reply::Void
            }
            Command::CreateSearchManager(kind) => Reply::id(self.search.create_manager(kind)),
            Command::DisposeSearchManager(id) => {
                self.search.dispose_manager(&id);
                Reply::Void
            }
            Command::SubmitWithPoint(params) => Reply::id(self.search.submit(
                params.manager_id.as_ref(),
                params.point,
                params.zoom,
                &params.options,
            )?),
            Command::CancelSearch(id) => {
                self.search.cancel(&id);
                Reply::Void
            }
            Command::DisposeSearch(id) => {
                self.search.dispose(&id);
                Reply::Void
            }
            Command::Suggest(params) => {
                self.suggest.suggest(&params);
                Reply::Void
            }
            Command::CancelSuggest => {
                self.suggest.cancel();
                Reply::Void
            }
            Command::ListenSuggest => {
                self.suggest.listen();
                Reply::Void
            }
            Command::UnlistenSuggest => {
                self.suggest.unlisten();
                Reply::Void
            }
            Command::Move { view, params } => {
                self.map_view(&view)?.move_camera(&params);
                Reply::Void
            }
            Command::AddPolygon { view, params } => Reply::id(
                self.map_view(&view)?
                    .objects()
                    .create_polygon(&params.polygon(), &params.style())?,
            ),
            Command::InitMarker { view, params } => Reply::id(
                self.map_view(&view)?
                    .objects()
                    .create_placemark(params.point, &params.props)?,
            ),
            Command::UpdateMarker { view, params } => {
                self.map_view(&view)?
                    .objects()
                    .update(&params.id, &params.props)?;
                Reply::Void
            }
            Command::RemoveObject { view, id } => {
                self.map_view(&view)?.objects().remove(&id);
                Reply::Void
            }
            Command::ShowUserLocation { view, icon } => {
                Reply::id(self.map_view(&view)?.objects().show_user_location(&icon)?)
            }
            Command::Unsupported { channel, method } => {
                let channel = self.channel_name(&channel);
                warn!("Unsupported command `{method}` on `{channel}`");
                return Err(BridgeError::UnsupportedCommand { channel, method });
            }
        })
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let views: Vec<Arc<MapView>> = lock(&self.map_views).drain().map(|(_, v)| v).collect();
        for view in views {
            view.tear_down();
        }
        self.suggest.cancel();
        self.search.dispose_all();
    }
}
