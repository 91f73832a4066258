//! Song routines: add, edit, delete, the list fetches and both searches

use super::{AppContext, Backend};
use crate::app::{AppAction, AppState};
use crate::song::{Song, SongAction};
use async_trait::async_trait;
use serde::de::IgnoredAny;
use soundwave_http::{Method, FALLBACK_MESSAGE};
use soundwave_runtime::{Saga, TakePolicy};
use std::sync::Arc;

fn answer(action: SongAction) -> Option<AppAction> {
    Some(action.into())
}

fn fallback(failure: fn(String) -> SongAction) -> Option<AppAction> {
    answer(failure(FALLBACK_MESSAGE.to_string()))
}

fn settle<T>(result: Result<T, String>, success: impl FnOnce(T) -> SongAction, failure: fn(String) -> SongAction) -> Option<AppAction> {
    answer(match result {
        Ok(value) => success(value),
        Err(message) => failure(message),
    })
}

/// Posts a new song on `AddSongRequest`
#[derive(Debug, Clone)]
pub struct AddSong {
    backend: Arc<Backend>,
}

impl AddSong {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for AddSong {
    fn name(&self) -> &'static str {
        "add_song"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::AddSongRequest(_)))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::AddSongRequest(draft)) = action else {
            return None;
        };
        let body = match serde_json::to_value(&draft) {
            Ok(body) => body,
            Err(error) => return answer(SongAction::AddSongFailure(error.to_string())),
        };
        let result = self
            .backend
            .call_authenticated::<Song>(ctx, Method::Post, "/songs", Some(body))
            .await;

        settle(result, SongAction::AddSongSuccess, SongAction::AddSongFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::AddSongFailure)
    }
}

/// Updates a song on `EditSongRequest`
#[derive(Debug, Clone)]
pub struct EditSong {
    backend: Arc<Backend>,
}

impl EditSong {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for EditSong {
    fn name(&self) -> &'static str {
        "edit_song"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::EditSongRequest { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::EditSongRequest { id, draft }) = action else {
            return None;
        };
        let path = format!("/songs/{}", urlencoding::encode(&id));
        let body = match serde_json::to_value(&draft) {
            Ok(body) => body,
            Err(error) => return answer(SongAction::EditSongFailure(error.to_string())),
        };
        let result = self
            .backend
            .call_authenticated::<Song>(ctx, Method::Put, &path, Some(body))
            .await;

        settle(result, SongAction::EditSongSuccess, SongAction::EditSongFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::EditSongFailure)
    }
}

/// Deletes a song on `DeleteSongRequest`
#[derive(Debug, Clone)]
pub struct DeleteSong {
    backend: Arc<Backend>,
}

impl DeleteSong {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for DeleteSong {
    fn name(&self) -> &'static str {
        "delete_song"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::DeleteSongRequest { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::DeleteSongRequest { id }) = action else {
            return None;
        };
        let path = format!("/songs/{}", urlencoding::encode(&id));
        let result = self
            .backend
            .call_authenticated::<IgnoredAny>(ctx, Method::Delete, &path, None)
            .await;

        settle(result, |_| SongAction::DeleteSongSuccess { id }, SongAction::DeleteSongFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::DeleteSongFailure)
    }
}

/// Fetches recently added songs on `GetRecentRequest`
#[derive(Debug, Clone)]
pub struct GetRecent {
    backend: Arc<Backend>,
}

impl GetRecent {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for GetRecent {
    fn name(&self) -> &'static str {
        "get_recent"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::GetRecentRequest))
    }

    async fn handle(&self, _action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let result = self
            .backend
            .call_authenticated::<Vec<Song>>(ctx, Method::Get, "/songs/recent", None)
            .await;

        settle(result, SongAction::GetRecentSuccess, SongAction::GetRecentFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::GetRecentFailure)
    }
}

/// Fetches one genre on `GetByGenreRequest`
#[derive(Debug, Clone)]
pub struct GetByGenre {
    backend: Arc<Backend>,
}

impl GetByGenre {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for GetByGenre {
    fn name(&self) -> &'static str {
        "get_by_genre"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::GetByGenreRequest { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::GetByGenreRequest { genre }) = action else {
            return None;
        };
        let path = format!("/songs/genre/{}", urlencoding::encode(&genre));
        let result = self
            .backend
            .call_authenticated::<Vec<Song>>(ctx, Method::Get, &path, None)
            .await;

        settle(result, SongAction::GetByGenreSuccess, SongAction::GetByGenreFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::GetByGenreFailure)
    }
}

/// Fetches the whole library on `GetLibRequest`
#[derive(Debug, Clone)]
pub struct GetLib {
    backend: Arc<Backend>,
}

impl GetLib {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for GetLib {
    fn name(&self) -> &'static str {
        "get_lib"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::GetLibRequest))
    }

    async fn handle(&self, _action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let result = self
            .backend
            .call_authenticated::<Vec<Song>>(ctx, Method::Get, "/songs", None)
            .await;

        settle(result, SongAction::GetLibSuccess, SongAction::GetLibFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::GetLibFailure)
    }
}

/// Fetches the user's own songs on `GetMySongsRequest`
#[derive(Debug, Clone)]
pub struct GetMySongs {
    backend: Arc<Backend>,
}

impl GetMySongs {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for GetMySongs {
    fn name(&self) -> &'static str {
        "get_my_songs"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::GetMySongsRequest))
    }

    async fn handle(&self, _action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let result = self
            .backend
            .call_authenticated::<Vec<Song>>(ctx, Method::Get, "/songs/mine", None)
            .await;

        settle(result, SongAction::GetMySongsSuccess, SongAction::GetMySongsFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::GetMySongsFailure)
    }
}

fn search_path(query: &str) -> String {
    format!("/songs/search?q={}", urlencoding::encode(query))
}

/// Searches the library on `SearchRequest`; a newer query supersedes an older one
#[derive(Debug, Clone)]
pub struct Search {
    backend: Arc<Backend>,
}

impl Search {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for Search {
    fn name(&self) -> &'static str {
        "search"
    }

    fn policy(&self) -> TakePolicy {
        TakePolicy::Latest
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::SearchRequest { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::SearchRequest { query }) = action else {
            return None;
        };
        let result = self
            .backend
            .call_authenticated::<Vec<Song>>(ctx, Method::Get, &search_path(&query), None)
            .await;

        settle(result, SongAction::SearchSuccess, SongAction::SearchFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::SearchFailure)
    }
}

/// Searches for songs to add on `SearchForAddRequest`
#[derive(Debug, Clone)]
pub struct SearchForAdd {
    backend: Arc<Backend>,
}

impl SearchForAdd {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for SearchForAdd {
    fn name(&self) -> &'static str {
        "search_for_add"
    }

    fn policy(&self) -> TakePolicy {
        TakePolicy::Latest
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::SearchForAddRequest { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::SearchForAddRequest { query }) = action else {
            return None;
        };
        let result = self
            .backend
            .call_authenticated::<Vec<Song>>(ctx, Method::Get, &search_path(&query), None)
            .await;

        settle(result, SongAction::SearchForAddSuccess, SongAction::SearchForAddFailure)
    }

    fn on_crash(&self) -> Option<AppAction> {
        fallback(SongAction::SearchForAddFailure)
    }
}
