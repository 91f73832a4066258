//! Favorite routines

use super::{AppContext, Backend};
use crate::app::{AppAction, AppState};
use crate::song::{Song, SongAction};
use async_trait::async_trait;
use serde::de::IgnoredAny;
use soundwave_http::{Method, FALLBACK_MESSAGE};
use soundwave_runtime::Saga;
use std::sync::Arc;

fn favorite_path(id: &str) -> String {
    format!("/favorites/{}", urlencoding::encode(id))
}

/// Routes `ToggleFavorite` to an add or a remove, based on current favorites
#[derive(Debug, Clone, Copy)]
pub struct ToggleFavorite;

#[async_trait]
impl Saga<AppState, AppAction> for ToggleFavorite {
    fn name(&self) -> &'static str {
        "toggle_favorite"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::ToggleFavorite { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::ToggleFavorite { id }) = action else {
            return None;
        };

        let is_favorite = ctx.select(|s| s.song.is_favorite(&id)).await;
        Some(
            if is_favorite {
                SongAction::RemoveFavRequest { id }
            } else {
                SongAction::AddFavRequest { id }
            }
            .into(),
        )
    }
}

/// Marks a favorite on `AddFavRequest`
#[derive(Debug, Clone)]
pub struct AddFav {
    backend: Arc<Backend>,
}

impl AddFav {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for AddFav {
    fn name(&self) -> &'static str {
        "add_fav"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::AddFavRequest { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::AddFavRequest { id }) = action else {
            return None;
        };
        let result = self
            .backend
            .call_authenticated::<Song>(ctx, Method::Post, &favorite_path(&id), None)
            .await;

        Some(
            match result {
                Ok(song) => SongAction::AddFavSuccess(song),
                Err(message) => SongAction::AddFavFailure(message),
            }
            .into(),
        )
    }

    fn on_crash(&self) -> Option<AppAction> {
        Some(SongAction::AddFavFailure(FALLBACK_MESSAGE.to_string()).into())
    }
}

/// Unmarks a favorite on `RemoveFavRequest`
#[derive(Debug, Clone)]
pub struct RemoveFav {
    backend: Arc<Backend>,
}

impl RemoveFav {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for RemoveFav {
    fn name(&self) -> &'static str {
        "remove_fav"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::RemoveFavRequest { .. }))
    }

    async fn handle(&self, action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let AppAction::Song(SongAction::RemoveFavRequest { id }) = action else {
            return None;
        };
        let result = self
            .backend
            .call_authenticated::<IgnoredAny>(ctx, Method::Delete, &favorite_path(&id), None)
            .await;

        Some(
            match result {
                Ok(_) => SongAction::RemoveFavSuccess { id },
                Err(message) => SongAction::RemoveFavFailure(message),
            }
            .into(),
        )
    }

    fn on_crash(&self) -> Option<AppAction> {
        Some(SongAction::RemoveFavFailure(FALLBACK_MESSAGE.to_string()).into())
    }
}

/// Fetches favorites on `GetFavsRequest`
#[derive(Debug, Clone)]
pub struct GetFavs {
    backend: Arc<Backend>,
}

impl GetFavs {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for GetFavs {
    fn name(&self) -> &'static str {
        "get_favs"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Song(SongAction::GetFavsRequest))
    }

    async fn handle(&self, _action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let result = self
            .backend
            .call_authenticated::<Vec<Song>>(ctx, Method::Get, "/favorites", None)
            .await;

        Some(
            match result {
                Ok(songs) => SongAction::GetFavsSuccess(songs),
                Err(message) => SongAction::GetFavsFailure(message),
            }
            .into(),
        )
    }

    fn on_crash(&self) -> Option<AppAction> {
        Some(SongAction::GetFavsFailure(FALLBACK_MESSAGE.to_string()).into())
    }
}
