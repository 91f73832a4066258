//! Song container: library lists, favorites and the workflow discriminator
//!
//! Several fetches may be in flight at once (library and own songs on the
//! same screen), so loading is tracked per workflow. `is_loading` stays set
//! until every started workflow has settled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use soundwave_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

/// A song as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Song id
    #[serde(rename = "_id")]
    pub id: String,
    /// Title
    pub title: String,
    /// Artist
    pub artist: String,
    /// Album
    pub album: String,
    /// Genre
    pub genre: String,
    /// Cover art URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Audio URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Song fields sent when adding or editing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SongDraft {
    /// Title
    pub title: String,
    /// Artist
    pub artist: String,
    /// Album
    pub album: String,
    /// Genre
    pub genre: String,
    /// Cover art URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Audio URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Which song workflow the loading flag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SongWorkflow {
    /// Adding a song
    AddSong,
    /// Editing a song
    EditSong,
    /// Deleting a song
    DeleteSong,
    /// Fetching recent songs
    GetRecent,
    /// Fetching songs of a genre
    GetByGenre,
    /// Fetching the library
    GetAll,
    /// Fetching the user's own songs
    GetLib,
    /// Searching
    Search,
    /// Searching for songs to add
    SearchForAdd,
    /// Adding a favorite
    AddFav,
    /// Removing a favorite
    RemoveFav,
    /// Fetching favorites
    GetFavs,
}

/// Song slice of the application state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongState {
    /// Songs uploaded by the user
    pub my_songs: Vec<Song>,
    /// Whole library
    pub lib_songs: Vec<Song>,
    /// Favorites
    pub fav_songs: Vec<Song>,
    /// Recently added
    pub recent_songs: Vec<Song>,
    /// Songs of the last requested genre
    pub genre_songs: Vec<Song>,
    /// Results of the last search
    pub search_results: Vec<Song>,
    /// Results of the last search for songs to add
    pub add_search_results: Vec<Song>,
    /// Some request is in flight (see `in_flight`)
    pub is_loading: bool,
    /// The last request failed
    pub is_error: bool,
    /// The last request succeeded
    pub is_success: bool,
    /// Message of the last failure
    pub error_msg: String,
    /// Workflow of the last request
    pub current_state: Option<SongWorkflow>,
    /// Workflows started and not yet settled
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub in_flight: BTreeSet<SongWorkflow>,
}

impl SongState {
    /// Whether `workflow` has been requested and has not settled yet
    #[must_use]
    pub fn is_loading_for(&self, workflow: SongWorkflow) -> bool {
        self.in_flight.contains(&workflow)
    }

    /// Whether a song is among the favorites
    #[must_use]
    pub fn is_favorite(&self, id: &str) -> bool {
        self.fav_songs.iter().any(|s| s.id == id)
    }

    fn lists_mut(&mut self) -> [&mut Vec<Song>; 7] {
        [
            &mut self.my_songs,
            &mut self.lib_songs,
            &mut self.fav_songs,
            &mut self.recent_songs,
            &mut self.genre_songs,
            &mut self.search_results,
            &mut self.add_search_results,
        ]
    }

    fn begin(&mut self, workflow: SongWorkflow) {
        self.in_flight.insert(workflow);
        self.is_loading = true;
        self.current_state = Some(workflow);
    }

    /// Other workflows keep their loading indication
    fn settle(&mut self, workflow: SongWorkflow) {
        self.in_flight.remove(&workflow);
        self.is_loading = !self.in_flight.is_empty();
    }

    fn succeed(&mut self) {
        self.is_error = false;
        self.is_success = true;
        self.error_msg.clear();
    }

    fn fail(&mut self, message: String) {
        self.is_success = false;
        self.is_error = true;
        self.error_msg = message;
    }

    fn reset(&mut self) {
        self.is_loading = false;
        self.is_error = false;
        self.is_success = false;
        self.error_msg.clear();
        self.current_state = None;
        self.in_flight.clear();
    }
}

/// Song intents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongAction {
    /// Add a song
    AddSongRequest(SongDraft),
    /// Song added
    AddSongSuccess(Song),
    /// Adding failed
    AddSongFailure(String),

    /// Edit a song
    EditSongRequest {
        /// Song id
        id: String,
        /// New fields
        draft: SongDraft,
    },
    /// Song edited
    EditSongSuccess(Song),
    /// Editing failed
    EditSongFailure(String),

    /// Delete a song
    DeleteSongRequest {
        /// Song id
        id: String,
    },
    /// Song deleted
    DeleteSongSuccess {
        /// Song id
        id: String,
    },
    /// Deleting failed
    DeleteSongFailure(String),

    /// Fetch recently added songs
    GetRecentRequest,
    /// Recent songs fetched
    GetRecentSuccess(Vec<Song>),
    /// Fetching recent songs failed
    GetRecentFailure(String),

    /// Fetch songs of a genre
    GetByGenreRequest {
        /// Genre name
        genre: String,
    },
    /// Genre songs fetched
    GetByGenreSuccess(Vec<Song>),
    /// Fetching genre songs failed
    GetByGenreFailure(String),

    /// Fetch the whole library
    GetLibRequest,
    /// Library fetched
    GetLibSuccess(Vec<Song>),
    /// Fetching the library failed
    GetLibFailure(String),

    /// Fetch the user's own songs
    GetMySongsRequest,
    /// Own songs fetched
    GetMySongsSuccess(Vec<Song>),
    /// Fetching own songs failed
    GetMySongsFailure(String),

    /// Search the library
    SearchRequest {
        /// Search text
        query: String,
    },
    /// Search results
    SearchSuccess(Vec<Song>),
    /// Search failed
    SearchFailure(String),

    /// Search for songs to add to the user's list
    SearchForAddRequest {
        /// Search text
        query: String,
    },
    /// Search-for-add results
    SearchForAddSuccess(Vec<Song>),
    /// Search-for-add failed
    SearchForAddFailure(String),

    /// Mark a song as favorite
    AddFavRequest {
        /// Song id
        id: String,
    },
    /// Favorite added
    AddFavSuccess(Song),
    /// Adding the favorite failed
    AddFavFailure(String),

    /// Unmark a favorite
    RemoveFavRequest {
        /// Song id
        id: String,
    },
    /// Favorite removed
    RemoveFavSuccess {
        /// Song id
        id: String,
    },
    /// Removing the favorite failed
    RemoveFavFailure(String),

    /// Fetch favorites
    GetFavsRequest,
    /// Favorites fetched
    GetFavsSuccess(Vec<Song>),
    /// Fetching favorites failed
    GetFavsFailure(String),

    /// Add or remove a favorite depending on its current state
    ToggleFavorite {
        /// Song id
        id: String,
    },
    /// Neutralize the transient flags
    Reset,
    /// Drop everything tied to the signed-in user
    ClearUserData,
}

impl SongAction {
    /// Workflow started by a request intent
    #[must_use]
    pub const fn requested_workflow(&self) -> Option<SongWorkflow> {
        Some(match self {
            Self::AddSongRequest(_) => SongWorkflow::AddSong,
            Self::EditSongRequest { .. } => SongWorkflow::EditSong,
            Self::DeleteSongRequest { .. } => SongWorkflow::DeleteSong,
            Self::GetRecentRequest => SongWorkflow::GetRecent,
            Self::GetByGenreRequest { .. } => SongWorkflow::GetByGenre,
            Self::GetLibRequest => SongWorkflow::GetAll,
            Self::GetMySongsRequest => SongWorkflow::GetLib,
            Self::SearchRequest { .. } => SongWorkflow::Search,
            Self::SearchForAddRequest { .. } => SongWorkflow::SearchForAdd,
            Self::AddFavRequest { .. } => SongWorkflow::AddFav,
            Self::RemoveFavRequest { .. } => SongWorkflow::RemoveFav,
            Self::GetFavsRequest => SongWorkflow::GetFavs,
            _ => return None,
        })
    }

    /// Workflow finished by a success or failure intent
    #[must_use]
    pub const fn settled_workflow(&self) -> Option<SongWorkflow> {
        Some(match self {
            Self::AddSongSuccess(_) | Self::AddSongFailure(_) => SongWorkflow::AddSong,
            Self::EditSongSuccess(_) | Self::EditSongFailure(_) => SongWorkflow::EditSong,
            Self::DeleteSongSuccess { .. } | Self::DeleteSongFailure(_) => SongWorkflow::DeleteSong,
            Self::GetRecentSuccess(_) | Self::GetRecentFailure(_) => SongWorkflow::GetRecent,
            Self::GetByGenreSuccess(_) | Self::GetByGenreFailure(_) => SongWorkflow::GetByGenre,
            Self::GetLibSuccess(_) | Self::GetLibFailure(_) => SongWorkflow::GetAll,
            Self::GetMySongsSuccess(_) | Self::GetMySongsFailure(_) => SongWorkflow::GetLib,
            Self::SearchSuccess(_) | Self::SearchFailure(_) => SongWorkflow::Search,
            Self::SearchForAddSuccess(_) | Self::SearchForAddFailure(_) => SongWorkflow::SearchForAdd,
            Self::AddFavSuccess(_) | Self::AddFavFailure(_) => SongWorkflow::AddFav,
            Self::RemoveFavSuccess { .. } | Self::RemoveFavFailure(_) => SongWorkflow::RemoveFav,
            Self::GetFavsSuccess(_) | Self::GetFavsFailure(_) => SongWorkflow::GetFavs,
            _ => return None,
        })
    }
}

fn replace_by_id(list: &mut [Song], song: &Song) {
    for slot in list.iter_mut().filter(|s| s.id == song.id) {
        slot.clone_from(song);
    }
}

/// Reducer for [`SongState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SongReducer;

impl Reducer for SongReducer {
    type State = SongState;
    type Action = SongAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if let Some(workflow) = action.requested_workflow() {
            state.begin(workflow);
            return smallvec![Effect::None];
        }
        if let Some(workflow) = action.settled_workflow() {
            state.settle(workflow);
        }

        match action {
            SongAction::AddSongSuccess(song) => {
                state.succeed();
                state.my_songs.push(song);
            },
            SongAction::EditSongSuccess(song) => {
                state.succeed();
                for list in state.lists_mut() {
                    replace_by_id(list, &song);
                }
            },
            SongAction::DeleteSongSuccess { id } => {
                state.succeed();
                for list in state.lists_mut() {
                    list.retain(|s| s.id != id);
                }
            },
            SongAction::GetRecentSuccess(songs) => {
                state.succeed();
                state.recent_songs = songs;
            },
            SongAction::GetByGenreSuccess(songs) => {
                state.succeed();
                state.genre_songs = songs;
            },
            SongAction::GetLibSuccess(songs) => {
                state.succeed();
                state.lib_songs = songs;
            },
            SongAction::GetMySongsSuccess(songs) => {
                state.succeed();
                state.my_songs = songs;
            },
            SongAction::SearchSuccess(songs) => {
                state.succeed();
                state.search_results = songs;
            },
            SongAction::SearchForAddSuccess(songs) => {
                state.succeed();
                state.add_search_results = songs;
            },
            SongAction::AddFavSuccess(song) => {
                state.succeed();
                if !state.is_favorite(&song.id) {
                    state.fav_songs.push(song);
                }
            },
            SongAction::RemoveFavSuccess { id } => {
                state.succeed();
                state.fav_songs.retain(|s| s.id != id);
            },
            SongAction::GetFavsSuccess(songs) => {
                state.succeed();
                state.fav_songs = songs;
            },
            SongAction::AddSongFailure(message)
            | SongAction::EditSongFailure(message)
            | SongAction::DeleteSongFailure(message)
            | SongAction::GetRecentFailure(message)
            | SongAction::GetByGenreFailure(message)
            | SongAction::GetLibFailure(message)
            | SongAction::GetMySongsFailure(message)
            | SongAction::SearchFailure(message)
            | SongAction::SearchForAddFailure(message)
            | SongAction::AddFavFailure(message)
            | SongAction::RemoveFavFailure(message)
            | SongAction::GetFavsFailure(message) => state.fail(message),
            SongAction::Reset => state.reset(),
            SongAction::ClearUserData => {
                let in_flight = std::mem::take(&mut state.in_flight);
                state.my_songs.clear();
                state.fav_songs.clear();
                state.add_search_results.clear();
                state.reset();
                // Fetches still running will settle on their own
                state.is_loading = !in_flight.is_empty();
                state.in_flight = in_flight;
            },
            // Routed to the add/remove favorite routines
            SongAction::ToggleFavorite { .. } => {},
            // Request intents were handled above
            SongAction::AddSongRequest(_)
            | SongAction::EditSongRequest { .. }
            | SongAction::DeleteSongRequest { .. }
            | SongAction::GetRecentRequest
            | SongAction::GetByGenreRequest { .. }
            | SongAction::GetLibRequest
            | SongAction::GetMySongsRequest
            | SongAction::SearchRequest { .. }
            | SongAction::SearchForAddRequest { .. }
            | SongAction::AddFavRequest { .. }
            | SongAction::RemoveFavRequest { .. }
            | SongAction::GetFavsRequest => {},
        }

        smallvec![Effect::None]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundwave_testing::{assertions, ReducerTest};

    fn song(id: &str, title: &str) -> Song {
        Song {
            id: id.to_string(),
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            genre: "jazz".to_string(),
            image: None,
            url: None,
        }
    }

    #[test]
    fn test_request_sets_workflow() {
        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(SongState::default())
            .when_action(SongAction::GetMySongsRequest)
            .then_state(|s| {
                assert!(s.is_loading_for(SongWorkflow::GetLib));
                assert!(!s.is_loading_for(SongWorkflow::GetAll));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_overlapping_fetches_keep_their_own_loading_signal() {
        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(SongState::default())
            .when_actions([
                SongAction::GetLibRequest,
                SongAction::GetMySongsRequest,
                SongAction::GetLibSuccess(vec![song("l1", "Lib")]),
            ])
            .then_state(|s| {
                assert!(!s.is_loading_for(SongWorkflow::GetAll));
                assert!(s.is_loading_for(SongWorkflow::GetLib));
                assert!(s.is_loading);
                assert_eq!(s.current_state, Some(SongWorkflow::GetLib));
                assert_eq!(s.lib_songs.len(), 1);
            })
            .run();

        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(SongState::default())
            .when_actions([
                SongAction::GetLibRequest,
                SongAction::GetMySongsRequest,
                SongAction::GetMySongsFailure("Request failed with status code 500".to_string()),
            ])
            .then_state(|s| {
                assert!(s.is_loading_for(SongWorkflow::GetAll));
                assert!(!s.is_loading_for(SongWorkflow::GetLib));
                assert!(s.is_loading && s.is_error);
            })
            .run();
    }

    #[test]
    fn test_clear_user_data_keeps_running_fetches_loading() {
        let state = SongState {
            my_songs: vec![song("m1", "Mine")],
            fav_songs: vec![song("f1", "Fav")],
            lib_songs: vec![song("l1", "Lib")],
            ..SongState::default()
        };

        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(state)
            .when_actions([SongAction::GetRecentRequest, SongAction::ClearUserData])
            .then_state(|s| {
                assert!(s.my_songs.is_empty() && s.fav_songs.is_empty());
                assert_eq!(s.lib_songs.len(), 1);
                assert!(s.is_loading_for(SongWorkflow::GetRecent));
                assert!(s.is_loading);
            })
            .run();
    }

    #[test]
    fn test_library_and_my_songs_use_separate_fields() {
        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(SongState::default())
            .when_actions([
                SongAction::GetLibRequest,
                SongAction::GetMySongsRequest,
                SongAction::GetMySongsSuccess(vec![song("m1", "Mine")]),
                SongAction::GetLibSuccess(vec![song("l1", "Lib"), song("l2", "Lib 2")]),
            ])
            .then_state(|s| {
                assert_eq!(s.my_songs.len(), 1);
                assert_eq!(s.lib_songs.len(), 2);
                assert!(s.is_success && !s.is_loading);
            })
            .run();
    }

    #[test]
    fn test_edit_replaces_everywhere_and_delete_removes_everywhere() {
        let original = song("s1", "Old");
        let state = SongState {
            my_songs: vec![original.clone()],
            lib_songs: vec![original.clone(), song("s2", "Other")],
            fav_songs: vec![original],
            ..SongState::default()
        };

        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(state.clone())
            .when_action(SongAction::EditSongSuccess(song("s1", "New")))
            .then_state(|s| {
                assert_eq!(s.my_songs[0].title, "New");
                assert_eq!(s.lib_songs[0].title, "New");
                assert_eq!(s.fav_songs[0].title, "New");
                assert_eq!(s.lib_songs[1].title, "Other");
            })
            .run();

        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(state)
            .when_action(SongAction::DeleteSongSuccess { id: "s1".to_string() })
            .then_state(|s| {
                assert!(s.my_songs.is_empty() && s.fav_songs.is_empty());
                assert_eq!(s.lib_songs.len(), 1);
            })
            .run();
    }

    #[test]
    fn test_favorites() {
        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(SongState::default())
            .when_actions([
                SongAction::AddFavSuccess(song("s1", "A")),
                SongAction::AddFavSuccess(song("s1", "A")),
                SongAction::AddFavSuccess(song("s2", "B")),
                SongAction::RemoveFavSuccess { id: "s1".to_string() },
            ])
            .then_state(|s| {
                assert_eq!(s.fav_songs, vec![song("s2", "B")]);
                assert!(s.is_favorite("s2"));
            })
            .run();
    }

    #[test]
    fn test_failure_then_reset() {
        ReducerTest::new(SongReducer)
            .with_env(())
            .given_state(SongState {
                lib_songs: vec![song("l1", "Kept")],
                ..SongState::default()
            })
            .when_actions([
                SongAction::SearchRequest { query: "x".to_string() },
                SongAction::SearchFailure("Request failed with status code 500".to_string()),
            ])
            .then_state(|s| {
                assert!(s.is_error && !s.is_success && !s.is_loading);
                assert_eq!(s.error_msg, "Request failed with status code 500");
                assert_eq!(s.current_state, Some(SongWorkflow::Search));
            })
            .run();

        let mut state = SongState {
            is_error: true,
            error_msg: "boom".to_string(),
            lib_songs: vec![song("l1", "Kept")],
            ..SongState::default()
        };
        let _ = SongReducer.reduce(&mut state, SongAction::Reset, &());
        assert!(!state.is_error && state.error_msg.is_empty());
        assert_eq!(state.lib_songs.len(), 1);
    }

    #[test]
    fn test_workflow_tags_serialize() {
        assert_eq!(serde_json::to_value(SongWorkflow::GetAll).ok(), Some(serde_json::json!("GET_ALL")));
        assert_eq!(
            serde_json::to_value(SongWorkflow::SearchForAdd).ok(),
            Some(serde_json::json!("SEARCH_FOR_ADD"))
        );
    }
}
