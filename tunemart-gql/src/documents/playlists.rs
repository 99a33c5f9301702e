//! Playlists

use serde::{Deserialize, Serialize};

use super::tracks::Track;
use super::{PageInput, Paged};
use crate::operation::Operation;
use crate::query::{MutationOptions, QueryKey, QueryOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub total_tracks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: Playlist,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

fn playlists_key() -> QueryKey {
    QueryKey::new("playlists")
}

fn playlist_detail_key(playlist_id: &str) -> QueryKey {
    QueryKey::new("playlist").param(playlist_id)
}

/// Playlists owned by the signed-in listener
pub struct PlaylistsQuery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistsData {
    pub playlists: Paged<Playlist>,
}

impl Operation for PlaylistsQuery {
    type Variables = PageInput;
    type ResponseData = PlaylistsData;

    const QUERY: &'static str = r#"query Playlists($skip: Int, $take: Int) {
  playlists(skip: $skip, take: $take) {
    totalCount
    items { id name isPublic coverImage totalTracks }
  }
}"#;
    const OPERATION_NAME: &'static str = "Playlists";
}

pub fn playlists_query_options(page: PageInput) -> QueryOptions<PlaylistsQuery> {
    QueryOptions::new(playlists_key().param(page.skip).param(page.take), page)
}

/// One playlist with its tracks
pub struct PlaylistDetailQuery;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistIdVariables {
    pub playlist_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDetailData {
    pub playlist: Option<PlaylistDetail>,
}

impl Operation for PlaylistDetailQuery {
    type Variables = PlaylistIdVariables;
    type ResponseData = PlaylistDetailData;

    const QUERY: &'static str = r#"query PlaylistDetail($playlistId: String!) {
  playlist(id: $playlistId) {
    id
    name
    isPublic
    coverImage
    totalTracks
    tracks {
      id
      name
      coverImage
      streamCount
      favoriteCount
      createdAt
      artist { id stageName avatarImage }
    }
  }
}"#;
    const OPERATION_NAME: &'static str = "PlaylistDetail";
}

pub fn playlist_detail_query_options(playlist_id: &str) -> QueryOptions<PlaylistDetailQuery> {
    QueryOptions::new(
        playlist_detail_key(playlist_id),
        PlaylistIdVariables {
            playlist_id: playlist_id.to_string(),
        },
    )
}

pub struct CreatePlaylistMutation;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistVariables {
    pub name: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistData {
    pub create_playlist: Playlist,
}

impl Operation for CreatePlaylistMutation {
    type Variables = CreatePlaylistVariables;
    type ResponseData = CreatePlaylistData;

    const QUERY: &'static str = r#"mutation CreatePlaylist($name: String!, $isPublic: Boolean!) {
  createPlaylist(name: $name, isPublic: $isPublic) { id name isPublic coverImage totalTracks }
}"#;
    const OPERATION_NAME: &'static str = "CreatePlaylist";
}

pub fn create_playlist_mutation_options(
    name: impl Into<String>,
    is_public: bool,
) -> MutationOptions<CreatePlaylistMutation> {
    MutationOptions::json(
        CreatePlaylistVariables {
            name: name.into(),
            is_public,
        },
        vec![playlists_key()],
    )
}

pub struct AddTrackToPlaylistMutation;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTrackToPlaylistVariables {
    pub playlist_id: String,
    pub track_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTrackToPlaylistData {
    pub add_track_to_playlist: bool,
}

impl Operation for AddTrackToPlaylistMutation {
    type Variables = AddTrackToPlaylistVariables;
    type ResponseData = AddTrackToPlaylistData;

    const QUERY: &'static str = r#"mutation AddTrackToPlaylist($playlistId: String!, $trackId: String!) {
  addTrackToPlaylist(playlistId: $playlistId, trackId: $trackId)
}"#;
    const OPERATION_NAME: &'static str = "AddTrackToPlaylist";
}

/// Refreshes both the listing (track counts) and the playlist itself
pub fn add_track_to_playlist_mutation_options(
    playlist_id: &str,
    track_id: &str,
) -> MutationOptions<AddTrackToPlaylistMutation> {
    MutationOptions::json(
        AddTrackToPlaylistVariables {
            playlist_id: playlist_id.to_string(),
            track_id: track_id.to_string(),
        },
        vec![playlists_key(), playlist_detail_key(playlist_id)],
    )
}
