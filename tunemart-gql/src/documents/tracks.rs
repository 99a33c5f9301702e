//! Track listing, detail, comments and upload

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ArtistSummary, PageInput, Paged};
use crate::operation::Operation;
use crate::query::{MutationOptions, QueryKey, QueryOptions};
use crate::upload::{UploadFile, VariableTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub stream_count: u64,
    #[serde(default)]
    pub favorite_count: u64,
    pub artist: ArtistSummary,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDetail {
    #[serde(flatten)]
    pub track: Track,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Paged track listing
pub struct TracksQuery;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracksVariables {
    #[serde(flatten)]
    pub page: PageInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracksData {
    pub tracks: Paged<Track>,
}

impl Operation for TracksQuery {
    type Variables = TracksVariables;
    type ResponseData = TracksData;

    const QUERY: &'static str = r#"query Tracks($skip: Int, $take: Int, $search: String) {
  tracks(skip: $skip, take: $take, where: { name: { contains: $search } }) {
    totalCount
    items {
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
    const OPERATION_NAME: &'static str = "Tracks";
}

pub fn tracks_query_options(page: PageInput, search: Option<String>) -> QueryOptions<TracksQuery> {
    let key = QueryKey::new("tracks").param(page.skip).param(page.take).param(search.as_deref());
    QueryOptions::new(key, TracksVariables { page, search })
}

/// Single track with details
pub struct TrackDetailQuery;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackIdVariables {
    pub track_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDetailData {
    pub track: Option<TrackDetail>,
}

impl Operation for TrackDetailQuery {
    type Variables = TrackIdVariables;
    type ResponseData = TrackDetailData;

    const QUERY: &'static str = r#"query TrackDetail($trackId: String!) {
  track(id: $trackId) {
    id
    name
    description
    lyrics
    duration
    coverImage
    streamCount
    favoriteCount
    createdAt
    artist { id stageName avatarImage }
  }
}"#;
    const OPERATION_NAME: &'static str = "TrackDetail";
}

pub fn track_detail_query_options(track_id: &str) -> QueryOptions<TrackDetailQuery> {
    QueryOptions::new(
        track_detail_key(track_id),
        TrackIdVariables {
            track_id: track_id.to_string(),
        },
    )
}

fn track_detail_key(track_id: &str) -> QueryKey {
    QueryKey::new("track").param(track_id)
}

/// Post a comment on a track
pub struct CreateCommentMutation;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentVariables {
    pub track_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentData {
    pub create_comment: Comment,
}

impl Operation for CreateCommentMutation {
    type Variables = CreateCommentVariables;
    type ResponseData = CreateCommentData;

    const QUERY: &'static str = r#"mutation CreateComment($trackId: String!, $content: String!) {
  createComment(trackId: $trackId, content: $content) { id content createdAt }
}"#;
    const OPERATION_NAME: &'static str = "CreateComment";
}

pub fn create_comment_mutation_options(
    track_id: &str,
    content: impl Into<String>,
) -> MutationOptions<CreateCommentMutation> {
    MutationOptions::json(
        CreateCommentVariables {
            track_id: track_id.to_string(),
            content: content.into(),
        },
        vec![track_detail_key(track_id)],
    )
}

/// Artist uploads a new track with audio and cover art
pub struct UploadTrackMutation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTrackData {
    pub upload_track: Track,
}

impl Operation for UploadTrackMutation {
    type Variables = Value;
    type ResponseData = UploadTrackData;

    const QUERY: &'static str = r#"mutation UploadTrack($input: UploadTrackInput!) {
  uploadTrack(input: $input) {
    id
    name
    coverImage
    streamCount
    favoriteCount
    createdAt
    artist { id stageName avatarImage }
  }
}"#;
    const OPERATION_NAME: &'static str = "UploadTrack";
}

/// Track metadata sent alongside the files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTrackInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

impl UploadTrackInput {
    fn fields(&self) -> VariableTree<UploadFile> {
        let mut fields = VariableTree::object().with("name", Value::from(self.name.as_str()));
        if let Some(description) = &self.description {
            fields = fields.with("description", Value::from(description.as_str()));
        }
        fields.with("categoryIds", Value::from(self.category_ids.clone()))
    }
}

pub fn upload_track_mutation_options(
    input: &UploadTrackInput,
    audio: UploadFile,
    cover_image: Option<UploadFile>,
) -> MutationOptions<UploadTrackMutation> {
    let mut fields = input.fields().with("file", audio);
    if let Some(cover) = cover_image {
        fields = fields.with("coverImage", cover);
    }
    let variables: VariableTree<UploadFile> = VariableTree::object().with("input", fields);

    MutationOptions::upload(variables, vec![QueryKey::new("tracks")])
}
