//! Listener requests to artists (custom tracks, commissions)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ArtistSummary, PageInput, Paged};
use crate::operation::Operation;
use crate::query::{MutationOptions, QueryKey, QueryOptions};
use crate::upload::{UploadFile, VariableTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRequest {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub artist: Option<ArtistSummary>,
}

fn requests_key() -> QueryKey {
    QueryKey::new("requests")
}

pub struct RequestsQuery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestsData {
    pub requests: Paged<ArtistRequest>,
}

impl Operation for RequestsQuery {
    type Variables = PageInput;
    type ResponseData = RequestsData;

    const QUERY: &'static str = r#"query Requests($skip: Int, $take: Int) {
  requests(skip: $skip, take: $take) {
    totalCount
    items { id title summary status budget artist { id stageName avatarImage } }
  }
}"#;
    const OPERATION_NAME: &'static str = "Requests";
}

pub fn requests_query_options(page: PageInput) -> QueryOptions<RequestsQuery> {
    QueryOptions::new(requests_key().param(page.skip).param(page.take), page)
}

/// Create a request, optionally with a reference attachment
pub struct CreateRequestMutation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestData {
    pub create_request: ArtistRequest,
}

impl Operation for CreateRequestMutation {
    type Variables = Value;
    type ResponseData = CreateRequestData;

    const QUERY: &'static str = r#"mutation CreateRequest($createRequest: CreateRequestInput!) {
  createRequest(createRequest: $createRequest) {
    id title summary status budget artist { id stageName avatarImage }
  }
}"#;
    const OPERATION_NAME: &'static str = "CreateRequest";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestInput {
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

impl CreateRequestInput {
    fn fields(&self) -> VariableTree<UploadFile> {
        let mut fields = VariableTree::object()
            .with("title", Value::from(self.title.as_str()))
            .with("summary", Value::from(self.summary.as_str()));
        if let Some(artist_id) = &self.artist_id {
            fields = fields.with("artistId", Value::from(artist_id.as_str()));
        }
        if let Some(budget) = self.budget {
            fields = fields.with("budget", Value::from(budget));
        }
        fields
    }
}

/// The attachment lands at `variables.createRequest.file`
pub fn create_request_mutation_options(
    input: &CreateRequestInput,
    attachment: Option<UploadFile>,
) -> MutationOptions<CreateRequestMutation> {
    let mut fields = input.fields();
    if let Some(file) = attachment {
        fields = fields.with("file", file);
    }
    let variables: VariableTree<UploadFile> = VariableTree::object().with("createRequest", fields);

    MutationOptions::upload(variables, vec![requests_key()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::query::MutationInput;
    use crate::upload::UploadPlan;

    #[test]
    fn test_create_request_map() {
        let input = CreateRequestInput {
            title: "Wedding song".to_string(),
            summary: "Acoustic, 3 minutes".to_string(),
            artist_id: Some("a1".to_string()),
            budget: None,
        };
        let options = create_request_mutation_options(&input, Some(UploadFile::from_bytes("brief.pdf", vec![7])));
        assert_eq!(options.invalidates, vec![QueryKey::new("requests")]);

        let MutationInput::Upload(tree) = options.input else {
            panic!("expected upload input");
        };
        let plan = UploadPlan::build(&CreateRequestMutation::query(), tree).unwrap();
        assert_eq!(
            serde_json::to_value(&plan.map).unwrap(),
            json!({"0": ["variables.createRequest.file"]})
        );
        assert_eq!(plan.operations["variables"]["createRequest"]["file"], Value::Null);
        assert_eq!(plan.operations["variables"]["createRequest"]["artistId"], "a1");
    }

    #[test]
    fn test_request_fields_match_serialized_input() {
        let input = CreateRequestInput {
            title: "Wedding song".to_string(),
            summary: "Acoustic".to_string(),
            artist_id: Some("a1".to_string()),
            budget: Some(120.5),
        };
        let extracted = input.fields().extract_payloads("variables");
        assert_eq!(extracted.variables, serde_json::to_value(&input).unwrap());
    }

    #[test]
    fn test_create_request_without_attachment() {
        let input = CreateRequestInput {
            title: "t".to_string(),
            summary: "s".to_string(),
            artist_id: None,
            budget: Some(50.0),
        };
        let options = create_request_mutation_options(&input, None);
        let MutationInput::Upload(tree) = options.input else {
            panic!("expected upload input");
        };
        assert_eq!(tree.payload_count(), 0);
    }
}
