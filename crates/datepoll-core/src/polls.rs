//! Poll endpoints, as a consumer of the request pipeline.
//!
//! Authentication is invisible here: tokens and expiry are handled by
//! `ApiClient::send`.

use serde_json::Value;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{PollEnvelope, PollListResponse, PollSummary};

const POLLS_PATH: &str = "/api/polls";
const USER_POLLS_PATH: &str = "/api/user/polls";

#[derive(Clone)]
pub struct PollsApi {
    api: ApiClient,
}

impl PollsApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// List public polls. `params` are passed through as query parameters.
    pub async fn list(&self, params: &[(&str, &str)]) -> Result<Vec<PollSummary>, ApiError> {
        let request = params
            .iter()
            .fold(ApiRequest::get(POLLS_PATH), |request, (key, value)| {
                request.query(*key, *value)
            });
        let response: PollListResponse = self.api.send_json(request).await?;
        Ok(response.polls)
    }

    pub async fn get(&self, id: &str) -> Result<PollSummary, ApiError> {
        let envelope: PollEnvelope = self.api.get(&poll_path(id)).await?;
        Ok(envelope.poll)
    }

    /// Full poll payload, including dates, votes and comments.
    pub async fn get_raw(&self, id: &str) -> Result<Value, ApiError> {
        self.api.get(&poll_path(id)).await
    }

    pub async fn create(&self, body: &Value) -> Result<Value, ApiError> {
        self.api.post(POLLS_PATH, body).await
    }

    pub async fn update(&self, id: &str, body: &Value) -> Result<Value, ApiError> {
        self.api.put(&poll_path(id), body).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete(&poll_path(id)).await
    }

    pub async fn vote(&self, id: &str, body: &Value) -> Result<Value, ApiError> {
        self.api.post(&format!("{}/vote", poll_path(id)), body).await
    }

    /// Polls created by the signed-in user.
    pub async fn mine(&self) -> Result<Vec<PollSummary>, ApiError> {
        let response: PollListResponse = self.api.get(USER_POLLS_PATH).await?;
        Ok(response.polls)
    }
}

fn poll_path(id: &str) -> String {
    format!("{}/{}", POLLS_PATH, urlencoding::encode(id))
}

#[cfg(test)]
mod tests {
    use super::poll_path;
    use crate::test_support::{auth_body, Harness};
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_list_passes_params() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/polls")
            .match_query(Matcher::UrlEncoded("search".into(), "lunch".into()))
            .with_status(200)
            .with_body(r#"{"polls":[{"id":"p1","title":"Lunch"}],"count":1}"#)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        let polls = h.ctx.polls().list(&[("search", "lunch")]).await.expect("list");
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].id, "p1");
    }

    #[test]
    fn test_poll_path_encodes_id() {
        assert_eq!(poll_path("p1"), "/api/polls/p1");
        assert_eq!(poll_path("a/b c"), "/api/polls/a%2Fb%20c");
    }

    #[tokio::test]
    async fn test_get_unwraps_envelope() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/polls/p1")
            .with_status(200)
            .with_body(r#"{"poll":{"id":"p1","title":"Retro","location":"Room 2"},"votes":[]}"#)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        let poll = h.ctx.polls().get("p1").await.expect("get");
        assert_eq!(poll.location, "Room 2");
    }

    #[tokio::test]
    async fn test_create_recovers_from_expired_token() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/polls")
            .match_header("authorization", "Bearer T1")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/api/auth/refresh")
            .with_status(200)
            .with_body(auth_body("T2", "R2"))
            .create_async()
            .await;
        let created = server
            .mock("POST", "/api/polls")
            .match_header("authorization", "Bearer T2")
            .match_body(Matcher::Json(json!({"title": "Offsite"})))
            .with_status(201)
            .with_body(r#"{"id":"p9","title":"Offsite"}"#)
            .expect(1)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.sign_in("T1", "R1");
        let poll = h
            .ctx
            .polls()
            .create(&json!({"title": "Offsite"}))
            .await
            .expect("create");
        assert_eq!(poll["id"], "p9");
        created.assert_async().await;
    }

    #[tokio::test]
    async fn test_mine_and_delete() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/user/polls")
            .with_status(200)
            .with_body(r#"{"polls":[],"count":0}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/polls/p1")
            .with_status(200)
            .with_body(r#"{"message":"Poll deleted"}"#)
            .expect(1)
            .create_async()
            .await;

        let h = Harness::new(&server.url());
        h.sign_in("T1", "R1");
        assert!(h.ctx.polls().mine().await.expect("mine").is_empty());
        h.ctx.polls().delete("p1").await.expect("delete");
        delete.assert_async().await;
    }
}
