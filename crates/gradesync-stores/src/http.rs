//! Grade store backed by a remote exam document service.
//!
//! Routes:
//! - `GET  /exams` lists exam ids
//! - `GET  /exams/{id}/answers` returns merged answers (404 for an unknown exam)
//! - `GET  /exams/{id}/grades` returns the ordered grade list
//! - `GET  /exams/{id}/grades/{idx}` returns one record (404 when absent)
//! - `PUT  /exams/{id}/grades/{idx}` upserts one record atomically

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::instrument;

use gradesync_core::model::{GradeRecord, MergedAnswerEntry};
use gradesync_core::traits::{AnswerSource, GradeStore};
use gradesync_core::StoreError;

use crate::document::validate_exam_id;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct HttpGradeStore {
    name: String,
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpGradeStore {
    pub fn new(name: &str, base_url: &str, api_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.is_empty()),
            client,
        }
    }

    fn exam_url(&self, exam_id: &str, rest: &str) -> Result<String, StoreError> {
        validate_exam_id(exam_id)?;
        Ok(format!("{}/exams/{exam_id}{rest}", self.base_url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        self.authorize(request).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out after {DEFAULT_TIMEOUT_SECS}s")
            } else if e.is_connect() {
                format!("not reachable at {}", self.base_url)
            } else {
                e.to_string()
            };
            StoreError::Unavailable {
                store: self.name.clone(),
                message,
            }
        })
    }

    async fn check_status(&self, response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) {
            return Err(StoreError::Unavailable {
                store: self.name.clone(),
                message: format!("HTTP {}: {body}", status.as_u16()),
            });
        }
        Err(StoreError::Http {
            store: self.name.clone(),
            status: status.as_u16(),
            message: body,
        })
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, StoreError> {
        response.json().await.map_err(|e| StoreError::Decode {
            store: self.name.clone(),
            message: format!("failed to parse response: {e}"),
        })
    }

    /// GET a JSON body, mapping 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, url: String) -> Result<Option<T>, StoreError> {
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.check_status(response).await?;
        self.decode(response).await.map(Some)
    }

    async fn list_exams(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .send(self.client.get(format!("{}/exams", self.base_url)))
            .await?;
        let response = self.check_status(response).await?;
        self.decode(response).await
    }
}

#[async_trait]
impl GradeStore for HttpGradeStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn get_grade(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<Option<GradeRecord>, StoreError> {
        let url = self.exam_url(exam_id, &format!("/grades/{question_index}"))?;
        self.get_optional(url).await
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn list_grades(&self, exam_id: &str) -> Result<Vec<GradeRecord>, StoreError> {
        let url = self.exam_url(exam_id, "/grades")?;
        Ok(self.get_optional(url).await?.unwrap_or_default())
    }

    #[instrument(
        skip(self, record),
        fields(store = %self.name, exam_id = %record.exam_id, question_index = record.question_index)
    )]
    async fn upsert_grade(&self, record: &GradeRecord) -> Result<(), StoreError> {
        let url = self.exam_url(
            &record.exam_id,
            &format!("/grades/{}", record.question_index),
        )?;
        let response = self.send(self.client.put(url).json(record)).await?;
        self.check_status(response).await?;
        tracing::debug!("grade upserted");
        Ok(())
    }

    async fn exam_ids(&self) -> Result<Vec<String>, StoreError> {
        self.list_exams().await
    }
}

#[async_trait]
impl AnswerSource for HttpGradeStore {
    #[instrument(skip(self), fields(store = %self.name))]
    async fn merged_answers(
        &self,
        exam_id: &str,
    ) -> Result<Option<Vec<MergedAnswerEntry>>, StoreError> {
        let url = self.exam_url(exam_id, "/answers")?;
        self.get_optional(url).await
    }

    async fn assembled_exam_ids(&self) -> Result<Vec<String>, StoreError> {
        self.list_exams().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> GradeRecord {
        GradeRecord {
            exam_id: "exam-7".into(),
            question_index: 3,
            score: 6.0,
            max_score: 8.0,
            feedback: "Missing ORDER BY".into(),
            graded_at: Utc.with_ymd_and_hms(2025, 7, 17, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn get_grade_decodes_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exams/exam-7/grades/3"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(record()))
            .mount(&server)
            .await;

        let store = HttpGradeStore::new("secondary", &server.uri(), Some("secret".into()));
        let grade = store.get_grade("exam-7", 3).await.unwrap();
        assert_eq!(grade, Some(record()));
    }

    #[tokio::test]
    async fn missing_grade_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exams/exam-7/grades/4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/exams/exam-7/grades"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpGradeStore::new("secondary", &server.uri(), None);
        assert!(store.get_grade("exam-7", 4).await.unwrap().is_none());
        assert!(store.list_grades("exam-7").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_puts_record() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/exams/exam-7/grades/3"))
            .and(body_json(record()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpGradeStore::new("secondary", &format!("{}/", server.uri()), None);
        store.upsert_grade(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn error_statuses_map_to_store_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/exams/exam-7/grades/3"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/exams/exam-7/answers"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let store = HttpGradeStore::new("secondary", &server.uri(), None);
        let err = store.upsert_grade(&record()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));

        let err = store.merged_answers("exam-7").await.unwrap_err();
        assert!(matches!(err, StoreError::Http { status: 403, .. }));
    }

    #[tokio::test]
    async fn answers_and_exam_listing() {
        let server = MockServer::start().await;
        let answers = vec![MergedAnswerEntry::new("exam-7", 0, "Count the pilots per base", "SELECT")];
        Mock::given(method("GET"))
            .and(path("/exams/exam-7/answers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&answers))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/exams"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["exam-7", "exam-8"]))
            .mount(&server)
            .await;

        let store = HttpGradeStore::new("primary", &server.uri(), None);
        assert_eq!(store.merged_answers("exam-7").await.unwrap(), Some(answers));
        assert_eq!(store.assembled_exam_ids().await.unwrap(), vec!["exam-7", "exam-8"]);
        assert!(store.merged_answers("exam-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let store = HttpGradeStore::new("secondary", "http://127.0.0.1:9", None);
        let err = store.get_grade("exam-7", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn unsafe_exam_id_never_reaches_the_network() {
        let store = HttpGradeStore::new("secondary", "http://127.0.0.1:9", None);
        let err = store.list_grades("a/b").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidExamId(_)));
    }

    #[tokio::test]
    async fn fractional_scores_decode_exactly() {
        let server = MockServer::start().await;
        let mut expected = record();
        expected.score = 1.0 / 11.0;
        expected.max_score = f64::from(632) / 7.0;
        Mock::given(method("GET"))
            .and(path("/exams/exam-7/grades/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&expected))
            .mount(&server)
            .await;

        let store = HttpGradeStore::new("secondary", &server.uri(), None);
        assert_eq!(store.get_grade("exam-7", 3).await.unwrap(), Some(expected));
    }
}
