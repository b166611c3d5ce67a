use std::sync::Arc;

use tracing::{info, warn};

use super::{
    error::ApiError,
    gateway::{ApiRequest, ApiResponse, FileUpload, Gateway},
    models::{
        BulkUploadSummary, DeleteSummary, Devotee, DuplicateEntry, EntryKind, InvalidEntry,
        NewDevotee, PendingEntry,
    },
    session::Session,
};
use crate::nakshatra::Nakshatra;

/// Devotee operations for one signed-in operator.
#[derive(Clone)]
pub struct TempleApi {
    gateway: Gateway,
    session: Arc<Session>,
}

impl TempleApi {
    pub fn new(gateway: Gateway, session: Arc<Session>) -> Self {
        Self { gateway, session }
    }

    async fn call(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.gateway
            .send(&self.session, &request)
            .await?
            .error_for_status()
    }

    pub async fn list_devotees(&self, nakshatra: Nakshatra) -> Result<Vec<Devotee>, ApiError> {
        let request = ApiRequest::get("devotees/").with_query("nakshatra", nakshatra.as_str());
        self.call(request).await?.json()
    }

    pub async fn create_devotee(&self, devotee: &NewDevotee) -> Result<Devotee, ApiError> {
        devotee.validate()?;
        let request = ApiRequest::post("devotees/").with_json(devotee)?;
        let created: Devotee = self.call(request).await?.json()?;
        info!(id = created.id, nakshatra = %created.nakshatra, "devotee created");
        Ok(created)
    }

    pub async fn update_devotee(&self, id: i64, devotee: &NewDevotee) -> Result<Devotee, ApiError> {
        devotee.validate()?;
        let request = ApiRequest::put(format!("devotees/{id}/")).with_json(devotee)?;
        self.call(request).await?.json()
    }

    pub async fn delete_devotee(&self, id: i64) -> Result<(), ApiError> {
        self.call(ApiRequest::delete(format!("devotees/{id}/")))
            .await?;
        info!(id, "devotee deleted");
        Ok(())
    }

    /// Remove every devotee filed under `nakshatra`.
    pub async fn delete_nakshatra(&self, nakshatra: Nakshatra) -> Result<DeleteSummary, ApiError> {
        let response = self
            .call(ApiRequest::delete(format!("delete-nakshatra/{}/", nakshatra.as_str())))
            .await?;
        let summary = parse_delete_summary(&response.body);
        info!(%nakshatra, deleted = ?summary.deleted, "nakshatra cleared");
        Ok(summary)
    }

    /// Send a CSV/XLSX file for server-side classification.
    pub async fn bulk_upload(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
        nakshatra: Option<Nakshatra>,
    ) -> Result<BulkUploadSummary, ApiError> {
        let mut upload = FileUpload::new("file", filename, content_type, bytes);
        if let Some(star) = nakshatra {
            upload = upload.with_field("nakshatra", star.as_str());
        }
        let request = ApiRequest::post("bulk-upload/").with_upload(upload);
        let summary: BulkUploadSummary = self.call(request).await?.json()?;
        info!(
            filename,
            created = summary.created,
            duplicates = summary.duplicates,
            invalid = summary.invalid,
            "bulk upload processed"
        );
        Ok(summary)
    }

    pub async fn list_entries(&self, kind: EntryKind) -> Result<Vec<PendingEntry>, ApiError> {
        let response = self
            .call(ApiRequest::get(format!("{}/", kind.slug())))
            .await?;
        let entries = match kind {
            EntryKind::Duplicate => response
                .json::<Vec<DuplicateEntry>>()?
                .into_iter()
                .map(PendingEntry::from)
                .collect(),
            EntryKind::Invalid => response
                .json::<Vec<InvalidEntry>>()?
                .into_iter()
                .map(PendingEntry::from)
                .collect(),
        };
        Ok(entries)
    }

    pub async fn delete_entry(&self, kind: EntryKind, id: i64) -> Result<(), ApiError> {
        self.call(ApiRequest::delete(format!("{}/{id}/", kind.slug())))
            .await?;
        Ok(())
    }

    /// Resubmit a corrected entry as a devotee, then drop the entry.
    ///
    /// The entry is only deleted once the devotee exists, so a rejected create
    /// leaves it in place for another attempt.
    pub async fn convert_entry(
        &self,
        kind: EntryKind,
        id: i64,
        devotee: &NewDevotee,
    ) -> Result<Devotee, ApiError> {
        let created = self.create_devotee(devotee).await?;
        if let Err(err) = self.delete_entry(kind, id).await {
            warn!(?err, kind = kind.slug(), id, "devotee created but entry could not be removed");
            if err.requires_login() {
                return Err(err);
            }
            return Err(ApiError::EntryNotRemoved {
                devotee: created.id,
                source: Box::new(err),
            });
        }
        info!(kind = kind.slug(), id, devotee = created.id, "entry converted");
        Ok(created)
    }

    pub async fn delete_all_entries(&self, kind: EntryKind) -> Result<DeleteSummary, ApiError> {
        let response = self
            .call(ApiRequest::delete(kind.bulk_delete_path()))
            .await?;
        Ok(parse_delete_summary(&response.body))
    }
}

// 204 replies carry no body.
fn parse_delete_summary(body: &str) -> DeleteSummary {
    if body.trim().is_empty() {
        return DeleteSummary::default();
    }
    serde_json::from_str(body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::{
        fake::{FakeApi, LOGIN_ACCESS, VALID_REFRESH, spawn_fake_api},
        session::Credentials,
    };

    fn devotee_row(id: i64, name: &str, phone: &str, star: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "country_code": "+91",
            "phone": phone,
            "nakshatra": star,
            "created_at": "2026-10-01T10:00:00Z",
        })
    }

    async fn api_for(fake: Arc<FakeApi>) -> TempleApi {
        let base = spawn_fake_api(fake).await;
        let session = Arc::new(Session::new(Credentials::new(LOGIN_ACCESS, VALID_REFRESH)));
        TempleApi::new(Gateway::new(reqwest::Client::new(), base), session)
    }

    fn rohini() -> Nakshatra {
        "ROHINI".parse().unwrap()
    }

    #[tokio::test]
    async fn lists_devotees_of_one_nakshatra() {
        let fake = FakeApi::new().with_devotees(vec![
            devotee_row(1, "RAVI", "9876500001", "ROHINI"),
            devotee_row(2, "MEERA", "9876500002", "BHARANI"),
        ]);
        let api = api_for(fake).await;

        let rows = api.list_devotees(rohini()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "RAVI");
    }

    #[tokio::test]
    async fn duplicate_create_surfaces_conflict() {
        let fake = FakeApi::new().with_devotees(vec![devotee_row(1, "RAVI", "9876500001", "ROHINI")]);
        let api = api_for(fake).await;

        let err = api
            .create_devotee(&NewDevotee::normalized("ravi", "+91", "9876500001", "rohini"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_create_never_reaches_the_server() {
        let fake = FakeApi::new();
        let api = api_for(fake.clone()).await;

        let err = api
            .create_devotee(&NewDevotee::normalized("", "+91", "", "ROHINI"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(fake.devotee_count(), 0);
    }

    #[tokio::test]
    async fn update_and_delete_devotee() {
        let fake = FakeApi::new().with_devotees(vec![devotee_row(1, "RAVI", "9876500001", "ROHINI")]);
        let api = api_for(fake.clone()).await;

        let updated = api
            .update_devotee(1, &NewDevotee::normalized("ravi kumar", "+91", "9876500001", "ROHINI"))
            .await
            .unwrap();
        assert_eq!(updated.name, "RAVI KUMAR");

        api.delete_devotee(1).await.unwrap();
        assert_eq!(fake.devotee_count(), 0);
        assert_eq!(fake.deleted_paths(), vec!["devotees/1/".to_string()]);
    }

    #[tokio::test]
    async fn clearing_an_empty_nakshatra_reports_not_found() {
        let fake = FakeApi::new().with_devotees(vec![devotee_row(1, "RAVI", "9876500001", "ROHINI")]);
        let api = api_for(fake).await;

        let summary = api.delete_nakshatra(rohini()).await.unwrap();
        assert_eq!(summary.deleted, Some(1));

        let err = api.delete_nakshatra(rohini()).await.unwrap_err();
        assert_eq!(err.user_message(), "No devotees found");
    }

    #[tokio::test]
    async fn bulk_upload_returns_server_counts() {
        let fake = FakeApi::new();
        let api = api_for(fake.clone()).await;

        let summary = api
            .bulk_upload("devotees.csv", "text/csv", b"name,phone\nA,1\n".to_vec(), Some(rohini()))
            .await
            .unwrap();
        assert_eq!(summary.to_string(), "Created: 7, Duplicates: 2, Invalid Rows: 1");
        assert_eq!(fake.uploaded_files(), vec!["devotees.csv".to_string()]);
    }

    #[tokio::test]
    async fn converting_a_duplicate_creates_then_deletes() {
        let fake = FakeApi::new().with_duplicates(vec![devotee_row(9, "RAVI", "9876500001", "ROHINI")]);
        let api = api_for(fake.clone()).await;

        let entries = api.list_entries(EntryKind::Duplicate).await.unwrap();
        assert_eq!(entries.len(), 1);

        let created = api
            .convert_entry(
                EntryKind::Duplicate,
                9,
                &NewDevotee::normalized("ravi", "+91", "9876500009", "ROHINI"),
            )
            .await
            .unwrap();
        assert_eq!(created.phone, "9876500009");
        assert_eq!(fake.devotee_count(), 1);
        assert_eq!(fake.deleted_paths(), vec!["duplicates/9/".to_string()]);
    }

    #[tokio::test]
    async fn entry_left_behind_after_create_is_reported() {
        // The fake has no invalids collection, so the entry delete 404s.
        let fake = FakeApi::new();
        let api = api_for(fake.clone()).await;

        let err = api
            .convert_entry(
                EntryKind::Invalid,
                4,
                &NewDevotee::normalized("meera", "+91", "9876500004", "BHARANI"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::EntryNotRemoved { .. }));
        assert!(!err.requires_login());
        assert!(err.user_message().starts_with("Devotee was saved, but the entry could not be removed"));
        assert_eq!(fake.devotee_count(), 1);
    }

    #[tokio::test]
    async fn failed_conversion_keeps_the_entry() {
        let fake = FakeApi::new()
            .with_devotees(vec![devotee_row(1, "RAVI", "9876500001", "ROHINI")])
            .with_duplicates(vec![devotee_row(9, "RAVI", "9876500001", "ROHINI")]);
        let api = api_for(fake.clone()).await;

        let err = api
            .convert_entry(
                EntryKind::Duplicate,
                9,
                &NewDevotee::normalized("ravi", "+91", "9876500001", "ROHINI"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert!(fake.deleted_paths().is_empty());
    }

    #[tokio::test]
    async fn delete_all_duplicates_reports_count() {
        let fake = FakeApi::new().with_duplicates(vec![
            devotee_row(9, "RAVI", "1", "ROHINI"),
            devotee_row(10, "MEERA", "2", "BHARANI"),
        ]);
        let api = api_for(fake).await;

        let summary = api.delete_all_entries(EntryKind::Duplicate).await.unwrap();
        assert_eq!(summary.deleted, Some(2));
        assert!(api.list_entries(EntryKind::Duplicate).await.unwrap().is_empty());
    }

    #[test]
    fn empty_delete_body_is_tolerated() {
        assert_eq!(parse_delete_summary(""), DeleteSummary::default());
        assert_eq!(parse_delete_summary("not json"), DeleteSummary::default());
    }
}
