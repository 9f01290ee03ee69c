use std::sync::Arc;

use tracing::{info, warn};

use tasky_types::api::CreateOfferRequest;
use tasky_types::{Offer, User};

use crate::backend::Backend;
use crate::error::ClientError;

/// Parses an offer amount as typed by a person: `12,50` and `12.50` are the
/// same. The result must be finite and strictly positive.
pub fn parse_amount(raw: &str) -> Result<f64, ClientError> {
    let normalized = raw.trim().replacen(',', ".", 1);
    let amount: f64 = normalized
        .parse()
        .map_err(|_| ClientError::validation("invalid amount"))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ClientError::validation("invalid amount"));
    }
    Ok(amount)
}

/// Offer form contents, unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferDraft {
    pub amount: String,
    pub message: String,
}

impl OfferDraft {
    pub fn new(amount: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            message: message.into(),
        }
    }

    /// Whether the submit button should be enabled.
    pub fn can_submit(&self, viewer: Option<&User>) -> bool {
        self.validate(viewer).is_ok()
    }

    pub fn validate(&self, viewer: Option<&User>) -> Result<CreateOfferRequest, ClientError> {
        let viewer =
            viewer.ok_or_else(|| ClientError::validation("no tasker is signed in"))?;
        let amount = parse_amount(&self.amount)?;
        let message = self.message.trim();
        if message.is_empty() {
            return Err(ClientError::validation("a short message is required"));
        }
        Ok(CreateOfferRequest {
            tasker_id: viewer.id,
            amount,
            message: message.to_owned(),
        })
    }
}

/// Validates `draft` and posts it as `viewer`'s offer on `task_id`.
pub async fn submit_offer<B: Backend>(
    backend: &B,
    task_id: i64,
    viewer: Option<&User>,
    draft: &OfferDraft,
) -> Result<Offer, ClientError> {
    let request = draft.validate(viewer)?;
    let offer = backend.create_offer(task_id, &request).await?;
    info!(
        "offer {} sent on task {} by tasker {}",
        offer.id, task_id, request.tasker_id
    );
    Ok(offer)
}

/// Offers on one task, as shown to its publisher.
pub struct OfferList<B: Backend> {
    backend: Arc<B>,
    task_id: i64,
    pub offers: Vec<Offer>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<B: Backend> OfferList<B> {
    pub fn new(backend: Arc<B>, task_id: i64) -> Self {
        Self {
            backend,
            task_id,
            offers: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    /// Refetches the list. On failure the error is recorded and the previous
    /// list is left alone.
    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        match self.backend.list_offers(self.task_id).await {
            Ok(offers) => self.offers = offers,
            Err(err) => {
                warn!("loading offers for task {} failed: {}", self.task_id, err);
                self.error = Some(err.to_string());
            }
        }
        self.loading = false;
    }

    /// Shows a just-created offer first without refetching.
    pub fn record_created(&mut self, offer: Offer) {
        self.offers.retain(|existing| existing.id != offer.id);
        self.offers.insert(0, offer);
    }
}

#[cfg(test)]
mod tests {
    use tasky_types::Role;

    use super::*;
    use crate::testing::StubBackend;

    fn tasker() -> User {
        User::new(7, Role::Tasker)
    }

    #[test]
    fn comma_decimal_is_accepted() {
        assert_eq!(parse_amount("12,50").unwrap(), 12.5);
        assert_eq!(parse_amount(" 80 ").unwrap(), 80.0);
        assert_eq!(parse_amount("0.01").unwrap(), 0.01);
    }

    #[test]
    fn non_positive_and_garbage_amounts_are_rejected() {
        for raw in ["0", "-5", "", "abc", "1,2,3", "inf", "NaN"] {
            assert!(parse_amount(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn draft_needs_a_viewer_and_a_message() {
        let draft = OfferDraft::new("100", "Puedo mañana");
        assert!(matches!(
            draft.validate(None),
            Err(ClientError::Validation(_))
        ));
        assert!(!OfferDraft::new("100", "   ").can_submit(Some(&tasker())));

        let request = draft.validate(Some(&tasker())).unwrap();
        assert_eq!(request.tasker_id, 7);
        assert_eq!(request.amount, 100.0);
        assert_eq!(request.message, "Puedo mañana");
    }

    #[tokio::test]
    async fn invalid_draft_issues_no_request() {
        let (stub, _feed) = StubBackend::new();
        let err = submit_offer(&stub, 5, Some(&tasker()), &OfferDraft::new("0", "hola"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid amount");
        assert!(stub.offer_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_offer_is_listed_first() {
        let (stub, _feed) = StubBackend::new();
        let stub = Arc::new(stub);
        let mut list = OfferList::new(Arc::clone(&stub), 5);
        list.load().await;
        assert!(list.offers.is_empty());
        assert!(!list.loading);

        let first = submit_offer(stub.as_ref(), 5, Some(&tasker()), &OfferDraft::new("10", "a"))
            .await
            .unwrap();
        let second = submit_offer(stub.as_ref(), 5, Some(&tasker()), &OfferDraft::new("12,5", "b"))
            .await
            .unwrap();
        list.record_created(first.clone());
        list.record_created(second.clone());

        assert_eq!(list.offers, vec![second, first]);
        let sent = stub.offer_requests.lock().unwrap().clone();
        assert_eq!(sent[1].amount, 12.5);
    }
}
