use tracing::info;

use tasky_types::Review;
use tasky_types::api::{CreateReviewRequest, REVIEW_TARGET_TASKER};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::permissions::DerivedSession;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Reads the leading integer of `raw` (sign allowed), treating anything
/// unparsable as 0, and clamps it to 1..=5.
pub fn clamp_rating(raw: &str) -> u8 {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end]
        .parse::<i64>()
        .map(|v| v * sign)
        .unwrap_or(0);
    value.clamp(i64::from(MIN_RATING), i64::from(MAX_RATING)) as u8
}

/// Review form contents. Explicit ids win over the ones the session resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    pub rating: String,
    pub comment: String,
    pub task_id: Option<i64>,
    pub tasker_id: Option<i64>,
    pub deal_id: Option<i64>,
}

impl Default for ReviewDraft {
    fn default() -> Self {
        Self {
            rating: MAX_RATING.to_string(),
            comment: String::new(),
            task_id: None,
            tasker_id: None,
            deal_id: None,
        }
    }
}

impl ReviewDraft {
    pub fn new(rating: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            rating: rating.into(),
            comment: comment.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self, session: Option<&DerivedSession>) -> Result<CreateReviewRequest, ClientError> {
        let rating = clamp_rating(&self.rating);
        let comment = self.comment.trim();
        if comment.is_empty() {
            return Err(ClientError::validation("a comment is required"));
        }
        let task_id = self
            .task_id
            .or_else(|| session.and_then(|s| s.task_id))
            .ok_or_else(|| ClientError::validation("missing task id"))?;
        let worker_id = self
            .tasker_id
            .or_else(|| session.and_then(|s| s.assigned_tasker_id))
            .ok_or_else(|| ClientError::validation("missing worker id (assigned tasker)"))?;
        let deal_id = self.deal_id.or_else(|| session.and_then(|s| s.deal_id));

        Ok(CreateReviewRequest {
            target: REVIEW_TARGET_TASKER.to_owned(),
            task_id,
            worker_id,
            rating,
            comment: comment.to_owned(),
            deal_id,
        })
    }
}

/// Validates `draft` against `session` and posts the review.
pub async fn submit_review<B: Backend>(
    backend: &B,
    session: Option<&DerivedSession>,
    draft: &ReviewDraft,
) -> Result<Review, ClientError> {
    let request = draft.validate(session)?;
    let review = backend.create_review(request.task_id, &request).await?;
    info!(
        "review {} saved for tasker {} on task {}",
        review.id, request.worker_id, request.task_id
    );
    Ok(review)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubBackend;

    fn session() -> DerivedSession {
        DerivedSession {
            task_id: Some(5),
            publisher_id: Some(1),
            assigned_tasker_id: Some(2),
            deal_id: Some(40),
            is_publisher: true,
            can_review_tasker: true,
            can_chat: true,
            can_send_offer: false,
        }
    }

    #[test]
    fn rating_is_clamped_like_a_form_input() {
        assert_eq!(clamp_rating("4"), 4);
        assert_eq!(clamp_rating("9"), 5);
        assert_eq!(clamp_rating("0"), 1);
        assert_eq!(clamp_rating("-3"), 1);
        assert_eq!(clamp_rating("3 stars"), 3);
        assert_eq!(clamp_rating("great"), 1);
        assert_eq!(clamp_rating(""), 1);
    }

    #[test]
    fn ids_fall_back_to_session() {
        let request = ReviewDraft::new("5", " Excelente ").validate(Some(&session())).unwrap();
        assert_eq!(request.task_id, 5);
        assert_eq!(request.worker_id, 2);
        assert_eq!(request.deal_id, Some(40));
        assert_eq!(request.comment, "Excelente");
        assert_eq!(request.target, "tasker");
    }

    #[test]
    fn explicit_ids_win() {
        let draft = ReviewDraft {
            tasker_id: Some(99),
            deal_id: Some(2),
            ..ReviewDraft::new("3", "ok")
        };
        let request = draft.validate(Some(&session())).unwrap();
        assert_eq!(request.worker_id, 99);
        assert_eq!(request.deal_id, Some(2));
    }

    #[test]
    fn missing_comment_or_ids_are_rejected() {
        let err = ReviewDraft::new("5", "   ").validate(Some(&session())).unwrap_err();
        assert_eq!(err.to_string(), "a comment is required");

        let err = ReviewDraft::new("5", "ok").validate(None).unwrap_err();
        assert_eq!(err.to_string(), "missing task id");

        let mut no_tasker = session();
        no_tasker.assigned_tasker_id = None;
        let err = ReviewDraft::new("5", "ok").validate(Some(&no_tasker)).unwrap_err();
        assert!(err.to_string().contains("worker id"));
    }

    #[tokio::test]
    async fn deal_id_is_omitted_when_unknown() {
        let (stub, _feed) = StubBackend::new();
        let mut without_deal = session();
        without_deal.deal_id = None;

        let review = submit_review(&stub, Some(&without_deal), &ReviewDraft::new("7", "bien"))
            .await
            .unwrap();
        assert_eq!(review.rating, Some(5));

        let sent = stub.review_requests.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].deal_id, None);
    }
}
