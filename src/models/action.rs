//! The closed vocabulary of actions that can be granted on a bucket.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pseudo-action that expands to every entry of the vocabulary.
pub const ALL_ACTIONS: &str = "all";

/// A single grantable bucket or job action.
///
/// Variant order is the canonical display order used by `actions_for`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BucketAction {
    BucketAccess,
    BucketCheck,
    BucketCreate,
    BucketDelete,
    BucketInfo,
    BucketMonitor,
    BucketRename,
    BucketSort,
    JobApprove,
    JobReply,
    JobComplete,
    JobCreate,
    JobEdit,
    JobLog,
    JobMail,
    JobReports,
}

impl BucketAction {
    pub const ALL: [BucketAction; 16] = [
        BucketAction::BucketAccess,
        BucketAction::BucketCheck,
        BucketAction::BucketCreate,
        BucketAction::BucketDelete,
        BucketAction::BucketInfo,
        BucketAction::BucketMonitor,
        BucketAction::BucketRename,
        BucketAction::BucketSort,
        BucketAction::JobApprove,
        BucketAction::JobReply,
        BucketAction::JobComplete,
        BucketAction::JobCreate,
        BucketAction::JobEdit,
        BucketAction::JobLog,
        BucketAction::JobMail,
        BucketAction::JobReports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketAction::BucketAccess => "bucket_access",
            BucketAction::BucketCheck => "bucket_check",
            BucketAction::BucketCreate => "bucket_create",
            BucketAction::BucketDelete => "bucket_delete",
            BucketAction::BucketInfo => "bucket_info",
            BucketAction::BucketMonitor => "bucket_monitor",
            BucketAction::BucketRename => "bucket_rename",
            BucketAction::BucketSort => "bucket_sort",
            BucketAction::JobApprove => "job_approve",
            BucketAction::JobReply => "job_reply",
            BucketAction::JobComplete => "job_complete",
            BucketAction::JobCreate => "job_create",
            BucketAction::JobEdit => "job_edit",
            BucketAction::JobLog => "job_log",
            BucketAction::JobMail => "job_mail",
            BucketAction::JobReports => "job_reports",
        }
    }
}

impl fmt::Display for BucketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller asked for when naming an action: one action or `all`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    One(BucketAction),
    All,
}

/// Immutable set of grantable actions, built once at startup and shared.
#[derive(Clone, Debug)]
pub struct ActionVocabulary {
    actions: Vec<BucketAction>,
}

impl ActionVocabulary {
    /// The full sixteen-action vocabulary.
    pub fn standard() -> Self {
        Self {
            actions: BucketAction::ALL.to_vec(),
        }
    }

    pub fn actions(&self) -> &[BucketAction] {
        &self.actions
    }

    /// Case-insensitive lookup of a single action name. `all` is not an action.
    pub fn resolve(&self, name: &str) -> Option<BucketAction> {
        let name = name.trim();
        self.actions
            .iter()
            .copied()
            .find(|action| action.as_str().eq_ignore_ascii_case(name))
    }

    /// Resolve a requested name, accepting the `all` pseudo-action.
    pub fn parse_request(&self, name: &str) -> Option<ActionRequest> {
        if name.trim().eq_ignore_ascii_case(ALL_ACTIONS) {
            return Some(ActionRequest::All);
        }
        self.resolve(name).map(ActionRequest::One)
    }
}

impl Default for ActionVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_case_insensitively() {
        let vocab = ActionVocabulary::standard();
        assert_eq!(vocab.resolve("BUCKET_INFO"), Some(BucketAction::BucketInfo));
        assert_eq!(vocab.resolve(" job_reply "), Some(BucketAction::JobReply));
        assert_eq!(vocab.resolve("job_replyjob_complete"), None);
        assert_eq!(vocab.resolve("all"), None);
    }

    #[test]
    fn all_is_a_request_but_not_an_action() {
        let vocab = ActionVocabulary::standard();
        assert_eq!(vocab.parse_request("All"), Some(ActionRequest::All));
        assert_eq!(
            vocab.parse_request("job_mail"),
            Some(ActionRequest::One(BucketAction::JobMail))
        );
        assert_eq!(vocab.parse_request("bucket_explode"), None);
    }

    #[test]
    fn names_round_trip_through_display() {
        let vocab = ActionVocabulary::standard();
        for action in BucketAction::ALL {
            assert_eq!(vocab.resolve(&action.to_string()), Some(action));
        }
        assert_eq!(vocab.actions().len(), 16);
    }
}
