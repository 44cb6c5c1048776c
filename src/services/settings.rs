//! Bucket settings validation.
//!
//! Each `set` call carries one `(key, value)` pair. The value is parsed into
//! a [`SettingChange`] first and applied to the bucket only once it is known
//! to be well-formed.

use crate::errors::{BucketError, BucketResult};
use crate::models::bucket::{Bucket, DueTimeout, MAX_DESCRIPTION_LEN, TimeoutUnit};

/// Sentinel amount meaning "jobs never expire".
const NEVER_TIMEOUT: &str = "-1";

/// The settable keys of a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingKey {
    Desc,
    Completion,
    Approval,
    Denial,
    Timeout,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Desc => "desc",
            SettingKey::Completion => "completion",
            SettingKey::Approval => "approval",
            SettingKey::Denial => "denial",
            SettingKey::Timeout => "timeout",
        }
    }

    /// The bucket field a key writes to.
    pub fn field(&self) -> &'static str {
        match self {
            SettingKey::Desc => "description",
            SettingKey::Completion => "completion_board",
            SettingKey::Approval => "approval_board",
            SettingKey::Denial => "denial_board",
            SettingKey::Timeout => "due_timeout",
        }
    }
}

/// A validated change ready to be applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingChange {
    Description(String),
    CompletionBoard(u32),
    ApprovalBoard(u32),
    DenialBoard(u32),
    Timeout(DueTimeout),
}

impl SettingChange {
    pub fn apply(self, bucket: &mut Bucket) {
        match self {
            SettingChange::Description(text) => bucket.description = text,
            SettingChange::CompletionBoard(id) => bucket.settings.completion_board = Some(id),
            SettingChange::ApprovalBoard(id) => bucket.settings.approval_board = Some(id),
            SettingChange::DenialBoard(id) => bucket.settings.denial_board = Some(id),
            SettingChange::Timeout(timeout) => bucket.settings.due_timeout = Some(timeout),
        }
    }

    /// Short text describing the stored value, for success messages.
    pub fn describe(&self) -> String {
        match self {
            SettingChange::Description(text) => text.clone(),
            SettingChange::CompletionBoard(id)
            | SettingChange::ApprovalBoard(id)
            | SettingChange::DenialBoard(id) => id.to_string(),
            SettingChange::Timeout(timeout) => timeout.summary(),
        }
    }
}

/// Validates settings against the settings and interval vocabularies.
#[derive(Clone, Debug)]
pub struct SettingsValidator {
    keys: Vec<SettingKey>,
    intervals: Vec<TimeoutUnit>,
}

impl Default for SettingsValidator {
    fn default() -> Self {
        Self::standard()
    }
}

impl SettingsValidator {
    pub fn standard() -> Self {
        Self {
            keys: vec![
                SettingKey::Desc,
                SettingKey::Completion,
                SettingKey::Approval,
                SettingKey::Denial,
                SettingKey::Timeout,
            ],
            intervals: TimeoutUnit::ALL.to_vec(),
        }
    }

    pub fn key(&self, name: &str) -> BucketResult<SettingKey> {
        let name = name.trim();
        self.keys
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| BucketError::UnknownSetting(name.to_string()))
    }

    pub fn validate(&self, key: &str, value: &str) -> BucketResult<SettingChange> {
        let key = self.key(key)?;
        match key {
            SettingKey::Desc => validate_description(value).map(SettingChange::Description),
            SettingKey::Completion => parse_board(key, value).map(SettingChange::CompletionBoard),
            SettingKey::Approval => parse_board(key, value).map(SettingChange::ApprovalBoard),
            SettingKey::Denial => parse_board(key, value).map(SettingChange::DenialBoard),
            SettingKey::Timeout => self.parse_timeout(value).map(SettingChange::Timeout),
        }
    }

    /// Parse `"<amount> <unit>"` or the `-1` never-expires sentinel.
    pub fn parse_timeout(&self, value: &str) -> BucketResult<DueTimeout> {
        let expected = || {
            BucketError::invalid_value(
                SettingKey::Timeout.as_str(),
                "expected `<amount> <hours|days|months|years>` or `-1`",
            )
        };

        let tokens: Vec<&str> = value.split_whitespace().collect();
        match tokens.as_slice() {
            [NEVER_TIMEOUT] => Ok(DueTimeout::Never),
            [amount, unit] => {
                let unit = self
                    .intervals
                    .iter()
                    .copied()
                    .find(|u| u.as_str().eq_ignore_ascii_case(unit))
                    .ok_or_else(|| {
                        BucketError::invalid_value(
                            SettingKey::Timeout.as_str(),
                            "the interval must be `hours`, `days`, `months` or `years`",
                        )
                    })?;
                let amount = parse_non_negative(amount).ok_or_else(|| {
                    BucketError::invalid_value(
                        SettingKey::Timeout.as_str(),
                        "the timeout amount must be a non-negative integer",
                    )
                })?;
                Ok(DueTimeout::After { amount, unit })
            }
            _ => Err(expected()),
        }
    }
}

/// Descriptions must be non-empty and at most 45 characters.
pub fn validate_description(value: &str) -> BucketResult<String> {
    let text = value.trim();
    if text.is_empty() {
        return Err(BucketError::invalid_value(
            SettingKey::Desc.as_str(),
            "a description must not be empty",
        ));
    }
    if text.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(BucketError::invalid_value(
            SettingKey::Desc.as_str(),
            format!("bucket descriptions must be at most {MAX_DESCRIPTION_LEN} characters"),
        ));
    }
    Ok(text.to_string())
}

fn parse_board(key: SettingKey, value: &str) -> BucketResult<u32> {
    parse_non_negative(value.trim()).ok_or_else(|| {
        BucketError::invalid_value(key.as_str(), "the board id must be a non-negative integer")
    })
}

/// Digits only: rejects signs, blanks and anything `u32` cannot hold.
fn parse_non_negative(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
