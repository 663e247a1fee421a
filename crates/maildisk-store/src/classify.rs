//! Typed classification of raw backend failures.
//!
//! Backends only report free text. The rules below are evaluated in order
//! against that text; the first match decides the [`StoreError`] variant and
//! anything unmatched passes through as [`StoreError::Backend`].
//! Classification only changes what gets reported. Nothing is retried.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BackendError, StoreError};

struct Rule {
    pattern: Regex,
    kind: fn() -> StoreError,
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let rule = |pattern: &str, kind: fn() -> StoreError| Rule {
        pattern: Regex::new(pattern).expect("classifier pattern must compile"),
        kind,
    };
    vec![
        rule(r"^LOGIN failed$", || StoreError::LoginFailed),
        rule(r"^CREATE failed: mailbox already exists$", || {
            StoreError::MailboxAlreadyExists
        }),
    ]
});

/// Map a raw backend failure onto the domain taxonomy.
pub fn classify(err: BackendError) -> StoreError {
    match RULES.iter().find(|r| r.pattern.is_match(err.message())) {
        Some(rule) => (rule.kind)(),
        None => StoreError::Backend(err),
    }
}

/// Like [`classify`], but unmatched failures during bootstrap are reported as
/// [`StoreError::InitFailed`].
pub fn classify_init(err: BackendError) -> StoreError {
    match classify(err) {
        StoreError::Backend(raw) => StoreError::InitFailed {
            reason: raw.message().to_string(),
        },
        classified => classified,
    }
}

/// Attach classification to a backend call.
pub trait Classify<T> {
    fn classified(self) -> Result<T, StoreError>;
    fn classified_init(self) -> Result<T, StoreError>;
}

impl<T> Classify<T> for Result<T, BackendError> {
    fn classified(self) -> Result<T, StoreError> {
        self.map_err(classify)
    }

    fn classified_init(self) -> Result<T, StoreError> {
        self.map_err(classify_init)
    }
}
