use bytes::Bytes;
use log::debug;
use serde_json::Value;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// The lifecycle verb sent when an issue or pull request is opened
pub const ACTION_CREATED: &str = "created";

/// The kinds of webhook deliveries the bot understands.
///
/// `Access` is never named by the event header; it is the delivery sent
/// directly by the platform and is recognised by its `User-Agent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    Access,
    Issue,
    PullRequest,
    Push,
    IssueComment,
    PullRequestReview,
    PullRequestComment,
    Unknown,
}

impl EventType {
    /// Every event type which can have a handler, in slot order
    pub const KNOWN: [EventType; 7] = [
        EventType::Access,
        EventType::Issue,
        EventType::PullRequest,
        EventType::Push,
        EventType::IssueComment,
        EventType::PullRequestReview,
        EventType::PullRequestComment,
    ];

    /// Index of this type in a handler table, `None` for unknown events.
    pub fn slot(self) -> Option<usize> {
        use EventType::*;

        match self {
            Access => Some(0),
            Issue => Some(1),
            PullRequest => Some(2),
            Push => Some(3),
            IssueComment => Some(4),
            PullRequestReview => Some(5),
            PullRequestComment => Some(6),
            Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self.slot().is_some()
    }

    pub fn as_str(self) -> &'static str {
        use EventType::*;

        match self {
            Access => "access",
            Issue => "issues",
            PullRequest => "pull_request",
            Push => "push",
            IssueComment => "issue_comment",
            PullRequestReview => "pull_request_review",
            PullRequestComment => "pull_request_review_comment",
            Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("invalid webhook event")]
pub struct ParseEventTypeError;

impl FromStr for EventType {
    type Err = ParseEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use EventType::*;

        match s {
            "issues" => Ok(Issue),
            "pull_request" => Ok(PullRequest),
            "push" => Ok(Push),
            "issue_comment" => Ok(IssueComment),
            "pull_request_review" => Ok(PullRequestReview),
            "pull_request_review_comment" => Ok(PullRequestComment),
            _ => Err(ParseEventTypeError),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("invalid number in field `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

/// One classified webhook delivery.
#[derive(Clone, Debug)]
pub struct Event {
    pub event_type: EventType,
    /// Raw value of the event header
    pub event_name: String,
    /// Delivery id, only present for access events
    pub event_uuid: Option<String>,
    pub action: String,
    pub org: String,
    pub repo: String,
    pub html_url: String,
    pub git_ref: String,
    pub head: String,
    pub review: String,
    pub reviewer: String,
    pub pr_author: String,
    pub pr_commenter: String,
    pub pr_comment: String,
    pub pr_number: Option<u64>,
    pub issue_author: String,
    pub issue_commenter: String,
    pub issue_comment: String,
    pub issue_number: Option<u64>,
    payload: Bytes,
}

impl Event {
    pub fn new<S: Into<String>>(event_type: EventType, event_name: S, payload: Bytes) -> Self {
        Self {
            event_type,
            event_name: event_name.into(),
            event_uuid: None,
            action: String::new(),
            org: String::new(),
            repo: String::new(),
            html_url: String::new(),
            git_ref: String::new(),
            head: String::new(),
            review: String::new(),
            reviewer: String::new(),
            pr_author: String::new(),
            pr_commenter: String::new(),
            pr_comment: String::new(),
            pr_number: None,
            issue_author: String::new(),
            issue_commenter: String::new(),
            issue_comment: String::new(),
            issue_number: None,
            payload,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn require_pr_number(&self) -> Result<u64, EventError> {
        self.pr_number
            .ok_or(EventError::MissingField("pull_request.number"))
    }

    pub fn require_issue_number(&self) -> Result<u64, EventError> {
        self.issue_number.ok_or(EventError::MissingField("issue.number"))
    }

    /// Key/value pairs identifying this event in log records. Empty values are
    /// left out.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let uuid = self.event_uuid.as_deref().unwrap_or_default();
        [
            ("event-type", self.event_name.as_str()),
            ("event-uuid", uuid),
            ("event-action", self.action.as_str()),
            ("org", self.org.as_str()),
            ("repo", self.repo.as_str()),
            ("url", self.html_url.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }

    /// Fills the identity fields from the json payload. Fields which are
    /// already set are kept. A payload which isn't json leaves the event
    /// untouched. Each field is read on its own, so a text field of the wrong
    /// json type counts as absent, while a number field holding something
    /// other than an unsigned integer is an error.
    pub fn normalize(&mut self) -> Result<(), EventError> {
        let payload: Value = match serde_json::from_slice(&self.payload) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("payload of {} event is not json: {}", self.event_type, e);
                return Ok(());
            }
        };

        fill(&mut self.action, text(&payload, "/action"));
        fill(&mut self.git_ref, text(&payload, "/ref"));
        fill(&mut self.head, text(&payload, "/after"));

        if let Some((org, repo)) = text(&payload, "/repository/full_name")
            .and_then(|name| name.split_once('/'))
            .filter(|(org, _)| !org.is_empty())
        {
            fill(&mut self.org, Some(org));
            fill(&mut self.repo, Some(repo));
        }
        fill(&mut self.html_url, text(&payload, "/repository/html_url"));

        if self.pr_number.is_none() {
            self.pr_number = number(&payload, "/pull_request/number", "pull_request.number")?;
        }
        fill(&mut self.pr_author, text(&payload, "/pull_request/user/login"));

        if self.issue_number.is_none() {
            self.issue_number = number(&payload, "/issue/number", "issue.number")?;
        }
        fill(&mut self.issue_author, text(&payload, "/issue/user/login"));

        let commenter = text(&payload, "/comment/user/login");
        let comment = text(&payload, "/comment/body");
        match self.event_type {
            EventType::PullRequestComment => {
                fill(&mut self.pr_commenter, commenter);
                fill(&mut self.pr_comment, comment);
            }
            _ => {
                fill(&mut self.issue_commenter, commenter);
                fill(&mut self.issue_comment, comment);
            }
        }

        fill(&mut self.reviewer, text(&payload, "/review/user/login"));
        fill(&mut self.review, text(&payload, "/review/body"));

        Ok(())
    }
}

fn fill(field: &mut String, value: Option<&str>) {
    if field.is_empty() {
        if let Some(value) = value {
            *field = value.to_owned();
        }
    }
}

fn text<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload.pointer(pointer).and_then(Value::as_str)
}

// Numbers arrive either as json integers or as numeric strings. `null` is
// treated as absent.
fn number(payload: &Value, pointer: &str, field: &'static str) -> Result<Option<u64>, EventError> {
    match payload.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| EventError::InvalidNumber {
            field,
            value: n.to_string(),
        }),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EventError::InvalidNumber {
                field,
                value: s.clone(),
            }),
        Some(other) => Err(EventError::InvalidNumber {
            field,
            value: other.to_string(),
        }),
    }
}
