//! Domain identifier types with validation
//!
//! Newtype wrappers for report identifiers and routing tags. Each type keeps
//! distinct identifiers from being mixed up and validates its format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Report identifier newtype wrapper
///
/// Every report produced by a pipeline step gets a fresh random UUID.
///
/// # Examples
///
/// ```
/// use courier::domain::ids::ReportId;
/// use std::str::FromStr;
///
/// let id = ReportId::from_str("7d44b88c-4199-4bad-97dc-d78268e01398").unwrap();
/// assert_eq!(id.to_string(), "7d44b88c-4199-4bad-97dc-d78268e01398");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(Uuid);

impl ReportId {
    /// Creates a new random ReportId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Consumes self and returns the inner UUID
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReportId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid report ID '{s}': {e}"))
    }
}

impl From<Uuid> for ReportId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Topic newtype wrapper
///
/// A coarse routing domain tag such as `full-elr` or `etor-ti`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Creates a new Topic
    ///
    /// Topics are lowercase slugs made of ASCII letters, digits and dashes.
    pub fn new(topic: impl Into<String>) -> Result<Self, String> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err("Topic cannot be empty".to_string());
        }
        if !topic
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(format!(
                "Invalid topic '{topic}': only lowercase letters, digits and '-' are allowed"
            ));
        }
        Ok(Self(topic))
    }

    /// Returns the topic as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The pipeline stage that produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStep {
    /// Submission intake
    Receive,
    /// Format conversion into the internal bundle format
    Convert,
    /// Topic-level destination selection
    DestinationFilter,
    /// Per-receiver filter evaluation
    ReceiverFilter,
    /// Routing to receivers
    Route,
    /// Translation into the receiver's format
    Translate,
    /// Batching of translated items
    Batch,
    /// Delivery to the receiver's transport
    Send,
}

impl PipelineStep {
    /// All steps in pipeline order
    pub const ALL: [PipelineStep; 8] = [
        PipelineStep::Receive,
        PipelineStep::Convert,
        PipelineStep::DestinationFilter,
        PipelineStep::ReceiverFilter,
        PipelineStep::Route,
        PipelineStep::Translate,
        PipelineStep::Batch,
        PipelineStep::Send,
    ];

    /// Returns the kebab-case token used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Receive => "receive",
            PipelineStep::Convert => "convert",
            PipelineStep::DestinationFilter => "destination-filter",
            PipelineStep::ReceiverFilter => "receiver-filter",
            PipelineStep::Route => "route",
            PipelineStep::Translate => "translate",
            PipelineStep::Batch => "batch",
            PipelineStep::Send => "send",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase().replace('_', "-");
        PipelineStep::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == token)
            .ok_or_else(|| format!("Unknown pipeline step '{s}'"))
    }
}
