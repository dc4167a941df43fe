//! Message definitions
//!
//! Inbound frames received from the peer, first as a raw field map and then
//! as a typed variant per known message kind.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FcpError, Result};

use super::{DATA_LENGTH_FIELD, IDENTIFIER_FIELD};

// =============================================================================
// Terminator
// =============================================================================

/// Line that ends a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    End,
    EndMessage,
    /// A binary payload of `DataLength` bytes follows
    Data,
}

impl Terminator {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminator::End => "End",
            Terminator::EndMessage => "EndMessage",
            Terminator::Data => "Data",
        }
    }

    /// Match a line verbatim against the three terminators
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "End" => Some(Terminator::End),
            "EndMessage" => Some(Terminator::EndMessage),
            "Data" => Some(Terminator::Data),
            _ => None,
        }
    }
}

// =============================================================================
// Raw Message
// =============================================================================

/// One decoded frame before interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub name: String,
    pub fields: BTreeMap<String, String>,
    pub terminator: Terminator,
}

impl RawMessage {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get(IDENTIFIER_FIELD)
    }

    /// Declared payload length; only meaningful for `Data`-terminated frames
    pub fn data_length(&self) -> Result<Option<usize>> {
        self.get(DATA_LENGTH_FIELD)
            .map(|v| parse_value(&self.name, DATA_LENGTH_FIELD, v))
            .transpose()
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            FcpError::Decode(format!("{} is missing required field {}", self.name, key))
        })
    }

    fn number_or_zero<T: FromStr + Default>(&self, key: &str) -> Result<T> {
        match self.get(key) {
            Some(v) => parse_value(&self.name, key, v),
            None => Ok(T::default()),
        }
    }

    /// Number if present and well-formed; anything else is `None`
    fn lenient_number<T: FromStr>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match value.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!("{}: ignoring non-numeric {}={:?}", self.name, key, value);
                None
            }
        }
    }

    fn owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }
}

fn parse_value<T: FromStr>(message: &str, key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        FcpError::Decode(format!(
            "{}: field {} is not a number: {:?}",
            message, key, value
        ))
    })
}

// =============================================================================
// Message Names
// =============================================================================

/// Closed set of message names this client understands
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageName {
    NodeHello,
    CloseConnectionDuplicateClientName,
    SimpleProgress,
    UriGenerated,
    PutSuccessful,
    PutFetchable,
    PutFailed,
    PersistentPut,
    PersistentPutDir,
    StartedCompression,
    FinishedCompression,
    ExpectedHashes,
    DataFound,
    AllData,
    GetFailed,
    PersistentGet,
    ProtocolError,
    IdentifierCollision,
    Unknown(String),
}

impl MessageName {
    pub fn from_wire(name: &str) -> Self {
        match name {
            "NodeHello" => MessageName::NodeHello,
            "CloseConnectionDuplicateClientName" => MessageName::CloseConnectionDuplicateClientName,
            "SimpleProgress" => MessageName::SimpleProgress,
            "URIGenerated" => MessageName::UriGenerated,
            "PutSuccessful" => MessageName::PutSuccessful,
            "PutFetchable" => MessageName::PutFetchable,
            "PutFailed" => MessageName::PutFailed,
            "PersistentPut" => MessageName::PersistentPut,
            "PersistentPutDir" => MessageName::PersistentPutDir,
            "StartedCompression" => MessageName::StartedCompression,
            "FinishedCompression" => MessageName::FinishedCompression,
            "ExpectedHashes" => MessageName::ExpectedHashes,
            "DataFound" => MessageName::DataFound,
            "AllData" => MessageName::AllData,
            "GetFailed" => MessageName::GetFailed,
            "PersistentGet" => MessageName::PersistentGet,
            "ProtocolError" => MessageName::ProtocolError,
            "IdentifierCollision" => MessageName::IdentifierCollision,
            other => MessageName::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageName::NodeHello => "NodeHello",
            MessageName::CloseConnectionDuplicateClientName => "CloseConnectionDuplicateClientName",
            MessageName::SimpleProgress => "SimpleProgress",
            MessageName::UriGenerated => "URIGenerated",
            MessageName::PutSuccessful => "PutSuccessful",
            MessageName::PutFetchable => "PutFetchable",
            MessageName::PutFailed => "PutFailed",
            MessageName::PersistentPut => "PersistentPut",
            MessageName::PersistentPutDir => "PersistentPutDir",
            MessageName::StartedCompression => "StartedCompression",
            MessageName::FinishedCompression => "FinishedCompression",
            MessageName::ExpectedHashes => "ExpectedHashes",
            MessageName::DataFound => "DataFound",
            MessageName::AllData => "AllData",
            MessageName::GetFailed => "GetFailed",
            MessageName::PersistentGet => "PersistentGet",
            MessageName::ProtocolError => "ProtocolError",
            MessageName::IdentifierCollision => "IdentifierCollision",
            MessageName::Unknown(name) => name,
        }
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Typed Payloads
// =============================================================================

/// Peer greeting
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeHello {
    pub build: Option<u32>,
    pub ext_build: Option<u32>,
    pub revision: Option<String>,
    pub version: Option<String>,
    pub fcp_version: Option<String>,
    pub connection_identifier: Option<String>,
}

/// Counters from a SimpleProgress message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub succeeded: u64,
    pub required: u64,
    pub total: u64,
    pub failed: u64,
    pub fatally_failed: u64,
    pub finalized: bool,
}

/// Code and descriptions carried by PutFailed, GetFailed and ProtocolError
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub code: u32,
    pub short_description: String,
    pub description: String,
}

impl Failure {
    pub fn into_protocol_error(self, identifier: Option<String>) -> FcpError {
        FcpError::Protocol {
            code: self.code,
            description: self.short_description,
            extra: self.description,
            identifier,
        }
    }

    pub fn into_operation_error(self, operation: &'static str) -> FcpError {
        FcpError::OperationFailed {
            operation,
            code: self.code,
            short: self.short_description,
            description: self.description,
        }
    }
}

// =============================================================================
// Typed Message
// =============================================================================

/// An inbound frame interpreted by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    NodeHello(NodeHello),
    SimpleProgress {
        identifier: Option<String>,
        progress: Progress,
    },
    PutSuccessful {
        identifier: Option<String>,
        uri: String,
    },
    PutFetchable {
        identifier: Option<String>,
        uri: String,
    },
    PutFailed {
        identifier: Option<String>,
        failure: Failure,
    },
    AllData {
        identifier: Option<String>,
        data_length: usize,
    },
    GetFailed {
        identifier: Option<String>,
        failure: Failure,
        redirect_uri: Option<String>,
    },
    ProtocolError {
        identifier: Option<String>,
        failure: Failure,
    },
    /// The peer already has a request under this identifier
    IdentifierCollision { identifier: Option<String> },
    /// Known, non-terminal notification (URIGenerated, compression, ...)
    Info { name: MessageName, raw: RawMessage },
    /// Name outside the known set, kept for forward compatibility
    Unknown(RawMessage),
}

impl Message {
    /// Interpret a raw frame
    pub fn parse(raw: RawMessage) -> Result<Self> {
        let name = MessageName::from_wire(&raw.name);
        let identifier = raw.owned(IDENTIFIER_FIELD);

        let message = match name {
            MessageName::NodeHello => Message::NodeHello(NodeHello {
                build: raw.lenient_number("Build"),
                ext_build: raw.lenient_number("ExtBuild"),
                revision: raw.owned("Revision"),
                version: raw.owned("Version"),
                fcp_version: raw.owned("FCPVersion"),
                connection_identifier: raw.owned("ConnectionIdentifier"),
            }),
            MessageName::SimpleProgress => Message::SimpleProgress {
                identifier,
                progress: Progress {
                    succeeded: raw.number_or_zero("Succeeded")?,
                    required: raw.number_or_zero("Required")?,
                    total: raw.number_or_zero("Total")?,
                    failed: raw.number_or_zero("Failed")?,
                    fatally_failed: raw.number_or_zero("FatallyFailed")?,
                    finalized: raw.get("FinalizedTotal") == Some("true"),
                },
            },
            MessageName::PutSuccessful => Message::PutSuccessful {
                identifier,
                uri: raw.require("URI")?.to_string(),
            },
            MessageName::PutFetchable => Message::PutFetchable {
                identifier,
                uri: raw.require("URI")?.to_string(),
            },
            MessageName::PutFailed => Message::PutFailed {
                identifier,
                failure: operation_failure(&raw)?,
            },
            MessageName::AllData => Message::AllData {
                identifier,
                data_length: raw.data_length()?.ok_or_else(|| {
                    FcpError::Decode("AllData is missing required field DataLength".to_string())
                })?,
            },
            MessageName::GetFailed => Message::GetFailed {
                identifier,
                failure: operation_failure(&raw)?,
                redirect_uri: raw.owned("RedirectURI"),
            },
            MessageName::ProtocolError => Message::ProtocolError {
                identifier,
                failure: Failure {
                    code: raw.number_or_zero("Code")?,
                    short_description: raw.owned("CodeDescription").unwrap_or_default(),
                    description: raw.owned("ExtraDescription").unwrap_or_default(),
                },
            },
            MessageName::IdentifierCollision => Message::IdentifierCollision { identifier },
            MessageName::Unknown(_) => Message::Unknown(raw),
            name => Message::Info { name, raw },
        };

        Ok(message)
    }

    pub fn name(&self) -> MessageName {
        match self {
            Message::NodeHello(_) => MessageName::NodeHello,
            Message::SimpleProgress { .. } => MessageName::SimpleProgress,
            Message::PutSuccessful { .. } => MessageName::PutSuccessful,
            Message::PutFetchable { .. } => MessageName::PutFetchable,
            Message::PutFailed { .. } => MessageName::PutFailed,
            Message::AllData { .. } => MessageName::AllData,
            Message::GetFailed { .. } => MessageName::GetFailed,
            Message::ProtocolError { .. } => MessageName::ProtocolError,
            Message::IdentifierCollision { .. } => MessageName::IdentifierCollision,
            Message::Info { name, .. } => name.clone(),
            Message::Unknown(raw) => MessageName::Unknown(raw.name.clone()),
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            Message::NodeHello(_) => None,
            Message::SimpleProgress { identifier, .. }
            | Message::PutSuccessful { identifier, .. }
            | Message::PutFetchable { identifier, .. }
            | Message::PutFailed { identifier, .. }
            | Message::AllData { identifier, .. }
            | Message::GetFailed { identifier, .. }
            | Message::ProtocolError { identifier, .. }
            | Message::IdentifierCollision { identifier } => identifier.as_deref(),
            Message::Info { raw, .. } | Message::Unknown(raw) => raw.identifier(),
        }
    }
}

/// PutFailed and GetFailed share Code/ShortCodeDescription/CodeDescription
fn operation_failure(raw: &RawMessage) -> Result<Failure> {
    Ok(Failure {
        code: raw.number_or_zero("Code")?,
        short_description: raw.owned("ShortCodeDescription").unwrap_or_default(),
        description: raw.owned("CodeDescription").unwrap_or_default(),
    })
}
