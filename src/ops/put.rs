//! Single-blob put
//!
//! `ClientPut` with the data sent inline, then wait for `PutSuccessful` or
//! `PutFetchable`.

use bytes::Bytes;

use crate::error::{FcpError, Result};
use crate::network::Session;
use crate::protocol::{generate_identifier, Command, Message, DATA_LENGTH_FIELD};

use super::{tolerate, Event, Observer, PutOptions};

/// Build the ClientPut command for `data_len` bytes of direct upload
pub fn build_put_command(identifier: &str, data_len: usize, options: &PutOptions) -> Command {
    Command::new("ClientPut")
        .with_identifier(identifier)
        .field("URI", options.target.as_uri())
        .field("Verbosity", options.verbosity)
        .field("MaxRetries", options.max_retries)
        .field("Metadata.ContentType", &options.content_type)
        .field("DontCompress", options.dont_compress)
        .field("PriorityClass", options.priority.class())
        .field("UploadFrom", "direct")
        .field(DATA_LENGTH_FIELD, data_len)
}

/// Insert one blob and return the resulting URI
///
/// SimpleProgress messages are reported to `observer`. ProtocolError and
/// PutFailed end the operation with an error.
pub fn put(
    session: &mut Session,
    data: impl Into<Bytes>,
    options: &PutOptions,
    observer: &mut dyn Observer,
) -> Result<String> {
    let data = data.into();
    let identifier = generate_identifier("put");
    let command = build_put_command(&identifier, data.len(), options).with_payload(data);

    tracing::debug!(
        "Inserting {} bytes at {} as {}",
        command.payload().map(|p| p.len()).unwrap_or(0),
        options.target.as_uri(),
        identifier
    );
    session.send_command(&command)?;

    loop {
        match session.read_message()? {
            Message::PutSuccessful { uri, .. } | Message::PutFetchable { uri, .. } => {
                tracing::info!("{}: inserted at {}", identifier, uri);
                return Ok(uri);
            }
            Message::SimpleProgress { progress, .. } => observer.on_event(&Event::Progress {
                identifier: identifier.clone(),
                progress,
            }),
            Message::ProtocolError {
                identifier: id,
                failure,
            } => return Err(failure.into_protocol_error(id)),
            Message::IdentifierCollision { .. } => {
                return Err(FcpError::IdentifierCollision(identifier))
            }
            Message::PutFailed { failure, .. } => {
                // Well-formed puts should not reach this
                tracing::warn!("{}: put failed unexpectedly: {:?}", identifier, failure);
                return Err(failure.into_operation_error("ClientPut"));
            }
            other => tolerate(session, &identifier, other, observer)?,
        }
    }
}
