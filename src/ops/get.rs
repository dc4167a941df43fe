//! Get
//!
//! `ClientGet` with `ReturnType=direct`, following redirects until the data
//! arrives in an `AllData` frame.

use bytes::Bytes;

use crate::error::{FcpError, Result};
use crate::network::Session;
use crate::protocol::{generate_identifier, Command, Message};

use super::{tolerate, Event, GetOptions, Observer};

/// GetFailed codes that carry a RedirectURI to retry against
pub const REDIRECT_CODES: [u32; 2] = [24, 27];

/// Build the ClientGet command for one attempt
pub fn build_get_command(identifier: &str, uri: &str, options: &GetOptions) -> Command {
    Command::new("ClientGet")
        .with_identifier(identifier)
        .field("URI", uri)
        .field("Verbosity", options.verbosity)
        .field("MaxRetries", options.max_retries)
        .field("PriorityClass", options.priority.class())
        .field("ReturnType", "direct")
}

/// Outcome of one ClientGet
enum Attempt {
    Data(Bytes),
    Redirect(String),
}

/// Fetch the data at `uri`, following up to `options.max_redirects` redirects
pub fn get(
    session: &mut Session,
    uri: &str,
    options: &GetOptions,
    observer: &mut dyn Observer,
) -> Result<Bytes> {
    let mut target = uri.to_string();
    let mut hops = 0;

    loop {
        match attempt(session, &target, options, observer)? {
            Attempt::Data(data) => return Ok(data),
            Attempt::Redirect(next) => {
                if hops >= options.max_redirects {
                    return Err(FcpError::RedirectLoopExceeded {
                        hops,
                        last_uri: next,
                    });
                }
                hops += 1;
                observer.on_event(&Event::Redirect {
                    from: target.clone(),
                    to: next.clone(),
                });
                target = next;
            }
        }
    }
}

fn attempt(
    session: &mut Session,
    uri: &str,
    options: &GetOptions,
    observer: &mut dyn Observer,
) -> Result<Attempt> {
    let identifier = generate_identifier("get");
    session.send_command(&build_get_command(&identifier, uri, options))?;
    tracing::debug!("Fetching {} as {}", uri, identifier);

    loop {
        match session.read_message()? {
            Message::AllData { data_length, .. } => {
                let data = session.read_payload()?;
                debug_assert_eq!(data.len(), data_length);
                tracing::info!("{}: fetched {} bytes from {}", identifier, data.len(), uri);
                return Ok(Attempt::Data(data));
            }
            Message::GetFailed {
                failure,
                redirect_uri,
                ..
            } => {
                if REDIRECT_CODES.contains(&failure.code) {
                    if let Some(next) = redirect_uri {
                        return Ok(Attempt::Redirect(next));
                    }
                    tracing::warn!("{}: redirect code {} without RedirectURI", identifier, failure.code);
                }
                return Err(failure.into_operation_error("ClientGet"));
            }
            Message::ProtocolError {
                identifier: id,
                failure,
            } => return Err(failure.into_protocol_error(id)),
            Message::IdentifierCollision { .. } => {
                return Err(FcpError::IdentifierCollision(identifier))
            }
            Message::SimpleProgress { progress, .. } => observer.on_event(&Event::Progress {
                identifier: identifier.clone(),
                progress,
            }),
            other => tolerate(session, &identifier, other, observer)?,
        }
    }
}
