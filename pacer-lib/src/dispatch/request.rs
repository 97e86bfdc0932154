use http::header::{CONTENT_TYPE, COOKIE, USER_AGENT};
use http::{HeaderMap, HeaderValue};
use url::form_urlencoded;

use crate::{Command, Result};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Turn a [`Command`] into a request ready for the transport.
///
/// `defaults` are per-host headers from the configuration; headers set on
/// the command replace defaults of the same name.
pub(crate) fn build_request(
    command: &Command,
    defaults: Option<&HeaderMap>,
    user_agent: &HeaderValue,
) -> Result<reqwest::Request> {
    let mut request = reqwest::Request::new(command.method(), command.url().clone());
    let headers = request.headers_mut();

    if let Some(defaults) = defaults {
        headers.extend(defaults.clone());
    }
    for name in command.headers().keys() {
        headers.remove(name);
    }
    for (name, value) in command.headers() {
        headers.append(name.clone(), value.clone());
    }

    if let Some(credentials) = command.basic_auth() {
        credentials.apply(headers);
    }

    if !command.cookies().is_empty() {
        let pairs = command
            .cookies()
            .iter()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect::<Vec<_>>()
            .join("; ");
        // Appended as bytes, an existing value may hold non-UTF-8 octets
        let value = match headers.get(COOKIE) {
            Some(existing) if !existing.is_empty() => {
                let mut bytes = existing.as_bytes().to_vec();
                bytes.extend_from_slice(b"; ");
                bytes.extend_from_slice(pairs.as_bytes());
                HeaderValue::from_bytes(&bytes)?
            }
            _ => HeaderValue::from_str(&pairs)?,
        };
        headers.insert(COOKIE, value);
    }

    if let Some(body) = command.body() {
        *request.body_mut() = Some(body.to_vec().into());
    } else if let Some(form) = command.form() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        if !request.headers().contains_key(CONTENT_TYPE) {
            request
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
        }
        *request.body_mut() = Some(encoded.into());
    }

    if !request.headers().contains_key(USER_AGENT) {
        request
            .headers_mut()
            .insert(USER_AGENT, user_agent.clone());
    }

    Ok(request)
}
