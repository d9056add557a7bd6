use url::Url;

use crate::entity::BodyKind;
use crate::error::{AppError, AppResult};
use crate::models::KeyValue;
use crate::services::resolver::ResolvedHttp;

/// Wire-level request ready for the HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }
}

fn enabled(rows: &[KeyValue]) -> impl Iterator<Item = &KeyValue> {
    rows.iter().filter(|r| r.enabled)
}

/// Build the wire request from a resolved, variable-substituted request
pub fn prepare(resolved: &ResolvedHttp) -> AppResult<PreparedRequest> {
    let method = match resolved.http.method.trim() {
        "" => "GET".to_string(),
        m => m.to_ascii_uppercase(),
    };

    let mut url = Url::parse(resolved.http.url.trim())
        .map_err(|e| AppError::InvalidArgument(format!("invalid url: {}", e)))?;

    let params: Vec<&KeyValue> = enabled(&resolved.search_params).collect();
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for param in params {
            query.append_pair(&param.key, &param.value);
        }
    }

    let mut prepared = PreparedRequest {
        method,
        url: url.to_string(),
        headers: enabled(&resolved.headers)
            .filter(|h| !h.key.is_empty())
            .map(|h| (h.key.clone(), h.value.clone()))
            .collect(),
        body: Vec::new(),
    };

    match resolved.http.body_kind {
        BodyKind::FormData => {
            let boundary = uuid::Uuid::new_v4().simple().to_string();
            prepared.body = multipart_body(&boundary, &resolved.body_forms);
            if !prepared.has_header("content-type") {
                prepared.headers.push((
                    "Content-Type".to_string(),
                    format!("multipart/form-data; boundary={}", boundary),
                ));
            }
        }
        BodyKind::UrlEncoded => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for field in enabled(&resolved.body_urlencoded) {
                serializer.append_pair(&field.key, &field.value);
            }
            prepared.body = serializer.finish().into_bytes();
            if !prepared.has_header("content-type") {
                prepared.headers.push((
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ));
            }
        }
        BodyKind::Raw => {
            let bytes = resolved.raw_bytes();
            if !bytes.is_empty() {
                prepared.body = bytes.to_vec();
                if !prepared.has_header("content-type") {
                    prepared
                        .headers
                        .push(("Content-Type".to_string(), infer_content_type(bytes).to_string()));
                }
            }
        }
        BodyKind::Empty | BodyKind::Unspecified => {}
    }

    Ok(prepared)
}

fn infer_content_type(bytes: &[u8]) -> &'static str {
    if serde_json::from_slice::<serde_json::Value>(bytes).is_ok() {
        "application/json"
    } else {
        "text/plain"
    }
}

fn multipart_body(boundary: &str, fields: &[KeyValue]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in enabled(fields) {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                field.key.replace('"', "\\\"")
            )
            .as_bytes(),
        );
        body.extend_from_slice(field.value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}
