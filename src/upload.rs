//! Local-file detection and request body encoding.
//!
//! Methods with declared upload slots may receive local paths, remote
//! URLs, or platform file identifiers. Local files turn the request into
//! a `multipart/form-data` body assembled here with a random boundary;
//! everything else stays a JSON call. Nested descriptor shapes (media
//! arrays, sticker objects) are rewritten to `attach://<name>` sentinels
//! with a matching file part, the platform's convention for bundled
//! uploads.

use crate::cache::canonical_json;
use crate::methods::{MethodDescriptor, UploadShape};
use rand::distr::{Alphanumeric, SampleString};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Body handed to the transport: content type plus fully encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Encoding failures synthesise a 400 envelope; the description names the
/// offending path.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("not a regular file: {}", .0.display())]
    NotRegular(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
struct FilePart {
    field: String,
    path: PathBuf,
}

/// How a single slot value should be treated.
#[derive(Debug, Clone, PartialEq)]
enum FileRef {
    LocalPath(PathBuf),
    PassThrough,
}

/// Classify one candidate value. Rules, first match wins:
/// `file://` prefix, existing absolute path, `http(s)` URL, bare platform
/// file identifier, anything else untouched.
fn classify(value: &str) -> FileRef {
    if let Some(stripped) = value.strip_prefix("file://") {
        return FileRef::LocalPath(PathBuf::from(stripped));
    }
    let path = Path::new(value);
    if path.is_absolute() && path.exists() {
        return FileRef::LocalPath(path.to_path_buf());
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return FileRef::PassThrough;
    }
    if value.len() >= 20
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return FileRef::PassThrough;
    }
    FileRef::PassThrough
}

/// Encode the request body for one invocation.
///
/// With no local files involved this is the canonical JSON of the
/// parameters; otherwise a multipart body with one part per parameter and
/// one file part per detected local file.
pub async fn prepare(
    descriptor: Option<&MethodDescriptor>,
    params: &Value,
) -> Result<EncodedBody, UploadError> {
    let slots = descriptor.map(|d| d.upload_slots).unwrap_or(&[]);
    if slots.is_empty() {
        return Ok(json_body(params));
    }

    let mut params = params.clone();
    let mut files = Vec::new();

    if let Value::Object(map) = &mut params {
        for upload in slots {
            let Some(value) = map.get_mut(upload.name) else { continue };
            match upload.shape {
                UploadShape::Plain => {
                    let local = value.as_str().and_then(|s| match classify(s) {
                        FileRef::LocalPath(path) => Some(path),
                        FileRef::PassThrough => None,
                    });
                    if let Some(path) = local {
                        files.push(FilePart { field: upload.name.to_string(), path });
                        map.remove(upload.name);
                    }
                }
                UploadShape::Array(inner_fields) => {
                    if let Value::Array(entries) = value {
                        for (i, entry) in entries.iter_mut().enumerate() {
                            rewrite_descriptor(
                                entry,
                                inner_fields,
                                |field| format!("{}_{i}", singular(field)),
                                &mut files,
                            );
                        }
                    }
                }
                UploadShape::Object(inner_fields) => {
                    rewrite_descriptor(
                        value,
                        inner_fields,
                        |field| field.to_string(),
                        &mut files,
                    );
                }
            }
        }
    }

    if files.is_empty() {
        return Ok(json_body(&params));
    }

    for part in &files {
        let meta = tokio::fs::metadata(&part.path)
            .await
            .map_err(|_| UploadError::NotFound(part.path.clone()))?;
        if !meta.is_file() {
            return Err(UploadError::NotRegular(part.path.clone()));
        }
    }

    multipart_body(&params, files).await
}

/// Inspect one descriptor object and rewrite local-path fields to
/// `attach://` sentinels, collecting the matching file parts.
fn rewrite_descriptor(
    entry: &mut Value,
    inner_fields: &[&str],
    attach_name: impl Fn(&str) -> String,
    files: &mut Vec<FilePart>,
) {
    let Value::Object(obj) = entry else { return };
    for field in inner_fields {
        let Some(inner) = obj.get_mut(*field) else { continue };
        let Some(s) = inner.as_str() else { continue };
        if let FileRef::LocalPath(path) = classify(s) {
            let name = attach_name(field);
            *inner = Value::String(format!("attach://{name}"));
            files.push(FilePart { field: name, path });
        }
    }
}

fn singular(field: &str) -> &str {
    field.strip_suffix('s').unwrap_or(field)
}

fn json_body(params: &Value) -> EncodedBody {
    EncodedBody {
        content_type: "application/json".to_string(),
        bytes: canonical_json(params).into_bytes(),
    }
}

async fn multipart_body(params: &Value, files: Vec<FilePart>) -> Result<EncodedBody, UploadError> {
    let boundary = Alphanumeric.sample_string(&mut rand::rng(), 32);
    let mut bytes = Vec::new();

    if let Value::Object(map) = params {
        for (name, value) in map {
            let text = match value {
                Value::String(s) => s.clone(),
                other => canonical_json(other),
            };
            bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            bytes.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            bytes.extend_from_slice(text.as_bytes());
            bytes.extend_from_slice(b"\r\n");
        }
    }

    for part in files {
        let content = tokio::fs::read(&part.path)
            .await
            .map_err(|source| UploadError::Read { path: part.path.clone(), source })?;
        let filename = part
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| part.field.clone());
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n",
                part.field
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(
            format!("Content-Type: {}\r\n\r\n", mime_for(&part.path)).as_bytes(),
        );
        bytes.extend_from_slice(&content);
        bytes.extend_from_slice(b"\r\n");
    }

    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok(EncodedBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        bytes,
    })
}

/// MIME type by extension. The platform only needs a hint; unknown
/// extensions fall back to octet-stream.
fn mime_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "json" => "application/json",
        "tgs" => "application/x-tgsticker",
        _ => "application/octet-stream",
    }
}
