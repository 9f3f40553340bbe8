//! Verb command handler

use crate::cli::{BodyArgs, CallArgs, DeleteArgs, FormField, GetArgs};
use crate::config::StoredSession;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use kos_http::{FileRef, MultipartField, RequestSpec, SessionAccessor, SessionContext};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// HTTP verb of a request command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    fn label(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    fn uploads(self) -> bool {
        matches!(self, Verb::Post | Verb::Put)
    }
}

/// Flags shared by every verb
fn base_spec(call: &CallArgs) -> RequestSpec {
    let mut spec = RequestSpec::new(call.path.clone()).with_error_display_mode(call.error_mode.into());
    for (key, value) in &call.params {
        spec = spec.with_param(key.clone(), value);
    }
    for (name, value) in &call.headers {
        spec = spec.with_header(name.clone(), value.clone());
    }
    if let Some(enabled) = call.notification() {
        spec = spec.with_success_notification(enabled);
    }
    if let Some(millis) = call.timeout {
        spec = spec.with_timeout(Duration::from_millis(millis));
    }
    spec
}

pub fn get_spec(args: &GetArgs) -> RequestSpec {
    base_spec(&args.call).with_cache_buster(args.cache_buster)
}

pub fn delete_spec(args: &DeleteArgs) -> RequestSpec {
    let spec = base_spec(&args.call);
    match &args.body {
        Some(body) => spec.with_json(body.clone()),
        None => spec,
    }
}

pub fn body_spec(args: &BodyArgs) -> Result<RequestSpec> {
    let spec = base_spec(&args.call);
    if !args.fields.is_empty() {
        return Ok(spec.with_fields(multipart_fields(&args.fields)?));
    }
    Ok(match &args.body {
        Some(body) => spec.with_json(body.clone()),
        None => spec,
    })
}

/// `-F` arguments as multipart fields; file fields must exist
fn multipart_fields(fields: &[FormField]) -> Result<Vec<MultipartField>> {
    fields
        .iter()
        .map(|field| match field {
            FormField::Text { key, value } => Ok(MultipartField::new(key.clone(), value.clone())),
            FormField::File { key, path } => {
                if !path.is_file() {
                    return Err(Error::FileNotFound { path: path.clone() });
                }
                let mut file = FileRef::new(path.display().to_string());
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    file = file.with_file_name(name);
                }
                if let Some(mime) = mime_for(path) {
                    file = file.with_mime_type(mime);
                }
                Ok(MultipartField::file(key.clone(), file))
            }
        })
        .collect()
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// Send one request and print the normalized response
#[instrument(skip_all, fields(verb = verb.label(), path = %spec.url))]
pub async fn handle_request(
    verb: Verb,
    mut spec: RequestSpec,
    context: &SessionContext,
    session: &StoredSession,
    output: &mut OutputWriter,
) -> Result<()> {
    let timer = Timer::with_details("request", &format!("{} {}", verb.label(), spec.url));

    let bar = if verb.uploads() && spec.body.is_some() {
        output.upload_progress(&format!("{} {}", verb.label(), spec.url))
    } else {
        None
    };
    if let Some(bar) = bar.clone() {
        spec = spec.with_upload_progress(move |progress| bar.update(progress));
    }

    let http = context.http();
    let result = match verb {
        Verb::Get => http.get(spec).await,
        Verb::Post => http.post(spec).await,
        Verb::Put => http.put(spec).await,
        Verb::Patch => http.patch(spec).await,
        Verb::Delete => http.delete(spec).await,
    };
    if let Some(bar) = &bar {
        bar.finish();
    }
    debug!(elapsed_ms = timer.elapsed().as_millis() as u64, "request finished");

    match result {
        Ok(response) => {
            info!(status = response.status_code, "request succeeded");
            output.data(&response)
        }
        Err(error) => {
            if error.status_code() == Some(401) {
                // The process may exit before the scheduled logout runs.
                session.logout();
            }
            let modal = context.errors().modal_error();
            if modal.is_error {
                output.info(&format!("modal: {}", modal.message));
            }
            Err(error.into())
        }
    }
}
