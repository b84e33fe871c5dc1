use std::{io, path::PathBuf};

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
};
use metrics::counter;
use tracing::{info, warn};
use uuid::Uuid;

use empleaworks_core::locale::MessageKey;
use empleaworks_core::types::Role;
use empleaworks_core::validation::ValidationErrors;

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::{Flash, Visitor};

const AVATAR_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Avatar,
    Cv,
}

impl FileKind {
    fn dir(self) -> &'static str {
        match self {
            Self::Avatar => "avatars",
            Self::Cv => "cvs",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Cv => "cv",
        }
    }

    fn accepts(self, extension: &str) -> bool {
        match self {
            Self::Avatar => AVATAR_EXTENSIONS.contains(&extension),
            Self::Cv => extension == "pdf",
        }
    }

    fn type_message(self) -> &'static str {
        match self {
            Self::Avatar => "The avatar must be a png, jpg, jpeg, webp or gif image.",
            Self::Cv => "The CV must be a PDF file.",
        }
    }
}

/// Local directory holding uploaded avatars and CVs under generated names.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, kind: FileKind, name: &str) -> io::Result<PathBuf> {
        if !is_stored_name(name) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "invalid file name"));
        }
        Ok(self.root.join(kind.dir()).join(name))
    }

    /// Writes `bytes` under a fresh UUID name and returns that name.
    pub async fn save(&self, kind: FileKind, extension: &str, bytes: &[u8]) -> io::Result<String> {
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;
        let name = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(dir.join(&name), bytes).await?;
        Ok(name)
    }

    pub async fn read(&self, kind: FileKind, name: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path(kind, name)?).await
    }

    /// Deletes a stored file; a file that is already gone is not an error.
    pub async fn remove(&self, kind: FileKind, name: &str) {
        let result = match self.path(kind, name) {
            Ok(path) => tokio::fs::remove_file(path).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(stage = "uploads", file = name, error = %err, "failed to remove file"),
        }
    }
}

/// Names produced by [`FileStore::save`]: no separators, no leading dot.
fn is_stored_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.')
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    Some(extension.to_ascii_lowercase())
}

fn content_type(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn multipart_problem(err: MultipartError) -> ProblemResponse {
    ProblemResponse::new(err.status(), "invalid_upload", err.body_text())
}

struct Upload {
    extension: String,
    bytes: Vec<u8>,
}

async fn read_upload(
    mut multipart: Multipart,
    kind: FileKind,
    max_bytes: usize,
) -> Result<Upload, ProblemResponse> {
    let field_name = kind.label();
    while let Some(field) = multipart.next_field().await.map_err(multipart_problem)? {
        if field.name() != Some(field_name) {
            continue;
        }
        let extension = field
            .file_name()
            .and_then(extension_of)
            .filter(|extension| kind.accepts(extension));
        let bytes = field.bytes().await.map_err(multipart_problem)?;

        let Some(extension) = extension else {
            return Err(ValidationErrors::single(field_name, kind.type_message()).into());
        };
        if bytes.is_empty() {
            return Err(ValidationErrors::single(field_name, "The uploaded file is empty.").into());
        }
        if bytes.len() > max_bytes {
            return Err(ValidationErrors::single(
                field_name,
                format!("The file may not be greater than {} kilobytes.", max_bytes / 1024),
            )
            .into());
        }
        if kind == FileKind::Cv && !bytes.starts_with(PDF_MAGIC) {
            return Err(ValidationErrors::single(field_name, kind.type_message()).into());
        }
        return Ok(Upload {
            extension,
            bytes: bytes.to_vec(),
        });
    }
    Err(ValidationErrors::single(field_name, format!("The {field_name} field is required.")).into())
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    visitor: Visitor,
    multipart: Multipart,
) -> Result<Response, ProblemResponse> {
    let user_id = visitor.user()?.id.clone();
    let upload = read_upload(multipart, FileKind::Avatar, state.upload_max_bytes()).await?;

    let name = state
        .files()
        .save(FileKind::Avatar, &upload.extension, &upload.bytes)
        .await
        .map_err(|err| ProblemResponse::internal("uploads", err))?;
    let previous = match state
        .storage()
        .users()
        .set_avatar(&user_id, Some(&name), state.now())
        .await
    {
        Ok(previous) => previous,
        Err(err) => {
            state.files().remove(FileKind::Avatar, &name).await;
            return Err(ProblemResponse::internal("uploads", err));
        }
    };
    if let Some(previous) = previous {
        state.files().remove(FileKind::Avatar, &previous).await;
    }

    counter!("uploads_total", "kind" => "avatar").increment(1);
    info!(stage = "uploads", %user_id, file = %name, "avatar stored");
    Ok(visitor.redirect("/profile", Flash::success(MessageKey::AvatarUpdated)))
}

pub async fn remove_avatar(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, ProblemResponse> {
    let user_id = visitor.user()?.id.clone();
    let previous = state
        .storage()
        .users()
        .set_avatar(&user_id, None, state.now())
        .await
        .map_err(|err| ProblemResponse::internal("uploads", err))?;
    if let Some(previous) = previous {
        state.files().remove(FileKind::Avatar, &previous).await;
    }
    Ok(visitor.redirect("/profile", Flash::success(MessageKey::AvatarRemoved)))
}

pub async fn upload_cv(
    State(state): State<AppState>,
    visitor: Visitor,
    multipart: Multipart,
) -> Result<Response, ProblemResponse> {
    let user_id = visitor.require(Role::Candidate)?.id.clone();
    let upload = read_upload(multipart, FileKind::Cv, state.upload_max_bytes()).await?;

    let name = state
        .files()
        .save(FileKind::Cv, &upload.extension, &upload.bytes)
        .await
        .map_err(|err| ProblemResponse::internal("uploads", err))?;
    let previous = match state
        .storage()
        .candidates()
        .set_cv(&user_id, &name, state.now())
        .await
    {
        Ok(previous) => previous,
        Err(err) => {
            state.files().remove(FileKind::Cv, &name).await;
            return Err(ProblemResponse::internal("uploads", err));
        }
    };
    if let Some(previous) = previous {
        state.files().remove(FileKind::Cv, &previous).await;
    }

    counter!("uploads_total", "kind" => "cv").increment(1);
    info!(stage = "uploads", %user_id, file = %name, "cv stored");
    Ok(visitor.redirect("/profile", Flash::success(MessageKey::CvUploaded)))
}

pub async fn serve_avatar(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ProblemResponse> {
    let bytes = state
        .files()
        .read(FileKind::Avatar, &file)
        .await
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ProblemResponse::not_found("file"),
            _ => ProblemResponse::internal("uploads", err),
        })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(&file))
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .header("x-content-type-options", "nosniff")
        .body(Body::from(bytes))
        .map_err(|err| ProblemResponse::internal("uploads", err))
}

/// Builds the attachment response for a stored CV.
pub async fn cv_attachment(
    state: &AppState,
    candidate_id: &str,
    file: &str,
) -> Result<Response, ProblemResponse> {
    let bytes = state
        .files()
        .read(FileKind::Cv, file)
        .await
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ProblemResponse::not_found("CV"),
            _ => ProblemResponse::internal("uploads", err),
        })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"cv-{candidate_id}.pdf\""),
        )
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from(bytes))
        .map_err(|err| ProblemResponse::internal("uploads", err))
}

pub async fn remove_all(state: &AppState, avatar: Option<&str>, cv: Option<&str>) {
    if let Some(avatar) = avatar {
        state.files().remove(FileKind::Avatar, avatar).await;
    }
    if let Some(cv) = cv {
        state.files().remove(FileKind::Cv, cv).await;
    }
}
