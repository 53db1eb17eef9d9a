//! Request handlers.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use paimon::DocumentFormat;
use vassago_core::Error;

use crate::api::{
    HealthResponse, ImageUploadResponse, LoadModelParams, MessageResponse, ModelsResponse,
    QueryRequest, QueryResponse, RootResponse, SystemPromptForm, SystemPromptResponse,
    SystemPromptUpdated, UploadResponse,
};
use crate::error::ApiError;
use crate::pipeline;
use crate::server::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Uploaded file pulled out of a multipart body.
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Reads the `file` field of a multipart body.
async fn read_file_field(mut multipart: Multipart) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| Error::invalid_request("file field has no file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::invalid_request(format!("failed to read upload: {e}")))?;

        return Ok(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(Error::invalid_request("multipart field 'file' is required").into())
}

/// `GET /`
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Vassago RAG API",
        status: "running",
        available_endpoints: vec![
            "/query",
            "/query/stream",
            "/upload",
            "/upload-image",
            "/models",
            "/health",
        ],
    })
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy",
        model_loaded: state.generation.is_loaded(),
        documents_count: state.knowledge.count().await?,
    }))
}

/// `GET /models`
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let generation = &state.generation;
    Json(ModelsResponse {
        current_model: generation.current_model().map(|m| m.to_string()),
        available_models: generation.available_models().to_vec(),
        use_quantization: generation.use_quantization(),
        system_prompt: generation.system_prompt(),
        model_state: generation.state(),
    })
}

/// `GET /system-prompt`
pub async fn get_system_prompt(State(state): State<Arc<AppState>>) -> Json<SystemPromptResponse> {
    Json(SystemPromptResponse {
        system_prompt: state.generation.system_prompt(),
    })
}

/// `POST /system-prompt`
pub async fn set_system_prompt(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SystemPromptForm>,
) -> Json<SystemPromptUpdated> {
    state.generation.set_system_prompt(form.prompt.clone());
    Json(SystemPromptUpdated {
        message: "System prompt updated successfully",
        new_prompt: form.prompt,
    })
}

/// `POST /models/load?model_name=`
pub async fn load_model(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoadModelParams>,
) -> ApiResult<Json<MessageResponse>> {
    tracing::info!(model = %params.model_name, "Loading model via API");
    state.generation.load(params.model_name.as_str()).await?;
    Ok(Json(MessageResponse {
        message: format!("Model {} loaded successfully", params.model_name),
    }))
}

/// `POST /upload`
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let file = read_file_field(multipart).await?;
    tracing::info!(filename = %file.filename, bytes = file.bytes.len(), "Receiving document");

    // Reject before touching the disk.
    DocumentFormat::from_path(Path::new(&file.filename))?;

    let path = state.documents.save(&file.filename, &file.bytes).await?;
    let chunks = state.documents.parse(&path).await?;
    let chunks_created = state.knowledge.add(chunks).await?;

    let filename = path
        .file_name()
        .map_or_else(|| file.filename.clone(), |n| n.to_string_lossy().into_owned());
    tracing::info!(%filename, chunks_created, "Document ingested");

    Ok(Json(UploadResponse {
        message: "Document uploaded and processed successfully",
        filename,
        chunks_created,
    }))
}

/// `POST /upload-image`
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<ImageUploadResponse>> {
    let file = read_file_field(multipart).await?;
    tracing::info!(filename = %file.filename, bytes = file.bytes.len(), "Receiving image");

    let image = Arc::new(marbas::decode_bytes(&file.bytes)?);
    let path = state.documents.save(&file.filename, &file.bytes).await?;
    let caption = state.vision.caption(image, None).await?;

    let filename = path
        .file_name()
        .map_or_else(|| file.filename.clone(), |n| n.to_string_lossy().into_owned());

    Ok(Json(ImageUploadResponse { filename, caption }))
}

/// `POST /query`
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let prepared = pipeline::prepare(&state, request).await?;
    Ok(Json(prepared.answer().await?))
}

/// `POST /query/stream`
pub async fn query_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Response> {
    let prepared = pipeline::prepare(&state, request).await?;
    let events = prepared.stream().await?;
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// `DELETE /documents`
pub async fn clear_documents(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<MessageResponse>> {
    state.knowledge.clear().await?;
    Ok(Json(MessageResponse {
        message: "All documents cleared successfully".to_string(),
    }))
}
