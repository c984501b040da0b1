pub mod page;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::{Html, Json, Redirect};
use axum::routing::{get, post};
use axum::Router;
use tracing::{debug, warn};

use crate::llm::IntakeError;
use crate::session::{SessionView, Slot};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/session", get(session_json))
        .route("/images/primary", post(upload_primary))
        .route("/images/reference", post(upload_reference))
        .route("/images/primary/clear", post(clear_primary))
        .route("/images/reference/clear", post(clear_reference))
        .route("/analyze", post(analyze))
        .route("/reset", post(reset))
        .route("/retry", post(retry))
        .route("/prompt/copy", post(copy_prompt))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

fn back_to_page() -> Redirect {
    Redirect::to("/")
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let copy_ack_millis = state.copy_ack.as_millis() as u64;
    let session = state.session.lock();
    Html(page::render_page(&session, copy_ack_millis))
}

async fn session_json(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session.lock().view())
}

/// Pulls the `file` field out of the form. `Ok(None)` means nothing was
/// selected.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<Option<(Vec<u8>, Option<String>)>, IntakeError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| IntakeError::Unreadable(err.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(|value| value.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|err| IntakeError::Unreadable(err.body_text()))?;
        return Ok(Some((bytes.to_vec(), content_type)));
    }
    Ok(None)
}

async fn upload_into(state: &AppState, slot: Slot, multipart: Multipart) -> Redirect {
    match read_upload(multipart).await {
        Ok(Some((bytes, content_type))) => {
            state.load_into_slot(slot, &bytes, content_type.as_deref());
        }
        Ok(None) => debug!("No {} file in upload", slot.label()),
        Err(err) => warn!("Ignoring {} upload: {}", slot.label(), err),
    }
    back_to_page()
}

async fn upload_primary(State(state): State<AppState>, multipart: Multipart) -> Redirect {
    upload_into(&state, Slot::Primary, multipart).await
}

async fn upload_reference(State(state): State<AppState>, multipart: Multipart) -> Redirect {
    upload_into(&state, Slot::Reference, multipart).await
}

async fn clear_primary(State(state): State<AppState>) -> Redirect {
    state.session.lock().clear_image(Slot::Primary);
    back_to_page()
}

async fn clear_reference(State(state): State<AppState>) -> Redirect {
    state.session.lock().clear_image(Slot::Reference);
    back_to_page()
}

async fn analyze(State(state): State<AppState>) -> Redirect {
    if state.start_analysis().is_none() {
        debug!("Analysis not started");
    }
    back_to_page()
}

async fn reset(State(state): State<AppState>) -> Redirect {
    state.session.lock().reset();
    back_to_page()
}

async fn retry(State(state): State<AppState>) -> Redirect {
    state.session.lock().retry();
    back_to_page()
}

async fn copy_prompt(State(state): State<AppState>) -> Redirect {
    state.copy_prompt().await;
    back_to_page()
}
