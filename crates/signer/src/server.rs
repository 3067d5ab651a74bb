use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::TryStreamExt;
use serde::Deserialize;
use tracing::{error, info};

use crate::error::ServerError;
use crate::signing::{Content, OutputFormat, SignRequest, SigningInvoker};

/// Key material every request is signed with. Fixed at startup.
#[derive(Clone)]
pub struct Credentials {
    pub key: PathBuf,
    pub cert: PathBuf,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub invoker: SigningInvoker,
    pub credentials: Arc<Credentials>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignQuery {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub opaque: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(|| async move { (StatusCode::OK, "Ok").into_response() }))
        .route("/sign", post(sign_handler))
        .with_state(state)
}

pub async fn run(host: String, port: u16, state: AppState) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, program = %state.invoker.program_path().display(), "signing service listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .inspect_err(|err| error!(error = %err, "signing service terminated"))
    .context("serving signing requests")?;

    Ok(())
}

/// Streams the request body into the signing tool and answers with its
/// output.
async fn sign_handler(
    State(state): State<AppState>,
    query: Result<Query<SignQuery>, QueryRejection>,
    body: Body,
) -> Result<Response, ServerError> {
    let Query(query) = query.map_err(|err| ServerError::BadRequest(err.body_text()))?;

    let stream = Box::pin(body.into_data_stream().map_err(io::Error::other));
    let mut request = SignRequest::new()
        .content(Content::from_stream(stream))
        .key(state.credentials.key.clone())
        .cert(state.credentials.cert.clone())
        .output_format(query.format)
        .opaque(query.opaque);
    if let Some(ref password) = state.credentials.password {
        request = request.password(password.clone());
    }

    let result = state.invoker.sign(request).await?;
    info!(
        format = %query.format,
        opaque = query.opaque,
        output_len = result.output.len(),
        "signed request body"
    );

    Ok((
        [(header::CONTENT_TYPE, query.format.content_type())],
        result.output,
    )
        .into_response())
}
