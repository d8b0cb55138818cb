use axum::{
    extract::{Path, Query, State},
    http::{header, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    models::{ColumnType, Records, Table},
    services::{
        chart::ChartSpec,
        dataset_store::Dataset,
        export,
        inference::{self, ColumnClassification},
        plan::ChartPlan,
        reader::{self, ReadOptions},
        stats::{self, SummaryReport},
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/datasets", post(upload_dataset))
        .route("/datasets/:id/summary", get(dataset_summary))
        .route("/datasets/:id/preview", get(dataset_preview))
        .route("/datasets/:id/export", get(export_dataset))
        .route("/datasets/:id/chart", post(generate_chart))
        .layer(cors)
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    file_name: String,
    sheet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    name: String,
    dtype: ColumnType,
    null_count: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    id: u64,
    file_name: String,
    sheet_names: Vec<String>,
    shape: (usize, usize),
    columns: Vec<ColumnInfo>,
    classification: ColumnClassification,
    datetime_columns: Vec<String>,
    preview: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    rows: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    total_rows: usize,
    columns: Vec<String>,
    rows: serde_json::Value,
}

fn preview_rows(table: &Table, rows: usize) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(Records(&table.head(rows)))
        .map_err(|e| AppError::Internal(format!("Failed to serialize preview: {}", e)))
}

async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let start = std::time::Instant::now();
    if body.is_empty() {
        return Err(AppError::InvalidInput("No file provided".to_string()));
    }
    if body.len() > state.config.max_file_size {
        return Err(AppError::InvalidInput(format!(
            "File is {}KB, the limit is {}KB",
            body.len() / 1024,
            state.config.max_file_size / 1024
        )));
    }
    tracing::info!("Received {} ({}KB)", params.file_name, body.len() / 1024);

    let file_name = params.file_name.clone();
    let options = ReadOptions { sheet: params.sheet };
    let loaded = tokio::task::spawn_blocking(move || reader::load(&body, &file_name, &options))
        .await
        .map_err(|e| AppError::Internal(format!("Reader task failed: {}", e)))??;

    let table = &loaded.table;
    let columns = table
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name.clone(),
            dtype: c.dtype,
            null_count: c.null_count(),
        })
        .collect();
    let classification = inference::classify(table);
    let datetime_columns = inference::detect_datetime_columns(table);
    let shape = table.shape();
    let preview = preview_rows(table, state.config.preview_rows)?;

    let (id, dataset) = state.datasets.insert(Dataset {
        file_name: params.file_name,
        sheet_names: loaded.sheet_names,
        table: loaded.table,
    });
    tracing::info!("Dataset {} ready in {:?}", id, start.elapsed());

    Ok(Json(UploadResponse {
        id,
        file_name: dataset.file_name.clone(),
        sheet_names: dataset.sheet_names.clone(),
        shape,
        columns,
        classification,
        datetime_columns,
        preview,
    }))
}

async fn dataset_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<SummaryReport>, AppError> {
    let dataset = state.datasets.get(id)?;
    Ok(Json(stats::summarize(&dataset.table)))
}

async fn dataset_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<PreviewResponse>, AppError> {
    let dataset = state.datasets.get(id)?;
    let rows = preview_rows(&dataset.table, params.rows.unwrap_or(state.config.preview_rows))?;

    Ok(Json(PreviewResponse {
        total_rows: dataset.table.height(),
        columns: dataset.table.column_names().into_iter().map(String::from).collect(),
        rows,
    }))
}

fn export_file_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name);
    format!("{}_clean.csv", stem.replace('"', ""))
}

async fn export_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let dataset = state.datasets.get(id)?;
    let csv = export::to_csv(&dataset.table)?;
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(&dataset.file_name));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

async fn generate_chart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(plan): Json<ChartPlan>,
) -> Result<Json<ChartSpec>, AppError> {
    let dataset = state.datasets.get(id)?;
    tracing::info!("Chart '{}' requested for dataset {}", plan.kind, id);
    let spec = plan.execute(&dataset.table)?;
    Ok(Json(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::chart::ChartData;
    use axum::http::StatusCode;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default()))
    }

    async fn upload(state: &Arc<AppState>, file_name: &str, body: &'static [u8]) -> UploadResponse {
        let params = UploadParams { file_name: file_name.to_string(), sheet: None };
        let Json(response) = upload_dataset(State(state.clone()), Query(params), Bytes::from_static(body))
            .await
            .unwrap();
        response
    }

    #[tokio::test]
    async fn upload_then_chart() {
        let state = state();
        let uploaded = upload(&state, "vendas.csv", b"id;val\n1;10\n1;30\n2;20\n").await;
        assert_eq!(uploaded.shape, (3, 2));
        assert_eq!(uploaded.classification.numeric, vec!["id", "val"]);
        assert_eq!(uploaded.preview[1], serde_json::json!({"id": 1, "val": 30}));

        let plan: ChartPlan =
            serde_json::from_str(r#"{"kind":"Barras","x":"id","y":"val","mode":"soma"}"#).unwrap();
        let Json(spec) = generate_chart(State(state.clone()), Path(uploaded.id), Json(plan))
            .await
            .unwrap();
        let ChartData::Series { points, .. } = spec.data else { panic!("series expected") };
        let sums: Vec<String> = points.iter().map(|p| format!("{}={}", p.x, p.y)).collect();
        assert_eq!(sums, vec!["1=40", "2=20"]);
    }

    #[tokio::test]
    async fn preview_respects_row_limit() {
        let state = state();
        let uploaded = upload(&state, "a.csv", b"a,b\n1,x\n2,y\n3,z\n").await;
        let Json(preview) = dataset_preview(
            State(state.clone()),
            Path(uploaded.id),
            Query(PreviewParams { rows: Some(2) }),
        )
        .await
        .unwrap();
        assert_eq!(preview.total_rows, 3);
        assert_eq!(preview.columns, vec!["a", "b"]);
        assert_eq!(preview.rows, serde_json::json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]));
    }

    #[test]
    fn summary_of_unknown_dataset_is_404() {
        let err = tokio_test::block_on(dataset_summary(State(state()), Path(42))).unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected() {
        let params = UploadParams { file_name: "notes.txt".to_string(), sheet: None };
        let err = upload_dataset(State(state()), Query(params), Bytes::from_static(b"hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn export_sets_attachment_headers() {
        let state = state();
        let uploaded = upload(&state, "relatorio.csv", b"a,b\n1,x\n").await;
        let response = export_dataset(State(state.clone()), Path(uploaded.id))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"relatorio_clean.csv\""
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"a,b\n1,x\n");
    }

    #[test]
    fn export_name_drops_extension() {
        assert_eq!(export_file_name("vendas.xlsx"), "vendas_clean.csv");
        assert_eq!(export_file_name("dados"), "dados_clean.csv");
    }
}
