//! Handler for the /layers/{key} endpoint.
//!
//! A pure lookup of the most recently computed array for a layer, addressed
//! by its escaped key. Nothing is computed here: before any terrain request
//! the result is empty (`shape [0, 0]`). Output is JSON by default or an
//! Apache Arrow IPC stream with `format=arrow`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, Float32Array};
use arrow::record_batch::RecordBatch;
use arrow_ipc::writer::StreamWriter;
use arrow_schema::{DataType, Field, Schema};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error_response;
use crate::error::{Result, TerrawinError};
use crate::logging::generate_request_id;
use crate::state::AppState;
use crate::store::{decode_layer_key, StoredLayer};
use crate::tile::LayerPath;

/// Query parameters for the layer endpoint
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LayerQuery {
    /// Output format (json or arrow)
    #[serde(default)]
    pub format: Option<String>,
}

/// JSON body of a layer lookup
#[derive(Debug, Serialize)]
pub struct LayerResponse {
    pub key: String,
    pub layer: String,
    pub tile: Option<String>,
    pub run: Option<u64>,
    pub shape: [usize; 2],
    /// Row-major values
    pub data: Vec<f32>,
}

impl LayerResponse {
    fn new(key: &str, path: &LayerPath, stored: Option<&StoredLayer>) -> Self {
        match stored {
            Some(stored) => {
                let (rows, cols) = stored.data.dim();
                Self {
                    key: key.to_string(),
                    layer: path.to_string(),
                    tile: Some(stored.tile.clone()),
                    run: Some(stored.run),
                    shape: [rows, cols],
                    data: stored.data.iter().copied().collect(),
                }
            }
            None => Self {
                key: key.to_string(),
                layer: path.to_string(),
                tile: None,
                run: None,
                shape: [0, 0],
                data: Vec::new(),
            },
        }
    }
}

/// Handle GET /layers/{key} requests
pub async fn layer_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<LayerQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();
    let output_format = params.format.as_deref().unwrap_or("json");
    let params_desc = format!("key={}, format={}", key, output_format);

    debug!(
        endpoint = "/layers",
        request_id = %request_id,
        params = %params_desc,
        "Processing layer lookup"
    );

    let path = match decode_layer_key(&key) {
        Ok(path) => path,
        Err(error) => return error_response(error, "/layers", &request_id, Some(&params_desc)),
    };
    let stored = state.store.get(&path);

    let response = match output_format {
        "json" => Json(LayerResponse::new(&key, &path, stored.as_ref())).into_response(),
        "arrow" => {
            let empty = Array2::<f32>::zeros((0, 0));
            let data = stored.as_ref().map(|s| &*s.data).unwrap_or(&empty);
            match layer_to_arrow(&path, data) {
                Ok(bytes) => (
                    StatusCode::OK,
                    [(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/vnd.apache.arrow.stream"),
                    )],
                    bytes,
                )
                    .into_response(),
                Err(error) => {
                    return error_response(error, "/layers", &request_id, Some(&params_desc))
                }
            }
        }
        other => {
            let error = TerrawinError::InvalidParameter {
                param: "format".to_string(),
                message: format!("Unsupported format: {}. Must be json or arrow", other),
            };
            return error_response(error, "/layers", &request_id, Some(&params_desc));
        }
    };

    info!(
        endpoint = "/layers",
        request_id = %request_id,
        layer = %path,
        found = stored.is_some(),
        format = output_format,
        duration_us = start_time.elapsed().as_micros() as u64,
        "Layer lookup successful"
    );
    response
}

/// Serialize a layer as an Arrow IPC stream.
///
/// The batch holds one Float32 column in row-major order; the field carries
/// the array shape as JSON under the `shape` metadata key.
pub fn layer_to_arrow(path: &LayerPath, data: &Array2<f32>) -> Result<Vec<u8>> {
    let (rows, cols) = data.dim();
    let mut metadata = HashMap::new();
    metadata.insert(
        "shape".to_string(),
        serde_json::to_string(&[rows, cols]).map_err(|e| TerrawinError::Conversion {
            message: format!("Failed to serialize shape metadata: {}", e),
        })?,
    );
    metadata.insert("kind".to_string(), path.kind().to_string());

    let field = Field::new(path.to_string(), DataType::Float32, false).with_metadata(metadata);
    let schema = Arc::new(Schema::new(vec![field]));

    let values: Vec<f32> = data.iter().copied().collect();
    let column = Arc::new(Float32Array::from(values)) as ArrayRef;
    let batch =
        RecordBatch::try_new(schema.clone(), vec![column]).map_err(|e| TerrawinError::Conversion {
            message: format!("Failed to create Arrow record batch: {}", e),
        })?;

    let mut output = Vec::new();
    let mut writer =
        StreamWriter::try_new(&mut output, &schema).map_err(|e| TerrawinError::Conversion {
            message: format!("Failed to create Arrow IPC writer: {}", e),
        })?;

    writer.write(&batch).map_err(|e| TerrawinError::Conversion {
        message: format!("Failed to write Arrow record batch: {}", e),
    })?;

    writer.finish().map_err(|e| TerrawinError::Conversion {
        message: format!("Failed to finalize Arrow IPC stream: {}", e),
    })?;
    drop(writer);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use arrow_ipc::reader::StreamReader;
    use ndarray::array;
    use std::io::Cursor;

    #[test]
    fn test_empty_layer_response() {
        let path = LayerPath::new("NDVI", "Mean");
        let response = LayerResponse::new("NDVI-Mean", &path, None);
        assert_eq!(response.shape, [0, 0]);
        assert!(response.data.is_empty());
        assert!(response.tile.is_none());
    }

    #[test]
    fn test_layer_to_arrow() {
        let path = LayerPath::new("ASTER GDEM", "ASTGDEM");
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let bytes = layer_to_arrow(&path, &data).unwrap();

        let reader = StreamReader::try_new(Cursor::new(bytes), None).unwrap();
        let schema = reader.schema();
        let field = schema.field(0);
        assert_eq!(field.name(), "ASTER GDEM/ASTGDEM");
        assert_eq!(field.metadata().get("shape").unwrap(), "[2,3]");

        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let column = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Float32Array>()
            .unwrap();
        assert_eq!(column.len(), 6);
        assert_eq!(column.value(4), 5.0);
    }

    #[test]
    fn test_empty_layer_to_arrow() {
        let path = LayerPath::new("Land Water Map", "LWmap");
        let bytes = layer_to_arrow(&path, &Array2::zeros((0, 0))).unwrap();
        let reader = StreamReader::try_new(Cursor::new(bytes), None).unwrap();
        assert_eq!(reader.schema().field(0).metadata().get("shape").unwrap(), "[0,0]");
        assert_eq!(
            reader.schema().field(0).metadata().get("kind").unwrap(),
            "categorical"
        );
    }
}
