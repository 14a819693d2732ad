//! Remote graph operation client
//!
//! Plain erase/extract operations are delegated to a job-graph execution
//! service as a single `boolean_op` node graph.

use crate::error::{CutoutError, Result};
use crate::types::{ImageObject, ImageResource, OperationKind, Rect};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Node id of the single boolean operation node
pub const BOOLEAN_OP_NODE_ID: &str = "boolean_op_node";

/// Reference to a persisted image by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageField {
    pub image_name: String,
}

/// Boolean composite of two images inside a bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanOpNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub image_a: ImageField,
    pub image_b: ImageField,
    pub operation: OperationKind,
    pub bbox: Rect,
}

/// Connection between two node fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: EdgeEndpoint,
    pub destination: EdgeEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEndpoint {
    pub node_id: String,
    pub field: String,
}

/// Job graph submitted to the execution service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    pub nodes: BTreeMap<String, BooleanOpNode>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Single-node graph combining `image_a` with `image_b`
    #[must_use]
    pub fn boolean_op(image_a: &str, image_b: &str, operation: OperationKind, bbox: Rect) -> Self {
        let node = BooleanOpNode {
            id: BOOLEAN_OP_NODE_ID.to_string(),
            node_type: "boolean_op".to_string(),
            image_a: ImageField {
                image_name: image_a.to_string(),
            },
            image_b: ImageField {
                image_name: image_b.to_string(),
            },
            operation,
            bbox,
        };
        Self {
            id: format!("boolean_cutout:{}", uuid::Uuid::new_v4()),
            nodes: BTreeMap::from([(BOOLEAN_OP_NODE_ID.to_string(), node)]),
            edges: Vec::new(),
        }
    }
}

/// Request body accepted by the execution service
#[derive(Debug, Serialize)]
struct RunGraphRequest<'a> {
    graph: &'a Graph,
    output_node_id: &'a str,
}

/// Executes a graph and resolves its output image
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn run_graph(&self, graph: &Graph, output_node_id: &str) -> Result<ImageResource>;
}

/// Graph executor talking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpGraphExecutor {
    client: Client,
    endpoint: String,
}

impl HttpGraphExecutor {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new<S: Into<String>>(endpoint: S, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CutoutError::network_error("Failed to create HTTP client", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GraphExecutor for HttpGraphExecutor {
    async fn run_graph(&self, graph: &Graph, output_node_id: &str) -> Result<ImageResource> {
        tracing::debug!(endpoint = %self.endpoint, graph_id = %graph.id, "Submitting graph");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RunGraphRequest {
                graph,
                output_node_id,
            })
            .send()
            .await
            .map_err(|e| CutoutError::network_error("Failed to submit graph", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CutoutError::remote_op(format!("HTTP {}: {}", status, body.trim())));
        }

        response
            .json::<ImageResource>()
            .await
            .map_err(|e| CutoutError::network_error("Failed to decode graph output", e))
    }
}

/// Client for the remote boolean operation
#[derive(Clone)]
pub struct BooleanOpClient {
    executor: Arc<dyn GraphExecutor>,
}

impl BooleanOpClient {
    pub fn new(executor: Arc<dyn GraphExecutor>) -> Self {
        Self { executor }
    }

    /// Run `kind` on the composite (image A) with the mask (image B)
    ///
    /// # Errors
    /// Every executor failure is reported as [`CutoutError::RemoteOpFailed`].
    pub async fn run_boolean_op(
        &self,
        composite: &ImageObject,
        mask: &ImageObject,
        kind: OperationKind,
        bbox: Rect,
    ) -> Result<ImageResource> {
        let graph = Graph::boolean_op(
            &composite.image.image_name,
            &mask.image.image_name,
            kind,
            bbox,
        );
        self.executor
            .run_graph(&graph, BOOLEAN_OP_NODE_ID)
            .await
            .map_err(|e| match e {
                CutoutError::RemoteOpFailed(_) => e,
                other => CutoutError::remote_op(other.to_string()),
            })
    }
}

impl std::fmt::Debug for BooleanOpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BooleanOpClient").finish_non_exhaustive()
    }
}
