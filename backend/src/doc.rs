//! OpenAPI documentation configuration.
//!
//! Defines [`ApiDoc`], the generated OpenAPI specification covering the REST
//! endpoints and the response schemas they reference. Authentication is
//! handled by an upstream gateway, so the document declares no security
//! schemes.

use utoipa::OpenApi;

use crate::domain::enrichment::{
    DatasetGeometries, EnrichmentResult, FeatureSlot, ProviderSlot, QueryMode,
};
use crate::domain::error::{Error, ErrorCode};
use crate::domain::features::{FeatureCollectionDto, FeatureDto};
use crate::domain::geo::{BBox, GeoPoint};
use crate::inbound::http::datasets::DatasetListDto;

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Geoserve backend API",
        description = "Point enrichment cache and spatial dataset queries."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::health::live,
        crate::inbound::http::health::ready,
        crate::inbound::http::datasets::list_datasets,
        crate::inbound::http::datasets::query_dataset,
        crate::inbound::http::enrich::enrich_point,
    ),
    components(schemas(
        Error,
        ErrorCode,
        DatasetListDto,
        FeatureDto,
        FeatureCollectionDto,
        EnrichmentResult,
        ProviderSlot,
        FeatureSlot,
        DatasetGeometries,
        QueryMode,
        GeoPoint,
        BBox,
    )),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "datasets", description = "Spatial dataset queries"),
        (name = "enrichment", description = "Combined point enrichment")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use utoipa::OpenApi;

    use super::ApiDoc;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/health/live",
            "/api/v1/health/ready",
            "/api/v1/datasets",
            "/api/v1/datasets/{name}",
            "/api/v1/enrich/point",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }

    #[test]
    fn document_serialises_to_yaml() {
        let yaml = ApiDoc::openapi().to_yaml().expect("document serialises");
        assert!(yaml.contains("Geoserve backend API"));
    }
}
