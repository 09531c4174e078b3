//! HTTP handler functions for the dashboard API.

use actix_web::{HttpResponse, web};
use deforest_map_loader::Layers;
use deforest_map_pipeline::{FilterOptions, FilterSelection, PipelineError, PropertySelector};
use deforest_map_property_models::{AttributionStrategy, PropertyAttribute};
use deforest_map_report::{Dashboard, DashboardOptions};
use deforest_map_server_models::{
    ApiDataset, ApiError, ApiHealth, ApiLayerCounts, DashboardQueryParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/dataset`
///
/// Describes the dataset being served.
pub async fn dataset(state: web::Data<AppState>) -> HttpResponse {
    match state.layers() {
        Ok(layers) => HttpResponse::Ok().json(ApiDataset {
            id: layers.definition.id.clone(),
            name: layers.definition.name.clone(),
            working_crs: layers.working_crs.to_string(),
            display_crs: layers.display_crs.to_string(),
            default_strategy: layers.definition.attribution,
            layers: ApiLayerCounts {
                properties: layers.properties.len(),
                deforestation: layers.deforestation.len(),
                intersections: layers.intersections.as_ref().map(Vec::len),
                has_country: layers.country.is_some(),
            },
        }),
        Err(e) => load_failed(&e),
    }
}

/// `GET /api/filters`
///
/// Returns the selectable values of every filter.
pub async fn filters(state: web::Data<AppState>) -> HttpResponse {
    match state.layers() {
        Ok(layers) => HttpResponse::Ok().json(FilterOptions::from_layers(&layers)),
        Err(e) => load_failed(&e),
    }
}

/// `GET /api/dashboard`
///
/// Runs the pipeline for the requested selection and returns the full
/// dashboard payload.
pub async fn dashboard(
    state: web::Data<AppState>,
    query: web::Query<Vec<(String, String)>>,
) -> HttpResponse {
    let layers = match state.layers() {
        Ok(layers) => layers,
        Err(e) => return load_failed(&e),
    };

    let request = match DashboardQueryParams::from_pairs(query.into_inner())
        .and_then(|params| DashboardRequest::parse(&params, &layers))
    {
        Ok(request) => request,
        Err(message) => {
            log::warn!("Rejected dashboard request: {message}");
            return HttpResponse::BadRequest().json(ApiError::new(message));
        }
    };

    let result = web::block(move || -> Result<Dashboard, PipelineError> {
        deforest_map_report::build(
            &layers,
            &request.selection,
            request.strategy,
            request.options,
        )
    })
    .await;

    match result {
        Ok(Ok(dashboard)) => HttpResponse::Ok().json(dashboard),
        Ok(Err(e)) => {
            log::error!("Failed to build dashboard: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
        }
        Err(e) => {
            log::error!("Dashboard task failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to build dashboard"))
        }
    }
}

fn load_failed(e: &deforest_map_loader::LoaderError) -> HttpResponse {
    log::error!("Failed to load dataset: {e}");
    HttpResponse::InternalServerError().json(ApiError::new(format!("Failed to load dataset: {e}")))
}

/// A validated dashboard request.
#[derive(Debug)]
struct DashboardRequest {
    selection: FilterSelection,
    strategy: AttributionStrategy,
    options: DashboardOptions,
}

impl DashboardRequest {
    /// Starts from the full default selection and narrows it with every
    /// filter present in the query.
    fn parse(params: &DashboardQueryParams, layers: &Layers) -> Result<Self, String> {
        let mut selection = FilterSelection::defaults(&FilterOptions::from_layers(layers));

        let filters = [
            (PropertyAttribute::Category, &params.categories),
            (PropertyAttribute::Status, &params.statuses),
            (PropertyAttribute::PropertyType, &params.types),
        ];
        for (attribute, values) in filters {
            if let Some(values) = values {
                selection.restrict(attribute, values.iter().cloned());
            }
        }

        if let Some(property) = &params.property {
            selection.property = PropertySelector::from(property.as_str());
        }

        let strategy = match params.strategy.as_deref().map(str::trim) {
            None | Some("") => layers.definition.attribution,
            Some(s) => s
                .parse()
                .map_err(|_| format!("Invalid strategy '{s}' (expected auto, overlay or precomputed)"))?,
        };

        Ok(Self {
            selection,
            strategy,
            options: DashboardOptions {
                overlap_only: params.overlap_only.unwrap_or(false),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::App;
    use actix_web::test as actix_test;
    use deforest_map_loader::cache::LayerCache;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../loader/fixtures")
    }

    fn state() -> web::Data<AppState> {
        let definition =
            deforest_map_loader::registry::read_definition(&fixtures_dir().join("dataset.toml"))
                .unwrap();
        web::Data::new(AppState::new(
            definition,
            fixtures_dir(),
            Arc::new(LayerCache::new()),
        ))
    }

    fn params(query: &str) -> DashboardQueryParams {
        let pairs = web::Query::<Vec<(String, String)>>::from_query(query)
            .unwrap()
            .into_inner();
        DashboardQueryParams::from_pairs(pairs).unwrap()
    }

    #[test]
    fn absent_filters_select_everything() {
        let layers = state().layers().unwrap();
        let request = DashboardRequest::parse(&params(""), &layers).unwrap();
        assert_eq!(
            request.selection,
            FilterSelection::defaults(&FilterOptions::from_layers(&layers))
        );
        assert_eq!(request.strategy, AttributionStrategy::Auto);
        assert!(!request.options.overlap_only);
    }

    #[test]
    fn present_filters_narrow_the_selection() {
        let layers = state().layers().unwrap();
        let request = DashboardRequest::parse(
            &params("statuses=Ativo&statuses=%20Pendente&categories=&property=1001&overlapOnly=true"),
            &layers,
        )
        .unwrap();

        let statuses: Vec<&str> = request
            .selection
            .status
            .as_ref()
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(statuses, ["Ativo", "Pendente"]);
        assert!(request.selection.category.as_ref().unwrap().is_empty());
        assert_eq!(
            request.selection.property,
            PropertySelector::Id("1001".to_string())
        );
        assert!(request.options.overlap_only);
    }

    #[test]
    fn values_may_contain_commas() {
        let layers = state().layers().unwrap();
        let request =
            DashboardRequest::parse(&params("categories=Grande%2C%20Media"), &layers).unwrap();
        let categories: Vec<&str> = request
            .selection
            .category
            .as_ref()
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(categories, ["Grande, Media"]);
    }

    #[test]
    fn todos_selects_every_property() {
        let layers = state().layers().unwrap();
        let request = DashboardRequest::parse(&params("property=Todos"), &layers).unwrap();
        assert_eq!(request.selection.property, PropertySelector::All);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let layers = state().layers().unwrap();
        let err = DashboardRequest::parse(&params("strategy=dissolved"), &layers).unwrap_err();
        assert!(err.contains("dissolved"));
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = actix_test::init_service(App::new().configure(crate::configure)).await;
        let req = actix_test::TestRequest::get().uri("/api/health").to_request();
        let body: ApiHealth = actix_test::call_and_read_body_json(&app, req).await;
        assert!(body.healthy);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn dataset_describes_layers() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .configure(crate::configure),
        )
        .await;
        let req = actix_test::TestRequest::get().uri("/api/dataset").to_request();
        let body: ApiDataset = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.id, "fixture");
        assert_eq!(body.working_crs, "EPSG:31979");
        assert_eq!(body.layers.properties, 4);
        assert_eq!(body.layers.intersections, Some(3));
        assert!(body.layers.has_country);
    }

    #[actix_web::test]
    async fn filters_list_values() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .configure(crate::configure),
        )
        .await;
        let req = actix_test::TestRequest::get().uri("/api/filters").to_request();
        let body: FilterOptions = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.property_ids, ["1001", "1002", "1003", "1004"]);
        assert_eq!(
            body.statuses,
            Some(vec!["Ativo".to_string(), "Pendente".to_string()])
        );
    }

    #[actix_web::test]
    async fn dashboard_runs_the_pipeline() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .configure(crate::configure),
        )
        .await;
        let req = actix_test::TestRequest::get()
            .uri("/api/dashboard?statuses=Ativo&strategy=overlay")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["strategy"], "overlay");
        // 1001 and 1003 are active with a category
        assert_eq!(body["metrics"]["propertyCount"], 2);
        assert_eq!(body["metricLabels"]["propertiesTotalHa"], "8,00");
        assert_eq!(body["propertyTable"][0]["id"], "1001");
    }

    #[actix_web::test]
    async fn repeated_status_keys_select_each_value() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .configure(crate::configure),
        )
        .await;
        let req = actix_test::TestRequest::get()
            .uri("/api/dashboard?statuses=Ativo&statuses=Pendente&strategy=overlay")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        // 1004 has no category and stays out
        assert_eq!(body["metrics"]["propertyCount"], 3);
    }

    #[actix_web::test]
    async fn bad_toggle_is_a_bad_request() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .configure(crate::configure),
        )
        .await;
        let req = actix_test::TestRequest::get()
            .uri("/api/dashboard?overlapOnly=maybe")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn bad_strategy_is_a_bad_request() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .configure(crate::configure),
        )
        .await;
        let req = actix_test::TestRequest::get()
            .uri("/api/dashboard?strategy=nope")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unavailable_precomputed_layer_is_a_server_error() {
        let mut definition =
            deforest_map_loader::registry::read_definition(&fixtures_dir().join("dataset.toml"))
                .unwrap();
        definition.layers.intersections = None;
        let state = web::Data::new(AppState::new(
            definition,
            fixtures_dir(),
            Arc::new(LayerCache::new()),
        ));

        let app = actix_test::init_service(App::new().app_data(state).configure(crate::configure)).await;
        let req = actix_test::TestRequest::get()
            .uri("/api/dashboard?strategy=precomputed")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(
            resp.status(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
        let body: ApiError = actix_test::read_body_json(resp).await;
        assert!(body.error.contains("intersection"));
    }
}
