use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fanfetch API",
        version = "0.1.0",
        description = "Concurrent batch URL fetcher with first-error-wins cancellation."
    ),
    paths(crate::routes::fetch_urls, crate::routes::health),
    components(schemas(
        crate::dto::FetchRequest,
        crate::dto::FetchResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "fetch", description = "Batch fetching"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
