use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod conversion;
pub mod db;
pub mod error;
pub mod installment;
pub mod merge;
pub mod numbering;
pub mod process;
pub mod submission;
pub mod template;

pub use crate::db::AppState;
pub use crate::error::PipelineError;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn payload_too_large(message: &str) -> Self {
        Self::new("PayloadTooLarge", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::submission::handlers::create_submission,
            crate::submission::handlers::submit_submission,
            crate::submission::handlers::merge_submission_documents,
            crate::submission::handlers::preview_reward_form
        ),
        components(
            schemas(
                submission::Submission,
                submission::CreateSubmissionRequest,
                submission::PreviewRequest,
                submission::PreviewFormPayload,
                submission::PreviewFormData,
                submission::PreviewApplicant,
                submission::PreviewAttachmentMeta,
                submission::SubmitResponse,
                submission::GeneratedDocument,
                submission::MergeDocumentsResponse,
                submission::MergedFile,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Submissions", description = "Submission lifecycle and document merge endpoints."),
            (name = "Publication Rewards", description = "Publication reward form preview.")
        ),
        servers(
            (url = "http://127.0.0.1:8080", description = "Localhost server")
        )
    )]
    struct ApiDoc;

    let config = match config::AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let bind_address = (config.bind_address.clone(), config.port);

    let app_state = match AppState::new(config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to connect to database. Please check DATABASE_URL in .env and ensure the database is running. Error: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("research_fund_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://{}:{}", bind_address.0, bind_address.1);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-user-id"),
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(web::scope("/api").configure(submission::handlers::config))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind_address)?
    .run()
    .await
}
