use actix_web::{
    error, get,
    http::{header::ContentType, StatusCode},
    post,
    web::{self, Data, Json},
    HttpResponse,
};
use askama::Template;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::application::{self, Application, BookVehicle};
use crate::dashboard::{ConcurrencyDemoPage, DashboardPage, ErrorPage};
use crate::domain::BookingOutcome;
use crate::read_model::{AvailableVehicle, Repository};

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(concurrency_demo)
        .service(health)
        .service(get_available_vehicle)
        .service(book_without_lock)
        .service(book_with_lock)
        .service(reset_demo);
}

#[get("/")]
async fn index(repository: Data<Repository>) -> HttpResponse {
    let page = match repository.dashboard().await {
        Ok(dashboard) => DashboardPage::new(&dashboard).render(),
        Err(application::Error::Connection(err)) => {
            warn!(%err, "dashboard could not reach the database");
            ErrorPage::connection().render()
        }
        Err(err) => {
            error!(%err, "dashboard query failed");
            ErrorPage::failure(err.to_string()).render()
        }
    };
    html(page)
}

#[get("/concurrency-demo")]
async fn concurrency_demo() -> HttpResponse {
    html(ConcurrencyDemoPage {}.render())
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

fn html(page: askama::Result<String>) -> HttpResponse {
    match page {
        Ok(body) => HttpResponse::Ok()
            .insert_header(ContentType::html())
            .body(body),
        Err(err) => {
            error!(%err, "template rendering failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Serialize, Debug)]
struct VehicleLookup {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    vehicle: Option<AvailableVehicle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

#[get("/api/get-available-vehicle")]
async fn get_available_vehicle(
    repository: Data<Repository>,
) -> Result<Json<VehicleLookup>, application::Error> {
    let lookup = match repository.available_vehicle().await? {
        Some(vehicle) => VehicleLookup {
            success: true,
            vehicle: Some(vehicle),
            message: None,
        },
        None => VehicleLookup {
            success: false,
            vehicle: None,
            message: Some("No available vehicles"),
        },
    };
    Ok(Json(lookup))
}

#[post("/api/book-without-lock")]
async fn book_without_lock(
    app: Data<Application>,
    data: Json<BookVehicle>,
) -> Result<Json<BookingOutcome>, application::Error> {
    let outcome = app.book_without_lock(data.into_inner()).await?;
    Ok(Json(outcome))
}

#[post("/api/book-with-lock")]
async fn book_with_lock(
    app: Data<Application>,
    data: Json<BookVehicle>,
) -> Result<Json<BookingOutcome>, application::Error> {
    let outcome = app.book_with_lock(data.into_inner()).await?;
    Ok(Json(outcome))
}

#[derive(Serialize, Debug)]
struct ResetResponse {
    success: bool,
    message: &'static str,
    vehicles_reset: u64,
    rentals_deleted: u64,
}

#[post("/api/reset-demo")]
async fn reset_demo(app: Data<Application>) -> Result<Json<ResetResponse>, application::Error> {
    let summary = app.reset_demo().await?;
    Ok(Json(ResetResponse {
        success: true,
        message: "Demo reset successfully",
        vehicles_reset: summary.vehicles_reset,
        rentals_deleted: summary.rentals_deleted,
    }))
}

impl error::ResponseError for application::Error {
    fn error_response(&self) -> HttpResponse {
        match self {
            application::Error::Connection(err) => warn!(%err, "database connection failed"),
            application::Error::Database(err) => error!(%err, "database error"),
            application::Error::Domain(_) => {}
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            application::Error::Domain(_) => StatusCode::BAD_REQUEST,
            application::Error::Connection(_) | application::Error::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use actix_web::{test, App};
    use serde_json::Value;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

    use super::*;
    use crate::domain::BookingPolicy;
    use crate::testing;

    /// Pool aimed at a port nothing listens on.
    fn unreachable_pool() -> sqlx::PgPool {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy_with(PgConnectOptions::new().host("127.0.0.1").port(1))
    }

    fn app_data(pool: sqlx::PgPool) -> (Data<Application>, Data<Repository>) {
        (
            Data::new(Application::new(pool.clone(), BookingPolicy::default())),
            Data::new(Repository::new(pool)),
        )
    }

    #[actix_web::test]
    async fn static_pages_render() {
        let (app, repository) = app_data(unreachable_pool());
        let service =
            test::init_service(App::new().app_data(app).app_data(repository).configure(routes))
                .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body = test::call_and_read_body(&service, req).await;
        assert_eq!(body, web::Bytes::from_static(b"OK"));

        let req = test::TestRequest::get().uri("/concurrency-demo").to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("Concurrency Control Demo"));
    }

    #[actix_web::test]
    async fn unreachable_database_is_a_connection_failure() {
        let (app, repository) = app_data(unreachable_pool());
        let service =
            test::init_service(App::new().app_data(app).app_data(repository).configure(routes))
                .await;

        for uri in ["/api/book-with-lock", "/api/book-without-lock"] {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(json!({ "customer_name": "Alice", "vehicle_id": 7, "delay": 0 }))
                .to_request();
            let resp = test::call_service(&service, req).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body, json!({ "error": "Database connection failed" }));
        }

        let req = test::TestRequest::post().uri("/api/reset-demo").to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let req = test::TestRequest::get()
            .uri("/api/get-available-vehicle")
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("<h1>Database Connection Error</h1>"));
    }

    #[actix_web::test]
    async fn invalid_booking_requests_are_rejected() {
        let (app, repository) = app_data(unreachable_pool());
        let service =
            test::init_service(App::new().app_data(app).app_data(repository).configure(routes))
                .await;

        let req = test::TestRequest::post()
            .uri("/api/book-with-lock")
            .set_json(json!({ "customer_name": "Alice", "vehicle_id": 7, "delay": -3 }))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["error"],
            "delay must be a finite, non-negative number of seconds"
        );

        let req = test::TestRequest::post()
            .uri("/api/book-without-lock")
            .set_json(json!({ "customer_name": "", "vehicle_id": 7 }))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/book-without-lock")
            .set_json(json!({ "vehicle_id": 7 }))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    #[ignore = "requires database"]
    async fn booking_endpoints_end_to_end() {
        let pool = testing::scratch_pool("http_end_to_end").await;
        let (app, repository) = app_data(pool);
        let service =
            test::init_service(App::new().app_data(app).app_data(repository).configure(routes))
                .await;

        let req = test::TestRequest::get()
            .uri("/api/get-available-vehicle")
            .to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["vehicle"]["vehicle_id"], 1);

        let req = test::TestRequest::post()
            .uri("/api/book-with-lock")
            .set_json(json!({ "customer_name": "Alice", "customer_id": 2, "vehicle_id": 1 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["step"], "booked");
        assert!(body["rental_id"].is_i64());

        let req = test::TestRequest::post()
            .uri("/api/book-with-lock")
            .set_json(json!({ "customer_name": "Bob", "vehicle_id": 1 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Vehicle is now rented (another user got it)",
                "step": "unavailable",
            })
        );

        let req = test::TestRequest::post()
            .uri("/api/book-without-lock")
            .set_json(json!({ "customer_name": "Carol", "vehicle_id": 404 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["step"], "check");
        assert_eq!(body["message"], "Vehicle not found");

        for expected_rentals in [1, 0] {
            let req = test::TestRequest::post().uri("/api/reset-demo").to_request();
            let body: Value = test::call_and_read_body_json(&service, req).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["message"], "Demo reset successfully");
            assert_eq!(body["rentals_deleted"], expected_rentals);
        }

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("Dashboard Statistics"));
    }
}
