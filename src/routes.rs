use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregation::{compute_total, sort_for_display};
use crate::auth::{Session, SessionKeys};
use crate::error::TrackerError;
use crate::period::Period;
use crate::schemas::{Expense, ExpenseChanges, SortKey, Submission};
use crate::store::ExpenseStore;
use crate::tracker::ExpenseTracker;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    month: Option<u32>,
    year: Option<i32>,
    #[serde(default)]
    shift: i32,
    #[serde(default)]
    sort: SortKey,
}

impl PeriodQuery {
    fn period(&self) -> Result<Period, TrackerError> {
        let current = Period::current();
        let month = self.month.unwrap_or(current.month);
        let year = self.year.unwrap_or(current.year);
        let period = Period::new(month, year)
            .ok_or_else(|| TrackerError::Validation("month must be between 0 and 11".to_string()))?;
        period
            .advance(self.shift)
            .ok_or_else(|| TrackerError::Validation("year is out of range".to_string()))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PeriodListing {
    pub period: Period,
    pub total: f64,
    pub expenses: Vec<Expense>,
}

async fn list_expenses<S: ExpenseStore>(
    session: Session,
    tracker: web::Data<ExpenseTracker<S>>,
    query: web::Query<PeriodQuery>,
) -> Result<HttpResponse, TrackerError> {
    let period = query.period()?;
    info!("GET /expenses - {} {}/{}", session.owner, period.month + 1, period.year);
    let mut expenses = tracker.fetch_period(&session.owner, period).await?;
    sort_for_display(&mut expenses, query.sort);
    Ok(HttpResponse::Ok().json(PeriodListing {
        period,
        total: compute_total(&expenses),
        expenses,
    }))
}

async fn add_expense<S: ExpenseStore>(
    session: Session,
    tracker: web::Data<ExpenseTracker<S>>,
    submission: web::Json<Submission>,
) -> Result<HttpResponse, TrackerError> {
    info!("POST /expenses - {}", session.owner);
    let created = tracker.add_expense(&session.owner, &submission).await?;
    Ok(HttpResponse::Created().json(created))
}

async fn update_expense<S: ExpenseStore>(
    session: Session,
    tracker: web::Data<ExpenseTracker<S>>,
    id: web::Path<String>,
    changes: web::Json<ExpenseChanges>,
) -> Result<HttpResponse, TrackerError> {
    info!("PUT /expenses/{} - {}", id, session.owner);
    let updated = tracker.update_record(&session.owner, &id, &changes).await?;
    Ok(HttpResponse::Ok().json(updated))
}

async fn delete_expense<S: ExpenseStore>(
    session: Session,
    tracker: web::Data<ExpenseTracker<S>>,
    id: web::Path<String>,
) -> Result<HttpResponse, TrackerError> {
    info!("DELETE /expenses/{} - {}", id, session.owner);
    let removed = tracker.delete_cohort(&session.owner, &id).await?;
    Ok(HttpResponse::Ok().json(removed))
}

async fn logout(session: Session, keys: web::Data<SessionKeys>) -> HttpResponse {
    keys.revoke(&session, Utc::now());
    HttpResponse::NoContent().finish()
}

pub fn configure<S: ExpenseStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/expenses")
            .route(web::get().to(list_expenses::<S>))
            .route(web::post().to(add_expense::<S>)),
    )
    .service(
        web::resource("/expenses/{id}")
            .route(web::put().to(update_expense::<S>))
            .route(web::delete().to(delete_expense::<S>)),
    )
    .service(web::resource("/session/logout").route(web::post().to(logout)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tracker::DeletedCohort;
    use actix_web::{http::header, http::StatusCode, test, App};
    use chrono::Duration;
    use serde_json::json;

    const SECRET: &str = "test secret";

    fn keys() -> web::Data<SessionKeys> {
        web::Data::new(SessionKeys::new(SECRET, Duration::hours(1)))
    }

    fn bearer(keys: &SessionKeys, owner: &str) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", keys.issue(owner, Utc::now())))
    }

    macro_rules! app {
        ($tracker:expr, $keys:expr) => {
            test::init_service(
                App::new()
                    .app_data($tracker.clone())
                    .app_data($keys.clone())
                    .configure(configure::<MemoryStore>),
            )
            .await
        };
    }

    fn tracker() -> web::Data<ExpenseTracker<MemoryStore>> {
        web::Data::new(ExpenseTracker::new(MemoryStore::new()))
    }

    #[actix_web::test]
    async fn requests_without_a_session_are_rejected() {
        let (tracker, keys) = (tracker(), keys());
        let app = app!(tracker, keys);

        let request = test::TestRequest::get().uri("/expenses?month=0&year=2025").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = test::TestRequest::get()
            .uri("/expenses")
            .insert_header((header::AUTHORIZATION, "Bearer ana.1.00"))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn created_installments_are_listed_by_month() {
        let (tracker, keys) = (tracker(), keys());
        let app = app!(tracker, keys);

        let request = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&keys, "ana"))
            .set_json(json!({ "amount": 300.0, "description": "Rent", "installments": 3, "month": 11, "year": 2024 }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Vec<Expense> = test::read_body_json(response).await;
        assert_eq!(created.len(), 3);

        let request = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&keys, "ana"))
            .set_json(json!({ "amount": 900.0, "description": "Laptop", "month": 0, "year": 2025 }))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CREATED);

        // December viewed from November, one month forward
        let request = test::TestRequest::get()
            .uri("/expenses?month=10&year=2024&shift=1")
            .insert_header(bearer(&keys, "ana"))
            .to_request();
        let listing: PeriodListing = test::call_and_read_body_json(&app, request).await;
        assert_eq!(listing.period, Period::new(11, 2024).unwrap());
        assert_eq!(listing.total, 100.0);

        let request = test::TestRequest::get()
            .uri("/expenses?month=0&year=2025&sort=value")
            .insert_header(bearer(&keys, "ana"))
            .to_request();
        let listing: PeriodListing = test::call_and_read_body_json(&app, request).await;
        assert_eq!(listing.total, 1000.0);
        let descriptions: Vec<&str> = listing.expenses.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Laptop - Parcela 1/1", "Rent - Parcela 2/3"]);
    }

    #[actix_web::test]
    async fn invalid_submissions_are_bad_requests() {
        let (tracker, keys) = (tracker(), keys());
        let app = app!(tracker, keys);

        let request = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&keys, "ana"))
            .set_json(json!({ "amount": 10.0, "description": "", "month": 0, "year": 2025 }))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

        let request = test::TestRequest::get()
            .uri("/expenses?month=12&year=2025")
            .insert_header(bearer(&keys, "ana"))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

        let request = test::TestRequest::get()
            .uri("/expenses?month=11&year=2147483647&shift=1")
            .insert_header(bearer(&keys, "ana"))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);

        let request = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&keys, "ana"))
            .set_json(json!({ "amount": 20.0, "description": "Rent", "installments": 2, "month": 11, "year": 2147483647 }))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::BAD_REQUEST);
        assert!(tracker.store().is_empty());
    }

    #[actix_web::test]
    async fn edit_and_delete_respect_ownership() {
        let (tracker, keys) = (tracker(), keys());
        let app = app!(tracker, keys);
        let submission = Submission {
            amount: 60.0,
            description: "Gym".to_string(),
            installments: 2,
            month: 5,
            year: 2025,
        };
        let created = tracker.add_expense("ana", &submission).await.unwrap();
        let uri = format!("/expenses/{}", created[0].id);

        let request = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&keys, "bruno"))
            .set_json(json!({ "amount": 1.0 }))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::FORBIDDEN);

        let request = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&keys, "ana"))
            .set_json(json!({ "description": "Academia" }))
            .to_request();
        let updated: Expense = test::call_and_read_body_json(&app, request).await;
        assert_eq!(updated.description, "Academia");
        assert_eq!(updated.amount, 30.0);

        let request = test::TestRequest::delete()
            .uri("/expenses/unknown")
            .insert_header(bearer(&keys, "ana"))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NOT_FOUND);

        let request = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&keys, "ana"))
            .to_request();
        let removed: DeletedCohort = test::call_and_read_body_json(&app, request).await;
        assert_eq!(removed.deleted, 2);
        assert!(tracker.store().is_empty());
    }

    #[actix_web::test]
    async fn store_outage_is_service_unavailable() {
        let (tracker, keys) = (tracker(), keys());
        let app = app!(tracker, keys);
        tracker.store().set_unavailable(true);

        let request = test::TestRequest::get()
            .uri("/expenses?month=0&year=2025")
            .insert_header(bearer(&keys, "ana"))
            .to_request();
        assert_eq!(
            test::call_service(&app, request).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[actix_web::test]
    async fn logout_ends_the_session() {
        let (tracker, keys) = (tracker(), keys());
        let app = app!(tracker, keys);
        let authorization = bearer(&keys, "ana");

        let request = test::TestRequest::post()
            .uri("/session/logout")
            .insert_header(authorization.clone())
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NO_CONTENT);

        let request = test::TestRequest::get()
            .uri("/expenses")
            .insert_header(authorization)
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::UNAUTHORIZED);
    }
}
