use std::{collections::HashMap, convert::Infallible, future::Future, net::SocketAddr};

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use warp::{
    http::{Method, StatusCode},
    path::FullPath,
    reply::{self, Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::{
    database::Database,
    query::{self, QueryOutcome, EMPTY_QUERY_MESSAGE},
    restaurant::Restaurant,
};

pub(crate) const NO_RESULTS_MESSAGE: &str = "There are no results.";
const INTERNAL_ERROR_MESSAGE: &str = "Internal error while searching for restaurants.";
const SERVICE_NAME: &str = "Restaurant Recommendation API";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Recommendation {
    Message(String),
    Restaurants(Vec<Restaurant>),
}

impl Recommendation {
    fn message(message: &str) -> Self {
        Recommendation::Message(message.to_string())
    }

    fn count(&self) -> usize {
        match self {
            Recommendation::Message(_) => 0,
            Recommendation::Restaurants(restaurants) => restaurants.len(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecommendationResponse {
    restaurant_recommendation: Recommendation,
}

pub(crate) fn routes(
    db: Database,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let rest = warp::path!("rest")
        .and(warp::get())
        .and(warp::method())
        .and(warp::path::full())
        .and(raw_query())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_db(db.clone()))
        .and_then(recommend);
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_db(db))
        .and_then(health);
    let info = warp::path::end().and(warp::get()).map(service_info);

    rest.or(health).or(info)
}

/// The undecoded query string, empty when the request has none.
fn raw_query() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

fn request_url(path: &str, raw_query: &str) -> String {
    if raw_query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{raw_query}")
    }
}

fn with_db(db: Database) -> impl Filter<Extract = (Database,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

/// Serves the API on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub(crate) async fn serve(
    db: Database,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let (bound, server) =
        warp::serve(routes(db)).try_bind_with_graceful_shutdown(addr, shutdown)?;
    info!("Listening on {bound}");
    server.await;
    Ok(())
}

async fn recommend(
    method: Method,
    path: FullPath,
    raw_query: String,
    params: HashMap<String, String>,
    db: Database,
) -> Result<WithStatus<Json>, Infallible> {
    let url = request_url(path.as_str(), &raw_query);
    info!(
        method = %method,
        url = %url,
        query_params = ?params,
        endpoint = "/rest",
        "Incoming request"
    );

    let query = params.get("query").map_or("", String::as_str);
    let outcome = if query.trim().is_empty() {
        QueryOutcome::Empty
    } else {
        query::process_query(query)
    };
    let filter = match outcome {
        QueryOutcome::Empty => {
            return Ok(respond(
                &method,
                &url,
                StatusCode::OK,
                "empty_query",
                Recommendation::message(EMPTY_QUERY_MESSAGE),
            ));
        }
        QueryOutcome::Rejected(message) => {
            return Ok(respond(
                &method,
                &url,
                StatusCode::OK,
                "parse_error",
                Recommendation::Message(message),
            ));
        }
        QueryOutcome::Parsed { parsed, filter } => {
            let filter_doc = serde_json::to_string(&filter).unwrap_or_default();
            info!(query = %parsed.raw, filter = %filter_doc, "Searching restaurants");
            filter
        }
    };

    let reply = match tokio::task::spawn_blocking(move || db.find(&filter)).await {
        Ok(Ok(found)) if found.is_empty() => respond(
            &method,
            &url,
            StatusCode::OK,
            "no_results",
            Recommendation::message(NO_RESULTS_MESSAGE),
        ),
        Ok(Ok(found)) => respond(
            &method,
            &url,
            StatusCode::OK,
            "success",
            Recommendation::Restaurants(found),
        ),
        Ok(Err(e)) => {
            error!("Request error: {e:#}");
            internal_error(&method, &url)
        }
        Err(e) => {
            error!("Request error: {e}");
            internal_error(&method, &url)
        }
    };
    Ok(reply)
}

fn internal_error(method: &Method, url: &str) -> WithStatus<Json> {
    respond(
        method,
        url,
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        Recommendation::message(INTERNAL_ERROR_MESSAGE),
    )
}

fn respond(
    method: &Method,
    url: &str,
    status: StatusCode,
    result_type: &str,
    recommendation: Recommendation,
) -> WithStatus<Json> {
    let response = RecommendationResponse {
        restaurant_recommendation: recommendation,
    };
    // A response that cannot be rendered for the log is logged without it.
    let result = serde_json::to_string(&response).unwrap_or_default();
    info!(
        method = %method,
        url = %url,
        status = status.as_u16(),
        result_type,
        result_count = response.restaurant_recommendation.count(),
        result = %result,
        "Request completed"
    );
    reply::with_status(reply::json(&response), status)
}

async fn health(db: Database) -> Result<WithStatus<Json>, Infallible> {
    let count = match tokio::task::spawn_blocking(move || db.count()).await {
        Ok(count) => count,
        Err(e) => Err(e.into()),
    };
    let reply = match count {
        Ok(count) => reply::with_status(
            reply::json(&json!({
                "status": "healthy",
                "database": "connected",
                "restaurant_count": count,
            })),
            StatusCode::OK,
        ),
        Err(e) => {
            error!("Health check failed: {e:#}");
            reply::with_status(
                reply::json(&json!({
                    "status": "unhealthy",
                    "database": "disconnected",
                    "error": e.to_string(),
                })),
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    };
    Ok(reply)
}

fn service_info() -> Json {
    reply::json(&json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "endpoints": {
            "GET /rest?query=...": "Get restaurant recommendations",
            "GET /health": "Health check",
        },
        "query_rules": {
            "vegetarian": "If 'vegetarian' in query: vegetarian only, else: non-vegetarian only",
            "style": "First match wins: italian, asian, steakhouse, mediterranean",
            "time": "between X and Y, opens at X, closes at X, or current time (default)",
            "midnight_crossing": "Not supported (e.g. 22:00-02:00 returns an error)",
        },
        "examples": [
            "/rest?query=vegetarian italian restaurant",
            "/rest?query=asian restaurant between 10:00 and 18:30",
            "/rest?query=steakhouse closes at 23:00",
        ],
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use warp::http::StatusCode;

    use super::*;
    use crate::database::TestDatabase;

    fn restaurant(name: &str, style: &str, vegetarian: &str, open: &str, close: &str) -> Restaurant {
        Restaurant {
            name: name.to_string(),
            style: style.to_string(),
            address: format!("{name} square"),
            vegetarian: vegetarian.to_string(),
            open_hour: open.to_string(),
            close_hour: close.to_string(),
        }
    }

    fn seeded() -> TestDatabase {
        let test = TestDatabase::new();
        for r in [
            restaurant("Verde", "Italian", "yes", "00:00", "23:59"),
            restaurant("Roma", "Italian", "no", "00:00", "23:59"),
            restaurant("Lotus", "Asian", "no", "09:00", "20:00"),
            restaurant("Bamboo", "Asian", "no", "11:00", "22:00"),
            restaurant("Grill", "Steakhouse", "no", "17:00", "23:30"),
            restaurant("Late Grill", "Steakhouse", "no", "12:00", "22:00"),
        ] {
            test.db.insert_restaurant(&r).unwrap();
        }
        test
    }

    async fn get(db: &Database, path: &str) -> (StatusCode, Value) {
        let res = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&routes(db.clone()))
            .await;
        let body = serde_json::from_slice(res.body()).unwrap();
        (res.status(), body)
    }

    fn names(body: &Value) -> Vec<&str> {
        body["restaurantRecommendation"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn empty_query() {
        let test = seeded();
        for path in ["/rest", "/rest?query=", "/rest?query=+++"] {
            let (status, body) = get(&test.db, path).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"restaurantRecommendation": "query is empty"}));
        }
    }

    #[tokio::test]
    async fn vegetarian_italian_now() {
        let test = seeded();
        let (status, body) = get(&test.db, "/rest?query=vegetarian+italian+restaurant").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body), vec!["Verde"]);
    }

    #[tokio::test]
    async fn asian_between() {
        let test = seeded();
        let (_, body) = get(
            &test.db,
            "/rest?query=asian+restaurant+between+10:00+and+18:30",
        )
        .await;
        assert_eq!(names(&body), vec!["Lotus"]);

        let record = &body["restaurantRecommendation"][0];
        assert_eq!(
            record,
            &json!({
                "name": "Lotus",
                "style": "Asian",
                "address": "Lotus square",
                "vegetarian": "no",
                "openHour": "09:00",
                "closeHour": "20:00",
            })
        );
    }

    #[tokio::test]
    async fn midnight_crossing() {
        let test = seeded();
        let (status, body) = get(&test.db, "/rest?query=restaurant+between+22:00+and+02:00").await;
        assert_eq!(status, StatusCode::OK);
        let message = body["restaurantRecommendation"].as_str().unwrap();
        assert!(message.contains("midnight"));
    }

    #[tokio::test]
    async fn steakhouse_closes_at() {
        let test = seeded();
        let (_, body) = get(&test.db, "/rest?query=steakhouse+closes+at+23:00").await;
        assert_eq!(names(&body), vec!["Grill"]);
    }

    #[tokio::test]
    async fn no_results() {
        let test = seeded();
        let (status, body) = get(&test.db, "/rest?query=mediterranean+opens+at+0800").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"restaurantRecommendation": "There are no results."})
        );
    }

    #[tokio::test]
    async fn store_failure_is_an_internal_error() {
        let test = seeded();
        test.insert_raw(b"broken", &[0xff; 3]);

        let (status, body) = get(&test.db, "/rest?query=italian").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"restaurantRecommendation": "Internal error while searching for restaurants."})
        );
    }

    #[test]
    fn logged_url_keeps_query_string() {
        assert_eq!(request_url("/rest", ""), "/rest");
        assert_eq!(
            request_url("/rest", "query=asian+between+10:00+and+18:30"),
            "/rest?query=asian+between+10:00+and+18:30"
        );
    }

    #[tokio::test]
    async fn raw_query_is_optional() {
        let filter = raw_query();
        let raw = warp::test::request()
            .path("/rest?query=italian")
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(raw, "query=italian");
        let raw = warp::test::request()
            .path("/rest")
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(raw, "");
    }

    #[tokio::test]
    async fn health_reports_count() {
        let test = seeded();
        let (status, body) = get(&test.db, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "healthy", "database": "connected", "restaurant_count": 6})
        );
    }

    #[tokio::test]
    async fn service_metadata() {
        let test = TestDatabase::new();
        let (status, body) = get(&test.db, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "Restaurant Recommendation API");
        assert_eq!(body["version"], SERVICE_VERSION);
        assert!(body["endpoints"]
            .as_object()
            .unwrap()
            .contains_key("GET /rest?query=..."));
        assert_eq!(body["examples"].as_array().unwrap().len(), 3);
    }
}
