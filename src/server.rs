// src/server.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{convert::Infallible, sync::Arc};
use tracing::{info, warn};
use warp::{
    filters::body::BodyDeserializeError, http::StatusCode, reject::Rejection, reply::Reply,
    Filter,
};

use crate::{
    catalog,
    render::render,
    session::{Phase, SessionStore, ViewState},
    table::YearRange,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitRequest {
    /// Indicator code or full label.
    pub indicator: String,
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Serialize)]
struct FigureResponse {
    figure: Value,
    indicator: &'static str,
    start: i32,
    end: i32,
    submit_count: String,
    last_fetched: String,
    phase: Phase,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    submit_count: String,
    last_fetched: String,
    phase: Phase,
}

#[derive(Debug, Serialize)]
struct IndicatorOption {
    code: &'static str,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct OptionsResponse {
    indicators: Vec<IndicatorOption>,
    selected: &'static str,
    start: i32,
    end: i32,
    slider_min: i32,
    slider_max: i32,
    marks: Vec<(i32, String)>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    details: Option<String>,
}

const INDEX_HTML: &str = include_str!("index.html");

/// Slider tick labels: full years at the ends, `'YY` in between.
pub fn year_marks(min: i32, max: i32) -> Vec<(i32, String)> {
    (min..=max)
        .map(|y| {
            let label = if y == min || y == max {
                y.to_string()
            } else {
                format!("'{:02}", y.rem_euclid(100))
            };
            (y, label)
        })
        .collect()
}

fn with_store(
    store: Arc<SessionStore>,
) -> impl Filter<Extract = (Arc<SessionStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn bad_request(error: &str, details: impl Into<Option<String>>) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: error.to_string(),
            details: details.into(),
        }),
        StatusCode::BAD_REQUEST,
    )
}

fn figure_response(store: &SessionStore, view: &ViewState) -> FigureResponse {
    let table = store.table();
    let figure = render(&table, &view.indicator, view.years);
    FigureResponse {
        figure: figure.to_plotly(),
        indicator: view.indicator.label,
        start: view.years.start(),
        end: view.years.end(),
        submit_count: view.submit_count_text(),
        last_fetched: view.last_fetched_text(),
        phase: store.phase(),
    }
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "wbdash"
    })))
}

async fn options(store: Arc<SessionStore>) -> Result<impl Reply, Rejection> {
    let view = store.view().await;
    let slider_min = store.slider_min();
    Ok(warp::reply::json(&OptionsResponse {
        indicators: catalog::all()
            .iter()
            .map(|i| IndicatorOption {
                code: i.code,
                label: i.label,
            })
            .collect(),
        selected: view.indicator.label,
        start: view.years.start(),
        end: view.years.end(),
        slider_min,
        slider_max: view.slider_max,
        marks: year_marks(slider_min, view.slider_max),
    }))
}

async fn figure(store: Arc<SessionStore>) -> Result<impl Reply, Rejection> {
    let view = store.view().await;
    Ok(warp::reply::json(&figure_response(&store, &view)))
}

async fn status(store: Arc<SessionStore>) -> Result<impl Reply, Rejection> {
    let view = store.view().await;
    Ok(warp::reply::json(&StatusResponse {
        submit_count: view.submit_count_text(),
        last_fetched: view.last_fetched_text(),
        phase: store.phase(),
    }))
}

async fn submit(req: SubmitRequest, store: Arc<SessionStore>) -> Result<impl Reply, Rejection> {
    let Some(indicator) = catalog::lookup(&req.indicator) else {
        warn!(indicator = %req.indicator, "unknown indicator");
        return Ok(bad_request("unknown indicator", req.indicator));
    };
    let years = match YearRange::new(req.start, req.end) {
        Ok(y) => y,
        Err(e) => return Ok(bad_request("invalid year range", e.to_string())),
    };
    let slider_max = store.view().await.slider_max;
    if years.start() < store.slider_min() || years.end() > slider_max {
        return Ok(bad_request(
            "year range outside slider",
            format!("{}..={}", store.slider_min(), slider_max),
        ));
    }

    let view = store.submit(indicator, years).await;
    Ok(warp::reply::with_status(
        warp::reply::json(&figure_response(&store, &view)),
        StatusCode::OK,
    ))
}

/// Turn rejections into `ErrorResponse` bodies so every failure is JSON.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, error, details) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found", None)
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            "invalid request body",
            Some(e.to_string()),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported media type",
            None,
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed", None)
    } else {
        warn!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error",
            Some(format!("{:?}", err)),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: error.to_string(),
            details,
        }),
        status,
    ))
}

/// All dashboard routes.
pub fn routes(
    store: Arc<SessionStore>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let health = warp::path!("health")
        .and(warp::get())
        .and_then(health_check);

    let options_route = warp::path!("api" / "options")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(options);

    let figure_route = warp::path!("api" / "figure")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(figure);

    let status_route = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(status);

    let submit_route = warp::path!("api" / "submit")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_store(store))
        .and_then(submit);

    index
        .or(health)
        .or(options_route)
        .or(figure_route)
        .or(status_route)
        .or(submit_route)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

/// Serve until the process is stopped.
pub async fn serve(store: Arc<SessionStore>, addr: std::net::SocketAddr) {
    info!("Server starting on http://{}", addr);
    warp::serve(routes(store)).run(addr).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::INDICATORS,
        table::{Observation, ObservationTable},
    };
    use serde_json::json;

    fn store_with_chad() -> Arc<SessionStore> {
        let (store, writer) = SessionStore::new(2005, 2016);
        let rows = vec![
            Observation {
                region_code: "TCD".into(),
                country: "Chad".into(),
                year: 2005,
                values: vec![Some(10.0)],
            },
            Observation {
                region_code: "TCD".into(),
                country: "Chad".into(),
                year: 2006,
                values: vec![Some(20.0)],
            },
        ];
        writer.replace(ObservationTable::new(vec![INDICATORS[0]], rows).unwrap());
        Arc::new(store)
    }

    fn body<B: AsRef<[u8]>>(res: &warp::http::Response<B>) -> Value {
        serde_json::from_slice(res.body().as_ref()).unwrap()
    }

    #[test]
    fn marks_shorten_inner_years() {
        let marks = year_marks(2005, 2008);
        assert_eq!(
            marks,
            vec![
                (2005, "2005".to_string()),
                (2006, "'06".to_string()),
                (2007, "'07".to_string()),
                (2008, "2008".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_health_check() {
        let res = warp::test::request()
            .path("/health")
            .reply(&routes(store_with_chad()))
            .await;
        assert_eq!(res.status(), 200);
        assert_eq!(body(&res)["status"], "healthy");
    }

    #[tokio::test]
    async fn figure_uses_default_selection() {
        let res = warp::test::request()
            .path("/api/figure")
            .reply(&routes(store_with_chad()))
            .await;
        assert_eq!(res.status(), 200);
        let v = body(&res);
        assert_eq!(v["figure"]["data"][0]["z"][0], 15.0);
        assert_eq!(v["submit_count"], "Submit Count: 0");
        assert_eq!(v["last_fetched"], "Data Last Fetched: None");
        assert_eq!(v["phase"], "Fetched");
    }

    #[tokio::test]
    async fn submit_applies_selection_and_counts() {
        let store = store_with_chad();
        let api = routes(store.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/submit")
            .json(&json!({"indicator": INDICATORS[0].label, "start": 2005, "end": 2005}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);
        let v = body(&res);
        assert_eq!(v["figure"]["data"][0]["z"][0], 10.0);
        assert_eq!(v["submit_count"], "Submit Count: 1");
        assert_ne!(v["last_fetched"], "Data Last Fetched: None");

        let res = warp::test::request()
            .path("/api/status")
            .reply(&api)
            .await;
        assert_eq!(body(&res)["submit_count"], "Submit Count: 1");

        let res = warp::test::request()
            .path("/api/options")
            .reply(&api)
            .await;
        let v = body(&res);
        assert_eq!(v["slider_max"], 2017);
        assert_eq!(v["start"], 2005);
        assert_eq!(v["end"], 2005);
    }

    #[tokio::test]
    async fn submit_rejects_bad_input() {
        let store = store_with_chad();
        let api = routes(store.clone());

        for payload in [
            json!({"indicator": "NOPE", "start": 2005, "end": 2006}),
            json!({"indicator": INDICATORS[0].code, "start": 2010, "end": 2005}),
            json!({"indicator": INDICATORS[0].code, "start": 1990, "end": 2005}),
            json!({"indicator": INDICATORS[0].code, "start": null, "end": 2006}),
            json!({"indicator": INDICATORS[0].code, "start": "2005", "end": 2006}),
            json!({"start": 2005, "end": 2006}),
        ] {
            let res = warp::test::request()
                .method("POST")
                .path("/api/submit")
                .json(&payload)
                .reply(&api)
                .await;
            assert_eq!(res.status(), 400);
            assert!(body(&res)["error"].is_string());
        }
        assert_eq!(store.view().await.submit_count, 0);
    }

    #[tokio::test]
    async fn undecodable_body_is_a_json_error() {
        let res = warp::test::request()
            .method("POST")
            .path("/api/submit")
            .header("content-type", "application/json")
            .body(r#"{"indicator":"IT.NET.USER.ZS","start":null,"end":2006}"#)
            .reply(&routes(store_with_chad()))
            .await;
        assert_eq!(res.status(), 400);
        let v = body(&res);
        assert_eq!(v["error"], "invalid request body");
        assert!(v["details"].as_str().unwrap().contains("null"));
    }

    #[tokio::test]
    async fn unknown_path_is_a_json_404() {
        let res = warp::test::request()
            .path("/api/nothing")
            .reply(&routes(store_with_chad()))
            .await;
        assert_eq!(res.status(), 404);
        assert_eq!(body(&res)["error"], "not found");
    }

    #[tokio::test]
    async fn idle_session_renders_empty_map() {
        let (store, _writer) = SessionStore::new(2005, 2016);
        let res = warp::test::request()
            .path("/api/figure")
            .reply(&routes(Arc::new(store)))
            .await;
        let v = body(&res);
        assert_eq!(v["phase"], "Idle");
        assert_eq!(v["figure"]["data"][0]["locations"], json!([]));
    }

    #[tokio::test]
    async fn index_serves_html() {
        let res = warp::test::request()
            .path("/")
            .reply(&routes(store_with_chad()))
            .await;
        assert_eq!(res.status(), 200);
        assert!(std::str::from_utf8(res.body().as_ref()).unwrap().contains("wb-choropleth"));
    }
}
