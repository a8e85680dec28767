//! A json-server stand-in with a Nominatim-style `/search` endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Value};

use reportavias::models::value_id;

/// One request received by `/search`.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub user_agent: Option<String>,
    pub params: HashMap<String, String>,
}

#[derive(Default)]
pub struct MockState {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    searches: Mutex<Vec<SearchRequest>>,
}

impl MockState {
    pub fn seed(&self, collection: &str, values: Vec<Value>) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.to_string(), values);
    }

    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.searches.lock().unwrap().clone()
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: ServerHandle,
}

impl MockServer {
    /// Binds an ephemeral port and serves on the current actix runtime.
    pub fn start() -> Self {
        let state = Arc::new(MockState::default());
        let data = web::Data::from(Arc::clone(&state));
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/search", web::get().to(search))
                .route("/{collection}", web::get().to(list_records))
                .route("/{collection}", web::post().to(create_record))
                .route("/{collection}/{id}", web::get().to(get_record))
                .route("/{collection}/{id}", web::patch().to(patch_record))
                .route("/{collection}/{id}", web::delete().to(delete_record))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock server");
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn list_records(state: web::Data<MockState>, path: web::Path<String>) -> HttpResponse {
    HttpResponse::Ok().json(state.records(&path))
}

async fn get_record(state: web::Data<MockState>, path: web::Path<(String, String)>) -> HttpResponse {
    let (collection, id) = path.into_inner();
    match state
        .records(&collection)
        .into_iter()
        .find(|value| value_id(value).as_deref() == Some(id.as_str()))
    {
        Some(record) => HttpResponse::Ok().json(record),
        None => HttpResponse::NotFound().json(json!({})),
    }
}

async fn create_record(
    state: web::Data<MockState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    let mut record = body.into_inner();
    let mut collections = state.collections.lock().unwrap();
    let records = collections.entry(path.into_inner()).or_default();
    if value_id(&record).is_none() {
        record["id"] = json!(records.len() + 1);
    }
    records.push(record.clone());
    HttpResponse::Created().json(record)
}

async fn patch_record(
    state: web::Data<MockState>,
    path: web::Path<(String, String)>,
    body: web::Json<Value>,
) -> HttpResponse {
    let (collection, id) = path.into_inner();
    let mut collections = state.collections.lock().unwrap();
    let Some(record) = collections
        .entry(collection)
        .or_default()
        .iter_mut()
        .find(|value| value_id(value).as_deref() == Some(id.as_str()))
    else {
        return HttpResponse::NotFound().json(json!({}));
    };
    if let (Some(target), Some(fields)) = (record.as_object_mut(), body.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    HttpResponse::Ok().json(record.clone())
}

async fn delete_record(state: web::Data<MockState>, path: web::Path<(String, String)>) -> HttpResponse {
    let (collection, id) = path.into_inner();
    let mut collections = state.collections.lock().unwrap();
    let records = collections.entry(collection).or_default();
    let before = records.len();
    records.retain(|value| value_id(value).as_deref() != Some(id.as_str()));
    if records.len() == before {
        HttpResponse::NotFound().json(json!({}))
    } else {
        HttpResponse::Ok().json(json!({}))
    }
}

/// Knows two places: San José and Monrovia (outside Costa Rica).
/// Queries mentioning "averia" fail with a 500.
async fn search(
    state: web::Data<MockState>,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    let params = query.into_inner();
    state.searches.lock().unwrap().push(SearchRequest {
        user_agent: req
            .headers()
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        params: params.clone(),
    });

    let q = params.get("q").cloned().unwrap_or_default().to_lowercase();
    if q.contains("averia") {
        return HttpResponse::InternalServerError().body("search backend unavailable");
    }
    let places = if q.contains("san josé") || q.contains("san jose") {
        json!([
            {"lat": "9.9325427", "lon": "-84.0795782", "display_name": "San José, Costa Rica"},
            {"lat": "9.9000000", "lon": "-84.1000000", "display_name": "San José, Alajuela, Costa Rica"}
        ])
    } else if q.contains("monrovia") {
        json!([{"lat": "6.3005", "lon": "-10.7969", "display_name": "Monrovia, Liberia"}])
    } else {
        json!([])
    };
    HttpResponse::Ok().json(places)
}
