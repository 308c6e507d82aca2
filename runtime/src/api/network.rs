//! `Network` module: HTTP requests filtered by the device's network policy.

use std::time::Duration;

use rhai::{Blob, Dynamic, EvalAltResult, FnPtr, ImmutableString, Map, Module, INT};
use vdev_net::{HttpRequest, HttpResponse, Method, PolicyClient};

use super::{BindContext, CapabilityApi};
use crate::tasks::TaskWork;

pub struct NetworkApi {
    client: PolicyClient,
}

impl NetworkApi {
    pub fn new(client: PolicyClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PolicyClient {
        &self.client
    }
}

/// `#{statusCode, headers, body, bytes}`
pub fn response_to_map(response: HttpResponse) -> Map {
    let headers: Map = response
        .headers
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect();

    let mut map = Map::new();
    map.insert("statusCode".into(), INT::from(response.status).into());
    map.insert("headers".into(), Dynamic::from(headers));
    map.insert(
        "body".into(),
        String::from_utf8_lossy(&response.body).into_owned().into(),
    );
    map.insert("bytes".into(), Dynamic::from_blob(response.body));
    map
}

fn build_request(
    url: &str,
    method: &str,
    headers: Map,
    body: Option<Vec<u8>>,
) -> Result<HttpRequest, Box<EvalAltResult>> {
    let method =
        Method::parse(method).ok_or_else(|| format!("unsupported HTTP method '{method}'"))?;
    let mut request = HttpRequest::new(method, url);
    for (name, value) in headers {
        let value = match value.into_immutable_string() {
            Ok(s) => s.to_string(),
            Err(type_name) => {
                return Err(format!("header '{name}' must be a string, got {type_name}").into())
            }
        };
        request.headers.insert(name.to_string(), value);
    }
    request.body = body;
    Ok(request)
}

fn send(client: &PolicyClient, request: &HttpRequest) -> Result<Map, Box<EvalAltResult>> {
    client
        .execute(request)
        .map(response_to_map)
        .map_err(|e| e.to_string().into())
}

fn body_bytes(body: Dynamic) -> Result<Option<Vec<u8>>, Box<EvalAltResult>> {
    if body.is_unit() {
        Ok(None)
    } else if body.is_blob() {
        Ok(Some(body.cast::<Blob>()))
    } else if body.is_string() {
        Ok(body.into_string().ok().map(String::into_bytes))
    } else {
        Err(format!("request body must be a string or blob, got {}", body.type_name()).into())
    }
}

impl CapabilityApi for NetworkApi {
    fn bind(&self, ctx: &BindContext) -> Module {
        let mut module = Module::new();

        let client = self.client.clone();
        module.set_native_fn(
            "request_http",
            move |url: ImmutableString, method: ImmutableString| -> Result<Map, Box<EvalAltResult>> {
                send(&client, &build_request(&url, &method, Map::new(), None)?)
            },
        );

        let client = self.client.clone();
        module.set_native_fn(
            "request_http",
            move |url: ImmutableString,
                  method: ImmutableString,
                  headers: Map|
                  -> Result<Map, Box<EvalAltResult>> {
                send(&client, &build_request(&url, &method, headers, None)?)
            },
        );

        let client = self.client.clone();
        module.set_native_fn(
            "request_http",
            move |url: ImmutableString,
                  method: ImmutableString,
                  headers: Map,
                  body: Dynamic|
                  -> Result<Map, Box<EvalAltResult>> {
                let request = build_request(&url, &method, headers, body_bytes(body)?)?;
                send(&client, &request)
            },
        );

        let client = self.client.clone();
        let tasks = ctx.tasks.clone();
        module.set_native_fn(
            "request_http_async",
            move |url: ImmutableString,
                  method: ImmutableString,
                  headers: Map,
                  body: Dynamic,
                  callback: FnPtr|
                  -> Result<INT, Box<EvalAltResult>> {
                let request = build_request(&url, &method, headers, body_bytes(body)?)?;
                let client = client.clone();
                let work: TaskWork = Box::new(move || match client.execute(&request) {
                    Ok(response) => Dynamic::from(response_to_map(response)),
                    Err(e) => {
                        let mut map = Map::new();
                        map.insert("error".into(), e.to_string().into());
                        Dynamic::from(map)
                    }
                });
                Ok(tasks.schedule(callback, Duration::ZERO, Some(work)) as INT)
            },
        );

        let client = self.client.clone();
        module.set_native_fn(
            "is_allowed",
            move |url: ImmutableString| -> Result<bool, Box<EvalAltResult>> {
                Ok(client.is_allowed(&url))
            },
        );

        module
    }
}
