use serde_json::Value;
use steve_core::{HttpRequest, HttpResponse, Method, SteveError, SteveResult};
use url::Url;

/// Executes fully resolved requests. Any status is a successful exchange;
/// only transport failures are errors.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: HttpRequest) -> SteveResult<HttpResponse>;
}

/// Resolve `url` against `base`. Absolute URLs pass through; relative ones are
/// joined onto the base as a directory, so `../` walks up from it. Plain-http
/// localhost is upgraded to https.
pub fn resolve_url(base: &str, url: &str) -> SteveResult<String> {
    let mut out = if url.starts_with("http://") || url.starts_with("https://") {
        Url::parse(url).map_err(|e| SteveError::Validation(format!("bad url {}: {}", url, e)))?
    } else {
        let dir = if base.ends_with('/') { base.to_string() } else { format!("{}/", base) };
        let base = Url::parse(&dir).map_err(|e| SteveError::Validation(format!("bad base url {}: {}", base, e)))?;
        base.join(url).map_err(|e| SteveError::Validation(format!("bad url {}: {}", url, e)))?
    };
    if out.scheme() == "http" && out.host_str() == Some("localhost") {
        let _ = out.set_scheme("https");
    }
    Ok(out.to_string())
}

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new() -> SteveResult<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| SteveError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self { Self { client } }
}

fn reqwest_method(m: Method) -> reqwest::Method {
    match m {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttp {
    async fn execute(&self, req: HttpRequest) -> SteveResult<HttpResponse> {
        let mut rb = self.client.request(reqwest_method(req.method), req.url.as_str());
        for (k, v) in &req.headers {
            rb = rb.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &req.body {
            rb = rb.json(body);
        }
        let resp = rb.send().await.map_err(|e| SteveError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| SteveError::Transport(e.to_string()))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text))
        };
        Ok(HttpResponse::new(status, body))
    }
}
