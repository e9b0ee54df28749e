use anyhow::{Context, Error};
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Cross-origin policy for every route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Any origin, method and header, with credentials. Development only:
    /// switch to `AllowList` before exposing the service in production.
    AllowAll,
    AllowList(Vec<String>),
}

impl CorsPolicy {
    /// An empty list, or one containing `*`, means `AllowAll`.
    pub fn from_origins(origins: &[String]) -> Self {
        let origins: Vec<String> = origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            CorsPolicy::AllowAll
        } else {
            CorsPolicy::AllowList(origins)
        }
    }

    /// Wraps every route of `router` in this policy.
    ///
    /// `AllowAll` answers simple requests with a literal `*` and only echoes
    /// the caller's origin when the request carries a cookie or is a
    /// preflight, since browsers refuse `*` on credentialed requests.
    pub fn apply<S>(&self, router: Router<S>) -> Result<Router<S>, Error>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = router.layer(self.layer()?);
        Ok(match self {
            CorsPolicy::AllowAll => router.layer(middleware::from_fn(wildcard_unless_credentialed)),
            CorsPolicy::AllowList(_) => router,
        })
    }

    fn layer(&self) -> Result<CorsLayer, Error> {
        match self {
            CorsPolicy::AllowAll => Ok(CorsLayer::very_permissive()),
            CorsPolicy::AllowList(origins) => {
                let origins = origins
                    .iter()
                    .map(|origin| {
                        HeaderValue::from_str(origin)
                            .with_context(|| format!("invalid CORS origin {:?}", origin))
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(AllowMethods::mirror_request())
                    .allow_headers(AllowHeaders::mirror_request())
                    .allow_credentials(true))
            }
        }
    }
}

async fn wildcard_unless_credentialed(request: Request, next: Next) -> Response {
    let headers = request.headers();
    let echo_origin = headers.contains_key(header::COOKIE)
        || (request.method() == Method::OPTIONS
            && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD));

    let mut response = next.run(request).await;
    if !echo_origin {
        if let Some(origin) = response.headers_mut().get_mut(header::ACCESS_CONTROL_ALLOW_ORIGIN) {
            *origin = HeaderValue::from_static("*");
        }
    }
    response
}
