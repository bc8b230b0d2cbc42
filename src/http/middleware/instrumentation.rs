//! Request instrumentation middleware.
//! Wraps every route, including the not-found fallback.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::http::request::{InFlightRequest, RequestContext};
use crate::http::response::UnhandledFault;
use crate::http::server::AppState;
use crate::observability::Fields;

pub async fn instrument_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let in_flight = InFlightRequest::begin(
        RequestContext::from_request(&request),
        state.metrics.clone(),
        state.logger.clone(),
    );

    let response = next.run(request).await;

    if let Some(fault) = response.extensions().get::<UnhandledFault>() {
        tracing::debug!(
            method = %in_flight.context().method,
            path = %in_flight.context().path,
            "Handler fault converted to 500"
        );
        state.logger.error(
            "internal_server_error",
            Fields::new()
                .with("error", &fault.message)
                .with("trace", &fault.trace),
        );
    }

    in_flight.complete(response.status());
    response
}
