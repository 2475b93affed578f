fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-max-age"),
        HeaderValue::from_static("3600"),
    );
}

fn clamp_page_size(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_NOTIFICATION_PAGE)
        .max(1)
        .min(MAX_NOTIFICATION_PAGE)
}

fn parse_kind_filter(kind: Option<&str>) -> Result<Option<EventType>, HttpApiError> {
    match kind {
        None => Ok(None),
        Some(raw) => {
            let normalized = raw.trim().to_lowercase();
            EventType::from_name(&normalized).map(Some).ok_or_else(|| {
                HttpApiError::invalid_query(
                    "invalid notification kind filter",
                    Some(format!("kind={raw}")),
                )
            })
        }
    }
}
