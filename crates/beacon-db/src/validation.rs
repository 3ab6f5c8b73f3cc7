//! Validation rules for Check and Schedule definitions.
//!
//! Kept as plain functions returning `SchedulerError::Validation` so the
//! accept/reject decision is a pure function of the inputs — this is what
//! property-style tests exercise this against generated `(type, target,
//! interval, timeout)` tuples.

use beacon_schemas::{CheckType, NewCheck, SchedulerError, SchedulerResult};

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"];

pub fn validate_new_check(tenant_id: &str, def: &NewCheck) -> SchedulerResult<()> {
    if tenant_id.trim().is_empty() {
        return Err(SchedulerError::validation("tenant_id must not be empty"));
    }
    if def.name.trim().is_empty() {
        return Err(SchedulerError::validation("name must not be empty"));
    }
    if def.target.trim().is_empty() {
        return Err(SchedulerError::validation("target must not be empty"));
    }
    if !(5..=86_400).contains(&def.interval_seconds) {
        return Err(SchedulerError::validation(
            "interval must be between 5 seconds and 24 hours",
        ));
    }
    if !(1..=300).contains(&def.timeout_seconds) {
        return Err(SchedulerError::validation(
            "timeout must be between 1 and 300 seconds",
        ));
    }

    validate_type_specific(def)
}

fn validate_type_specific(def: &NewCheck) -> SchedulerResult<()> {
    match def.r#type {
        CheckType::Http | CheckType::Https => {
            if let Some(method) = def.config.string("method") {
                if !HTTP_METHODS.contains(&method.to_uppercase().as_str()) {
                    return Err(SchedulerError::validation(format!(
                        "http method must be one of {HTTP_METHODS:?}, got {method}"
                    )));
                }
            }
            if let Some(status) = def.config.int("expected_status") {
                if !(100..=599).contains(&status) {
                    return Err(SchedulerError::validation(
                        "expected_status must be between 100 and 599",
                    ));
                }
            }
            validate_url_like(&def.target)
        }
        CheckType::Graphql => {
            if let Some(query) = def.config.string("query") {
                if query.trim().is_empty() {
                    return Err(SchedulerError::validation(
                        "graphql query must not be empty when present",
                    ));
                }
            }
            validate_url_like(&def.target)
        }
        CheckType::Grpc => {
            if let Some(service) = def.config.string("service") {
                if service.trim().is_empty() {
                    return Err(SchedulerError::validation(
                        "grpc service must not be empty when present",
                    ));
                }
            }
            if let Some(method) = def.config.string("method") {
                if method.trim().is_empty() {
                    return Err(SchedulerError::validation(
                        "grpc method must not be empty when present",
                    ));
                }
            }
            validate_host_port(&def.target)
        }
        CheckType::Tcp => {
            if let Some(port) = def.config.int("port") {
                if !(1..=65_535).contains(&port) {
                    return Err(SchedulerError::validation(
                        "tcp config port must be between 1 and 65535",
                    ));
                }
            }
            validate_host_port(&def.target)
        }
    }
}

fn validate_url_like(target: &str) -> SchedulerResult<()> {
    if target.starts_with("http://") || target.starts_with("https://") {
        Ok(())
    } else {
        Err(SchedulerError::validation(
            "target must be a URL for http/https/graphql checks",
        ))
    }
}

fn validate_host_port(target: &str) -> SchedulerResult<()> {
    let Some((host, port)) = target.rsplit_once(':') else {
        return Err(SchedulerError::validation(
            "target must be host:port for grpc/tcp checks",
        ));
    };
    if host.trim().is_empty() {
        return Err(SchedulerError::validation("target host must not be empty"));
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(SchedulerError::validation(
            "target port must be a valid port number",
        )),
    }
}

pub fn validate_cron_expression(expr: &str) -> SchedulerResult<()> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(SchedulerError::validation(
            "cron_expression must have exactly 5 space-separated fields",
        ));
    }
    // `cron` crate parses 6 or 7 field expressions (with seconds); prefix a
    // synthetic seconds field so a 5-field Vixie expression parses under it.
    let with_seconds = format!("0 {expr}");
    cron::Schedule::from_str(&with_seconds)
        .map_err(|e| SchedulerError::validation(format!("invalid cron_expression: {e}")))?;
    Ok(())
}

use std::str::FromStr;
