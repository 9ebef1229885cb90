//! Shared validation helpers.

use std::net::IpAddr;

/// Push an error if `value` is outside `[min, max]`.
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error unless `value` names a loopback interface. Empty values
/// are left to [`validate_non_empty`].
pub(crate) fn validate_loopback(errors: &mut Vec<String>, name: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("localhost") {
        return;
    }
    match value.parse::<IpAddr>() {
        Ok(addr) if addr.is_loopback() => {}
        _ => errors.push(format!("{name} = {value} is not a loopback address")),
    }
}

/// Push an error if `value` is empty or whitespace.
pub(crate) fn validate_non_empty(errors: &mut Vec<String>, name: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(format!("{name} must not be empty"));
    }
}
