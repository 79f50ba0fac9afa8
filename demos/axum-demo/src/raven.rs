use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use ravenwire_axum::RavenState;
use ravenwire_core::{
    AttributeError, AttributeResolvers, HostsFactories, RavenConfig, RequestSource, Settings,
};
use serde_json::{Value, json};

/// Name of the hosts factory listing the `X-Forwarded-Host` values
pub const FORWARDED_HOSTS_FACTORY: &str = "axum_demo.forwarded_hosts";

const FORWARDED_HOST: &str = "x-forwarded-host";
const COUNTRY: &str = "x-country";

pub(crate) fn raven_state(settings: &Settings) -> RavenState {
    let config = RavenConfig::from_settings(settings);
    let hosts_factories = HostsFactories::new().with(FORWARDED_HOSTS_FACTORY, forwarded_hosts);
    let resolvers = AttributeResolvers::new()
        .with_property("user_agent", user_agent)
        .with_method("geoip", geoip);

    RavenState::builder(config)
        .with_hosts_factories(hosts_factories)
        .with_resolvers(resolvers)
        .build()
}

fn forwarded_hosts(request: &dyn RequestSource) -> Vec<String> {
    request
        .headers()
        .into_iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(FORWARDED_HOST))
        .flat_map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn user_agent(parts: &Parts) -> Option<Value> {
    let agent = parts.headers.get(USER_AGENT)?.to_str().ok()?;
    Some(json!(agent))
}

// the country is set by the edge proxy
fn geoip(parts: &Parts) -> Result<Value, AttributeError> {
    let Some(country) = parts.headers.get(COUNTRY) else {
        return Ok(Value::Null);
    };
    let country = country
        .to_str()
        .map_err(|err| AttributeError::failed("geoip", err.to_string()))?;

    Ok(json!({ "country_code": country }))
}
