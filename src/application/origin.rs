//! Base origin resolution for the three runtime contexts.
//!
//! Sources are consulted in a fixed order and the first non-empty one wins.
//! Each entrypoint builds its own [`OriginSources`]; resolution itself is pure.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::{
    application::error::ConfigurationError,
    config::{EnvSnapshot, OriginSettings},
};

/// Candidate origins in precedence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginSources {
    pub explicit: Option<String>,
    pub self_reference: Option<String>,
    pub deploy_preview: Option<String>,
    pub platform: Option<String>,
    pub local_default: Option<String>,
}

impl OriginSources {
    /// Serverless function host: there is no local copy of the site to fall back to.
    pub fn function_host(env: &EnvSnapshot, settings: &OriginSettings) -> Self {
        Self {
            explicit: explicit_override(env, settings),
            self_reference: None,
            deploy_preview: env.deploy_prime_url.clone(),
            platform: env.url.clone(),
            local_default: None,
        }
    }

    /// Standalone server. When it serves its own production build from disk it
    /// prints itself rather than an external deployment.
    pub fn server(
        env: &EnvSnapshot,
        settings: &OriginSettings,
        listen_addr: SocketAddr,
        serves_build: bool,
    ) -> Self {
        Self {
            explicit: explicit_override(env, settings),
            self_reference: serves_build.then(|| loopback_origin(listen_addr)),
            deploy_preview: env.deploy_prime_url.clone(),
            platform: env.url.clone(),
            local_default: settings.local_default.clone(),
        }
    }

    /// Batch generator: the ephemeral static server is the only site that exists
    /// at build time, so deploy and platform URLs are ignored.
    pub fn batch(env: &EnvSnapshot, settings: &OriginSettings, server_addr: SocketAddr) -> Self {
        Self {
            explicit: explicit_override(env, settings),
            self_reference: Some(loopback_origin(server_addr)),
            deploy_preview: None,
            platform: None,
            local_default: None,
        }
    }
}

/// Return the first usable origin with trailing slashes stripped.
pub fn resolve_origin(sources: &OriginSources) -> Result<String, ConfigurationError> {
    [
        &sources.explicit,
        &sources.self_reference,
        &sources.deploy_preview,
        &sources.platform,
        &sources.local_default,
    ]
    .into_iter()
    .filter_map(|candidate| candidate.as_deref())
    .map(|candidate| candidate.trim().trim_end_matches('/'))
    .find(|candidate| !candidate.is_empty())
    .map(str::to_string)
    .ok_or(ConfigurationError::MissingOrigin)
}

/// `http://<addr>` with unspecified listen addresses mapped to loopback.
pub fn loopback_origin(addr: SocketAddr) -> String {
    let ip = if addr.ip().is_unspecified() {
        match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
        }
    } else {
        addr.ip()
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}

fn explicit_override(env: &EnvSnapshot, settings: &OriginSettings) -> Option<String> {
    settings
        .override_url
        .clone()
        .or_else(|| env.pdf_base_url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvSnapshot {
        EnvSnapshot {
            deploy_prime_url: Some("https://deploy-preview-7--insurfox.example.app".into()),
            url: Some("https://insurfox.example.app/".into()),
            ..EnvSnapshot::default()
        }
    }

    #[test]
    fn explicit_override_wins_and_loses_trailing_slash() {
        let settings = OriginSettings {
            override_url: Some("https://print.example.com//".into()),
            local_default: None,
        };
        let sources = OriginSources::function_host(&env(), &settings);
        assert_eq!(
            resolve_origin(&sources).as_deref(),
            Ok("https://print.example.com")
        );
    }

    #[test]
    fn function_host_prefers_deploy_preview_over_platform_url() {
        let sources = OriginSources::function_host(&env(), &OriginSettings::default());
        assert_eq!(
            resolve_origin(&sources).as_deref(),
            Ok("https://deploy-preview-7--insurfox.example.app")
        );

        let platform_only = EnvSnapshot {
            url: Some("https://insurfox.example.app/".into()),
            ..EnvSnapshot::default()
        };
        let sources = OriginSources::function_host(&platform_only, &OriginSettings::default());
        assert_eq!(
            resolve_origin(&sources).as_deref(),
            Ok("https://insurfox.example.app")
        );
    }

    #[test]
    fn function_host_without_sources_fails_fast() {
        let blank = EnvSnapshot {
            pdf_base_url: Some("   ".into()),
            ..EnvSnapshot::default()
        };
        let sources = OriginSources::function_host(&blank, &OriginSettings::default());
        assert_eq!(resolve_origin(&sources), Err(ConfigurationError::MissingOrigin));
    }

    #[test]
    fn server_serving_its_build_references_itself() {
        let addr: SocketAddr = "0.0.0.0:3000".parse().expect("addr");
        let sources = OriginSources::server(&env(), &OriginSettings::default(), addr, true);
        assert_eq!(resolve_origin(&sources).as_deref(), Ok("http://127.0.0.1:3000"));

        let dev = OriginSources::server(
            &EnvSnapshot::default(),
            &OriginSettings {
                override_url: None,
                local_default: Some("http://127.0.0.1:5173".into()),
            },
            addr,
            false,
        );
        assert_eq!(resolve_origin(&dev).as_deref(), Ok("http://127.0.0.1:5173"));
    }

    #[test]
    fn batch_ignores_deployment_urls() {
        let addr: SocketAddr = "127.0.0.1:4173".parse().expect("addr");
        let sources = OriginSources::batch(&env(), &OriginSettings::default(), addr);
        assert_eq!(resolve_origin(&sources).as_deref(), Ok("http://127.0.0.1:4173"));
    }
}
