use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default delay between two probes of the authorization window.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A static query parameter appended to every authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

/// Parameter names used to read fields back off the redirect URL.
///
/// Providers disagree on spellings; the defaults follow RFC 6749.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParams {
    pub error_code: String,
    pub error_description: String,
    pub auth_code: String,
    pub returned_state: String,
    pub expires_in: String,
}

impl Default for ResponseParams {
    fn default() -> Self {
        Self {
            error_code: "error".into(),
            error_description: "error_description".into(),
            auth_code: "code".into(),
            returned_state: "state".into(),
            expires_in: "expires_in".into(),
        }
    }
}

/// Static description of one provider integration, fixed before any flow starts.
///
/// All values are assembled into request URLs verbatim. No percent-encoding is
/// applied anywhere, so values containing `&`, `=` or `#` will corrupt the
/// query string; callers that need reserved characters must encode them first.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Provider page that starts the authorization grant.
    pub authorize_endpoint: String,
    /// Provider page that ends the session.
    pub logout_endpoint: String,
    pub client_id_param: String,
    pub client_id: String,
    pub redirect_uri_param: String,
    /// Address the provider sends the browser back to. Also the prefix the
    /// poller watches for, and the logout redirect target.
    pub redirect_uri: String,
    /// Name under which the redirect URI is passed on logout requests.
    pub logout_redirect_param: String,
    pub response_type_param: String,
    pub response_type: String,
    /// Name under which the anti-CSRF nonce is sent and read back.
    pub state_param: String,
    /// Additional parameters, appended in order after the standard five.
    pub extra_params: Vec<QueryParam>,
    pub response_params: ResponseParams,
    pub poll_interval: Duration,
    /// Upper bound on a whole flow. `None` waits for the user indefinitely.
    pub flow_deadline: Option<Duration>,
}

impl FlowConfig {
    /// Build a config with RFC 6749 parameter spellings and a `code`
    /// response type.
    pub fn new(
        authorize_endpoint: impl Into<String>,
        logout_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            authorize_endpoint: authorize_endpoint.into(),
            logout_endpoint: logout_endpoint.into(),
            client_id_param: "client_id".into(),
            client_id: client_id.into(),
            redirect_uri_param: "redirect_uri".into(),
            redirect_uri: redirect_uri.into(),
            logout_redirect_param: "post_logout_redirect_uri".into(),
            response_type_param: "response_type".into(),
            response_type: "code".into(),
            state_param: "state".into(),
            extra_params: Vec::new(),
            response_params: ResponseParams::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            flow_deadline: None,
        }
    }

    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = response_type.into();
        self
    }

    /// Append a static query parameter. Configuration order is request order.
    pub fn with_extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push(QueryParam {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_response_params(mut self, params: ResponseParams) -> Self {
        self.response_params = params;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound the whole flow. When the deadline elapses before the redirect
    /// comes back, the flow fails with a `timeout` outcome.
    pub fn with_flow_deadline(mut self, deadline: Duration) -> Self {
        self.flow_deadline = Some(deadline);
        self
    }

    /// Check the config once, before any flow starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.authorize_endpoint).map_err(|source| ConfigError::InvalidEndpoint {
            field: "authorize endpoint",
            source,
        })?;
        Url::parse(&self.logout_endpoint).map_err(|source| ConfigError::InvalidEndpoint {
            field: "logout endpoint",
            source,
        })?;
        let required = [
            ("client id", self.client_id.as_str()),
            ("redirect URI", self.redirect_uri.as_str()),
            ("client id parameter", self.client_id_param.as_str()),
            ("redirect URI parameter", self.redirect_uri_param.as_str()),
            ("logout redirect parameter", self.logout_redirect_param.as_str()),
            ("response type parameter", self.response_type_param.as_str()),
            ("state parameter", self.state_param.as_str()),
            ("error parameter", self.response_params.error_code.as_str()),
            (
                "error description parameter",
                self.response_params.error_description.as_str(),
            ),
            ("auth code parameter", self.response_params.auth_code.as_str()),
            (
                "returned state parameter",
                self.response_params.returned_state.as_str(),
            ),
            ("expiry parameter", self.response_params.expires_in.as_str()),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ConfigError::EmptyField(field));
            }
        }
        if self.extra_params.iter().any(|param| param.name.is_empty()) {
            return Err(ConfigError::EmptyField("extra parameter name"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Assemble the authorization request URL for one flow.
    ///
    /// Parameter order is fixed: client id, redirect URI, response type,
    /// state, then the extras in configured order.
    pub fn authorization_url(&self, nonce: &str) -> String {
        let mut url = format!(
            "{}?{}={}&{}={}&{}={}&{}={}",
            self.authorize_endpoint,
            self.client_id_param,
            self.client_id,
            self.redirect_uri_param,
            self.redirect_uri,
            self.response_type_param,
            self.response_type,
            self.state_param,
            nonce,
        );
        for param in &self.extra_params {
            url.push('&');
            url.push_str(&param.name);
            url.push('=');
            url.push_str(&param.value);
        }
        url
    }

    /// Assemble the logout request URL.
    pub fn logout_url(&self) -> String {
        format!(
            "{}?{}={}",
            self.logout_endpoint, self.logout_redirect_param, self.redirect_uri
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {source}")]
    InvalidEndpoint {
        field: &'static str,
        source: url::ParseError,
    },
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FlowConfig {
        FlowConfig::new(
            "https://id.example.com/authorize",
            "https://id.example.com/logout",
            "client-1",
            "https://app.example.com/cb",
        )
    }

    #[test]
    fn authorization_url_orders_parameters() {
        let url = config()
            .with_extra_param("audience", "api")
            .with_extra_param("prompt", "login")
            .authorization_url("n0nce");
        assert_eq!(
            url,
            "https://id.example.com/authorize?client_id=client-1\
             &redirect_uri=https://app.example.com/cb&response_type=code\
             &state=n0nce&audience=api&prompt=login"
        );
        assert_eq!(url.matches('?').count(), 1);
    }

    #[test]
    fn values_are_joined_verbatim() {
        let url = config()
            .with_extra_param("scope", "read write")
            .authorization_url("abc%3D");
        assert!(url.contains("scope=read write"));
        assert!(url.contains("state=abc%3D"));
    }

    #[test]
    fn custom_parameter_spellings_are_used() {
        let mut cfg = config().with_response_type("token");
        cfg.client_id_param = "app_id".into();
        cfg.state_param = "nonce".into();
        let url = cfg.authorization_url("x");
        assert!(url.contains("app_id=client-1"));
        assert!(url.contains("response_type=token"));
        assert!(url.contains("nonce=x"));
        assert!(!url.contains("client_id="));
    }

    #[test]
    fn logout_url_carries_redirect() {
        assert_eq!(
            config().logout_url(),
            "https://id.example.com/logout?post_logout_redirect_uri=https://app.example.com/cb"
        );
    }

    #[test]
    fn defaults_match_rfc_spellings() {
        let cfg = config();
        assert_eq!(cfg.response_type, "code");
        assert_eq!(cfg.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(cfg.flow_deadline, None);
        assert_eq!(cfg.response_params.auth_code, "code");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_relative_endpoint() {
        let mut cfg = config();
        cfg.authorize_endpoint = "/authorize".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidEndpoint { field: "authorize endpoint", .. })
        ));
    }

    #[test]
    fn validate_rejects_empty_client_id() {
        let mut cfg = config();
        cfg.client_id = String::new();
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyField("client id"))));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let cfg = config().with_poll_interval(Duration::ZERO);
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroPollInterval)));
    }
}
