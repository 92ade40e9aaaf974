//! Turns an operation descriptor plus arguments into an `HttpRequest`.
//!
//! # Design
//! The query string is assembled in a fixed order so identical inputs always
//! yield identical requests: `response=json`, `command`, the descriptor's
//! fixed parameters, positional arguments in declaration order, then option
//! parameters in the order the options object declared them. Every contract
//! check happens here, before a request exists that could be sent.

use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::http::{HttpRequest, HttpResponse};
use crate::operation::Operation;
use crate::options::QueryOptions;
use crate::parser::Payload;

/// Parameter names the builder and the signer own.
const RESERVED: &[&str] = &["response", "command", "apiKey", "signature"];

/// Stateless request builder bound to one endpoint.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: String,
}

impl RequestBuilder {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build(
        &self,
        op: &Operation,
        args: &[Option<&str>],
        options: Option<&QueryOptions>,
    ) -> ApiResult<HttpRequest> {
        if args.len() > op.params.len() {
            return Err(ApiError::UnexpectedArgument {
                command: op.command,
                expected: op.params.len(),
                got: args.len(),
            });
        }

        let mut request = HttpRequest::new(op.method, &self.endpoint);
        request.query.push(("response".to_string(), "json".to_string()));
        request.query.push(("command".to_string(), op.command.to_string()));
        for (name, value) in op.fixed {
            request.query.push((name.to_string(), value.to_string()));
        }

        for (index, param) in op.params.iter().enumerate() {
            match args.get(index).copied().flatten() {
                Some(value) => request.query.push((param.name.to_string(), value.to_string())),
                None if param.required => {
                    return Err(ApiError::MissingParameter {
                        command: op.command,
                        name: param.name,
                    })
                }
                None => {}
            }
        }

        if let Some(options) = options {
            for (name, value) in options.params() {
                check_option(op, name)?;
                request.query.push((name.clone(), value.clone()));
            }
        }

        request
            .headers
            .push(("Accept".to_string(), "application/json".to_string()));
        debug!(command = op.command, params = request.query.len(), "built request");
        Ok(request)
    }
}

fn check_option(op: &Operation, name: &str) -> ApiResult<()> {
    if name.is_empty() {
        return Err(ApiError::InvalidOption {
            command: op.command,
            reason: "empty parameter name".to_string(),
        });
    }
    if RESERVED.iter().any(|reserved| reserved.eq_ignore_ascii_case(name)) {
        return Err(ApiError::InvalidOption {
            command: op.command,
            reason: format!("`{name}` is reserved"),
        });
    }
    if op.declares(name) {
        return Err(ApiError::InvalidOption {
            command: op.command,
            reason: format!("`{name}` is already a parameter of the command"),
        });
    }
    Ok(())
}

/// Run a 2xx response through the operation's parser, anything else through
/// its fallback. Exactly one of the two strategies sees the response.
pub fn resolve(op: &Operation, response: HttpResponse) -> ApiResult<Payload> {
    if response.is_success() {
        Ok(op.parser.parse(&response)?)
    } else {
        debug!(command = op.command, status = response.status, "resolving error response");
        op.fallback.recover(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::Fallback;
    use crate::http::HttpMethod;
    use crate::operation::Param;
    use crate::parser::ResponseParser;

    const UPDATE_ISO: Operation = Operation {
        command: "updateIso",
        method: HttpMethod::Get,
        fixed: &[],
        params: &[Param::required("id")],
        parser: ResponseParser::UnwrapOnlyValue,
        fallback: Fallback::MapHttp4xxToError,
    };

    const LIST_FIREWALL_RULES: Operation = Operation {
        command: "listFirewallRules",
        method: HttpMethod::Get,
        fixed: &[("listAll", "true")],
        params: &[],
        parser: ResponseParser::UnwrapNestedSet,
        fallback: Fallback::EmptySetOnNotFound,
    };

    const COPY_ISO: Operation = Operation {
        command: "copyIso",
        method: HttpMethod::Get,
        fixed: &[],
        params: &[
            Param::required("id"),
            Param::optional("sourcezoneid"),
            Param::required("destzoneid"),
        ],
        parser: ResponseParser::UnwrapOnlyValue,
        fallback: Fallback::MapHttp4xxToError,
    };

    fn builder() -> RequestBuilder {
        RequestBuilder::new("http://localhost:8080/client/api/")
    }

    #[test]
    fn positional_then_options_in_declared_order() {
        let options = QueryOptions::new()
            .param("bootable", true)
            .param("displaytext", "robert")
            .param("format", "format")
            .param("name", "bob")
            .param("ostypeid", "9")
            .param("passwordenabled", true);
        let req = builder().build(&UPDATE_ISO, &[Some("3")], Some(&options)).unwrap();
        assert_eq!(
            req.request_line(),
            "GET http://localhost:8080/client/api?response=json&command=updateIso&id=3&bootable=true&displaytext=robert&format=format&name=bob&ostypeid=9&passwordenabled=true HTTP/1.1"
        );
        assert_eq!(req.header("Accept"), Some("application/json"));
        assert!(req.body.is_none());
    }

    #[test]
    fn fixed_params_follow_command() {
        let req = builder().build(&LIST_FIREWALL_RULES, &[], None).unwrap();
        assert_eq!(req.query_string(), "response=json&command=listFirewallRules&listAll=true");
    }

    #[test]
    fn absent_optional_is_omitted() {
        let req = builder().build(&COPY_ISO, &[Some("3"), None, Some("7")], None).unwrap();
        assert_eq!(req.query_string(), "response=json&command=copyIso&id=3&destzoneid=7");
    }

    #[test]
    fn missing_required_fails_fast() {
        let err = builder().build(&COPY_ISO, &[Some("3")], None).unwrap_err();
        assert!(matches!(
            err,
            ApiError::MissingParameter {
                command: "copyIso",
                name: "destzoneid"
            }
        ));
    }

    #[test]
    fn too_many_arguments() {
        let err = builder().build(&UPDATE_ISO, &[Some("3"), Some("4")], None).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedArgument { expected: 1, got: 2, .. }));
    }

    #[test]
    fn reserved_option_is_rejected() {
        let options = QueryOptions::new().param("signature", "forged");
        let err = builder().build(&UPDATE_ISO, &[Some("3")], Some(&options)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOption { .. }));
    }

    #[test]
    fn option_shadowing_a_parameter_is_rejected() {
        let options = QueryOptions::new().param("id", "4");
        let err = builder().build(&UPDATE_ISO, &[Some("3")], Some(&options)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOption { .. }));
    }

    #[test]
    fn identical_inputs_build_identical_requests() {
        let options = QueryOptions::new().param("name", "web server");
        let a = builder().build(&UPDATE_ISO, &[Some("3")], Some(&options)).unwrap();
        let b = builder().build(&UPDATE_ISO, &[Some("3")], Some(&options)).unwrap();
        assert_eq!(a.url(), b.url());
        assert!(a.url().ends_with("name=web%20server"));
    }

    #[test]
    fn resolve_uses_parser_for_success() {
        let payload = resolve(&LIST_FIREWALL_RULES, HttpResponse::new(200, r#"{"listfirewallrulesresponse":{}}"#)).unwrap();
        assert_eq!(payload, Payload::Set(Vec::new()));
    }

    #[test]
    fn resolve_uses_fallback_for_errors() {
        let payload = resolve(&LIST_FIREWALL_RULES, HttpResponse::new(404, "")).unwrap();
        assert_eq!(payload, Payload::Set(Vec::new()));
        let err = resolve(&UPDATE_ISO, HttpResponse::new(404, "")).unwrap_err();
        assert!(err.is_not_found());
    }
}
