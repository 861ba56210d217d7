//! HTTP status reason phrases
//!
//! Covers the registered 1xx–5xx codes plus a handful of non-standard codes
//! that servers, proxies and CDNs send in practice.

use std::fmt;

/// An HTTP status code that renders as `"<code> <reason>"` when the code is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpStatus(u16);

impl HttpStatus {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn code(self) -> u16 {
        self.0
    }

    /// Reason phrase, if the code is in the table
    pub fn reason(self) -> Option<&'static str> {
        reason_phrase(self.0)
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} {}", self.0, reason),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Look up the reason phrase for a status code
fn reason_phrase(code: u16) -> Option<&'static str> {
    let reason = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",

        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        218 => "This Is Fine",
        226 => "IM Used",

        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",

        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        419 => "Page Expired",
        420 => "Enhance Your Calm",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        430 => "Request Header Fields Too Large",
        431 => "Request Header Fields Too Large",
        440 => "Login Time-out",
        444 => "No Response",
        449 => "Retry With",
        450 => "Blocked by Windows Parental Controls",
        451 => "Unavailable For Legal Reasons",
        494 => "Request Header Too Large",
        495 => "SSL Certificate Error",
        496 => "SSL Certificate Required",
        497 => "HTTP Request Sent to HTTPS Port",
        498 => "Invalid Token",
        499 => "Client Closed Request",

        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        509 => "Bandwidth Limit Exceeded",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        520 => "Web Server Returned an Unknown Error",
        521 => "Web Server Is Down",
        522 => "Connection Timed Out",
        523 => "Origin Is Unreachable",
        524 => "A Timeout Occurred",
        525 => "SSL Handshake Failed",
        526 => "Invalid SSL Certificate",
        527 => "Railgun Error",
        529 => "Site is overloaded",
        530 => "Site is frozen",
        561 => "Unauthorized",
        598 => "Network read timeout error",
        599 => "Network Connect Timeout Error",
        _ => return None,
    };
    Some(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_codes() {
        assert_eq!(reason_phrase(200), Some("OK"));
        assert_eq!(reason_phrase(404), Some("Not Found"));
        assert_eq!(reason_phrase(503), Some("Service Unavailable"));
    }

    #[test]
    fn test_non_standard_codes() {
        assert_eq!(reason_phrase(420), Some("Enhance Your Calm"));
        assert_eq!(reason_phrase(499), Some("Client Closed Request"));
        assert_eq!(reason_phrase(522), Some("Connection Timed Out"));
    }

    #[test]
    fn test_unknown_code_falls_back_to_number() {
        assert_eq!(reason_phrase(299), None);
        assert_eq!(HttpStatus::new(299).to_string(), "299");
        assert_eq!(HttpStatus::new(418).to_string(), "418 I'm a teapot");
    }
}
