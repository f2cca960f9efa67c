use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The closed set of methods a pipeline dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Head,
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Connect,
    Trace,
}

impl Method {
    pub const COUNT: usize = 9;

    pub const ALL: [Method; Self::COUNT] = [
        Method::Head,
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Options,
        Method::Connect,
        Method::Trace,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing is case-sensitive: `"get"` is not a method.
impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnknownMethod(s.to_string()))
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = Error;

    fn try_from(value: &http::Method) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}

/// Exposes the method-name field of a host request.
pub trait MethodSource {
    fn method_name(&self) -> &str;

    fn method(&self) -> Result<Method, Error> {
        self.method_name().parse()
    }
}

impl<B> MethodSource for http::Request<B> {
    #[inline]
    fn method_name(&self) -> &str {
        http::Request::method(self).as_str()
    }
}

impl MethodSource for Method {
    #[inline]
    fn method_name(&self) -> &str {
        self.as_str()
    }
}
