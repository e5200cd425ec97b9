use std::{borrow::Cow, sync::Arc};

use crate::error::{XMLError, XMLErrorDomain, XMLErrorLevel};

/// A diagnostic reported to [`SAXHandler`](crate::sax::handler::SAXHandler).
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "{}[line:{line},column:{column}]:{level}:{domain}:{message}",
    .system_id.as_deref().unwrap_or("")
)]
pub struct SAXParseError {
    pub error: XMLError,
    pub level: XMLErrorLevel,
    pub domain: XMLErrorDomain,
    pub line: usize,
    pub column: usize,
    pub system_id: Option<Arc<str>>,
    pub public_id: Option<Arc<str>>,
    pub message: Cow<'static, str>,
}

macro_rules! generic_error {
    ($reader:expr, $code:expr, $level:ident, $domain:ident, $message:literal, $( $args:expr ),+ $(,)?) => {{
        #[allow(unused_imports)]
        use $crate::error::XMLError::*;
        let code = $code;
        let message = ::std::borrow::Cow::Owned(format!($message, $( $args ),+));
        $reader.report_error(
            code,
            $crate::error::XMLErrorLevel::$level,
            $crate::error::XMLErrorDomain::$domain,
            message,
        )
    }};
    ($reader:expr, $code:expr, $level:ident, $domain:ident, $message:literal) => {{
        #[allow(unused_imports)]
        use $crate::error::XMLError::*;
        let code = $code;
        $reader.report_error(
            code,
            $crate::error::XMLErrorLevel::$level,
            $crate::error::XMLErrorDomain::$domain,
            ::std::borrow::Cow::Borrowed($message),
        )
    }};
}

/// Report a well-formedness error.  
/// After this, no events other than diagnostics are delivered to the handler.
macro_rules! fatal_error {
    ($reader:expr, $code:expr, $( $rest:tt )+) => {
        $crate::sax::error::generic_error!($reader, $code, FatalError, Parser, $( $rest )+)
    };
}

macro_rules! error {
    ($reader:expr, $code:expr, $( $rest:tt )+) => {
        $crate::sax::error::generic_error!($reader, $code, Error, Parser, $( $rest )+)
    };
}

macro_rules! warning {
    ($reader:expr, $code:expr, $( $rest:tt )+) => {
        $crate::sax::error::generic_error!($reader, $code, Warning, Parser, $( $rest )+)
    };
}

/// Report a violation of Namespaces in XML.  
/// The document is no longer namespace-well-formed, but parsing continues.
macro_rules! ns_error {
    ($reader:expr, $code:expr, $( $rest:tt )+) => {
        $crate::sax::error::generic_error!($reader, $code, Error, Namespace, $( $rest )+)
    };
}

macro_rules! validity_error {
    ($reader:expr, $code:expr, $( $rest:tt )+) => {
        $crate::sax::error::generic_error!($reader, $code, Error, DTDValid, $( $rest )+)
    };
}

pub(crate) use {error, fatal_error, generic_error, ns_error, validity_error, warning};
