use std::sync::Arc;

use crate::{encoding::DecodeError, sax::handler::HandlerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XMLErrorLevel {
    FatalError,
    Error,
    Warning,
}

impl std::fmt::Display for XMLErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::FatalError => write!(f, "fatal error"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XMLErrorDomain {
    Parser,
    Namespace,
    DTDValid,
}

impl std::fmt::Display for XMLErrorDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Parser => write!(f, "parser"),
            Self::Namespace => write!(f, "namespace"),
            Self::DTDValid => write!(f, "dtd-valid"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum XMLError {
    // general errors
    InternalError,
    // parser errors
    ParserUnsupportedEncoding,
    ParserEncodingMismatch,
    ParserUnsupportedXMLVersion,
    ParserTooLongXMLVersionNumber,
    ParserTooLongEncodingName,
    ParserTooLongName,
    ParserTooLongText,
    ParserEmptyDocument,
    ParserEmptyNmtoken,
    ParserEmptyName,
    ParserInvalidNameStartChar,
    ParserInvalidQNameSeparator,
    ParserInvalidSystemLiteral,
    ParserSystemLiteralWithFragment,
    ParserInvalidPubidLiteral,
    ParserInvalidAttValue,
    ParserInvalidEntityValue,
    ParserInvalidExternalID,
    ParserInvalidCharacter,
    ParserInvalidXMLDecl,
    ParserInvalidTextDecl,
    ParserInvalidXMLVersion,
    ParserInvalidEncodingDecl,
    ParserInvalidEncodingName,
    ParserInvalidSDDecl,
    ParserInvalidComment,
    ParserInvalidProcessingInstruction,
    ParserUnacceptablePITarget,
    ParserUnacceptablePatternInCharData,
    ParserInvalidDoctypeDecl,
    ParserMultipleDoctypeDecl,
    ParserInvalidElementDecl,
    ParserDuplicateElementDecl,
    ParserDuplicateMixedContent,
    ParserTooDeepContentModel,
    ParserInvalidAttlistDecl,
    ParserDuplicateAttlistDecl,
    ParserDuplicateTokensInAttlistDecl,
    ParserInvalidEntityDecl,
    ParserDuplicateEntityDecl,
    ParserInvalidNotationDecl,
    ParserDuplicateNotationDecl,
    ParserUndeclaredNotation,
    ParserInvalidConditionalSect,
    ParserInvalidStartOrEmptyTag,
    ParserInvalidEndTag,
    ParserMismatchElementType,
    ParserTooDeepElement,
    ParserDuplicateAttributes,
    ParserInvalidCharacterReference,
    ParserInvalidEntityReference,
    ParserInvalidParameterEntityReference,
    ParserEntityNotFound,
    ParserEntityRecursion,
    ParserEntityIncorrectNesting,
    ParserEntityTooDeep,
    ParserEntityAmplification,
    ParserUndeclaredEntityReference,
    ParserUnparsedEntityReference,
    ParserExternalEntityInAttValue,
    ParserMarkupInAttValue,
    ParserPEReferenceInInternalSubset,
    ParserNamespaceNameNotURI,
    ParserUnacceptableNamespaceName,
    ParserUndefinedNamespace,
    ParserUnexpectedDocumentContent,
    ParserUnexpectedEOF,
    ParserHandlerFailure(HandlerError),
    ParserStopped,
    // I/O errors
    IOError(Arc<std::io::Error>),
    // encoding errors
    DecodeError(DecodeError),
    // resolver errors
    ResolverEntityNotFound,
}

impl XMLError {
    /// Check if the parser can skip the broken markup declaration that raised this error
    /// and go on to the next one.
    ///
    /// Resource exhaustion, I/O and encoding failures are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::InternalError
                | Self::ParserUnsupportedEncoding
                | Self::ParserEncodingMismatch
                | Self::ParserTooLongName
                | Self::ParserTooLongText
                | Self::ParserTooDeepContentModel
                | Self::ParserEntityRecursion
                | Self::ParserEntityTooDeep
                | Self::ParserEntityAmplification
                | Self::ParserHandlerFailure(_)
                | Self::ParserStopped
                | Self::IOError(_)
                | Self::DecodeError(_)
        )
    }
}

impl std::fmt::Display for XMLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for XMLError {}

impl From<std::io::Error> for XMLError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(Arc::new(value))
    }
}

impl From<DecodeError> for XMLError {
    fn from(value: DecodeError) -> Self {
        Self::DecodeError(value)
    }
}

impl From<HandlerError> for XMLError {
    fn from(value: HandlerError) -> Self {
        Self::ParserHandlerFailure(value)
    }
}
