//! Error types for the plexus sync layer.

use std::fmt;

/// Result type alias for plexus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for plexus operations.
///
/// Contract violations (everything except the read-guard variants) abort
/// the whole operation; the read-guard variants (`NotUpToDate`,
/// `NotUpToDateDependency`) surface on individual property reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A declared property was read but not requested by the originating query.
    NotUpToDate {
        property: String,
        query: String,
    },
    /// A computed property's dependency is not up to date.
    NotUpToDateDependency {
        property: String,
        dependency: String,
        query: String,
    },
    /// A record reached a repository owning a different node type.
    TypeMismatch {
        expected: String,
        got: String,
    },
    /// An incoming payload carried no version.
    MissingVersion {
        node_type: String,
        id: String,
    },
    /// A node id was looked up before any data for it arrived.
    NotCached {
        node_type: String,
        id: String,
    },
    /// A caller declared a field name reserved for auto-injected identity
    /// properties.
    ImpliedProperty {
        node_type: String,
        property: String,
    },
    /// A push message or query result had an unexpected shape.
    MalformedMessage {
        message: String,
    },
    /// Invalid node type definition.
    InvalidSchema {
        message: String,
    },
    /// Invalid query definition or selection.
    InvalidQuery {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotUpToDate { property, query } => {
                write!(
                    f,
                    "Property {} was not queried by \"{}\" and is not up to date",
                    property, query
                )
            }
            Error::NotUpToDateDependency {
                property,
                dependency,
                query,
            } => {
                write!(
                    f,
                    "Computed property {} depends on {} which was not queried by \"{}\"",
                    property, dependency, query
                )
            }
            Error::TypeMismatch { expected, got } => {
                write!(f, "Node type mismatch: expected {}, got {}", expected, got)
            }
            Error::MissingVersion { node_type, id } => {
                write!(f, "Payload for {} \"{}\" carries no version", node_type, id)
            }
            Error::NotCached { node_type, id } => {
                write!(f, "No cached node for {} \"{}\"", node_type, id)
            }
            Error::ImpliedProperty { node_type, property } => {
                write!(
                    f,
                    "Field {} on {} is reserved for auto-injected identity properties",
                    property, node_type
                )
            }
            Error::MalformedMessage { message } => {
                write!(f, "Malformed message: {}", message)
            }
            Error::InvalidSchema { message } => {
                write!(f, "Invalid schema: {}", message)
            }
            Error::InvalidQuery { message } => {
                write!(f, "Invalid query: {}", message)
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates a not-up-to-date error.
    pub fn not_up_to_date(property: impl Into<String>, query: impl Into<String>) -> Self {
        Error::NotUpToDate {
            property: property.into(),
            query: query.into(),
        }
    }

    /// Creates a not-up-to-date dependency error.
    pub fn not_up_to_date_dependency(
        property: impl Into<String>,
        dependency: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Error::NotUpToDateDependency {
            property: property.into(),
            dependency: dependency.into(),
            query: query.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Creates a missing version error.
    pub fn missing_version(node_type: impl Into<String>, id: impl Into<String>) -> Self {
        Error::MissingVersion {
            node_type: node_type.into(),
            id: id.into(),
        }
    }

    /// Creates a not cached error.
    pub fn not_cached(node_type: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotCached {
            node_type: node_type.into(),
            id: id.into(),
        }
    }

    /// Creates an implied property error.
    pub fn implied_property(node_type: impl Into<String>, property: impl Into<String>) -> Self {
        Error::ImpliedProperty {
            node_type: node_type.into(),
            property: property.into(),
        }
    }

    /// Creates a malformed message error.
    pub fn malformed_message(message: impl Into<String>) -> Self {
        Error::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_up_to_date("dueDate", "todos");
        assert!(err.to_string().contains("dueDate"));
        assert!(err.to_string().contains("todos"));

        let err = Error::type_mismatch("todo", "user");
        assert!(err.to_string().contains("expected todo"));

        let err = Error::not_cached("todo", "t-1");
        assert!(err.to_string().contains("t-1"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::implied_property("todo", "version");
        match err {
            Error::ImpliedProperty { property, .. } => assert_eq!(property, "version"),
            _ => panic!("Wrong error type"),
        }

        let err = Error::not_up_to_date_dependency("displayName", "firstName", "users");
        match err {
            Error::NotUpToDateDependency { dependency, .. } => {
                assert_eq!(dependency, "firstName");
            }
            _ => panic!("Wrong error type"),
        }
    }
}
