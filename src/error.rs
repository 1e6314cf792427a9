use thiserror::Error;

/// A schedule annotation that could not be understood. Recoverable: the
/// workload is skipped for the current pass only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schedule `{value}`: {reason}")]
pub(crate) struct ParseError {
    pub(crate) value: String,
    pub(crate) reason: &'static str,
}

impl ParseError {
    pub(crate) fn new(value: &str, reason: &'static str) -> Self {
        Self {
            value: value.to_string(),
            reason,
        }
    }
}

/// The workload set could not be listed. Fatal for the reconciler.
#[derive(Debug, Error)]
#[error("failed to list deployments: {0}")]
pub(crate) struct FetchError(#[from] pub(crate) kube::Error);

#[derive(Debug, Error)]
pub(crate) enum UpdateError {
    #[error("deployment {namespace}/{name} was modified concurrently")]
    Conflict { namespace: String, name: String },

    #[error("deployment {namespace}/{name} no longer exists")]
    NotFound { namespace: String, name: String },

    #[error("deployment {namespace}/{name} has no resourceVersion, refusing an unguarded update")]
    MissingVersion { namespace: String, name: String },

    #[error("failed to update deployment {namespace}/{name}: {source}")]
    Transport {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

impl UpdateError {
    /// Classify a kube error returned by an update of `namespace/name`.
    pub(crate) fn from_kube(namespace: &str, name: &str, err: kube::Error) -> Self {
        let namespace = namespace.to_string();
        let name = name.to_string();
        match err {
            kube::Error::Api(ref resp) if resp.code == 409 => Self::Conflict { namespace, name },
            kube::Error::Api(ref resp) if resp.code == 404 => Self::NotFound { namespace, name },
            source => Self::Transport {
                namespace,
                name,
                source,
            },
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("simulated {reason}"),
        reason: reason.to_string(),
        code,
    })
}
