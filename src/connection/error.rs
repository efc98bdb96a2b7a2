use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("command `{command}` failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to transfer {local} to {remote}: {reason}")]
    Transfer {
        local: String,
        remote: String,
        reason: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
