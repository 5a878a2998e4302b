pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reparenting \"{node_id}\" under \"{new_parent_id}\" would create a cycle")]
    Cycle {
        node_id: String,
        new_parent_id: String,
    },

    #[error("unknown node: \"{id}\"")]
    UnknownNode { id: String },

    #[error("the root node cannot be {action}")]
    RootImmutable { action: &'static str },

    #[error("invalid drop target: {message}")]
    InvalidDrop { message: String },

    #[error("duplicate node id: \"{id}\"")]
    DuplicateNode { id: String },
}
