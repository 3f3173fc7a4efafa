use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("node {0} is already attached to a parent")]
    AlreadyAttached(String),
    #[error("node {0} is detached from any scope")]
    Detached(String),
    #[error("appending {0} under {1} would create a cycle")]
    WouldCycle(String, String),
    #[error("node {0} is not a child of {1}")]
    NotAChild(String, String),
}
