use thiserror::Error;

/// Errors returned directly by the flow entry points.
///
/// Everything that happens after a flow starts is reported through the
/// outcome notifications instead; see [`crate::FlowEvents`].
#[derive(Debug, Error)]
pub enum FlowError {
    /// A login or logout flow is already in progress on this manager.
    #[error("a login or logout flow is already in progress")]
    FlowInProgress,
    /// The opener produced no usable window.
    #[error("the authorization window could not be opened")]
    PopupBlocked,
}
