/// Completion notifications injected by the hosting application.
///
/// Exactly one method fires per completed flow, after the result record has
/// been written. Notifications carry no payload; hosts read
/// [`crate::FlowManager::result`] from inside the callback instead.
///
/// Callbacks run on the flow's task and should return promptly.
pub trait FlowEvents: Send + Sync {
    /// A login flow finished with a success classification.
    fn login_succeeded(&self);

    /// A login flow finished with any failure classification.
    fn login_failed(&self);

    /// A logout flow reached the redirect.
    fn logout_done(&self);
}
