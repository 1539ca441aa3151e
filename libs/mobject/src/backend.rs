use async_trait::async_trait;

/// A pluggable sequencer implementation.
///
/// Instances are built by the [`BackendFactory`](crate::BackendFactory) from a
/// type name and a JSON configuration, then owned by a provider until they
/// are closed or destroyed.
///
/// Backends are constructed through one of two entry points. `create` is
/// expected to set up fresh state, `open` to attach to state that already
/// exists somewhere outside the process. Both produce the same trait object
/// and nothing in the provider checks that an opened backend really found
/// pre-existing state: honoring that convention is up to the backend author.
///
/// Domain calls may run concurrently on one instance. A backend that is not
/// reentrant must do its own locking.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Identity side effect; the provider sends nothing back.
    fn say_hello(&self);

    async fn compute_sum(&self, x: i32, y: i32) -> anyhow::Result<i32>;

    /// Remove the backend's persistent state.
    ///
    /// The provider unregisters the instance before calling this, so it runs
    /// at most once per instance.
    async fn destroy(&self) -> anyhow::Result<bool>;
}
