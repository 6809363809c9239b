use axum::Router;

/// A service module that contributes HTTP routes.
///
/// Each business module (accounts, warranty, ...) implements this trait
/// to register its API endpoints. The binary entry point collects all
/// modules and merges their routes into a single Router.
pub trait Module: Send + Sync {
    /// Module name, used for logging and route prefixes.
    fn name(&self) -> &str;

    /// Return the module's routes. Routers carry their own
    /// `/{name}/v1` prefix and state.
    fn routes(&self) -> Router;
}
