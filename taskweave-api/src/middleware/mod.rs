/// HTTP middleware
///
/// - `session`: cookie-backed session carrier and the layer that runs the
///   session guard in front of protected routes

pub mod session;
