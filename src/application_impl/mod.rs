mod session_service_impl;

pub use session_service_impl::*;
