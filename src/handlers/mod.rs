mod redirect;
mod scans;

pub use redirect::redirect_handler;
pub use scans::{list_scans_handler, X_USER_ID};
