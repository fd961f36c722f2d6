mod redirect;

pub use redirect::validate_target_url;
