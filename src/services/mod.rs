pub mod webform_service;

pub use webform_service::WebFormService;
