pub mod system;
pub mod web_form;
