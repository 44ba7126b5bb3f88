pub mod jose;
pub mod request_object;
