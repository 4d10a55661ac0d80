pub mod password;
pub mod reporter_code;
pub mod token;
