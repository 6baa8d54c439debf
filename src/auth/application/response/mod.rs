pub mod session_response;
