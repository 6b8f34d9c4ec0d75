mod helpers;
mod microsoft_test;
mod reset_test;
mod session_test;
